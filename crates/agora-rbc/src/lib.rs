//! Agora RBC - Erasure-coded reliable broadcast
//!
//! One instance runs per (epoch, proposer). The proposer splits its value
//! into Reed-Solomon shards committed under a Merkle root, and every member
//! drives VAL, ECHO and READY until it can deliver the same bytes.

pub mod erasure;
pub mod error;
pub mod merkle;
pub mod rbc;
pub mod request;
pub mod state;

pub use erasure::ErasureCoder;
pub use error::RbcError;
pub use merkle::{commit, order_of_leaf, root_from_path, validate, MerklePath, MerkleTree};
pub use rbc::Rbc;
pub use request::{EchoRequest, RbcRequest, ReadyRequest, ValRequest};
pub use state::RbcState;
