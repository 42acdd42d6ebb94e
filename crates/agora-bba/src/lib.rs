//! Agora BBA - Binary Byzantine agreement
//!
//! One instance runs per epoch. Members vote with BVAL and AUX each round
//! and use a common coin to break ties until every honest member decides
//! the same bit.

pub mod bba;
pub mod error;
pub mod request;
pub mod state;

pub use bba::Bba;
pub use error::BbaError;
pub use request::{AuxRequest, BbaRequest, BvalRequest};
pub use state::{BbaState, BbaStatus, MAX_FUTURE_ROUNDS};
