//! Agora Core - Shared primitives for the agreement engine
//!
//! This crate provides hashing, member identity, binary value cells, vote
//! repositories, the wire envelope and the capabilities the reliable
//! broadcast and binary agreement instances consume from their environment.

pub mod capability;
pub mod config;
pub mod crypto;
pub mod error;
pub mod repository;
pub mod serialize;
pub mod types;

pub use capability::{Broadcaster, CoinGenerator};
pub use config::Config;
pub use crypto::{hash_blake3, hash_pair, Hash};
pub use error::CoreError;
pub use repository::{IncomingRequestRepository, RequestRepository};
pub use types::*;
