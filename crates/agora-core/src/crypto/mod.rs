pub mod hash;

pub use hash::{hash_blake3, hash_pair, Hash};
