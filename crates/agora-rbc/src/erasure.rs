use reed_solomon_erasure::galois_8::ReedSolomon;

use crate::error::RbcError;

/// Reed-Solomon coder over GF(2^8)
///
/// With `n` members and `f` tolerated faults it uses `n - f` data shards and
/// `f` parity shards, so any `n - f` shards recover the payload.
pub struct ErasureCoder {
    rs: ReedSolomon,
    data_shards: usize,
    parity_shards: usize,
}

impl ErasureCoder {
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self, RbcError> {
        if data_shards == 0 || parity_shards == 0 {
            return Err(RbcError::ConfigError(format!(
                "need at least one data and one parity shard, got {data_shards} and {parity_shards}"
            )));
        }

        let rs = ReedSolomon::new(data_shards, parity_shards)
            .map_err(|e| RbcError::ConfigError(format!("{e:?}")))?;

        Ok(ErasureCoder {
            rs,
            data_shards,
            parity_shards,
        })
    }

    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    pub fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Length of every shard for a payload of `content_length` bytes
    ///
    /// Shards are never empty, so an empty payload still codes.
    pub fn shard_len(&self, content_length: usize) -> usize {
        content_length.div_ceil(self.data_shards).max(1)
    }

    /// Pad `data` with zeros and cut it into equal data shards
    pub fn split(&self, data: &[u8]) -> Vec<Vec<u8>> {
        let shard_len = self.shard_len(data.len());
        let mut padded = data.to_vec();
        padded.resize(shard_len * self.data_shards, 0);

        padded.chunks(shard_len).map(<[u8]>::to_vec).collect()
    }

    /// Append parity shards to a full set of data shards
    pub fn encode(&self, mut shards: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, RbcError> {
        if shards.len() != self.data_shards {
            return Err(RbcError::CodingError(format!(
                "expected {} data shards, got {}",
                self.data_shards,
                shards.len()
            )));
        }

        let shard_len = shards.first().map(Vec::len).unwrap_or(0);
        shards.resize(self.total_shards(), vec![0u8; shard_len]);
        self.rs
            .encode(&mut shards)
            .map_err(|e| RbcError::CodingError(format!("{e:?}")))?;

        Ok(shards)
    }

    /// Split and encode in one step
    pub fn shard(&self, data: &[u8]) -> Result<Vec<Vec<u8>>, RbcError> {
        self.encode(self.split(data))
    }

    /// Fill in every `None` shard from the ones present
    pub fn reconstruct(&self, shards: &mut [Option<Vec<u8>>]) -> Result<(), RbcError> {
        let have = shards.iter().filter(|s| s.is_some()).count();
        if have < self.data_shards {
            return Err(RbcError::InsufficientShards {
                have,
                need: self.data_shards,
            });
        }

        self.rs
            .reconstruct(shards)
            .map_err(|e| RbcError::CodingError(format!("{e:?}")))
    }

    /// Concatenate the data shards and strip the padding
    pub fn join(&self, shards: &[Vec<u8>], content_length: usize) -> Result<Vec<u8>, RbcError> {
        let mut value: Vec<u8> = shards
            .iter()
            .take(self.data_shards)
            .flatten()
            .copied()
            .collect();

        if value.len() < content_length {
            return Err(RbcError::CodingError(format!(
                "reconstructed {} bytes, content length is {}",
                value.len(),
                content_length
            )));
        }

        value.truncate(content_length);
        Ok(value)
    }
}
