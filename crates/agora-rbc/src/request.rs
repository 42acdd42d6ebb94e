use agora_core::{serialize, Hash, Member, RbcMessage, RbcType};
use serde::{Deserialize, Serialize};

use crate::error::RbcError;
use crate::merkle::{self, MerklePath};

/// Shard sent by the proposer to one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValRequest {
    pub root_hash: Hash,
    pub data: Vec<u8>,
    pub path: MerklePath,
}

/// A validated shard, rebroadcast to everyone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoRequest {
    pub root_hash: Hash,
    pub data: Vec<u8>,
    pub path: MerklePath,
}

/// Vote that `root_hash` is safe to deliver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyRequest {
    pub root_hash: Hash,
}

impl ValRequest {
    /// Whether `data` is a shard of a `leaf_count` shard value of
    /// `content_length` bytes committed under `root_hash`
    pub fn validate(&self, leaf_count: usize, content_length: u64) -> bool {
        validate_shard(&self.data, &self.root_hash, &self.path, leaf_count, content_length)
    }
}

impl EchoRequest {
    pub fn validate(&self, leaf_count: usize, content_length: u64) -> bool {
        validate_shard(&self.data, &self.root_hash, &self.path, leaf_count, content_length)
    }

    /// Slot of this shard in the coded value
    pub fn position(&self) -> usize {
        merkle::order_of_leaf(&self.path.index_bits)
    }
}

fn validate_shard(
    data: &[u8],
    root_hash: &Hash,
    path: &MerklePath,
    leaf_count: usize,
    content_length: u64,
) -> bool {
    merkle::root_from_path(data, path, leaf_count)
        .is_some_and(|tree_root| merkle::commit(&tree_root, content_length) == *root_hash)
}

impl From<ValRequest> for EchoRequest {
    fn from(req: ValRequest) -> Self {
        EchoRequest {
            root_hash: req.root_hash,
            data: req.data,
            path: req.path,
        }
    }
}

/// Any request a reliable broadcast instance accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RbcRequest {
    Val(ValRequest),
    Echo(EchoRequest),
    Ready(ReadyRequest),
}

impl RbcRequest {
    pub fn kind(&self) -> RbcType {
        match self {
            RbcRequest::Val(_) => RbcType::Val,
            RbcRequest::Echo(_) => RbcType::Echo,
            RbcRequest::Ready(_) => RbcType::Ready,
        }
    }

    /// Decode a payload according to its type tag
    pub fn decode(kind: u32, payload: &[u8]) -> Result<Self, RbcError> {
        let kind = RbcType::from_tag(kind).ok_or(RbcError::UnsupportedRequestType(kind))?;
        let req = match kind {
            RbcType::Val => RbcRequest::Val(serialize::from_bytes(payload)?),
            RbcType::Echo => RbcRequest::Echo(serialize::from_bytes(payload)?),
            RbcType::Ready => RbcRequest::Ready(serialize::from_bytes(payload)?),
        };
        Ok(req)
    }

    pub fn encode_payload(&self) -> Result<Vec<u8>, RbcError> {
        let payload = match self {
            RbcRequest::Val(req) => serialize::to_bytes(req)?,
            RbcRequest::Echo(req) => serialize::to_bytes(req)?,
            RbcRequest::Ready(req) => serialize::to_bytes(req)?,
        };
        Ok(payload)
    }

    /// Wrap this request for the instance of `proposer`
    pub fn to_message(&self, proposer: &Member, content_length: u64) -> Result<RbcMessage, RbcError> {
        Ok(RbcMessage {
            proposer: proposer.clone(),
            content_length,
            kind: self.kind().tag(),
            payload: self.encode_payload()?,
        })
    }
}
