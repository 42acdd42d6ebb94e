use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::member::Member;

/// Kind of a reliable broadcast message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RbcType {
    Val,
    Echo,
    Ready,
}

impl RbcType {
    pub fn tag(self) -> u32 {
        match self {
            RbcType::Val => 0,
            RbcType::Echo => 1,
            RbcType::Ready => 2,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(RbcType::Val),
            1 => Some(RbcType::Echo),
            2 => Some(RbcType::Ready),
            _ => None,
        }
    }
}

/// Kind of a binary agreement message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BbaType {
    Bval,
    Aux,
}

impl BbaType {
    pub fn tag(self) -> u32 {
        match self {
            BbaType::Bval => 0,
            BbaType::Aux => 1,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(BbaType::Bval),
            1 => Some(BbaType::Aux),
            _ => None,
        }
    }
}

/// Reliable broadcast message body
///
/// `content_length` is the length of the proposer's original payload. It is
/// carried next to every message because the erasure padding is not
/// self-describing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RbcMessage {
    pub proposer: Member,
    pub content_length: u64,
    pub kind: u32,
    pub payload: Vec<u8>,
}

/// Binary agreement message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BbaMessage {
    pub epoch: u64,
    pub round: u64,
    pub kind: u32,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Rbc(RbcMessage),
    Bba(BbaMessage),
}

/// Envelope handed to the broadcaster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Member,
    /// Unix timestamp in milliseconds
    pub timestamp: u64,
    pub payload: Payload,
}

impl Message {
    pub fn new(sender: Member, payload: Payload) -> Self {
        Message {
            sender,
            timestamp: current_timestamp(),
            payload,
        }
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
