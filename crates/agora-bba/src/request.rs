use agora_core::{serialize, BbaMessage, BbaType, Binary};
use serde::{Deserialize, Serialize};

use crate::error::BbaError;

/// Vote that `value` is a valid estimate for the round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BvalRequest {
    pub value: Binary,
}

/// Vote for a value already in the sender's bin values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxRequest {
    pub value: Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BbaRequest {
    Bval(BvalRequest),
    Aux(AuxRequest),
}

impl BbaRequest {
    pub fn kind(&self) -> BbaType {
        match self {
            BbaRequest::Bval(_) => BbaType::Bval,
            BbaRequest::Aux(_) => BbaType::Aux,
        }
    }

    pub fn value(&self) -> Binary {
        match self {
            BbaRequest::Bval(req) => req.value,
            BbaRequest::Aux(req) => req.value,
        }
    }

    pub fn decode(kind: u32, payload: &[u8]) -> Result<Self, BbaError> {
        let kind = BbaType::from_tag(kind).ok_or(BbaError::UndefinedRequestType(kind))?;
        let req = match kind {
            BbaType::Bval => BbaRequest::Bval(serialize::from_bytes(payload)?),
            BbaType::Aux => BbaRequest::Aux(serialize::from_bytes(payload)?),
        };
        Ok(req)
    }

    pub fn encode_payload(&self) -> Result<Vec<u8>, BbaError> {
        let payload = match self {
            BbaRequest::Bval(req) => serialize::to_bytes(req)?,
            BbaRequest::Aux(req) => serialize::to_bytes(req)?,
        };
        Ok(payload)
    }

    pub fn to_message(&self, epoch: u64, round: u64) -> Result<BbaMessage, BbaError> {
        Ok(BbaMessage {
            epoch,
            round,
            kind: self.kind().tag(),
            payload: self.encode_payload()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_follows_variant() {
        let aux = BbaRequest::Aux(AuxRequest { value: Binary::One });
        let msg = aux.to_message(3, 1).unwrap();

        assert_eq!((msg.epoch, msg.round), (3, 1));
        assert_eq!(msg.kind, BbaType::Aux.tag());
        assert_eq!(BbaRequest::decode(msg.kind, &msg.payload).unwrap(), aux);
    }

    #[test]
    fn test_bval_and_aux_are_distinct() {
        let bval = BbaRequest::Bval(BvalRequest { value: Binary::Zero });
        let msg = bval.to_message(0, 0).unwrap();
        assert_eq!(msg.kind, BbaType::Bval.tag());
        assert_ne!(BbaType::Bval.tag(), BbaType::Aux.tag());
        assert_eq!(bval.value(), Binary::Zero);
    }

    #[test]
    fn test_undefined_tag() {
        assert!(matches!(
            BbaRequest::decode(7, &[]),
            Err(BbaError::UndefinedRequestType(7))
        ));
    }
}
