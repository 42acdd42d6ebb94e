use crate::types::{Binary, Message};

/// Best-effort send-to-all-members, the sender included
///
/// Instances call this from their worker task, so implementations must not
/// call back into the instance that is broadcasting.
pub trait Broadcaster: Send + Sync {
    fn share_message(&self, message: Message);
}

/// Source of the common coin
///
/// Every honest member must observe the same bit for the same
/// `(epoch, round)`, and the adversary must not learn it in advance.
pub trait CoinGenerator: Send + Sync {
    fn coin(&self, epoch: u64, round: u64) -> Binary;
}
