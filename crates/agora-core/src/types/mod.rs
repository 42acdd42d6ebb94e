pub mod binary;
pub mod member;
pub mod message;

pub use binary::{Binary, BinarySet, BinaryState};
pub use member::{ConnId, Member};
pub use message::{BbaMessage, BbaType, Message, Payload, RbcMessage, RbcType};
