use serde::{Deserialize, Serialize};
use std::fmt;

/// Network identity of a participant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Member {
    pub host: String,
    pub port: u16,
}

impl Member {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Member {
            host: host.into(),
            port,
        }
    }

    /// Key under which this member's votes are stored
    pub fn conn_id(&self) -> ConnId {
        ConnId(self.to_string())
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Per-sender repository key derived from a member's address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnId(String);

impl From<&Member> for ConnId {
    fn from(member: &Member) -> Self {
        member.conn_id()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conn_id_follows_address() {
        let a = Member::new("127.0.0.1", 8000);
        let b = Member::new("127.0.0.1", 8001);
        assert_eq!(a.conn_id().to_string(), "127.0.0.1:8000");
        assert_ne!(a.conn_id(), b.conn_id());
        assert_eq!(ConnId::from(&a), Member::new("127.0.0.1", 8000).conn_id());
    }
}
