use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::serialize;
use crate::types::Member;

/// Configuration shared by every broadcast and agreement instance of a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Number of members
    pub n: usize,

    /// Number of Byzantine members tolerated
    pub f: usize,

    /// This member's own address
    pub address: Member,

    /// Capacity of each instance's command queue
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Config {
            n: 4,
            f: 1,
            address: Member::new("127.0.0.1", 8000),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Config {
    /// Config tolerating the largest `f` with `3f + 1 <= n`
    pub fn new(n: usize, address: Member) -> Self {
        Config {
            n,
            f: n.saturating_sub(1) / 3,
            address,
            channel_capacity: default_channel_capacity(),
        }
    }

    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let config: Config = serialize::from_json(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.n == 0 {
            return Err(CoreError::Config("n must be positive".to_string()));
        }
        if 3 * self.f + 1 > self.n {
            return Err(CoreError::Config(format!(
                "n = {} cannot tolerate f = {} faults",
                self.n, self.f
            )));
        }
        if self.channel_capacity == 0 {
            return Err(CoreError::Config(
                "channel capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
