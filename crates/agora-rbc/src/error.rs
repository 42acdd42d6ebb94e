use thiserror::Error;

#[derive(Debug, Error)]
pub enum RbcError {
    #[error("Unsupported request type: {0}")]
    UnsupportedRequestType(u32),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Already processed: {0}")]
    AlreadyProcessed(String),

    #[error("Content length mismatch: known {known}, received {received}")]
    LengthMismatch { known: u64, received: u64 },

    #[error("Insufficient shards: have {have}, need {need}")]
    InsufficientShards { have: usize, need: usize },

    #[error("Coding error: {0}")]
    CodingError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Not the proposer: {0}")]
    NotProposer(String),

    #[error("Reconstructed shards do not match the committed root")]
    RootMismatch,

    #[error("Instance is closed")]
    Closed,

    #[error("Core error: {0}")]
    Core(#[from] agora_core::CoreError),
}

impl RbcError {
    /// Whether the instance cannot continue after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, RbcError::ConfigError(_))
    }
}
