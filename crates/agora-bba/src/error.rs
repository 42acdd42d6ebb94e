use thiserror::Error;

#[derive(Debug, Error)]
pub enum BbaError {
    #[error("Undefined request type: {0}")]
    UndefinedRequestType(u32),

    #[error("Already processed: {0}")]
    AlreadyProcessed(String),

    #[error("Epoch mismatch: expected {expected}, got {got}")]
    EpochMismatch { expected: u64, got: u64 },

    #[error("Stale round: current {current}, got {got}")]
    StaleRound { current: u64, got: u64 },

    #[error("Round too far ahead: current {current}, got {got}")]
    RoundTooFar { current: u64, got: u64 },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Instance is closed")]
    Closed,

    #[error("Core error: {0}")]
    Core(#[from] agora_core::CoreError),
}

impl BbaError {
    /// Whether the instance cannot continue after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BbaError::InvariantViolation(_) | BbaError::ConfigError(_)
        )
    }
}
