use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollError {
    /// Bad poll request — rejected before any side effect.
    #[error("invalid poll request: {0}")]
    Validation(String),

    /// Trigger create/delete failure against the scheduler backend.
    #[error("trigger scheduling error: {0}")]
    Scheduling(String),

    /// Messaging I/O failure — fatal to the current step.
    #[error("messaging gateway error: {0}")]
    Gateway(String),

    /// Per-voter weight resolution failure — absorbed as weight 0 by callers.
    #[error("voter lookup error: {0}")]
    Lookup(String),

    /// Trade executor failure — folded into the result report by callers.
    #[error("trade execution error: {0}")]
    Execution(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PollError>;
