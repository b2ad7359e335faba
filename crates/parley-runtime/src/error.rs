//! Runtime error types.

use parley_approval::ApprovalError;
use thiserror::Error;

/// Errors that can occur while routing replies.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The reply does not address any prompt.
    #[error("reply does not answer a prompt")]
    NoAnswer,

    /// The approval layer rejected the answer.
    #[error("approval error: {0}")]
    Approval(#[from] ApprovalError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
