/// Errors that can occur while managing rules and escalations.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// A rule was created with an inconsistent combination of fields.
    #[error("invalid rule: {field} {reason}")]
    InvalidRule {
        /// The offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Storage backend error (lock poisoned, corrupt row, etc.).
    #[error("storage error: {0}")]
    Storage(String),

    /// The prompt id is unknown or its prompt was already resolved.
    #[error("unknown or already resolved prompt: {prompt_id}")]
    UnknownPrompt {
        /// The prompt id that was looked up.
        prompt_id: String,
    },

    /// The approval request could not be delivered to the chat.
    #[error("failed to inject approval request: {0}")]
    Injection(String),

    /// Internal approval system error.
    #[error("internal approval error: {0}")]
    Internal(String),
}

/// Result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
