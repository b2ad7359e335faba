//! Error types for parsing identities.

use thiserror::Error;

/// Errors produced when parsing subjects, resources or their kinds from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityParseError {
    /// The subject kind is not one of `user`, `agent`, `plugin`.
    #[error("unknown subject kind: {0}")]
    UnknownSubjectKind(String),

    /// The resource kind is not one of `command`, `tool`, `ability`.
    #[error("unknown resource kind: {0}")]
    UnknownResourceKind(String),

    /// The text is not of the form `kind:name`.
    #[error("expected `kind:name`, got `{0}`")]
    MissingSeparator(String),

    /// The name part after `kind:` is empty.
    #[error("empty name in `{0}`")]
    EmptyName(String),
}

/// Result type for identity parsing.
pub type IdentityResult<T> = Result<T, IdentityParseError>;
