//! Human escalation for `prompt` decisions.
//!
//! When the engine answers `prompt`, the [`EscalationCoordinator`] injects an
//! approval form into the chat and hands the caller a [`PendingApproval`]
//! future. The future settles exactly once, for one of three causes:
//!
//! - **Answered**: a human picked a choice via
//!   [`submit_answer`](EscalationCoordinator::submit_answer)
//! - **Timed out**: nobody answered before the deadline
//! - **Cancelled**: the prompt or its session was torn down
//!
//! Whichever cause removes the entry from the [`PendingPromptStore`] first
//! wins; everyone else sees the prompt as unknown.

mod coordinator;
mod markup;
mod pending;

pub use coordinator::EscalationCoordinator;
pub use markup::{prompt_markup, request_hash};
pub use pending::{PendingApproval, PendingPrompt, PendingPromptStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ApprovalResult;
use crate::rule::{RuleAction, RuleId, RuleScope};

/// Default namespace for prompt ids.
pub const DEFAULT_PROMPT_PREFIX: &str = "perm_";

/// Identifier of one pending prompt, namespaced with a fixed prefix so replies
/// can be routed without asking the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromptId(String);

impl PromptId {
    /// Generate a fresh id under `prefix`.
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}{}", Uuid::new_v4().simple()))
    }

    /// The id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PromptId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PromptId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A human's choice on an approval form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAnswer {
    /// Allow this one action.
    AllowOnce,
    /// Allow for the rest of the session.
    AllowSession,
    /// Allow from now on.
    AllowAlways,
    /// Refuse.
    Deny,
}

impl ApprovalAnswer {
    /// Every choice, in the order the form offers them.
    pub const ALL: [Self; 4] = [
        Self::AllowOnce,
        Self::AllowSession,
        Self::AllowAlways,
        Self::Deny,
    ];

    /// Interpret an answer string. Anything unrecognized is a denial.
    #[must_use]
    pub fn parse(answer: &str) -> Self {
        match answer.trim().to_ascii_lowercase().as_str() {
            "allow_once" => Self::AllowOnce,
            "allow_session" => Self::AllowSession,
            "allow_always" => Self::AllowAlways,
            _ => Self::Deny,
        }
    }

    /// Wire value used in the form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllowOnce => "allow_once",
            Self::AllowSession => "allow_session",
            Self::AllowAlways => "allow_always",
            Self::Deny => "deny",
        }
    }

    /// Human-readable label used in the form.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AllowOnce => "Allow once",
            Self::AllowSession => "Allow for this session",
            Self::AllowAlways => "Always allow",
            Self::Deny => "Deny",
        }
    }

    /// The resulting action.
    #[must_use]
    pub fn action(self) -> RuleAction {
        match self {
            Self::Deny => RuleAction::Deny,
            _ => RuleAction::Allow,
        }
    }

    /// The resulting scope.
    #[must_use]
    pub fn scope(self) -> RuleScope {
        match self {
            Self::AllowOnce | Self::Deny => RuleScope::Once,
            Self::AllowSession => RuleScope::Session,
            Self::AllowAlways => RuleScope::Permanent,
        }
    }

    /// Whether answering this way leaves a rule behind.
    #[must_use]
    pub fn creates_rule(self) -> bool {
        matches!(self, Self::AllowSession | Self::AllowAlways)
    }
}

impl fmt::Display for ApprovalAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a pending approval settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionCause {
    /// A human answered.
    Answered,
    /// The deadline passed.
    TimedOut,
    /// The prompt was torn down.
    Cancelled,
}

/// The settled value of a [`PendingApproval`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalResolution {
    /// Allow or deny.
    pub action: RuleAction,
    /// Scope the human chose, when answered.
    pub scope: Option<RuleScope>,
    /// Why the action was refused, when it was.
    pub reason: Option<String>,
    /// What settled it.
    pub cause: ResolutionCause,
    /// Rule created by the answer, if any.
    pub rule_id: Option<RuleId>,
}

impl ApprovalResolution {
    pub(crate) fn answered(answer: ApprovalAnswer, rule_id: Option<RuleId>) -> Self {
        Self {
            action: answer.action(),
            scope: Some(answer.scope()),
            reason: (answer == ApprovalAnswer::Deny).then(|| "denied by user".to_string()),
            cause: ResolutionCause::Answered,
            rule_id,
        }
    }

    pub(crate) fn timed_out() -> Self {
        Self::refused(ResolutionCause::TimedOut, "timed out")
    }

    pub(crate) fn cancelled() -> Self {
        Self::refused(ResolutionCause::Cancelled, "cancelled")
    }

    fn refused(cause: ResolutionCause, reason: &str) -> Self {
        Self {
            action: RuleAction::Deny,
            scope: None,
            reason: Some(reason.to_string()),
            cause,
            rule_id: None,
        }
    }

    /// Check if the action may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.action == RuleAction::Allow
    }
}

/// Confirmation returned to whoever submitted an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerReceipt {
    /// The prompt that was answered.
    pub prompt_id: PromptId,
    /// The answer as interpreted.
    pub answer: ApprovalAnswer,
    /// What the waiting caller received.
    pub resolution: ApprovalResolution,
}

/// An approval form to append to a session's chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionRequest {
    /// Target session, when known.
    pub session_id: Option<String>,
    /// The prompt the form answers.
    pub prompt_id: PromptId,
    /// HML markup of the form.
    pub markup: String,
}

/// Appends approval forms to the chat a human is reading.
///
/// # Example
///
/// ```rust,ignore
/// use parley_approval::{ApprovalResult, InjectionRequest, MessageInjector};
///
/// struct Stdout;
///
/// #[async_trait::async_trait]
/// impl MessageInjector for Stdout {
///     async fn inject(&self, request: &InjectionRequest) -> ApprovalResult<String> {
///         println!("{}", request.markup);
///         Ok(format!("frame-{}", request.prompt_id))
///     }
/// }
/// ```
#[async_trait]
pub trait MessageInjector: Send + Sync {
    /// Append the form as a visible message and return the id of the frame
    /// that carries it.
    async fn inject(&self, request: &InjectionRequest) -> ApprovalResult<String>;
}
