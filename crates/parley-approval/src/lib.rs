//! Parley Approval - default-deny permissions with human escalation.
//!
//! Every privileged action an agent requests is checked by the
//! [`PermissionEngine`], which ranks the matching [`Rule`]s by specificity and
//! answers `allow`, `deny` or `prompt`. A `prompt` answer is handed to the
//! [`EscalationCoordinator`], which injects an approval form into the chat and
//! suspends that one action until a human answers, the prompt is cancelled,
//! or a timer fires.
//!
//! # Components
//!
//! - **Rules**: [`Rule`], [`NewRule`], and the [`RuleStore`] seam with an
//!   in-process [`MemoryRuleStore`]
//! - **Engine**: [`PermissionEngine::evaluate`] and the [`Decision`] it returns
//! - **Audit**: every decision is written to an [`AuditSink`]
//! - **Escalation**: [`EscalationCoordinator`], [`PendingApproval`], and the
//!   [`MessageInjector`] collaborator
//!
//! # Example
//!
//! ```
//! use parley_approval::{NewRule, PermissionEngine, RuleAction};
//! use parley_core::{EvalContext, Resource, Subject};
//!
//! let engine = PermissionEngine::in_memory();
//! let agent = Subject::agent("claude");
//! let ls = Resource::command("ls");
//! let ctx = EvalContext::new().with_session("s-1");
//!
//! // Nothing configured: ask a human.
//! assert_eq!(engine.evaluate(&agent, &ls, &ctx).action, RuleAction::Prompt);
//!
//! engine
//!     .create_rule(NewRule::allow().for_subject(&agent).on_resource(&ls))
//!     .unwrap();
//! assert_eq!(engine.evaluate(&agent, &ls, &ctx).action, RuleAction::Allow);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod audit;
pub mod engine;
/// Error types and results for the approval module.
pub mod error;
pub mod escalation;
pub mod rule;

pub use audit::{AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use engine::{Decision, PermissionEngine};
pub use error::{ApprovalError, ApprovalResult};
pub use escalation::{
    AnswerReceipt, ApprovalAnswer, ApprovalResolution, DEFAULT_PROMPT_PREFIX,
    EscalationCoordinator, InjectionRequest, MessageInjector, PendingApproval, PendingPromptStore,
    PromptId, ResolutionCause, request_hash,
};
pub use rule::{MemoryRuleStore, NewRule, Rule, RuleAction, RuleId, RuleScope, RuleStore};
