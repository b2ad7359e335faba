//! Common re-exports for consumers of the approval crate.
//!
//! ```
//! use parley_approval::prelude::*;
//! ```

pub use crate::{
    ApprovalAnswer, ApprovalError, ApprovalResolution, ApprovalResult, AuditSink, Decision,
    EscalationCoordinator, MessageInjector, NewRule, PendingApproval, PermissionEngine, Rule,
    RuleAction, RuleScope, RuleStore,
};
