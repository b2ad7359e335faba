//! Permission engine: specificity-ranked rule evaluation.
//!
//! # Evaluation
//!
//! 1. Load candidate rules from the [`RuleStore`]
//! 2. Keep the ones that [`match`](Rule::matches) the subject, resource and
//!    context
//! 3. Pick the winner by specificity, then priority, then the strictest
//!    action (`deny` over `prompt` over `allow`), then the oldest rule
//! 4. Consume the winner if it is a `once` rule
//! 5. Audit the decision
//!
//! No match means `prompt`; the engine never allows by default. A storage
//! failure means `deny`.

use chrono::Utc;
use parley_core::{EvalContext, Resource, Subject};
use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::audit::{AuditRecord, AuditSink, TracingAuditSink};
use crate::error::ApprovalResult;
use crate::rule::{MemoryRuleStore, NewRule, Rule, RuleAction, RuleId, RuleScope, RuleStore};

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// What to do with the action.
    pub action: RuleAction,
    /// The rule that decided it, or `None` for the default `prompt` and for
    /// fail-closed denials.
    pub rule: Option<Rule>,
}

impl Decision {
    fn default_prompt() -> Self {
        Self {
            action: RuleAction::Prompt,
            rule: None,
        }
    }

    fn fail_closed() -> Self {
        Self {
            action: RuleAction::Deny,
            rule: None,
        }
    }

    fn from_rule(rule: Rule) -> Self {
        Self {
            action: rule.action,
            rule: Some(rule),
        }
    }

    /// Id of the deciding rule.
    #[must_use]
    pub fn rule_id(&self) -> Option<RuleId> {
        self.rule.as_ref().map(|r| r.id)
    }

    /// Check if the action may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.action == RuleAction::Allow
    }

    /// Check if the action is refused.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        self.action == RuleAction::Deny
    }

    /// Check if a human must be asked.
    #[must_use]
    pub fn needs_prompt(&self) -> bool {
        self.action == RuleAction::Prompt
    }
}

/// Decides allow / deny / prompt for (subject, resource, context) triples.
///
/// `evaluate` takes `&self` and may be called concurrently; the store is
/// responsible for its own synchronization.
pub struct PermissionEngine {
    store: Arc<dyn RuleStore>,
    audit: Arc<dyn AuditSink>,
}

impl PermissionEngine {
    /// Create an engine over a rule store and an audit sink.
    #[must_use]
    pub fn new(store: Arc<dyn RuleStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// An engine over an empty [`MemoryRuleStore`] that audits to `tracing`.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRuleStore::new()), Arc::new(TracingAuditSink))
    }

    /// Decide what to do with an action.
    ///
    /// Never fails: a store error is logged and answered with `deny`.
    pub fn evaluate(&self, subject: &Subject, resource: &Resource, ctx: &EvalContext) -> Decision {
        let decision = match self.resolve(subject, resource, ctx) {
            Ok(decision) => decision,
            Err(e) => {
                error!(error = %e, %subject, %resource, "rule lookup failed, denying");
                Decision::fail_closed()
            },
        };

        debug!(
            %subject,
            %resource,
            action = %decision.action,
            rule = ?decision.rule_id(),
            "evaluated"
        );
        self.audit.record(AuditRecord {
            decision: decision.action,
            subject: subject.clone(),
            resource: resource.clone(),
            matched_rule_id: decision.rule_id(),
            session_id: ctx.session_id.clone(),
            timestamp: Utc::now(),
        });
        decision
    }

    fn resolve(
        &self,
        subject: &Subject,
        resource: &Resource,
        ctx: &EvalContext,
    ) -> ApprovalResult<Decision> {
        loop {
            let winner = self
                .store
                .candidates(subject, resource)?
                .into_iter()
                .filter(|rule| rule.matches(subject, resource, ctx))
                .max_by_key(|rule| {
                    (
                        rule.specificity(ctx),
                        rule.priority,
                        rule.action.severity(),
                        Reverse(rule.id),
                    )
                });

            let Some(rule) = winner else {
                return Ok(Decision::default_prompt());
            };
            if rule.scope != RuleScope::Once {
                return Ok(Decision::from_rule(rule));
            }
            // The delete arbitrates concurrent evaluations of the same once rule.
            if self.store.delete(rule.id)? {
                debug!(rule = %rule.id, "once rule consumed");
                return Ok(Decision::from_rule(rule));
            }
            debug!(rule = %rule.id, "once rule consumed concurrently, re-evaluating");
        }
    }

    /// Validate and persist a new rule.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidRule`](crate::ApprovalError::InvalidRule)
    /// for inconsistent fields, or a storage error.
    pub fn create_rule(&self, rule: NewRule) -> ApprovalResult<Rule> {
        rule.validate()?;
        let rule = self.store.create(rule)?;
        info!(
            rule = %rule.id,
            action = %rule.action,
            scope = %rule.scope,
            session_id = rule.session_id.as_deref(),
            "rule created"
        );
        Ok(rule)
    }

    /// Delete a rule, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    pub fn delete_rule(&self, id: RuleId) -> ApprovalResult<bool> {
        self.store.delete(id)
    }

    /// Every stored rule, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    pub fn rules(&self) -> ApprovalResult<Vec<Rule>> {
        self.store.list()
    }

    /// Drop every rule bound to a session.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    pub fn clear_session(&self, session_id: &str) -> ApprovalResult<usize> {
        let removed = self.store.delete_session_rules(session_id)?;
        if removed > 0 {
            info!(session_id, removed, "session rules cleared");
        }
        Ok(removed)
    }

    /// The underlying rule store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RuleStore> {
        &self.store
    }
}

impl fmt::Debug for PermissionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
