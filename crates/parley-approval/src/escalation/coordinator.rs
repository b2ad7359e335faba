//! Escalation coordinator: suspends `prompt` decisions until a human answers.
//!
//! # Flow
//!
//! 1. [`request_approval`](EscalationCoordinator::request_approval) registers
//!    a pending prompt, injects the approval form, and arms a timer
//! 2. The caller awaits the returned [`PendingApproval`]; other work keeps
//!    running
//! 3. [`submit_answer`](EscalationCoordinator::submit_answer), a cancel, or
//!    the timer takes the entry, and only that one settles the future
//! 4. Lasting allow answers leave a rule behind so the same request is not
//!    asked again

use parley_core::{EvalContext, Resource, Subject};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::markup::{prompt_markup, request_hash};
use super::pending::{PendingApproval, PendingPrompt, PendingPromptStore};
use super::{
    AnswerReceipt, ApprovalAnswer, ApprovalResolution, DEFAULT_PROMPT_PREFIX, InjectionRequest,
    MessageInjector, PromptId,
};
use crate::engine::PermissionEngine;
use crate::error::{ApprovalError, ApprovalResult};
use crate::rule::{NewRule, RuleId, RuleScope};

/// Default time to wait for an answer (5 minutes).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Turns `prompt` decisions into suspended approvals and resumes them.
pub struct EscalationCoordinator {
    engine: Arc<PermissionEngine>,
    injector: Arc<dyn MessageInjector>,
    pending: Arc<PendingPromptStore>,
    default_timeout: Duration,
    prompt_prefix: String,
}

impl EscalationCoordinator {
    /// Create a coordinator with its own pending table.
    #[must_use]
    pub fn new(engine: Arc<PermissionEngine>, injector: Arc<dyn MessageInjector>) -> Self {
        Self {
            engine,
            injector,
            pending: Arc::new(PendingPromptStore::new()),
            default_timeout: DEFAULT_TIMEOUT,
            prompt_prefix: DEFAULT_PROMPT_PREFIX.to_string(),
        }
    }

    /// Use a shared pending table.
    #[must_use]
    pub fn with_pending_store(mut self, pending: Arc<PendingPromptStore>) -> Self {
        self.pending = pending;
        self
    }

    /// Change the timeout used when a request names none.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Change the prompt id prefix.
    #[must_use]
    pub fn with_prompt_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prompt_prefix = prefix.into();
        self
    }

    /// Ask a human whether `subject` may act on `resource`.
    ///
    /// Returns once the form is injected; the returned future settles when
    /// the prompt is answered, cancelled, or times out (`timeout`, else the
    /// default of 5 minutes). Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Injection`] (or whatever the injector
    /// reports) if the form could not be delivered; nothing stays pending in
    /// that case. If the prompt was already answered, cancelled, or timed out
    /// by the time delivery failed, the settled future is returned instead.
    pub async fn request_approval(
        &self,
        subject: Subject,
        resource: Resource,
        context: EvalContext,
        timeout: Option<Duration>,
    ) -> ApprovalResult<PendingApproval> {
        let prompt_id = PromptId::generate(&self.prompt_prefix);
        let hash = request_hash(&subject, &resource);
        let request = InjectionRequest {
            session_id: context.session_id.clone(),
            prompt_id: prompt_id.clone(),
            markup: prompt_markup(&prompt_id, &hash, &subject, &resource),
        };

        info!(%prompt_id, %subject, %resource, "requesting approval");
        let (prompt, receiver) =
            PendingPrompt::new(prompt_id.clone(), subject, resource, context, hash);
        // Registered before injecting so an instant answer finds the entry.
        self.pending.insert(prompt)?;

        // The deadline runs from registration, not from delivery.
        let timeout = timeout.unwrap_or(self.default_timeout);
        let pending = Arc::clone(&self.pending);
        let timer_id = prompt_id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(prompt) = pending.take(&timer_id) {
                info!(prompt_id = %timer_id, ?timeout, "approval timed out");
                prompt.resolve(ApprovalResolution::timed_out());
            }
        });
        if !self.pending.set_timer(&prompt_id, timer.abort_handle()) {
            timer.abort();
        }

        let mut guard = InjectionGuard {
            pending: Arc::clone(&self.pending),
            prompt_id: prompt_id.clone(),
            armed: true,
        };
        let injected = self.injector.inject(&request).await;
        guard.armed = false;

        let frame_id = match injected {
            Ok(frame_id) => {
                self.pending.set_frame(&prompt_id, frame_id.clone());
                frame_id
            },
            Err(e) => {
                warn!(%prompt_id, error = %e, "approval form injection failed");
                if let Some(prompt) = self.pending.take(&prompt_id) {
                    prompt.resolve(ApprovalResolution::cancelled());
                    return Err(e);
                }
                // Settled while the form was in flight; the receiver holds
                // the outcome.
                debug!(%prompt_id, "prompt settled during injection");
                String::new()
            },
        };

        Ok(PendingApproval::new(prompt_id, frame_id, receiver))
    }

    /// Deliver a human's answer to a pending prompt.
    ///
    /// `allow_session` and `allow_always` also create a rule for the exact
    /// subject and resource. A failure to create that rule is logged and the
    /// action is still allowed.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::UnknownPrompt`] if the prompt does not exist
    /// or was already answered, cancelled, or timed out.
    pub fn submit_answer(&self, prompt_id: &str, answer: &str) -> ApprovalResult<AnswerReceipt> {
        let prompt_id = PromptId::from(prompt_id);
        let Some(prompt) = self.pending.take(&prompt_id) else {
            warn!(%prompt_id, "answer for unknown or resolved prompt");
            return Err(ApprovalError::UnknownPrompt {
                prompt_id: prompt_id.to_string(),
            });
        };

        let answer = ApprovalAnswer::parse(answer);
        let rule_id = if answer.creates_rule() {
            self.persist_answer(&prompt, answer)
        } else {
            None
        };

        let resolution = ApprovalResolution::answered(answer, rule_id);
        info!(%prompt_id, %answer, rule = ?rule_id, "approval answered");
        prompt.resolve(resolution.clone());

        Ok(AnswerReceipt {
            prompt_id,
            answer,
            resolution,
        })
    }

    fn persist_answer(&self, prompt: &PendingPrompt, answer: ApprovalAnswer) -> Option<RuleId> {
        let mut rule = NewRule::allow()
            .for_subject(&prompt.subject)
            .on_resource(&prompt.resource)
            .with_scope(answer.scope());
        if let Some(owner_id) = &prompt.context.owner_id {
            rule = rule.owned_by(owner_id.clone());
        }
        if answer.scope() == RuleScope::Session
            && let Some(session_id) = &prompt.context.session_id
        {
            rule = rule.in_session(session_id.clone());
        }

        match self.engine.create_rule(rule) {
            Ok(rule) => Some(rule.id),
            Err(e) => {
                warn!(prompt_id = %prompt.prompt_id, error = %e, "failed to persist approval rule");
                None
            },
        }
    }

    /// Cancel one pending prompt, settling it with `deny` / "cancelled".
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::UnknownPrompt`] if it is no longer pending.
    pub fn cancel_prompt(&self, prompt_id: &str) -> ApprovalResult<()> {
        let prompt_id = PromptId::from(prompt_id);
        let prompt = self
            .pending
            .take(&prompt_id)
            .ok_or_else(|| ApprovalError::UnknownPrompt {
                prompt_id: prompt_id.to_string(),
            })?;
        info!(%prompt_id, "approval cancelled");
        prompt.resolve(ApprovalResolution::cancelled());
        Ok(())
    }

    /// Cancel every pending prompt raised in a session. Returns how many
    /// this call cancelled.
    pub fn cancel_session(&self, session_id: &str) -> usize {
        let mut cancelled: usize = 0;
        for prompt_id in self.pending.ids_for_session(session_id) {
            if let Some(prompt) = self.pending.take(&prompt_id) {
                prompt.resolve(ApprovalResolution::cancelled());
                cancelled = cancelled.saturating_add(1);
            }
        }
        debug!(session_id, cancelled, "session prompts cancelled");
        cancelled
    }

    /// Number of outstanding prompts.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether a prompt is still outstanding.
    #[must_use]
    pub fn is_pending(&self, prompt_id: &str) -> bool {
        self.pending.is_pending(&PromptId::from(prompt_id))
    }

    /// Request hash of an outstanding prompt.
    #[must_use]
    pub fn request_hash(&self, prompt_id: &str) -> Option<String> {
        self.pending.request_hash(&PromptId::from(prompt_id))
    }

    /// The prompt id prefix in use.
    #[must_use]
    pub fn prompt_prefix(&self) -> &str {
        &self.prompt_prefix
    }

    /// The engine rules are created through.
    #[must_use]
    pub fn engine(&self) -> &Arc<PermissionEngine> {
        &self.engine
    }
}

/// Settles a prompt as cancelled if `request_approval` is dropped while its
/// form is still being injected.
struct InjectionGuard {
    pending: Arc<PendingPromptStore>,
    prompt_id: PromptId,
    armed: bool,
}

impl Drop for InjectionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(prompt) = self.pending.take(&self.prompt_id) {
            debug!(prompt_id = %self.prompt_id, "approval request dropped during injection");
            prompt.resolve(ApprovalResolution::cancelled());
        }
    }
}

impl fmt::Debug for EscalationCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscalationCoordinator")
            .field("pending", &self.pending.len())
            .field("default_timeout", &self.default_timeout)
            .field("prompt_prefix", &self.prompt_prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
