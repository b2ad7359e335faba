//! Pending prompt table and the future handed to suspended callers.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parley_core::{EvalContext, Resource, Subject};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use super::{ApprovalResolution, PromptId};
use crate::error::{ApprovalError, ApprovalResult};

/// A suspended action waiting for its prompt to settle.
///
/// Resolves exactly once. If the coordinator side disappears without
/// settling, the action is treated as cancelled.
#[derive(Debug)]
pub struct PendingApproval {
    prompt_id: PromptId,
    frame_id: String,
    receiver: oneshot::Receiver<ApprovalResolution>,
}

impl PendingApproval {
    pub(crate) fn new(
        prompt_id: PromptId,
        frame_id: String,
        receiver: oneshot::Receiver<ApprovalResolution>,
    ) -> Self {
        Self {
            prompt_id,
            frame_id,
            receiver,
        }
    }

    /// The prompt this future waits on.
    #[must_use]
    pub fn prompt_id(&self) -> &PromptId {
        &self.prompt_id
    }

    /// The chat frame carrying the approval form.
    #[must_use]
    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }
}

impl Future for PendingApproval {
    type Output = ApprovalResolution;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|settled| settled.unwrap_or_else(|_| ApprovalResolution::cancelled()))
    }
}

/// One outstanding escalation.
pub struct PendingPrompt {
    /// The prompt id.
    pub prompt_id: PromptId,
    /// Who asked.
    pub subject: Subject,
    /// What they asked for.
    pub resource: Resource,
    /// The context the action was evaluated in.
    pub context: EvalContext,
    /// Integrity hash of subject and resource.
    pub request_hash: String,
    /// Chat frame carrying the form, once injected.
    pub frame_id: Option<String>,
    /// When the prompt was registered.
    pub created_at: DateTime<Utc>,
    sender: oneshot::Sender<ApprovalResolution>,
    timer: Option<AbortHandle>,
}

impl PendingPrompt {
    /// Create an entry and the receiving half its caller waits on.
    #[must_use]
    pub fn new(
        prompt_id: PromptId,
        subject: Subject,
        resource: Resource,
        context: EvalContext,
        request_hash: String,
    ) -> (Self, oneshot::Receiver<ApprovalResolution>) {
        let (sender, receiver) = oneshot::channel();
        let prompt = Self {
            prompt_id,
            subject,
            resource,
            context,
            request_hash,
            frame_id: None,
            created_at: Utc::now(),
            sender,
            timer: None,
        };
        (prompt, receiver)
    }

    /// Stop the timeout timer and settle the waiting caller.
    pub fn resolve(self, resolution: ApprovalResolution) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        if self.sender.send(resolution).is_err() {
            tracing::debug!(prompt_id = %self.prompt_id, "approval waiter already gone");
        }
    }
}

impl fmt::Debug for PendingPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingPrompt")
            .field("prompt_id", &self.prompt_id)
            .field("subject", &self.subject)
            .field("resource", &self.resource)
            .field("frame_id", &self.frame_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Concurrent table of outstanding prompts keyed by prompt id.
///
/// [`take`](Self::take) is the single atomic step that decides who resolves
/// a prompt: an answer, a cancel and a timer can all race for it, and only
/// the caller that gets the entry back may settle it.
#[derive(Debug, Default)]
pub struct PendingPromptStore {
    entries: DashMap<PromptId, PendingPrompt>,
}

impl PendingPromptStore {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prompt.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the id is already registered.
    pub fn insert(&self, prompt: PendingPrompt) -> ApprovalResult<()> {
        match self.entries.entry(prompt.prompt_id.clone()) {
            Entry::Occupied(_) => Err(ApprovalError::Internal(format!(
                "prompt id collision: {}",
                prompt.prompt_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(prompt);
                Ok(())
            },
        }
    }

    /// Remove a prompt, handing it to the caller that will settle it.
    #[must_use]
    pub fn take(&self, prompt_id: &PromptId) -> Option<PendingPrompt> {
        self.entries.remove(prompt_id).map(|(_, prompt)| prompt)
    }

    /// Record the frame carrying the form. Returns `false` if the prompt is
    /// no longer pending.
    pub fn set_frame(&self, prompt_id: &PromptId, frame_id: String) -> bool {
        self.entries
            .get_mut(prompt_id)
            .map(|mut prompt| prompt.frame_id = Some(frame_id))
            .is_some()
    }

    /// Attach the timeout timer. Returns `false` if the prompt is no longer
    /// pending, in which case the caller should abort the timer itself.
    pub fn set_timer(&self, prompt_id: &PromptId, timer: AbortHandle) -> bool {
        self.entries
            .get_mut(prompt_id)
            .map(|mut prompt| prompt.timer = Some(timer))
            .is_some()
    }

    /// Whether a prompt is still outstanding.
    #[must_use]
    pub fn is_pending(&self, prompt_id: &PromptId) -> bool {
        self.entries.contains_key(prompt_id)
    }

    /// Request hash of an outstanding prompt.
    #[must_use]
    pub fn request_hash(&self, prompt_id: &PromptId) -> Option<String> {
        self.entries
            .get(prompt_id)
            .map(|prompt| prompt.request_hash.clone())
    }

    /// Ids of every outstanding prompt raised in a session.
    #[must_use]
    pub fn ids_for_session(&self, session_id: &str) -> Vec<PromptId> {
        self.entries
            .iter()
            .filter(|entry| entry.context.session_id.as_deref() == Some(session_id))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of outstanding prompts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
