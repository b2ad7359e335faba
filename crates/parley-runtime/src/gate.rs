//! Stream gate: permission checks for executable elements as they stream in.
//!
//! The gate owns the [`TagParser`] for one agent reply. Every executable
//! element that completes is mapped to a [`Resource`] and evaluated; allowed
//! and denied elements are reported right away, while `prompt` decisions are
//! escalated on a spawned task so the rest of the reply keeps parsing.
//! Results arrive on the [`GateOutcome`] channel in completion order.

use parley_approval::{
    ApprovalResolution, EscalationCoordinator, ResolutionCause, RuleAction, RuleId,
};
use parley_core::{EvalContext, Resource, Subject};
use parley_hml::{Element, ElementKind, ParseEvent, TagParser};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::shell::ShellCommand;

/// Map an executable element to the resource it acts on.
///
/// `<bash>` is read by [`ShellCommand::parse`]: the command named by its
/// first word, or the whole text for lists, pipelines, substitution and
/// redirection. `<websearch>` is the `websearch` tool and `<ask>` the `ask`
/// ability. Display elements and empty commands map to nothing.
#[must_use]
pub fn resource_for(element: &Element) -> Option<Resource> {
    target_for(element).map(|target| target.resource)
}

fn target_for(element: &Element) -> Option<ShellCommand> {
    let single = |resource: Resource| ShellCommand {
        resource: resource.clone(),
        commands: vec![resource],
    };
    match element.kind {
        ElementKind::Bash => ShellCommand::parse(&element.content),
        ElementKind::Websearch => Some(single(Resource::tool("websearch"))),
        ElementKind::Ask => Some(single(Resource::ability("ask"))),
        _ => None,
    }
}

/// Whether a gated element may run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Run it.
    Allowed {
        /// Rule that allowed it, if any.
        rule_id: Option<RuleId>,
        /// Set when a human was asked.
        cause: Option<ResolutionCause>,
    },
    /// Do not run it.
    Denied {
        /// Why.
        reason: String,
    },
}

impl Verdict {
    /// Check if the element may run.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

impl From<ApprovalResolution> for Verdict {
    fn from(resolution: ApprovalResolution) -> Self {
        match resolution.action {
            RuleAction::Allow => Self::Allowed {
                rule_id: resolution.rule_id,
                cause: Some(resolution.cause),
            },
            _ => Self::Denied {
                reason: resolution.reason.unwrap_or_else(|| "denied".to_string()),
            },
        }
    }
}

/// The verdict for one executable element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateOutcome {
    /// The element that was gated.
    pub element: Element,
    /// The resource it mapped to.
    pub resource: Option<Resource>,
    /// Whether it may run.
    pub verdict: Verdict,
}

/// Parses one agent reply and gates its executable elements.
///
/// Escalations run on tasks owned by the gate; dropping the gate abandons
/// them, so call [`finish`](Self::finish) to wait for every verdict.
pub struct StreamGate {
    parser: TagParser,
    coordinator: Arc<EscalationCoordinator>,
    subject: Subject,
    context: EvalContext,
    timeout: Option<Duration>,
    outcomes: mpsc::UnboundedSender<GateOutcome>,
    escalations: JoinSet<()>,
}

impl StreamGate {
    /// Create a gate for a reply written by `subject` in `context`.
    ///
    /// Returns the gate and the receiving end of its outcome channel.
    #[must_use]
    pub fn new(
        coordinator: Arc<EscalationCoordinator>,
        subject: Subject,
        context: EvalContext,
    ) -> (Self, mpsc::UnboundedReceiver<GateOutcome>) {
        let (outcomes, receiver) = mpsc::unbounded_channel();
        let gate = Self {
            parser: TagParser::new(),
            coordinator,
            subject,
            context,
            timeout: None,
            outcomes,
            escalations: JoinSet::new(),
        };
        (gate, receiver)
    }

    /// Use this timeout for escalations instead of the coordinator default.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Feed the next chunk of the reply.
    ///
    /// Returns the parser events; gating happens as a side effect. Only the
    /// injection of approval forms is awaited, never a human.
    pub async fn write(&mut self, chunk: &str) -> Vec<ParseEvent> {
        let events = self.parser.write(chunk);
        self.dispatch().await;
        events
    }

    /// Signal the end of the reply.
    pub async fn end(&mut self) -> Vec<ParseEvent> {
        let events = self.parser.end();
        self.dispatch().await;
        events
    }

    /// Number of escalations still waiting for a verdict.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.escalations.len()
    }

    /// Wait for every outstanding escalation to report.
    pub async fn finish(mut self) {
        while let Some(joined) = self.escalations.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "escalation task failed");
            }
        }
    }

    async fn dispatch(&mut self) {
        for element in self.parser.drain_executables() {
            self.gate(element).await;
        }
    }

    async fn gate(&mut self, element: Element) {
        let Some(target) = target_for(&element) else {
            self.report(GateOutcome {
                element,
                resource: None,
                verdict: Verdict::Denied {
                    reason: "no resource to check".to_string(),
                },
            });
            return;
        };

        let Some(verdict) = self.decide(&target) else {
            debug!(id = %element.id, resource = %target.resource, "element needs approval");
            self.escalate(element, target.resource).await;
            return;
        };
        debug!(
            id = %element.id,
            resource = %target.resource,
            allowed = verdict.is_allowed(),
            "element gated"
        );
        self.report(GateOutcome {
            element,
            resource: Some(target.resource),
            verdict,
        });
    }

    /// Decide from the rules alone, or `None` when a human must be asked.
    ///
    /// Any denied command denies the element, and it is allowed outright only
    /// when every command is. Otherwise a compound element is checked as a
    /// whole before escalating.
    fn decide(&self, target: &ShellCommand) -> Option<Verdict> {
        let engine = self.coordinator.engine();
        let mut allowed_by = None;
        let mut undecided = false;
        for command in &target.commands {
            let decision = engine.evaluate(&self.subject, command, &self.context);
            match decision.action {
                RuleAction::Deny => return Some(denied(decision.rule_id())),
                RuleAction::Allow => allowed_by = allowed_by.or(decision.rule_id()),
                RuleAction::Prompt => undecided = true,
            }
        }
        if !undecided {
            return Some(Verdict::Allowed {
                rule_id: allowed_by,
                cause: None,
            });
        }
        if !target.is_compound() {
            return None;
        }

        let whole = engine.evaluate(&self.subject, &target.resource, &self.context);
        match whole.action {
            RuleAction::Allow => Some(Verdict::Allowed {
                rule_id: whole.rule_id(),
                cause: None,
            }),
            RuleAction::Deny => Some(denied(whole.rule_id())),
            RuleAction::Prompt => None,
        }
    }

    async fn escalate(&mut self, element: Element, resource: Resource) {
        let requested = self
            .coordinator
            .request_approval(
                self.subject.clone(),
                resource.clone(),
                self.context.clone(),
                self.timeout,
            )
            .await;

        let pending = match requested {
            Ok(pending) => pending,
            Err(e) => {
                self.report(GateOutcome {
                    element,
                    resource: Some(resource),
                    verdict: Verdict::Denied {
                        reason: format!("approval request failed: {e}"),
                    },
                });
                return;
            },
        };

        info!(id = %element.id, prompt_id = %pending.prompt_id(), "element awaiting approval");
        let outcomes = self.outcomes.clone();
        self.escalations.spawn(async move {
            let verdict = Verdict::from(pending.await);
            let outcome = GateOutcome {
                element,
                resource: Some(resource),
                verdict,
            };
            if outcomes.send(outcome).is_err() {
                debug!("gate outcome receiver dropped");
            }
        });
    }

    fn report(&self, outcome: GateOutcome) {
        if self.outcomes.send(outcome).is_err() {
            debug!("gate outcome receiver dropped");
        }
    }
}

fn denied(rule_id: Option<RuleId>) -> Verdict {
    Verdict::Denied {
        reason: rule_id.map_or_else(
            || "permission check failed".to_string(),
            |id| format!("denied by {id}"),
        ),
    }
}

impl fmt::Debug for StreamGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamGate")
            .field("subject", &self.subject)
            .field("context", &self.context)
            .field("outstanding", &self.escalations.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
