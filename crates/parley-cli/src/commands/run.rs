//! `parley run`: stream a reply through the permission gate.
//!
//! Approval forms are printed instead of being sent to a chat, and every
//! prompt receives the same scripted answer.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parley_approval::{
    ApprovalError, ApprovalResult, InjectionRequest, MessageInjector, PermissionEngine,
};
use parley_config::Config;
use parley_core::{EvalContext, Subject};
use parley_runtime::{GateOutcome, StreamGate, route_reply};
use tokio::sync::mpsc;
use tracing::warn;

use crate::config_bridge;
use crate::theme::Theme;

/// Options for one run.
#[derive(Debug, Clone)]
pub(crate) struct RunOptions {
    /// Who wrote the reply, as `kind:id`.
    pub(crate) subject: String,
    /// Session the reply belongs to.
    pub(crate) session: String,
    /// Answer given to every prompt; `None` lets prompts time out.
    pub(crate) answer: Option<String>,
    /// Characters per streamed chunk (0 = whole reply).
    pub(crate) chunk_size: usize,
    /// Escalation timeout overriding the config.
    pub(crate) timeout: Option<Duration>,
}

/// Prints approval forms and hands their prompt ids to the answer script.
struct ScriptedInjector {
    prompts: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl MessageInjector for ScriptedInjector {
    async fn inject(&self, request: &InjectionRequest) -> ApprovalResult<String> {
        println!(
            "{}",
            Theme::warning(&format!("approval requested ({})", request.prompt_id))
        );
        println!("{}", Theme::dimmed(&request.markup));
        self.prompts
            .send(request.prompt_id.to_string())
            .map_err(|_| ApprovalError::Injection("answer script stopped".to_string()))?;
        Ok(format!("stdout:{}", request.prompt_id))
    }
}

/// Read the reply and print every gate outcome.
pub(crate) async fn run_reply(
    cfg: &Config,
    input: Option<&Path>,
    options: RunOptions,
) -> Result<()> {
    let text = super::read_input(input)?;
    let outcomes = gate_reply(cfg, &text, options).await?;

    println!("{}", Theme::separator());
    for outcome in &outcomes {
        println!(
            "<{}> {:?} → {}",
            outcome.element.kind,
            outcome.element.content,
            Theme::verdict(&outcome.verdict)
        );
    }
    let allowed = outcomes.iter().filter(|o| o.verdict.is_allowed()).count();
    println!(
        "{}",
        Theme::info(&format!(
            "{allowed} of {} executable element(s) allowed",
            outcomes.len()
        ))
    );
    Ok(())
}

/// Stream `text` through a gate seeded from `cfg`, answering prompts as
/// scripted, and collect the outcomes in completion order.
pub(crate) async fn gate_reply(
    cfg: &Config,
    text: &str,
    options: RunOptions,
) -> Result<Vec<GateOutcome>> {
    let subject: Subject = options.subject.parse()?;
    let engine = Arc::new(PermissionEngine::in_memory());
    config_bridge::seed_rules(cfg, &engine)?;

    let (prompts, mut prompt_ids) = mpsc::unbounded_channel();
    let coordinator = Arc::new(config_bridge::to_coordinator(
        cfg,
        engine,
        Arc::new(ScriptedInjector { prompts }),
    ));

    let (gate, mut outcomes) = StreamGate::new(
        Arc::clone(&coordinator),
        subject,
        EvalContext::new().with_session(options.session.clone()),
    );
    let mut gate = match options.timeout {
        Some(timeout) => gate.with_timeout(timeout),
        None => gate,
    };

    let answer = |prompt_id: String| {
        let Some(answer) = &options.answer else {
            return;
        };
        match route_reply(&coordinator, &format!("{prompt_id} {answer}")) {
            Ok(receipt) => println!(
                "{}",
                Theme::info(&format!("answered {} with {}", receipt.prompt_id, receipt.answer))
            ),
            Err(e) => warn!(%prompt_id, error = %e, "scripted answer rejected"),
        }
    };

    for chunk in super::chunks(text, options.chunk_size) {
        gate.write(chunk).await;
        while let Ok(prompt_id) = prompt_ids.try_recv() {
            answer(prompt_id);
        }
    }
    gate.end().await;
    while let Ok(prompt_id) = prompt_ids.try_recv() {
        answer(prompt_id);
    }
    gate.finish().await;

    let mut collected = Vec::new();
    while let Ok(outcome) = outcomes.try_recv() {
        collected.push(outcome);
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_config::RuleSeed;
    use parley_runtime::Verdict;

    fn options(answer: Option<&str>) -> RunOptions {
        RunOptions {
            subject: "agent:claude".to_owned(),
            session: "cli".to_owned(),
            answer: answer.map(str::to_owned),
            chunk_size: 4,
            timeout: None,
        }
    }

    fn config() -> Config {
        let mut cfg = Config::default();
        cfg.rules.push(RuleSeed {
            action: "allow".to_owned(),
            resource_kind: Some("command".to_owned()),
            resource_name: Some("ls".to_owned()),
            ..RuleSeed::default()
        });
        cfg.rules.push(RuleSeed {
            action: "deny".to_owned(),
            resource_kind: Some("command".to_owned()),
            resource_name: Some("rm".to_owned()),
            ..RuleSeed::default()
        });
        cfg
    }

    #[tokio::test]
    async fn test_rules_and_scripted_answer() {
        let reply = "<bash>ls -la</bash> then <bash>rm -rf tmp</bash> and <websearch>rust</websearch>";
        let outcomes = gate_reply(&config(), reply, options(Some("allow_once")))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        let verdict_for = |content: &str| {
            outcomes
                .iter()
                .find(|o| o.element.content == content)
                .map(|o| o.verdict.clone())
                .unwrap()
        };
        assert!(verdict_for("ls -la").is_allowed());
        assert!(!verdict_for("rm -rf tmp").is_allowed());
        assert!(matches!(verdict_for("rust"), Verdict::Allowed { .. }));
    }

    #[tokio::test]
    async fn test_deny_answer() {
        let outcomes = gate_reply(&Config::default(), "<ask/>", options(Some("deny")))
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            outcomes[0].verdict,
            Verdict::Denied {
                reason: "denied by user".to_owned()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_prompt_times_out() {
        let mut opts = options(None);
        opts.timeout = Some(Duration::from_secs(1));
        let outcomes = gate_reply(&Config::default(), "<websearch>x</websearch>", opts)
            .await
            .unwrap();
        assert_eq!(
            outcomes[0].verdict,
            Verdict::Denied {
                reason: "timed out".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn test_bad_subject() {
        let mut opts = options(None);
        opts.subject = "claude".to_owned();
        assert!(gate_reply(&Config::default(), "", opts).await.is_err());
    }
}
