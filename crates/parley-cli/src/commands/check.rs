//! `parley check`: evaluate one request against the configured rules.

use anyhow::{Context, Result};
use parley_approval::{Decision, PermissionEngine};
use parley_config::Config;
use parley_core::{EvalContext, Resource, Subject};

use crate::config_bridge;
use crate::theme::Theme;

/// Seed an in-memory engine from `cfg` and print the decision for one
/// `subject` / `resource` pair.
pub(crate) fn run_check(
    cfg: &Config,
    subject: &str,
    resource: &str,
    session: Option<String>,
    owner: Option<String>,
) -> Result<()> {
    let decision = evaluate(cfg, subject, resource, session, owner)?;

    println!("{}", Theme::header("Permission check"));
    println!("{}", Theme::separator());
    println!("{}", Theme::kv("subject", subject));
    println!("{}", Theme::kv("resource", resource));
    println!("{}", Theme::kv("decision", &Theme::action(decision.action)));
    match &decision.rule {
        Some(rule) => println!(
            "{}",
            Theme::kv(
                "rule",
                &format!("{} ({} scope, priority {})", rule.id, rule.scope, rule.priority)
            )
        ),
        None => println!("{}", Theme::dimmed("no rule matched")),
    }
    Ok(())
}

pub(crate) fn evaluate(
    cfg: &Config,
    subject: &str,
    resource: &str,
    session: Option<String>,
    owner: Option<String>,
) -> Result<Decision> {
    let subject: Subject = subject.parse().context("subject")?;
    let resource: Resource = resource.parse().context("resource")?;

    let engine = PermissionEngine::in_memory();
    config_bridge::seed_rules(cfg, &engine)?;

    let mut ctx = EvalContext::new();
    ctx.session_id = session;
    ctx.owner_id = owner;
    Ok(engine.evaluate(&subject, &resource, &ctx))
}
