//! Bridge from `parley_config::Config` to domain types.
//!
//! The config crate keeps kinds and actions as strings; this module turns
//! them into log settings, seed rules and an escalation coordinator.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use parley_approval::{
    EscalationCoordinator, MessageInjector, NewRule, PermissionEngine, RuleAction, RuleScope,
};
use parley_config::{Config, RuleSeed};
use parley_core::{ConditionValue, ResourceKind, SubjectKind};
use parley_telemetry::{LogConfig, LogFormat};

/// Convert config to [`LogConfig`].
///
/// An unknown format falls back to compact; validation has already rejected
/// it for loaded configs.
#[must_use]
pub fn to_log_config(cfg: &Config) -> LogConfig {
    let format = cfg
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or(LogFormat::Compact);

    cfg.logging
        .directives
        .iter()
        .fold(LogConfig::new(&cfg.logging.level).with_format(format), |lc, d| {
            lc.with_directive(d)
        })
}

/// Convert one seed to a [`NewRule`].
///
/// # Errors
///
/// Returns an error naming the offending field if a kind, action, scope or
/// condition value is not recognized.
pub fn to_new_rule(seed: &RuleSeed) -> Result<NewRule> {
    let action: RuleAction = seed.action.parse().context("rule action")?;
    let scope: RuleScope = seed.scope.parse().context("rule scope")?;

    let mut rule = NewRule::new(action, scope).with_priority(seed.priority);
    rule.subject_kind = seed
        .subject_kind
        .as_deref()
        .map(str::parse::<SubjectKind>)
        .transpose()
        .context("rule subject_kind")?;
    rule.subject_id.clone_from(&seed.subject_id);
    rule.resource_kind = seed
        .resource_kind
        .as_deref()
        .map(str::parse::<ResourceKind>)
        .transpose()
        .context("rule resource_kind")?;
    rule.resource_name.clone_from(&seed.resource_name);
    rule.session_id.clone_from(&seed.session_id);
    rule.owner_id.clone_from(&seed.owner_id);

    for (key, value) in &seed.conditions {
        let value = match value {
            toml::Value::String(text) => ConditionValue::from(text.as_str()),
            toml::Value::Integer(number) => ConditionValue::from(*number),
            toml::Value::Boolean(flag) => ConditionValue::from(*flag),
            other => bail!("rule condition {key}: unsupported value {other}"),
        };
        rule = rule.with_condition(key.clone(), value);
    }

    rule.validate()?;
    Ok(rule)
}

/// Create every configured seed rule in `engine`.
///
/// Returns the number of rules created.
///
/// # Errors
///
/// Stops at the first seed that does not convert or is rejected.
pub fn seed_rules(cfg: &Config, engine: &PermissionEngine) -> Result<usize> {
    for (index, seed) in cfg.rules.iter().enumerate() {
        let rule = to_new_rule(seed).with_context(|| format!("rules[{index}]"))?;
        engine
            .create_rule(rule)
            .with_context(|| format!("rules[{index}]"))?;
    }
    Ok(cfg.rules.len())
}

/// Build a coordinator with the configured timeout and prompt prefix.
#[must_use]
pub fn to_coordinator(
    cfg: &Config,
    engine: Arc<PermissionEngine>,
    injector: Arc<dyn MessageInjector>,
) -> EscalationCoordinator {
    EscalationCoordinator::new(engine, injector)
        .with_default_timeout(cfg.escalation_timeout())
        .with_prompt_prefix(cfg.escalation.prompt_prefix.clone())
}
