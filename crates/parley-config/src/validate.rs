//! Post-merge configuration validation.
//!
//! Validates that deserialized [`Config`](crate::Config) values are within
//! acceptable ranges and that seed rules name known kinds.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, RuleSeed};

/// Longest escalation timeout accepted (one day).
const MAX_TIMEOUT_SECS: u64 = 86_400;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const FORMATS: [&str; 4] = ["pretty", "compact", "json", "full"];
const ACTIONS: [&str; 3] = ["allow", "deny", "prompt"];
const SCOPES: [&str; 3] = ["once", "session", "permanent"];
const SUBJECT_KINDS: [&str; 3] = ["user", "agent", "plugin"];
const RESOURCE_KINDS: [&str; 3] = ["command", "tool", "ability"];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_escalation(config)?;
    validate_logging(config)?;
    for (index, seed) in config.rules.iter().enumerate() {
        validate_rule(index, seed)?;
    }
    Ok(())
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> ConfigResult<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!(
                "unsupported value '{value}'; expected one of: {}",
                allowed.join(", ")
            ),
        ))
    }
}

fn validate_escalation(config: &Config) -> ConfigResult<()> {
    let e = &config.escalation;

    if e.timeout_secs == 0 || e.timeout_secs > MAX_TIMEOUT_SECS {
        return Err(invalid(
            "escalation.timeout_secs",
            format!(
                "timeout {} is out of range; must be between 1 and {MAX_TIMEOUT_SECS}",
                e.timeout_secs
            ),
        ));
    }

    if e.prompt_prefix.is_empty() {
        return Err(invalid("escalation.prompt_prefix", "must not be empty"));
    }
    if !e
        .prompt_prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid(
            "escalation.prompt_prefix",
            format!(
                "'{}' may only contain ASCII letters, digits, '_' and '-'",
                e.prompt_prefix
            ),
        ));
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    one_of("logging.level", &config.logging.level, &LEVELS)?;
    one_of("logging.format", &config.logging.format, &FORMATS)
}

fn validate_rule(index: usize, seed: &RuleSeed) -> ConfigResult<()> {
    let field = |name: &str| format!("rules[{index}].{name}");

    one_of(&field("action"), &seed.action, &ACTIONS)?;
    one_of(&field("scope"), &seed.scope, &SCOPES)?;
    if let Some(kind) = &seed.subject_kind {
        one_of(&field("subject_kind"), kind, &SUBJECT_KINDS)?;
    }
    if let Some(kind) = &seed.resource_kind {
        one_of(&field("resource_kind"), kind, &RESOURCE_KINDS)?;
    }

    if seed.subject_id.is_some() && seed.subject_kind.is_none() {
        return Err(invalid(field("subject_id"), "requires subject_kind"));
    }
    if seed.resource_name.is_some() && seed.resource_kind.is_none() {
        return Err(invalid(field("resource_name"), "requires resource_kind"));
    }
    if seed.scope == "session" && seed.session_id.is_none() {
        return Err(invalid(
            field("session_id"),
            "is required for session-scoped rules",
        ));
    }

    for (key, value) in &seed.conditions {
        if !matches!(
            value,
            toml::Value::String(_) | toml::Value::Integer(_) | toml::Value::Boolean(_)
        ) {
            return Err(invalid(
                field(&format!("conditions.{key}")),
                "must be a string, integer or boolean",
            ));
        }
    }

    Ok(())
}
