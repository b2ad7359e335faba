//! Configuration types for the Parley hub.
//!
//! These types carry plain strings rather than the domain enums of
//! `parley-core` and `parley-approval`; the binary converts them at startup.
//! Every struct implements [`Default`] so that a bare `[section]` header
//! still produces a working configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Human escalation of permission prompts.
    pub escalation: EscalationSection,
    /// Logging level, format and per-crate directives.
    pub logging: LoggingSection,
    /// Rules loaded into the permission engine at startup.
    pub rules: Vec<RuleSeed>,
}

// ---------------------------------------------------------------------------
// EscalationSection
// ---------------------------------------------------------------------------

/// How permission prompts are escalated to a human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationSection {
    /// Seconds a prompt waits for an answer before it resolves deny.
    pub timeout_secs: u64,
    /// Prefix of generated prompt ids.
    pub prompt_prefix: String,
}

impl Default for EscalationSection {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            prompt_prefix: "perm_".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["parley_hml=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// RuleSeed
// ---------------------------------------------------------------------------

/// A permission rule declared in configuration.
///
/// ```toml
/// [[rules]]
/// action = "allow"
/// subject_kind = "agent"
/// subject_id = "claude"
/// resource_kind = "command"
/// resource_name = "ls"
/// ```
///
/// Omitted kinds are wildcards. Conditions accept strings, integers and
/// booleans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSeed {
    /// `"allow"`, `"deny"` or `"prompt"`.
    pub action: String,
    /// `"once"`, `"session"` or `"permanent"`.
    pub scope: String,
    /// `"user"`, `"agent"` or `"plugin"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_kind: Option<String>,
    /// Exact subject id. Requires `subject_kind`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    /// `"command"`, `"tool"` or `"ability"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_kind: Option<String>,
    /// Exact resource name. Requires `resource_kind`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    /// Session to bind the rule to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Owning account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Tiebreaker at equal specificity.
    pub priority: i32,
    /// Equality constraints on context attributes.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, toml::Value>,
}

impl Default for RuleSeed {
    fn default() -> Self {
        Self {
            action: "prompt".to_owned(),
            scope: "permanent".to_owned(),
            subject_kind: None,
            subject_id: None,
            resource_kind: None,
            resource_name: None,
            session_id: None,
            owner_id: None,
            priority: 0,
            conditions: BTreeMap::new(),
        }
    }
}
