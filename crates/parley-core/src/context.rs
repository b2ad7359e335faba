//! Evaluation context for permission checks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A comparable value used by rule conditions and context attributes.
///
/// Equality is plain structural equality: `Integer(1)` never equals
/// `String("1")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    /// A boolean flag.
    Bool(bool),
    /// A signed integer.
    Integer(i64),
    /// A string.
    String(String),
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// The scope an action is evaluated in.
///
/// `session_id` and `owner_id` are both optional: a missing session simply
/// means session-bound rules cannot match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalContext {
    /// Current chat session, if any.
    pub session_id: Option<String>,
    /// Owner of the session (the account whose rules apply), if any.
    pub owner_id: Option<String>,
    /// Extra attributes that rule conditions can test for equality.
    #[serde(default)]
    pub attributes: BTreeMap<String, ConditionValue>,
}

impl EvalContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session id.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the owner id.
    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Add an attribute.
    #[must_use]
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<ConditionValue>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up a value by condition key.
    ///
    /// `sessionId`/`session_id` and `ownerId`/`owner_id` resolve to the
    /// context ids; every other key resolves against [`Self::attributes`].
    #[must_use]
    pub fn value(&self, key: &str) -> Option<ConditionValue> {
        match key {
            "sessionId" | "session_id" => self.session_id.clone().map(ConditionValue::String),
            "ownerId" | "owner_id" => self.owner_id.clone().map(ConditionValue::String),
            _ => self.attributes.get(key).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_resolves_ids_and_attributes() {
        let ctx = EvalContext::new()
            .with_session("s-1")
            .with_owner("alice")
            .with_attribute("channel", "ops")
            .with_attribute("depth", 2);

        assert_eq!(ctx.value("sessionId"), Some(ConditionValue::from("s-1")));
        assert_eq!(ctx.value("owner_id"), Some(ConditionValue::from("alice")));
        assert_eq!(ctx.value("channel"), Some(ConditionValue::from("ops")));
        assert_eq!(ctx.value("depth"), Some(ConditionValue::Integer(2)));
        assert_eq!(ctx.value("missing"), None);
    }

    #[test]
    fn test_condition_values_do_not_coerce() {
        assert_ne!(ConditionValue::Integer(1), ConditionValue::from("1"));
        assert_ne!(ConditionValue::Bool(true), ConditionValue::from("true"));
    }

    #[test]
    fn test_condition_value_untagged_json() {
        let parsed: BTreeMap<String, ConditionValue> =
            serde_json::from_str(r#"{"a":"x","b":3,"c":false}"#).unwrap();
        assert_eq!(parsed["a"], ConditionValue::from("x"));
        assert_eq!(parsed["b"], ConditionValue::Integer(3));
        assert_eq!(parsed["c"], ConditionValue::Bool(false));
    }
}
