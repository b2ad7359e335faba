//! Rule persistence.

use chrono::{DateTime, Utc};
use parley_core::{ConditionValue, Resource, ResourceKind, Subject, SubjectKind};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use super::{NewRule, Rule, RuleAction, RuleId, RuleScope};
use crate::error::{ApprovalError, ApprovalResult};

/// Wildcard marker used in stored type columns.
const WILDCARD: &str = "*";

/// Data access for authorization rules.
///
/// Implementations must make [`delete`](Self::delete) atomic: when two
/// callers delete the same id concurrently, exactly one sees `true`. The
/// engine relies on that to hand out a `once` rule at most one time.
pub trait RuleStore: Send + Sync {
    /// Persist a new rule and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    fn create(&self, rule: NewRule) -> ApprovalResult<Rule>;

    /// Load one rule.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    fn get(&self, id: RuleId) -> ApprovalResult<Option<Rule>>;

    /// Rules whose subject and resource columns could match.
    ///
    /// This is a coarse pre-filter; the engine still applies
    /// [`Rule::matches`] to every candidate.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    fn candidates(&self, subject: &Subject, resource: &Resource) -> ApprovalResult<Vec<Rule>>;

    /// Delete a rule, returning whether this call removed it.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    fn delete(&self, id: RuleId) -> ApprovalResult<bool>;

    /// Every stored rule, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    fn list(&self) -> ApprovalResult<Vec<Rule>>;

    /// Delete every rule bound to a session, returning how many went.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    fn delete_session_rules(&self, session_id: &str) -> ApprovalResult<usize>;
}

/// Stored shape of a rule: type columns as strings with `*` for wildcard,
/// conditions as serialized JSON text.
#[derive(Debug, Clone)]
struct RuleRow {
    id: i64,
    owner_id: Option<String>,
    session_id: Option<String>,
    subject_type: String,
    subject_id: Option<String>,
    resource_type: String,
    resource_name: Option<String>,
    action: String,
    scope: String,
    conditions: Option<String>,
    priority: i32,
    created_at: DateTime<Utc>,
}

impl RuleRow {
    fn from_new(id: i64, rule: &NewRule) -> ApprovalResult<Self> {
        let conditions = rule
            .conditions
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ApprovalError::Storage(format!("failed to encode conditions: {e}")))?;
        Ok(Self {
            id,
            owner_id: rule.owner_id.clone(),
            session_id: rule.session_id.clone(),
            subject_type: rule
                .subject_kind
                .map_or(WILDCARD, |k| k.as_str())
                .to_string(),
            subject_id: rule.subject_id.clone(),
            resource_type: rule
                .resource_kind
                .map_or(WILDCARD, |k| k.as_str())
                .to_string(),
            resource_name: rule.resource_name.clone(),
            action: rule.action.as_str().to_string(),
            scope: rule.scope.as_str().to_string(),
            conditions,
            priority: rule.priority,
            created_at: Utc::now(),
        })
    }

    /// Cheap column test used by [`RuleStore::candidates`].
    fn could_match(&self, subject: &Subject, resource: &Resource) -> bool {
        (self.subject_type == WILDCARD || self.subject_type == subject.kind.as_str())
            && (self.resource_type == WILDCARD || self.resource_type == resource.kind.as_str())
    }

    fn to_rule(&self) -> ApprovalResult<Rule> {
        let corrupt = |what: &str, e: &dyn fmt::Display| {
            ApprovalError::Storage(format!("corrupt {what} in rule {}: {e}", self.id))
        };

        let subject_kind = match self.subject_type.as_str() {
            WILDCARD => None,
            other => Some(
                other
                    .parse::<SubjectKind>()
                    .map_err(|e| corrupt("subject_type", &e))?,
            ),
        };
        let resource_kind = match self.resource_type.as_str() {
            WILDCARD => None,
            other => Some(
                other
                    .parse::<ResourceKind>()
                    .map_err(|e| corrupt("resource_type", &e))?,
            ),
        };
        let conditions = self
            .conditions
            .as_deref()
            .map(serde_json::from_str::<BTreeMap<String, ConditionValue>>)
            .transpose()
            .map_err(|e| corrupt("conditions", &e))?;

        Ok(Rule {
            id: RuleId(self.id),
            owner_id: self.owner_id.clone(),
            session_id: self.session_id.clone(),
            subject_kind,
            subject_id: self.subject_id.clone(),
            resource_kind,
            resource_name: self.resource_name.clone(),
            action: self
                .action
                .parse::<RuleAction>()
                .map_err(|e| corrupt("action", &e))?,
            scope: self
                .scope
                .parse::<RuleScope>()
                .map_err(|e| corrupt("scope", &e))?,
            conditions,
            priority: self.priority,
            created_at: self.created_at,
        })
    }
}

/// In-process rule table.
///
/// Thread-safe via an internal [`RwLock`]; ids come from an atomic counter
/// starting at 1. [`list`](RuleStore::list) skips rows that fail to decode
/// with a warning; [`candidates`](RuleStore::candidates) fails instead, so
/// evaluation denies.
///
/// # Example
///
/// ```
/// use parley_approval::{MemoryRuleStore, NewRule, RuleStore};
///
/// let store = MemoryRuleStore::new();
/// let rule = store.create(NewRule::deny()).unwrap();
/// assert!(store.delete(rule.id).unwrap());
/// assert!(!store.delete(rule.id).unwrap());
/// ```
pub struct MemoryRuleStore {
    rows: RwLock<BTreeMap<i64, RuleRow>>,
    next_id: AtomicI64,
}

impl MemoryRuleStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored rules.
    #[must_use]
    pub fn count(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    fn decode_readable<'a>(rows: impl Iterator<Item = &'a RuleRow>) -> Vec<Rule> {
        rows.filter_map(|row| match row.to_rule() {
            Ok(rule) => Some(rule),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable rule row");
                None
            },
        })
        .collect()
    }
}

impl Default for MemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryRuleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRuleStore")
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

impl RuleStore for MemoryRuleStore {
    fn create(&self, rule: NewRule) -> ApprovalResult<Rule> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let row = RuleRow::from_new(id, &rule)?;
        let stored = row.to_rule()?;
        self.rows
            .write()
            .map_err(|e| ApprovalError::Storage(e.to_string()))?
            .insert(id, row);
        Ok(stored)
    }

    fn get(&self, id: RuleId) -> ApprovalResult<Option<Rule>> {
        let rows = self
            .rows
            .read()
            .map_err(|e| ApprovalError::Storage(e.to_string()))?;
        rows.get(&id.0).map(RuleRow::to_rule).transpose()
    }

    fn candidates(&self, subject: &Subject, resource: &Resource) -> ApprovalResult<Vec<Rule>> {
        let rows = self
            .rows
            .read()
            .map_err(|e| ApprovalError::Storage(e.to_string()))?;
        // Any unreadable candidate fails the read so evaluation denies.
        rows.values()
            .filter(|row| row.could_match(subject, resource))
            .map(RuleRow::to_rule)
            .collect()
    }

    fn delete(&self, id: RuleId) -> ApprovalResult<bool> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| ApprovalError::Storage(e.to_string()))?;
        Ok(rows.remove(&id.0).is_some())
    }

    fn list(&self) -> ApprovalResult<Vec<Rule>> {
        let rows = self
            .rows
            .read()
            .map_err(|e| ApprovalError::Storage(e.to_string()))?;
        Ok(Self::decode_readable(rows.values()))
    }

    fn delete_session_rules(&self, session_id: &str) -> ApprovalResult<usize> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| ApprovalError::Storage(e.to_string()))?;
        let before = rows.len();
        rows.retain(|_, row| row.session_id.as_deref() != Some(session_id));
        Ok(before.saturating_sub(rows.len()))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
