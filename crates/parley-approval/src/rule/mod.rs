//! Authorization rules and the store that holds them.
//!
//! A [`Rule`] binds an optional subject, resource, session and owner to an
//! [`RuleAction`]. Unset fields are wildcards. Rules are immutable once
//! created; deleting is the only mutation, and a [`RuleScope::Once`] rule is
//! deleted by the engine the first time it wins an evaluation.

mod store;

pub use store::{MemoryRuleStore, RuleStore};

use chrono::{DateTime, Utc};
use parley_core::{ConditionValue, EvalContext, Resource, ResourceKind, Subject, SubjectKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ApprovalError, ApprovalResult};

/// Store-assigned rule identifier, increasing in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub i64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule:{}", self.0)
    }
}

/// What a rule decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Let the action run.
    Allow,
    /// Refuse the action.
    Deny,
    /// Ask a human.
    Prompt,
}

impl RuleAction {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Prompt => "prompt",
        }
    }

    /// Tiebreak rank at equal specificity and priority. Higher wins.
    pub(crate) fn severity(self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Prompt => 1,
            Self::Deny => 2,
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleAction {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            "prompt" => Ok(Self::Prompt),
            other => Err(ApprovalError::InvalidRule {
                field: "action",
                reason: format!("unknown action '{other}'"),
            }),
        }
    }
}

/// How long a rule lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// Consumed by the first evaluation it wins.
    Once,
    /// Bound to one session; removed on session teardown.
    Session,
    /// Lives until explicitly deleted.
    Permanent,
}

impl RuleScope {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Session => "session",
            Self::Permanent => "permanent",
        }
    }
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleScope {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "once" => Ok(Self::Once),
            "session" => Ok(Self::Session),
            "permanent" => Ok(Self::Permanent),
            other => Err(ApprovalError::InvalidRule {
                field: "scope",
                reason: format!("unknown scope '{other}'"),
            }),
        }
    }
}

/// A stored authorization rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Store-assigned id.
    pub id: RuleId,
    /// Owning account (`None` = system-wide).
    pub owner_id: Option<String>,
    /// Session the rule is bound to (`None` = all sessions).
    pub session_id: Option<String>,
    /// Subject kind (`None` = `*`).
    pub subject_kind: Option<SubjectKind>,
    /// Specific subject id (`None` = any id of the kind).
    pub subject_id: Option<String>,
    /// Resource kind (`None` = `*`).
    pub resource_kind: Option<ResourceKind>,
    /// Specific resource name (`None` = any name of the kind).
    pub resource_name: Option<String>,
    /// What the rule decides.
    pub action: RuleAction,
    /// How long the rule lives.
    pub scope: RuleScope,
    /// Extra equality constraints against the evaluation context.
    pub conditions: Option<BTreeMap<String, ConditionValue>>,
    /// Tiebreaker at equal specificity. Higher wins.
    pub priority: i32,
    /// When the rule was created.
    pub created_at: DateTime<Utc>,
}

impl Rule {
    /// Whether this rule applies to the given triple.
    ///
    /// Every set field must equal its input, and every condition must equal
    /// the context value under the same key.
    #[must_use]
    pub fn matches(&self, subject: &Subject, resource: &Resource, ctx: &EvalContext) -> bool {
        field_matches(self.subject_kind.as_ref(), Some(&subject.kind))
            && field_matches(self.subject_id.as_ref(), Some(&subject.id))
            && field_matches(self.resource_kind.as_ref(), Some(&resource.kind))
            && field_matches(self.resource_name.as_ref(), Some(&resource.name))
            && field_matches(self.session_id.as_ref(), ctx.session_id.as_ref())
            && field_matches(self.owner_id.as_ref(), ctx.owner_id.as_ref())
            && self.conditions.as_ref().is_none_or(|conditions| {
                conditions
                    .iter()
                    .all(|(key, expected)| ctx.value(key).as_ref() == Some(expected))
            })
    }

    /// Specificity score of this rule for a context it matches.
    ///
    /// +8 for a session-scoped rule bound to the context's session, +4 for
    /// an exact subject id (else +2 for an exact subject kind), +1 for an
    /// exact resource name. A `once` or `permanent` rule that names a session is
    /// still limited to it but earns no bonus.
    #[must_use]
    pub fn specificity(&self, ctx: &EvalContext) -> u8 {
        let mut score: u8 = 0;
        if self.scope == RuleScope::Session
            && self.session_id.is_some()
            && self.session_id == ctx.session_id
        {
            score = score.saturating_add(8);
        }
        if self.subject_id.is_some() {
            score = score.saturating_add(4);
        } else if self.subject_kind.is_some() {
            score = score.saturating_add(2);
        }
        if self.resource_name.is_some() {
            score = score.saturating_add(1);
        }
        score
    }
}

fn field_matches<T: PartialEq>(rule: Option<&T>, input: Option<&T>) -> bool {
    rule.is_none_or(|expected| input == Some(expected))
}

/// Fields for a rule about to be created.
///
/// Starts fully wildcarded; narrow it with the builder methods.
///
/// ```
/// use parley_approval::{NewRule, RuleScope};
/// use parley_core::{Resource, Subject};
///
/// let rule = NewRule::deny()
///     .for_subject(&Subject::agent("claude"))
///     .on_resource(&Resource::command("rm"))
///     .with_scope(RuleScope::Session)
///     .in_session("s-1");
/// assert!(rule.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    /// Owning account (`None` = system-wide).
    pub owner_id: Option<String>,
    /// Session the rule is bound to.
    pub session_id: Option<String>,
    /// Subject kind (`None` = `*`).
    pub subject_kind: Option<SubjectKind>,
    /// Specific subject id.
    pub subject_id: Option<String>,
    /// Resource kind (`None` = `*`).
    pub resource_kind: Option<ResourceKind>,
    /// Specific resource name.
    pub resource_name: Option<String>,
    /// What the rule decides.
    pub action: RuleAction,
    /// How long the rule lives.
    pub scope: RuleScope,
    /// Extra equality constraints.
    pub conditions: Option<BTreeMap<String, ConditionValue>>,
    /// Tiebreaker at equal specificity.
    pub priority: i32,
}

impl NewRule {
    /// A wildcard rule with the given action and scope.
    #[must_use]
    pub fn new(action: RuleAction, scope: RuleScope) -> Self {
        Self {
            owner_id: None,
            session_id: None,
            subject_kind: None,
            subject_id: None,
            resource_kind: None,
            resource_name: None,
            action,
            scope,
            conditions: None,
            priority: 0,
        }
    }

    /// A permanent wildcard `allow` rule.
    #[must_use]
    pub fn allow() -> Self {
        Self::new(RuleAction::Allow, RuleScope::Permanent)
    }

    /// A permanent wildcard `deny` rule.
    #[must_use]
    pub fn deny() -> Self {
        Self::new(RuleAction::Deny, RuleScope::Permanent)
    }

    /// A permanent wildcard `prompt` rule.
    #[must_use]
    pub fn prompt() -> Self {
        Self::new(RuleAction::Prompt, RuleScope::Permanent)
    }

    /// Target exactly this subject.
    #[must_use]
    pub fn for_subject(mut self, subject: &Subject) -> Self {
        self.subject_kind = Some(subject.kind);
        self.subject_id = Some(subject.id.clone());
        self
    }

    /// Target every subject of one kind.
    #[must_use]
    pub fn for_subject_kind(mut self, kind: SubjectKind) -> Self {
        self.subject_kind = Some(kind);
        self.subject_id = None;
        self
    }

    /// Target exactly this resource.
    #[must_use]
    pub fn on_resource(mut self, resource: &Resource) -> Self {
        self.resource_kind = Some(resource.kind);
        self.resource_name = Some(resource.name.clone());
        self
    }

    /// Target every resource of one kind.
    #[must_use]
    pub fn on_resource_kind(mut self, kind: ResourceKind) -> Self {
        self.resource_kind = Some(kind);
        self.resource_name = None;
        self
    }

    /// Bind to a session.
    #[must_use]
    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Bind to an owner.
    #[must_use]
    pub fn owned_by(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Change the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: RuleScope) -> Self {
        self.scope = scope;
        self
    }

    /// Change the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add an equality condition on a context key.
    #[must_use]
    pub fn with_condition(
        mut self,
        key: impl Into<String>,
        value: impl Into<ConditionValue>,
    ) -> Self {
        self.conditions
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Check the field combination.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidRule`] when a session-scoped rule has
    /// no session id, or when an id or name is set under a wildcard kind.
    pub fn validate(&self) -> ApprovalResult<()> {
        if self.scope == RuleScope::Session && self.session_id.is_none() {
            return Err(ApprovalError::InvalidRule {
                field: "session_id",
                reason: "is required for session-scoped rules".to_string(),
            });
        }
        if self.subject_id.is_some() && self.subject_kind.is_none() {
            return Err(ApprovalError::InvalidRule {
                field: "subject_id",
                reason: "cannot be set with a wildcard subject type".to_string(),
            });
        }
        if self.resource_name.is_some() && self.resource_kind.is_none() {
            return Err(ApprovalError::InvalidRule {
                field: "resource_name",
                reason: "cannot be set with a wildcard resource type".to_string(),
            });
        }
        Ok(())
    }
}
