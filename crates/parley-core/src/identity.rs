//! Subjects and resources.
//!
//! A [`Subject`] is the identity attempting an action; a [`Resource`] is the
//! thing being acted upon. Both render as `kind:name` and parse back from
//! the same form, which is how the CLI and config seeds spell them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{IdentityParseError, IdentityResult};

/// The kind of identity attempting an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// A human participant.
    User,
    /// An AI agent participant.
    Agent,
    /// A plugin acting on someone's behalf.
    Plugin,
}

impl SubjectKind {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::Plugin => "plugin",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubjectKind {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> IdentityResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            "plugin" => Ok(Self::Plugin),
            other => Err(IdentityParseError::UnknownSubjectKind(other.to_string())),
        }
    }
}

/// The kind of thing being acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A shell command.
    Command,
    /// A tool such as web search.
    Tool,
    /// A hub ability such as prompting the human.
    Ability,
}

impl ResourceKind {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Tool => "tool",
            Self::Ability => "ability",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> IdentityResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "command" => Ok(Self::Command),
            "tool" => Ok(Self::Tool),
            "ability" => Ok(Self::Ability),
            other => Err(IdentityParseError::UnknownResourceKind(other.to_string())),
        }
    }
}

/// The identity attempting an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    /// What kind of participant this is.
    pub kind: SubjectKind,
    /// Participant identifier, unique within its kind.
    pub id: String,
}

impl Subject {
    /// Create a subject.
    #[must_use]
    pub fn new(kind: SubjectKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for a user subject.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(SubjectKind::User, id)
    }

    /// Shorthand for an agent subject.
    #[must_use]
    pub fn agent(id: impl Into<String>) -> Self {
        Self::new(SubjectKind::Agent, id)
    }

    /// Shorthand for a plugin subject.
    #[must_use]
    pub fn plugin(id: impl Into<String>) -> Self {
        Self::new(SubjectKind::Plugin, id)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for Subject {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> IdentityResult<Self> {
        let (kind, id) = split_pair(s)?;
        Ok(Self::new(kind.parse()?, id))
    }
}

/// The thing being acted upon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// What kind of resource this is.
    pub kind: ResourceKind,
    /// Resource name (command name, tool name, ability name).
    pub name: String,
}

impl Resource {
    /// Create a resource.
    #[must_use]
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Shorthand for a command resource.
    #[must_use]
    pub fn command(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Command, name)
    }

    /// Shorthand for a tool resource.
    #[must_use]
    pub fn tool(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Tool, name)
    }

    /// Shorthand for an ability resource.
    #[must_use]
    pub fn ability(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Ability, name)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

impl FromStr for Resource {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> IdentityResult<Self> {
        let (kind, name) = split_pair(s)?;
        Ok(Self::new(kind.parse()?, name))
    }
}

/// Split `kind:name` at the first colon. The name may itself contain colons.
fn split_pair(s: &str) -> IdentityResult<(&str, &str)> {
    let (kind, name) = s
        .split_once(':')
        .ok_or_else(|| IdentityParseError::MissingSeparator(s.to_string()))?;
    if name.trim().is_empty() {
        return Err(IdentityParseError::EmptyName(s.to_string()));
    }
    Ok((kind, name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_round_trips_through_display() {
        let subject = Subject::agent("researcher");
        let parsed: Subject = subject.to_string().parse().unwrap();
        assert_eq!(parsed, subject);
    }

    #[test]
    fn test_kind_parsing_is_case_insensitive() {
        assert_eq!("AGENT".parse::<SubjectKind>().unwrap(), SubjectKind::Agent);
        assert_eq!(" Tool ".parse::<ResourceKind>().unwrap(), ResourceKind::Tool);
    }

    #[test]
    fn test_resource_name_may_contain_colons() {
        let resource: Resource = "tool:mcp:github".parse().unwrap();
        assert_eq!(resource.kind, ResourceKind::Tool);
        assert_eq!(resource.name, "mcp:github");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "ls".parse::<Resource>(),
            Err(IdentityParseError::MissingSeparator("ls".to_string()))
        );
        assert_eq!(
            "robot:x".parse::<Subject>(),
            Err(IdentityParseError::UnknownSubjectKind("robot".to_string()))
        );
        assert_eq!(
            "command:".parse::<Resource>(),
            Err(IdentityParseError::EmptyName("command:".to_string()))
        );
    }

    #[test]
    fn test_kind_serde_is_snake_case() {
        let json = serde_json::to_string(&ResourceKind::Ability).unwrap();
        assert_eq!(json, "\"ability\"");
    }
}
