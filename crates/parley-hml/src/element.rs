//! HML elements and the fixed tag vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one element instance within a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub Uuid);

impl ElementId {
    /// Create a new random element ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el:{}", self.0)
    }
}

/// The HML tag vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Run a web search (executable).
    Websearch,
    /// Run a shell command (executable).
    Bash,
    /// Ask the human a structured question (executable).
    Ask,
    /// Agent reasoning shown collapsed.
    Thinking,
    /// A task list.
    Todo,
    /// A progress indicator.
    Progress,
    /// A hyperlink.
    Link,
    /// A copyable snippet.
    Copy,
    /// The result of an earlier action.
    Result,
    /// A list item, or a choice inside `<ask>`.
    Item,
}

impl ElementKind {
    /// Every tag, executable ones first.
    pub const ALL: [Self; 10] = [
        Self::Websearch,
        Self::Bash,
        Self::Ask,
        Self::Thinking,
        Self::Todo,
        Self::Progress,
        Self::Link,
        Self::Copy,
        Self::Result,
        Self::Item,
    ];

    /// Lowercase tag name.
    #[must_use]
    pub fn tag_name(self) -> &'static str {
        match self {
            Self::Websearch => "websearch",
            Self::Bash => "bash",
            Self::Ask => "ask",
            Self::Thinking => "thinking",
            Self::Todo => "todo",
            Self::Progress => "progress",
            Self::Link => "link",
            Self::Copy => "copy",
            Self::Result => "result",
            Self::Item => "item",
        }
    }

    /// Look up a tag by name, ignoring ASCII case.
    #[must_use]
    pub fn from_tag_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.tag_name().eq_ignore_ascii_case(name))
    }

    /// Whether completing this element requests a privileged action.
    #[must_use]
    pub fn is_executable(self) -> bool {
        matches!(self, Self::Websearch | Self::Bash | Self::Ask)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name())
    }
}

/// Attributes of an element in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    /// Create an empty attribute list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute. A repeated name keeps its first position and
    /// takes the latest value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.0.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.0.push((name, value));
        }
    }

    /// Value of an attribute, matching the name case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over `(name, value)` pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One HML element instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Unique instance id.
    pub id: ElementId,
    /// Which tag this is.
    pub kind: ElementKind,
    /// Attributes from the open tag.
    pub attributes: Attributes,
    /// Accumulated inner text; trimmed once the element completes.
    pub content: String,
    /// Whether this element requests a privileged action.
    pub executable: bool,
    /// When the open tag was seen.
    pub start_time: DateTime<Utc>,
    /// When the element completed or errored.
    pub end_time: Option<DateTime<Utc>>,
}

impl Element {
    /// Create a freshly opened element.
    #[must_use]
    pub fn new(kind: ElementKind, attributes: Attributes) -> Self {
        Self {
            id: ElementId::new(),
            kind,
            attributes,
            content: String::new(),
            executable: kind.is_executable(),
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// Whether the element has been closed (completed or errored).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.end_time.is_some()
    }
}
