//! Parser lifecycle events.

use serde::{Deserialize, Serialize};

use crate::element::{Element, ElementId, ElementKind};

/// An event emitted by the [`TagParser`](crate::TagParser).
///
/// For any one element the order is always `ElementStart`, zero or more
/// `ElementUpdate`, then exactly one of `ElementComplete` or
/// `ElementError`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParseEvent {
    /// Plain text outside any element.
    Text {
        /// The text fragment.
        text: String,
    },
    /// An open tag was recognized.
    ElementStart {
        /// Snapshot of the element as opened.
        element: Element,
    },
    /// Text was appended to the innermost open element.
    ElementUpdate {
        /// Which element grew.
        id: ElementId,
        /// Its kind.
        kind: ElementKind,
        /// The appended fragment.
        delta: String,
    },
    /// An element closed normally.
    ElementComplete {
        /// The finished element with trimmed content.
        element: Element,
    },
    /// Malformed markup: a mismatched close tag, an implicitly closed child,
    /// or an element left open when the stream ended.
    ElementError {
        /// The affected element, absent for a stray close tag.
        element: Option<Element>,
        /// What went wrong.
        message: String,
    },
    /// The stream ended.
    Done {
        /// Every executable element completed over the stream.
        executables: Vec<Element>,
    },
}

impl ParseEvent {
    /// The completed element, if this is an `ElementComplete`.
    #[must_use]
    pub fn completed(&self) -> Option<&Element> {
        match self {
            Self::ElementComplete { element } => Some(element),
            _ => None,
        }
    }

    /// Whether this is an `ElementError`.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ElementError { .. })
    }
}
