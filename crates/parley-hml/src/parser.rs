//! Incremental HML tag parser for streaming agent replies.
//!
//! The parser keeps one growing buffer and a stack of open elements. Each
//! [`write`](TagParser::write) scans the buffer for complete vocabulary tags,
//! routes the text between them, and flushes everything except a trailing
//! fragment that could still turn into a tag once more text arrives. Because
//! matching always runs over the same accumulated text, splitting the input
//! at different chunk boundaries never changes which elements complete.

use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::element::{Element, ElementKind};
use crate::event::ParseEvent;
use crate::markup::parse_attributes;

/// Open or close tag from the vocabulary. Attribute text, when present,
/// must start with whitespace or `/` so `<bashful>` is never a `<bash>`,
/// and may not contain `<` so prose like `<ask later` cannot swallow the
/// next tag.
static TAG: LazyLock<Regex> = LazyLock::new(|| {
    let names: Vec<&str> = ElementKind::ALL.iter().map(|k| k.tag_name()).collect();
    Regex::new(&format!(
        r"(?i)<(/)?({})((?:[\s/][^<>]*)?)>",
        names.join("|")
    ))
    .expect("invalid regex")
});

/// Streaming parser state for one agent reply.
///
/// One logical writer per stream: call [`write`](Self::write) for each
/// chunk in arrival order, then [`end`](Self::end) once.
#[derive(Debug, Default)]
pub struct TagParser {
    /// Unprocessed tail that may be the start of a tag.
    buffer: String,
    /// Open elements, innermost last.
    stack: Vec<Element>,
    /// Completed executable elements not yet drained by the orchestrator.
    pending: Vec<Element>,
    /// Every completed executable element, reported again on `Done`.
    executables: Vec<Element>,
    finished: bool,
}

impl TagParser {
    /// Create a parser for a new stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk, returning the events it produced.
    pub fn write(&mut self, chunk: &str) -> Vec<ParseEvent> {
        if self.finished {
            warn!(len = chunk.len(), "write after end ignored");
            return Vec::new();
        }

        self.buffer.push_str(chunk);
        let buffer = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        let mut cursor = 0;

        for caps in TAG.captures_iter(&buffer) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            self.route_text(&buffer[cursor..whole.start()], &mut events);
            cursor = whole.end();

            let Some(kind) = caps
                .get(2)
                .and_then(|m| ElementKind::from_tag_name(m.as_str()))
            else {
                continue;
            };
            if caps.get(1).is_some() {
                self.close(kind, &mut events);
            } else {
                let attr_text = caps.get(3).map_or("", |m| m.as_str());
                self.open(kind, attr_text, &mut events);
            }
        }

        let rest = &buffer[cursor..];
        let hold = partial_tag_start(rest).unwrap_or(rest.len());
        self.route_text(&rest[..hold], &mut events);
        self.buffer = rest[hold..].to_string();

        events
    }

    /// Signal the end of the stream.
    ///
    /// Flushes held-back text, reports every still-open element as unclosed,
    /// and finishes with [`ParseEvent::Done`]. Calling it twice yields
    /// nothing the second time.
    pub fn end(&mut self) -> Vec<ParseEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        self.route_text(&rest, &mut events);

        while let Some(element) = self.stack.pop() {
            Self::fail(element, "unclosed element".to_string(), &mut events);
        }

        debug!(executables = self.executables.len(), "stream ended");
        events.push(ParseEvent::Done {
            executables: self.executables.clone(),
        });
        events
    }

    /// Take the executable elements completed since the last drain.
    pub fn drain_executables(&mut self) -> Vec<Element> {
        std::mem::take(&mut self.pending)
    }

    /// Elements currently open, outermost first.
    #[must_use]
    pub fn open_elements(&self) -> &[Element] {
        &self.stack
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether [`end`](Self::end) has been called.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn route_text(&mut self, text: &str, events: &mut Vec<ParseEvent>) {
        if text.is_empty() {
            return;
        }
        if let Some(top) = self.stack.last_mut() {
            top.content.push_str(text);
            events.push(ParseEvent::ElementUpdate {
                id: top.id,
                kind: top.kind,
                delta: text.to_string(),
            });
        } else {
            events.push(ParseEvent::Text {
                text: text.to_string(),
            });
        }
    }

    fn open(&mut self, kind: ElementKind, attr_text: &str, events: &mut Vec<ParseEvent>) {
        let trimmed = attr_text.trim();
        let self_closing = trimmed.ends_with('/');
        let attributes = parse_attributes(trimmed.trim_end_matches('/'));
        let element = Element::new(kind, attributes);
        debug!(id = %element.id, %kind, self_closing, "element opened");

        events.push(ParseEvent::ElementStart {
            element: element.clone(),
        });
        if self_closing {
            self.complete(element, events);
        } else {
            self.stack.push(element);
        }
    }

    fn close(&mut self, kind: ElementKind, events: &mut Vec<ParseEvent>) {
        let Some(index) = self.stack.iter().rposition(|e| e.kind == kind) else {
            debug!(%kind, "closing tag without open element");
            events.push(ParseEvent::ElementError {
                element: None,
                message: format!("unexpected closing tag </{kind}>"),
            });
            return;
        };

        // Everything above the match is closed implicitly, innermost first.
        let orphans = self.stack.split_off(index.saturating_add(1));
        for child in orphans.into_iter().rev() {
            let message = format!("<{}> implicitly closed by </{kind}>", child.kind);
            Self::fail(child, message, events);
        }
        if let Some(element) = self.stack.pop() {
            self.complete(element, events);
        }
    }

    fn complete(&mut self, mut element: Element, events: &mut Vec<ParseEvent>) {
        element.content = element.content.trim().to_string();
        element.end_time = Some(Utc::now());
        debug!(id = %element.id, kind = %element.kind, "element complete");

        if element.executable {
            self.pending.push(element.clone());
            self.executables.push(element.clone());
        }
        events.push(ParseEvent::ElementComplete { element });
    }

    fn fail(mut element: Element, message: String, events: &mut Vec<ParseEvent>) {
        element.end_time = Some(Utc::now());
        debug!(id = %element.id, kind = %element.kind, %message, "element error");
        events.push(ParseEvent::ElementError {
            element: Some(element),
            message,
        });
    }
}

/// Byte offset of the first `<` in `rest` whose tail could still grow into a
/// vocabulary tag.
fn partial_tag_start(rest: &str) -> Option<usize> {
    rest.match_indices('<')
        .map(|(i, _)| i)
        .find(|&i| could_become_tag(&rest[i..]))
}

/// Whether `fragment` (starting at `<`) is an incomplete vocabulary tag.
fn could_become_tag(fragment: &str) -> bool {
    if fragment.contains('>') {
        // A complete tag would already have matched.
        return false;
    }
    let body = fragment.strip_prefix('<').unwrap_or(fragment);
    let body = body.strip_prefix('/').unwrap_or(body);
    let name_len = body
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(body.len());
    let (name, tail) = body.split_at(name_len);

    if tail.is_empty() {
        return ElementKind::ALL.iter().any(|k| {
            k.tag_name()
                .get(..name.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(name))
        });
    }
    ElementKind::from_tag_name(name).is_some()
        && tail.starts_with(|c: char| c.is_whitespace() || c == '/')
        && !tail.contains('<')
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
