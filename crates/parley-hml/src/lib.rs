//! Parley HML - streaming parser for the hub markup language.
//!
//! Agents reply in HML: ordinary text interleaved with a fixed vocabulary of
//! tags. Some tags are display-only (`<thinking>`, `<todo>`, ...), others
//! request privileged execution (`<bash>`, `<websearch>`, `<ask>`). Replies
//! arrive token by token, so the [`TagParser`] recognizes elements across
//! arbitrary chunk boundaries and reports their lifecycle as
//! [`ParseEvent`]s while the stream is still open.
//!
//! # Example
//!
//! ```
//! use parley_hml::{ElementKind, ParseEvent, TagParser};
//!
//! let mut parser = TagParser::new();
//! let mut events = parser.write("run <bash");
//! events.extend(parser.write(">ls -la</bash>"));
//! events.extend(parser.end());
//!
//! let completed: Vec<_> = events.iter().filter_map(ParseEvent::completed).collect();
//! assert_eq!(completed.len(), 1);
//! assert_eq!(completed[0].kind, ElementKind::Bash);
//! assert_eq!(completed[0].content, "ls -la");
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod element;
pub mod event;
pub mod markup;
pub mod parser;

pub use element::{Attributes, Element, ElementId, ElementKind};
pub use event::ParseEvent;
pub use markup::{escape_attr, escape_text, parse_attributes};
pub use parser::TagParser;
