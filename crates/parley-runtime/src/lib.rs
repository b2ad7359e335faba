//! Parley Runtime - gating agent replies as they stream.
//!
//! This crate ties the tag parser to the approval layer:
//! - [`StreamGate`] parses one agent reply and checks every executable
//!   element against the permission engine, escalating `prompt` decisions
//!   without holding up the rest of the stream
//! - [`route_reply`] finds the prompt a human reply answers and delivers it
//!
//! # Example
//!
//! ```rust,no_run
//! use parley_runtime::prelude::*;
//! use parley_approval::{EscalationCoordinator, MessageInjector, PermissionEngine};
//! use parley_core::{EvalContext, Subject};
//! use std::sync::Arc;
//!
//! # async fn example(injector: Arc<dyn MessageInjector>) {
//! let engine = Arc::new(PermissionEngine::in_memory());
//! let coordinator = Arc::new(EscalationCoordinator::new(engine, injector));
//! let (mut gate, mut outcomes) = StreamGate::new(
//!     coordinator,
//!     Subject::agent("claude"),
//!     EvalContext::new().with_session("s-1"),
//! );
//!
//! gate.write("Listing files: <bash>ls -la</bash>").await;
//! gate.end().await;
//! gate.finish().await;
//! while let Ok(outcome) = outcomes.try_recv() {
//!     println!("{} -> {:?}", outcome.element.kind, outcome.verdict);
//! }
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod answer;
mod error;
mod gate;
mod shell;

pub use answer::{extract_answer, route_reply};
pub use error::{RuntimeError, RuntimeResult};
pub use gate::{GateOutcome, StreamGate, Verdict, resource_for};
pub use shell::ShellCommand;
