//! Prelude module - commonly used types for convenient import.
//!
//! Use `use parley_runtime::prelude::*;` to import all essential types.

// Errors
pub use crate::{RuntimeError, RuntimeResult};

// Gating
pub use crate::{GateOutcome, ShellCommand, StreamGate, Verdict, resource_for};

// Replies
pub use crate::{extract_answer, route_reply};
