//! Parley Core - identity and context types shared across the Parley hub.
//!
//! This crate provides:
//! - [`Subject`]: who is attempting an action (user, agent or plugin)
//! - [`Resource`]: what is being acted upon (command, tool or ability)
//! - [`EvalContext`]: the session/owner scope an action happens in, plus
//!   arbitrary [`ConditionValue`] attributes that rules can constrain
//!
//! # Example
//!
//! ```
//! use parley_core::{EvalContext, Resource, Subject, SubjectKind};
//!
//! let subject: Subject = "agent:researcher".parse().unwrap();
//! assert_eq!(subject.kind, SubjectKind::Agent);
//!
//! let resource = Resource::command("ls");
//! let ctx = EvalContext::new().with_session("s-1").with_owner("alice");
//! assert_eq!(ctx.session_id.as_deref(), Some("s-1"));
//! assert_eq!(resource.to_string(), "command:ls");
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod context;
pub mod error;
pub mod identity;

pub use context::{ConditionValue, EvalContext};
pub use error::{IdentityParseError, IdentityResult};
pub use identity::{Resource, ResourceKind, Subject, SubjectKind};
