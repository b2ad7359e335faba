//! Prelude module - commonly used types for convenient import.
//!
//! Use `use parley_core::prelude::*;` to import all essential types.

pub use crate::{
    ConditionValue, EvalContext, IdentityParseError, IdentityResult, Resource, ResourceKind,
    Subject, SubjectKind,
};
