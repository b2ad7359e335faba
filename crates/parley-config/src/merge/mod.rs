//! Deep merge of TOML values.
//!
//! The merge operates on raw [`toml::Value`] trees rather than deserialized
//! structs, so a key absent from an overlay never resets the base value.

mod deep;
mod types;

pub use deep::{deep_merge, deep_merge_tracking, record_all_leaves};
pub use types::{ConfigLayer, FieldSources};
