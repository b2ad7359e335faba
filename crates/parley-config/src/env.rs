//! Environment variable fallbacks.
//!
//! Environment variables are a fallback, not an override: they only fill
//! fields that no config file set. A value that came from the embedded
//! defaults still counts as unset.

use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources};

/// Prefix shared by every variable Parley reads.
pub const ENV_PREFIX: &str = "PARLEY_";

/// Variable naming an alternate user config directory.
pub const HOME_VAR: &str = "PARLEY_HOME";

#[derive(Clone, Copy)]
enum FieldType {
    String,
    Integer,
}

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: FieldType,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "PARLEY_LOG_LEVEL",
        field_path: "logging.level",
        kind: FieldType::String,
    },
    EnvMapping {
        var_name: "PARLEY_LOG_FORMAT",
        field_path: "logging.format",
        kind: FieldType::String,
    },
    EnvMapping {
        var_name: "PARLEY_ESCALATION_TIMEOUT_SECS",
        field_path: "escalation.timeout_secs",
        kind: FieldType::Integer,
    },
    EnvMapping {
        var_name: "PARLEY_PROMPT_PREFIX",
        field_path: "escalation.prompt_prefix",
        kind: FieldType::String,
    },
];

/// Snapshot the process environment, keeping only `PARLEY_*` variables.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect()
}

/// Apply environment fallbacks to fields no config file set.
///
/// Returns the number of variables applied.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a numeric variable does not parse.
pub fn apply_env_fallbacks<S: BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let set_by_file = sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            continue;
        }
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };

        let value = coerce(mapping, raw)?;
        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        set_field(merged, mapping.field_path, value);
        sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    Ok(count)
}

fn coerce(mapping: &EnvMapping, raw: &str) -> ConfigResult<toml::Value> {
    match mapping.kind {
        FieldType::String => Ok(toml::Value::String(raw.to_owned())),
        FieldType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(toml::Value::Integer)
            .map_err(|e| ConfigError::EnvError {
                var_name: mapping.var_name.to_owned(),
                message: format!("expected an integer: {e}"),
            }),
    }
}

/// Set a dotted field, creating intermediate tables as needed.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut current = root;
    for segment in segments {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment)
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }

    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), value);
    }
}
