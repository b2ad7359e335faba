//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge the user config (`~/.parley/config.toml`, or `$PARLEY_HOME/config.toml`)
//! 3. Merge an explicitly named config file, if any
//! 4. Apply env var fallbacks for fields no file set
//! 5. Deserialize the merged tree → `Config`
//! 6. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{HOME_VAR, apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_all_leaves};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Inputs to [`load`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory holding the user `config.toml`, replacing `~/.parley`
    /// and `PARLEY_HOME`.
    pub parley_home: Option<PathBuf>,
    /// File merged over the user config. Must exist.
    pub config_file: Option<PathBuf>,
    /// Environment used for `PARLEY_*` lookups.
    pub env: HashMap<String, String>,
}

impl LoadOptions {
    /// Options reading `PARLEY_*` variables from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            env: collect_env_vars(),
            ..Self::default()
        }
    }

    /// Use `dir` as the user config directory.
    #[must_use]
    pub fn with_home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.parley_home = Some(dir.into());
        self
    }

    /// Merge `path` over the user config.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Add one environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Load the configuration with layered file precedence.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is unreadable or malformed,
/// an environment fallback has the wrong type, or the merged configuration
/// fails validation.
pub fn load(options: &LoadOptions) -> ConfigResult<ResolvedConfig> {
    // 1. Embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_all_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    // 2. User config.
    let path = user_config_path(options)?;
    if let Some(overlay) = try_load_file(&path)? {
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::User,
            &mut field_sources,
        );
        info!(path = %path.display(), "loaded user config");
        loaded_files.push(path.display().to_string());
    }

    // 3. Explicit file.
    if let Some(path) = &options.config_file {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::File,
            &mut field_sources,
        );
        info!(path = %path.display(), "loaded config file");
        loaded_files.push(path.display().to_string());
    }

    // 4. Env var fallbacks.
    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, &options.env)?;
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    // 5. Deserialize.
    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // 6. Validate.
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a single file (no layering).
///
/// Sections the file omits take their [`Default`] values.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;

    let config: Config = overlay
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Resolve where the user config lives, without touching the file.
fn user_config_path(options: &LoadOptions) -> ConfigResult<PathBuf> {
    if let Some(home) = &options.parley_home {
        return Ok(home.join("config.toml"));
    }

    if let Some(raw) = options.env.get(HOME_VAR) {
        let dir = PathBuf::from(raw);
        if dir.is_dir() {
            return Ok(dir.join("config.toml"));
        }
        tracing::warn!(path = %raw, "PARLEY_HOME is not a directory; ignoring");
    }

    let home = directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".parley").join("config.toml"))
}

/// Try to load a file, returning `None` if it doesn't exist.
///
/// Reads once, then checks the size, so there is no window between a
/// metadata check and the read.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    let len = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if len > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {len} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_with_empty_home() {
        let home = tempfile::tempdir().unwrap();
        let resolved = load(&LoadOptions::default().with_home(home.path())).unwrap();

        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.field_sources.get("escalation.timeout_secs"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_user_then_file_precedence() {
        let home = tempfile::tempdir().unwrap();
        write(
            home.path(),
            "config.toml",
            r#"
            [escalation]
            timeout_secs = 60
            prompt_prefix = "ask_"
            "#,
        );
        let explicit = write(
            home.path(),
            "override.toml",
            r"
            [escalation]
            timeout_secs = 10
            ",
        );

        let resolved = load(
            &LoadOptions::default()
                .with_home(home.path())
                .with_file(&explicit),
        )
        .unwrap();

        assert_eq!(resolved.config.escalation.timeout_secs, 10);
        assert_eq!(resolved.config.escalation.prompt_prefix, "ask_");
        assert_eq!(resolved.loaded_files.len(), 2);
        assert_eq!(
            resolved.field_sources.get("escalation.timeout_secs"),
            Some(&ConfigLayer::File)
        );
        assert_eq!(
            resolved.field_sources.get("escalation.prompt_prefix"),
            Some(&ConfigLayer::User)
        );
    }

    #[test]
    fn test_env_fills_only_unset_fields() {
        let home = tempfile::tempdir().unwrap();
        write(
            home.path(),
            "config.toml",
            "[logging]\nlevel = \"warn\"\n",
        );

        let resolved = load(
            &LoadOptions::default()
                .with_home(home.path())
                .with_env("PARLEY_LOG_LEVEL", "trace")
                .with_env("PARLEY_ESCALATION_TIMEOUT_SECS", "90"),
        )
        .unwrap();

        assert_eq!(resolved.config.logging.level, "warn");
        assert_eq!(resolved.config.escalation.timeout_secs, 90);
        assert_eq!(
            resolved.field_sources.get("escalation.timeout_secs"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_parley_home_env() {
        let home = tempfile::tempdir().unwrap();
        write(
            home.path(),
            "config.toml",
            "[escalation]\nprompt_prefix = \"hub_\"\n",
        );

        let options =
            LoadOptions::default().with_env(HOME_VAR, home.path().display().to_string());
        let resolved = load(&options).unwrap();
        assert_eq!(resolved.config.escalation.prompt_prefix, "hub_");
    }

    #[test]
    fn test_seed_rules_load() {
        let home = tempfile::tempdir().unwrap();
        write(
            home.path(),
            "config.toml",
            r#"
            [[rules]]
            action = "allow"
            subject_kind = "agent"
            subject_id = "claude"
            resource_kind = "command"
            resource_name = "ls"

            [[rules]]
            action = "deny"
            resource_kind = "command"
            resource_name = "rm"
            priority = 10
            conditions = { tier = 2 }
            "#,
        );

        let resolved = load(&LoadOptions::default().with_home(home.path())).unwrap();
        let rules = &resolved.config.rules;
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].scope, "permanent");
        assert_eq!(rules[0].subject_id.as_deref(), Some("claude"));
        assert_eq!(rules[1].priority, 10);
        assert_eq!(
            rules[1].conditions.get("tier"),
            Some(&toml::Value::Integer(2))
        );
    }

    #[test]
    fn test_invalid_merged_config_rejected() {
        let home = tempfile::tempdir().unwrap();
        write(home.path(), "config.toml", "[logging]\nformat = \"xml\"\n");

        let result = load(&LoadOptions::default().with_home(home.path()));
        assert!(matches!(
            result,
            Err(ConfigError::ValidationError { ref field, .. }) if field == "logging.format"
        ));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let home = tempfile::tempdir().unwrap();
        write(home.path(), "config.toml", "[escalation\n");

        let result = load(&LoadOptions::default().with_home(home.path()));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let home = tempfile::tempdir().unwrap();
        let options = LoadOptions::default()
            .with_home(home.path())
            .with_file(home.path().join("missing.toml"));

        assert!(matches!(
            load(&options),
            Err(ConfigError::ReadError { .. })
        ));
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_load_file_single() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "parley.toml", "[escalation]\ntimeout_secs = 5\n");

        let config = load_file(&path).unwrap();
        assert_eq!(config.escalation.timeout_secs, 5);
        assert_eq!(config.escalation.prompt_prefix, "perm_");
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        let path = write(dir.path(), "huge.toml", &data);

        let result = try_load_file(&path);
        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "expected ValidationError for oversized config, got: {result:?}"
        );
    }
}
