//! Layered configuration for the Parley hub.
//!
//! A single [`Config`] covers escalation timing, logging, and the seed rules
//! loaded into the permission engine at startup.
//!
//! # Usage
//!
//! ```rust,no_run
//! use parley_config::{Config, LoadOptions};
//!
//! let resolved = Config::load(&LoadOptions::from_env()).unwrap();
//! println!("prompts time out after {}s", resolved.config.escalation.timeout_secs);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Explicit file** (`--config path.toml`)
//! 2. **User** (`~/.parley/config.toml`, or `$PARLEY_HOME/config.toml`)
//! 3. **Environment variables** (`PARLEY_*`), fallback only
//! 4. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! # Design
//!
//! This crate has no dependencies on other internal parley crates. Rule
//! seeds keep their kinds and actions as strings; the CLI converts them to
//! domain rules at startup.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging.
pub mod merge;
/// Resolved configuration display.
pub mod show;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::LoadOptions;
pub use show::{ResolvedConfig, ShowFormat};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(options: &LoadOptions) -> ConfigResult<ResolvedConfig> {
        loader::load(options)
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Escalation timeout as a [`Duration`](std::time::Duration).
    #[must_use]
    pub fn escalation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.escalation.timeout_secs)
    }
}
