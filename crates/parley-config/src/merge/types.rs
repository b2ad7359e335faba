use std::collections::HashMap;
use std::fmt;

/// Which configuration layer a value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Compiled-in defaults (`defaults.toml`).
    Defaults,
    /// User-level configuration (`~/.parley/config.toml`).
    User,
    /// A file passed explicitly on the command line.
    File,
    /// Environment variable fallback.
    Environment,
}

impl ConfigLayer {
    /// Short tag used in `config show` annotations.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Defaults => "defaults",
            Self::User => "user",
            Self::File => "file",
            Self::Environment => "env",
        }
    }
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::User => write!(f, "user (~/.parley/config.toml)"),
            Self::File => write!(f, "explicit config file"),
            Self::Environment => write!(f, "environment variable"),
        }
    }
}

/// Tracks which layer set each field's value, keyed by dotted path.
pub type FieldSources = HashMap<String, ConfigLayer>;
