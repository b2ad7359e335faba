//! Source-annotated display for `config show`.
//!
//! Prints the resolved configuration with a comment after each value naming
//! the layer (defaults, user, file, environment) that set it.

use std::fmt::{self, Write as _};

use crate::merge::FieldSources;
use crate::types::Config;

/// A resolved configuration together with source annotations.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final merged configuration.
    pub config: Config,
    /// Dotted field path → which layer set the value.
    pub field_sources: FieldSources,
    /// Config file paths that were loaded, in precedence order.
    pub loaded_files: Vec<String>,
}

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    /// TOML with inline comments showing source.
    Toml,
    /// JSON (for programmatic consumption).
    Json,
}

impl ResolvedConfig {
    /// Render the resolved config.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn show(&self, format: ShowFormat) -> Result<String, fmt::Error> {
        match format {
            ShowFormat::Toml => self.show_toml(),
            ShowFormat::Json => serde_json::to_string_pretty(&self.config).map_err(|_| fmt::Error),
        }
    }

    fn show_toml(&self) -> Result<String, fmt::Error> {
        let body = toml::to_string_pretty(&self.config).map_err(|_| fmt::Error)?;

        let mut output = String::new();
        output.push_str("# Resolved Parley configuration\n");
        output.push_str("# Source annotations: [defaults] [user] [file] [env]\n");
        if !self.loaded_files.is_empty() {
            output.push_str("#\n# Loaded files (in precedence order):\n");
            for (i, path) in self.loaded_files.iter().enumerate() {
                writeln!(output, "#   {}. {path}", i.saturating_add(1))?;
            }
        }
        output.push('\n');

        let mut section = String::new();
        for line in body.lines() {
            let trimmed = line.trim();
            if let Some(name) = trimmed
                .strip_prefix("[[")
                .and_then(|rest| rest.strip_suffix("]]"))
            {
                section = name.to_owned();
                match self.field_sources.get(name) {
                    Some(layer) => writeln!(output, "{line}  # [{}]", layer.tag())?,
                    None => writeln!(output, "{line}")?,
                }
                continue;
            }
            if let Some(name) = trimmed
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
            {
                section = name.to_owned();
                writeln!(output, "{line}")?;
                continue;
            }

            match self.annotation(&section, trimmed) {
                Some(tag) => writeln!(output, "{line}  # [{tag}]")?,
                None => writeln!(output, "{line}")?,
            }
        }

        Ok(output)
    }

    fn annotation(&self, section: &str, line: &str) -> Option<&'static str> {
        let (key, _) = line.split_once('=')?;
        let key = key.trim();
        let path = if section.is_empty() {
            key.to_owned()
        } else {
            format!("{section}.{key}")
        };
        self.field_sources.get(&path).map(|layer| layer.tag())
    }
}
