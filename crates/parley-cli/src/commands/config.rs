//! `parley config`: inspect the resolved configuration.

use anyhow::{Result, bail};
use parley_config::{Config, LoadOptions, ShowFormat};

use crate::theme::Theme;

/// Print the resolved config with source annotations.
pub(crate) fn show_config(options: &LoadOptions, format: &str) -> Result<()> {
    let format = match format {
        "toml" => ShowFormat::Toml,
        "json" => ShowFormat::Json,
        other => bail!("unknown format '{other}'; expected toml or json"),
    };
    let resolved = Config::load(options)?;
    let text = resolved
        .show(format)
        .map_err(|_| anyhow::anyhow!("failed to render configuration"))?;
    print!("{text}");
    Ok(())
}

/// Load and validate the config, reporting the outcome.
pub(crate) fn validate_config(options: &LoadOptions) -> Result<()> {
    match Config::load(options) {
        Ok(resolved) => {
            println!("{}", Theme::success("Configuration is valid"));
            for path in &resolved.loaded_files {
                println!("  {}", Theme::dimmed(path));
            }
            println!(
                "  {}",
                Theme::kv("seed rules", &resolved.config.rules.len().to_string())
            );
            Ok(())
        },
        Err(e) => {
            println!("{}", Theme::error(&e.to_string()));
            Err(e.into())
        },
    }
}

/// Print the config locations that are consulted.
pub(crate) fn show_paths(options: &LoadOptions) {
    println!("{}", Theme::header("Config paths (in precedence order)"));
    if let Some(path) = &options.config_file {
        println!("  {} {}", path.display(), Theme::dimmed("(--config)"));
    }
    match &options.parley_home {
        Some(home) => println!("  {}", home.join("config.toml").display()),
        None => {
            println!("  ~/.parley/config.toml");
            println!("  {}", Theme::dimmed("$PARLEY_HOME/config.toml when set"));
        },
    }
    println!("  {}", Theme::dimmed("<embedded defaults>"));
    println!(
        "{}",
        Theme::info("PARLEY_* environment variables fill fields no file sets")
    );
}
