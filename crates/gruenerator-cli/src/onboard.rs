//! `gruenerator onboard` — write the default configuration.
//!
//! - Creates `~/.gruenerator/config.json` with defaults (never overwrites)
//! - Lists the environment variables that supply provider keys

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use gruenerator_core::config::{get_config_path, save_config, Config};
use gruenerator_core::types::ProviderName;

/// Run the onboard command.
pub fn run(config_path: Option<PathBuf>) -> Result<()> {
    println!();
    println!("{}", "🌻 Gruenerator — Setup".green().bold());
    println!();

    let config_path = config_path.unwrap_or_else(get_config_path);
    if write_default_config(&config_path)? {
        println!("  {} created config at {}", "✓".green(), config_path.display());
    } else {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            config_path.display()
        );
    }

    println!();
    println!("  {}", "Provider keys are read from the config or from:".bold());
    for provider in ProviderName::ALL {
        println!(
            "    {:<10} {} / {}",
            provider.as_str(),
            provider.env_key(),
            provider.base_url_env().dimmed()
        );
    }

    println!();
    println!(
        "{}",
        "  Setup complete! Run `gruenerator status` to check providers.".green()
    );
    println!();

    Ok(())
}

/// Write a default config unless one exists. Returns whether a file was written.
fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_config(&Config::default(), Some(path))
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    Ok(true)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
