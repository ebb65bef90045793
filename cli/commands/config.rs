use crate::cli_args::ConfigArgs;
use anyhow::{Context, Result, bail};
use colored::*;
use log;
use projcat_core::Config;
use projcat_core::config::{DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILENAME};
use std::fs;

pub fn handle_config_command(args: &ConfigArgs, quiet: bool) -> Result<()> {
    let content = Config::default()
        .to_toml()
        .context("Failed to serialize default configuration")?;

    if !args.save {
        crate::output::write_to_stdout(&content)?;
        return Ok(());
    }

    let project_root = Config::determine_project_root(args.project_root.as_ref())
        .context("Failed to determine project root for config command")?;
    let config_dir = project_root.join(DEFAULT_CONFIG_DIR);
    let config_path = config_dir.join(DEFAULT_CONFIG_FILENAME);
    if config_path.exists() {
        bail!(
            "Config file already exists at {}; remove it first to regenerate.",
            config_path.display()
        );
    }
    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create directory {}", config_dir.display()))?;
    fs::write(&config_path, content)
        .with_context(|| format!("Failed to write config file {}", config_path.display()))?;
    log::info!("Default config written to {}", config_path.display());
    if !quiet {
        println!(
            "{} Default config saved to: {}",
            "✓".green(),
            config_path.display().to_string().blue()
        );
    }
    Ok(())
}
