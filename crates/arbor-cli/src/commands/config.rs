//! Config command for managing CLI configuration

use std::path::Path;

use clap::{Args, Subcommand};

use crate::config::Config;
use crate::Cli;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Get a config value
    Get {
        /// Config key name
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key name
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
    /// Initialize default config file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

pub fn run(args: &ConfigArgs, cli: &Cli) -> anyhow::Result<()> {
    let path = cli.config_path();
    match &args.command {
        ConfigCommands::Get { key } => run_get(&path, key),
        ConfigCommands::Set { key, value } => run_set(&path, key, value),
        ConfigCommands::List => run_list(&path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Init { force } => run_init(&path, *force),
    }
}

fn run_get(path: &Path, key: &str) -> anyhow::Result<()> {
    if !Config::keys().contains(&key) {
        anyhow::bail!(
            "Unknown config key: {}. Available keys: {}",
            key,
            Config::keys().join(", ")
        );
    }
    let config = Config::load_from(path);
    println!("{}", config.get(key).unwrap_or_else(|| "(not set)".to_string()));
    Ok(())
}

fn run_set(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let mut config = Config::load_from(path);
    config.set(key, value)?;
    config.save_to(path)?;
    println!("Set {} = {}", key, value);
    Ok(())
}

fn run_list(path: &Path) -> anyhow::Result<()> {
    let config = Config::load_from(path);
    println!("Config file: {}", path.display());
    println!();
    for key in Config::keys() {
        let value = config.get(key).unwrap_or_else(|| "(not set)".to_string());
        println!("{} = {}", key, value);
    }
    Ok(())
}

fn run_init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    Config::initial().save_to(path)?;
    println!("Created config file at {}", path.display());
    Ok(())
}
