//! Arbor CLI - Shell and tools for the Arbor embedded database

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use arbor_core::{DataFormat, Engine, Vocabulary};
use arbor_storage::{Database, FileStorage};
use commands::{completions, config as config_cmd, exec, io, run, shell};
use config::{Config, DEFAULT_DATABASE_FILE};

#[derive(Parser)]
#[command(name = "arbor")]
#[command(author, version, about = "Embedded hierarchical database with a small query language")]
pub struct Cli {
    /// Data directory
    #[arg(short, long, env = "ARBOR_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Database file (overrides the data directory)
    #[arg(long, env = "ARBOR_DATABASE", global = true)]
    pub database: Option<PathBuf>,

    /// Configuration file
    #[arg(long, env = "ARBOR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format: basic, tree, json, xml
    #[arg(short, long, env = "ARBOR_FORMAT", global = true)]
    pub format: Option<DataFormat>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress logging except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(config::config_file_path)
    }

    /// Database file: flag, then config file, then the default location
    pub fn database_path(&self, config: &Config) -> PathBuf {
        if let Some(path) = &self.database {
            return path.clone();
        }
        let data_dir = self.data_dir.clone().unwrap_or_else(|| config.data_dir());
        let file = config
            .database_file
            .as_deref()
            .unwrap_or(DEFAULT_DATABASE_FILE);
        data_dir.join(file)
    }

    pub fn format(&self, config: &Config) -> DataFormat {
        self.format
            .or_else(|| config.format.as_deref().and_then(|f| f.parse().ok()))
            .unwrap_or_default()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive statement shell (default)
    Shell(shell::ShellArgs),
    /// Execute a script file
    Run(run::RunArgs),
    /// Execute statements given as arguments
    Exec(exec::ExecArgs),
    /// Export the whole tree
    Export(io::ExportArgs),
    /// Import records into the tree
    Import(io::ImportArgs),
    /// Manage configuration
    Config(config_cmd::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context with the opened database
pub struct AppContext {
    pub database: Database<FileStorage>,
    pub config: Config,
    pub format: DataFormat,
}

impl AppContext {
    pub async fn new(cli: &Cli) -> anyhow::Result<Self> {
        let config = Config::load_from(&cli.config_path());
        let db_path = cli.database_path(&config);
        let format = cli.format(&config);
        tracing::debug!("Using database at: {:?}", db_path);

        let engine = Engine::new(Arc::new(Vocabulary::default())).with_format(format);
        let database = Database::open(engine, FileStorage::new(db_path)).await?;

        Ok(Self {
            database,
            config,
            format,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Logs go to stderr so statement output stays clean
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting arbor CLI");

    match &cli.command {
        Some(Commands::Config(args)) => return config_cmd::run(args, &cli),
        Some(Commands::Completions(args)) => return completions::run(args),
        _ => {}
    }

    let mut ctx = AppContext::new(&cli).await?;

    match &cli.command {
        None => shell::run(&shell::ShellArgs::default(), &mut ctx).await?,
        Some(Commands::Shell(args)) => shell::run(args, &mut ctx).await?,
        Some(Commands::Run(args)) => run::run(args, &mut ctx).await?,
        Some(Commands::Exec(args)) => exec::run(args, &mut ctx).await?,
        Some(Commands::Export(args)) => io::run_export(args, &ctx).await?,
        Some(Commands::Import(args)) => io::run_import(args, &mut ctx).await?,
        Some(Commands::Config(_)) | Some(Commands::Completions(_)) => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exchange_format_is_separate_from_reply_format() {
        let cli = Cli::try_parse_from(["arbor", "--format", "json", "export", "--as", "xml"]).unwrap();
        assert_eq!(cli.format, Some(DataFormat::Json));
        match cli.command {
            Some(Commands::Export(args)) => assert!(args.as_format == io::ExportFormat::Xml),
            _ => panic!("expected export"),
        }

        let cli = Cli::try_parse_from(["arbor", "import", "tree.json"]).unwrap();
        match cli.command {
            Some(Commands::Import(args)) => assert!(args.as_format.is_none()),
            _ => panic!("expected import"),
        }
    }
}
