use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use floodgate_config::Config;
use floodgate_server::services::MemoryStore;

use crate::setup;

#[derive(Debug, Parser)]
#[command(name = "floodgate", version, about = "Ingestion front door of the metrics store")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the ingestion server. This is the default when no command is given.
    Run,
    /// Print the effective configuration and exit.
    Config,
}

pub fn execute() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config),
        Commands::Config => show_config(&config),
    }
}

fn run(config: Config) -> anyhow::Result<()> {
    floodgate_log::init(config.logging());
    setup::dump_spawn_infos(&config);
    setup::init_metrics(&config)?;

    // The production storage engine lives outside this repository and is linked
    // through the `MetricsStore` trait at this composition root. Without one,
    // ingested metrics are held in memory.
    let store = Arc::new(MemoryStore::default());

    floodgate_server::run(Arc::new(config), store)?;
    Ok(())
}

fn show_config(config: &Config) -> anyhow::Result<()> {
    let yaml = config.to_yaml_string()?;
    std::io::stdout().write_all(yaml.as_bytes())?;
    Ok(())
}
