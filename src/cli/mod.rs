pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pmkt")]
#[command(about = "Prompt market admin CLI - migrations, fixtures and health checks")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Load fixture data from a YAML file")]
    Seed {
        #[arg(long, default_value = "fixtures/seed.yaml", help = "Fixture file path")]
        file: PathBuf,
    },

    #[command(about = "Ping a running API server")]
    Health {
        #[arg(long, default_value = "http://127.0.0.1:8000", help = "Server base URL")]
        url: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Migrate => commands::migrate::handle().await,
        Commands::Seed { file } => commands::seed::handle(&file).await,
        Commands::Health { url } => commands::health::handle(&url).await,
    }
}
