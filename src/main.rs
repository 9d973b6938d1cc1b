//! SOC Console - Main Server
//!
//! SecMaster incident sync with LightRAG graph intelligence.

use anyhow::Result;
use clap::{Parser, Subcommand};
use soc_console::{AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "soc-console")]
#[command(about = "SOC Console Backend Server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the console server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Run one incident graph sync sweep and exit
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,soc_console=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Serve { port } => {
            config.server_port = port;
            soc_console::start_server(config).await
        }
        Commands::Sync => run_sync(config).await,
    }
}

async fn run_sync(config: Config) -> Result<()> {
    let state = AppState::new(config).await?;
    tracing::info!("Running one incident graph sync sweep");
    state.scheduler.run().await;
    tracing::info!("Sweep complete");
    Ok(())
}
