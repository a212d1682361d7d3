//! Taskboard - Main Server
//!
//! Multi-tenant task management backend with a conversational assistant.

use anyhow::Result;
use clap::{Parser, Subcommand};
use taskboard::{api, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Task Management Server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Purge trashed tasks past the retention window
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,taskboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            api::start_server(config).await
        }
        Commands::Sweep => run_sweep(config).await,
    }
}

async fn run_sweep(config: Config) -> Result<()> {
    let state = AppState::new(config).await?;
    let purged = state.store.sweep_expired(chrono::Utc::now()).await?;
    tracing::info!(purged, "trash sweep complete");
    println!("Purged {purged} expired tasks from the trash");
    Ok(())
}
