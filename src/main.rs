use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use showroom::config::AppConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "showroom")]
#[command(version, about = "Dealership operations server")]
pub struct Cli {
    /// Path to showroom.toml. Defaults to ./showroom.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file. Overrides showroom.toml and SHOWROOM_DB.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on. Overrides showroom.toml and SHOWROOM_PORT.
        #[arg(short, long)]
        port: Option<u16>,

        /// Dev mode: permissive CORS, binds 0.0.0.0
        #[arg(long)]
        dev: bool,
    },
    /// Fetch S08 manifests from one branch mailbox and import them
    Sync {
        /// Branch with a [[mailboxes]] entry in showroom.toml
        #[arg(long)]
        branch: String,
    },
    /// Create the database schema
    InitDb {
        /// Seed a demo dataset: branches, users, code book, vehicles
        #[arg(long)]
        demo: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    // Held for the life of the process so buffered file logs are flushed.
    let _log_guard = init_tracing(&config);

    match &cli.command {
        Commands::Serve { port, dev } => cmd::cmd_serve(&cli, config, *port, *dev).await?,
        Commands::Sync { branch } => cmd::cmd_sync(&cli, config, branch).await?,
        Commands::InitDb { demo } => cmd::cmd_init_db(&cli, config, *demo)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => {
            let dir = std::env::current_dir().context("Failed to get current directory")?;
            AppConfig::load_or_default(&dir)
        }
    }
}

fn init_tracing(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_from_env("SHOWROOM_LOG").unwrap_or_else(|_| EnvFilter::new("showroom=info"));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match &config.logging.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "showroom.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}
