//! picstore CLI tool

#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{PutCommand, ReconcileCommand, RmCommand, ServeCommand};
use picstore::config::PicstoreConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "picstore")]
#[command(version)]
#[command(about = "Image store with derived thumbnails", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./picstore.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve,
    /// Store a local image file
    Put {
        /// Image file to ingest
        file: PathBuf,
        /// Name to store it under (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Remove a stored image and its thumbnail
    Rm {
        /// Stored name
        name: String,
    },
    /// Repair artifacts left behind by an interrupted run
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PicstoreConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            picstore::observability::init("info")?;
            ServeCommand::new(config).execute().await?;
        }
        Commands::Put { file, name } => {
            picstore::observability::init("warn")?;
            PutCommand::new(file, name).execute(&config).await?;
        }
        Commands::Rm { name } => {
            picstore::observability::init("warn")?;
            RmCommand::new(name).execute(&config).await?;
        }
        Commands::Reconcile => {
            picstore::observability::init("warn")?;
            ReconcileCommand::execute(&config).await?;
        }
    }

    Ok(())
}
