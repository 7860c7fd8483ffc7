//! # resumable CLI
//!
//! Inspect, feed and finalize chunked uploads held in the configured stores.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use resumable_storage::{chunk_store_from_config, persistent_store_from_config};
use resumable_transfer::{FinalizeCoordinator, UploadConfig};

mod commands;

/// Chunked upload reassembly tool
#[derive(Parser)]
#[command(name = "resumable")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, env = "RESUMABLE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stored chunks of an upload
    Status {
        /// Client filename (resumableFilename)
        #[arg(long)]
        filename: String,

        /// Declared total size in bytes (resumableTotalSize)
        #[arg(long)]
        total_size: u64,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Split a local file into chunks and feed them through the upload pipeline
    Push {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Chunk size in bytes
        #[arg(long, default_value_t = commands::DEFAULT_PUSH_CHUNK_SIZE)]
        chunk_size: u64,

        /// Filename to upload as (defaults to the file's name)
        #[arg(long)]
        name: Option<String>,

        /// Send chunks in random order
        #[arg(long)]
        shuffle: bool,
    },

    /// Merge a complete upload into the persistent store
    Finalize {
        #[arg(long)]
        filename: String,

        #[arg(long)]
        total_size: u64,

        /// Target path in the persistent store (defaults to the upload destination)
        #[arg(long)]
        to: Option<String>,
    },

    /// Print the effective configuration
    Config {
        /// Write it to the configuration file
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,resumable=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(commands::default_config_path);
    let config = UploadConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    if let Commands::Config { write } = cli.command {
        return commands::show_config(&config, &config_path, write);
    }

    let chunks = chunk_store_from_config(&config.chunk_storage)
        .await
        .context("failed to open chunk storage")?;
    let persistent = persistent_store_from_config(&config.persistent_storage)
        .await
        .context("failed to open persistent storage")?;
    let coordinator = FinalizeCoordinator::new(chunks, persistent, &config);

    match cli.command {
        Commands::Status {
            filename,
            total_size,
            json,
        } => commands::status(&coordinator, &filename, total_size, json).await,
        Commands::Push {
            file,
            chunk_size,
            name,
            shuffle,
        } => {
            let outcome =
                commands::push(&coordinator, &file, chunk_size, name.as_deref(), shuffle).await?;
            commands::print_push_outcome(outcome.as_ref());
            Ok(())
        }
        Commands::Finalize {
            filename,
            total_size,
            to,
        } => commands::finalize(&coordinator, &filename, total_size, to.as_deref()).await,
        Commands::Config { .. } => Ok(()),
    }
}
