use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use storage::{open_db, BlockQueue, HashStore, SledBlockQueue, SledHashStore, StoreError};
use sync::SyncConfig;
use tracing::info;

/// Inspect or reset a persisted block sync queue.
///
/// The stores are opened without an import worker, so nothing is consumed.
#[derive(Parser, Debug)]
struct Args {
    /// Directory holding the sled database.
    #[arg(short, long)]
    data_dir: PathBuf,

    /// YAML file with sync settings.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print queue sizes and the current sync target.
    Status,
    /// List hashes at the front of the frontier without removing them.
    Hashes {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Remove every queued hash and block.
    Clear,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SyncConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SyncConfig::default(),
    };

    let db = open_db(&args.data_dir)
        .with_context(|| format!("failed to open database at {}", args.data_dir.display()))?;
    let hashes = SledHashStore::open(&db)?;
    let blocks = SledBlockQueue::open(&db, config.max_blocks_queued)?;

    match args.command {
        Command::Status => {
            println!("hash queue size:  {}", hashes.len());
            println!("block queue size: {}/{}", blocks.len(), blocks.capacity());

            match hashes.peek() {
                Ok(hash) => println!("best hash:        {hash}"),
                Err(StoreError::EmptyFrontier) => println!("best hash:        none"),
                Err(err) => return Err(err.into()),
            }

            if let Some(block) = blocks.peek_back()? {
                println!("last block:       #{} {}", block.number, block.hash);
            }
        }
        Command::Hashes { count } => {
            for hash in hashes.front(count)? {
                println!("{hash}");
            }
        }
        Command::Clear => {
            let (hash_count, block_count) = (hashes.len(), blocks.len());
            hashes.clear()?;
            blocks.clear()?;
            info!(hash_count, block_count, "Cleared sync queue");
        }
    }

    hashes.close()?;
    blocks.close()?;
    Ok(())
}
