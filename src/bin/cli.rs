//! CaskKV CLI
//!
//! Command-line interface for inspecting and editing a CaskKV directory.

use std::path::{Path, PathBuf};
use std::process;

use caskkv::segment::SegmentRecovery;
use caskkv::{Config, Engine};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// CaskKV CLI
#[derive(Parser, Debug)]
#[command(name = "caskkv-cli")]
#[command(about = "CLI for the CaskKV embedded key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./caskkv_data")]
    dir: PathBuf,

    /// fsync after every put/delete
    #[arg(long)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List live keys
    List,

    /// Compact the directory (must be the only writer)
    Merge,

    /// Scan segments and report recovery statistics
    Verify,

    /// Show segment and key counts
    Stats,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caskkv=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> caskkv::Result<()> {
    match args.command {
        Commands::Get { key } => {
            let engine = open_engine(&args.dir, false, false)?;
            match engine.get(key.as_bytes())? {
                Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                None => println!("(not found)"),
            }
            engine.close()
        }
        Commands::Put { key, value } => {
            let engine = open_engine(&args.dir, true, args.sync)?;
            engine.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
            engine.close()
        }
        Commands::Del { key } => {
            let engine = open_engine(&args.dir, true, args.sync)?;
            engine.delete(key.as_bytes())?;
            println!("OK");
            engine.close()
        }
        Commands::List => {
            let engine = open_engine(&args.dir, false, false)?;
            for key in engine.list_keys() {
                println!("{}", String::from_utf8_lossy(&key));
            }
            engine.close()
        }
        Commands::Merge => {
            let stats = caskkv::merge(&args.dir)?;
            println!(
                "merged {} keys into segment {}: {} -> {} bytes ({} segments removed)",
                stats.live_keys,
                stats.merge_segment_id,
                stats.bytes_before,
                stats.bytes_after,
                stats.segments_removed
            );
            Ok(())
        }
        Commands::Verify => {
            let result = SegmentRecovery::verify(&args.dir)?;
            println!("segments:   {}", result.segments_scanned);
            println!("records:    {}", result.records_recovered);
            println!("tombstones: {}", result.tombstones);
            println!("bytes:      {}", result.bytes_scanned);
            println!("truncated:  {:?}", result.truncated_segments);
            Ok(())
        }
        Commands::Stats => {
            let engine = open_engine(&args.dir, false, false)?;
            println!("segments: {}", engine.segment_count()?);
            println!("keys:     {}", engine.key_count());
            println!("bytes:    {}", engine.disk_usage()?);
            engine.close()
        }
    }
}

/// Open a handle; queries pass `read_write = false` so they never create a segment
fn open_engine(dir: &Path, read_write: bool, sync_on_put: bool) -> caskkv::Result<Engine> {
    let config = Config::builder()
        .data_dir(dir)
        .read_write(read_write)
        .sync_on_put(sync_on_put)
        .build();
    Engine::open(config)
}
