//! segwal CLI
//!
//! Command-line tools for looking at a write-ahead log directory.
//!
//! # Commands
//!
//! - `inspect` - Display segments, sizes and LSN bounds
//! - `verify` - Verify the checksum of every page
//! - `dump` - Print records starting at an LSN
//!
//! No command takes the directory lock or writes to the directory.

mod commands;

use clap::{Parser, Subcommand};
use commands::LogOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Tools for segwal write-ahead logs.
#[derive(Parser)]
#[command(name = "segwal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Base name of the segment files
    #[arg(global = true, short, long, default_value = "wal")]
    name: String,

    /// Page size the log was written with
    #[arg(global = true, long, default_value_t = 4096)]
    page_size: usize,

    /// Encryption key, hex encoded
    #[arg(global = true, long, requires = "iv")]
    key: Option<String>,

    /// Encryption IV, hex encoded
    #[arg(global = true, long, requires = "key")]
    iv: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display segments, sizes and LSN bounds
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify the checksum of every page
    Verify,

    /// Print records starting at an LSN
    Dump {
        /// Segment of the first record (defaults to the first segment)
        #[arg(short, long)]
        segment: Option<u64>,

        /// Position of the first record within its segment
        #[arg(long, default_value_t = 22)]
        position: u64,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("segwal CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let options = LogOptions {
        path: cli.path.ok_or("Log directory path required")?,
        name: cli.name,
        page_size: cli.page_size,
        key: cli.key,
        iv: cli.iv,
    };

    match cli.command {
        Commands::Inspect { format } => commands::inspect::run(&options, &format)?,
        Commands::Verify => commands::verify::run(&options)?,
        Commands::Dump {
            segment,
            position,
            limit,
            format,
        } => commands::dump::run(&options, segment, position, limit, &format)?,
        Commands::Version => {}
    }

    Ok(())
}
