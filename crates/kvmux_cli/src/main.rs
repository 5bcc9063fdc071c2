//! kvmux CLI
//!
//! Command-line tools for kvmux.
//!
//! # Commands
//!
//! - `stress` - Drive the multiplexer against an in-memory cluster
//! - `validate` - Parse a space description and print its canonical form
//! - `codes` - List status, datatype and predicate codes

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// kvmux command-line tools.
#[derive(Parser)]
#[command(name = "kvmux")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the multiplexer against an in-memory cluster
    Stress {
        /// Number of operations per run
        #[arg(short, long, default_value = "10000")]
        operations: usize,

        /// Number of submitting threads for the concurrent run
        #[arg(short, long, default_value = "4")]
        threads: usize,

        /// Number of connections in the client pool
        #[arg(short, long, default_value = "2")]
        workers: usize,

        /// Number of distinct keys
        #[arg(short, long, default_value = "1000")]
        keys: usize,

        /// Operations in flight for the pipelined run
        #[arg(short, long, default_value = "64")]
        depth: usize,

        /// Interleave completions pseudo-randomly with this seed
        #[arg(long)]
        shuffle: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Parse a space description and print its canonical form
    Validate {
        /// File holding the description (stdin if omitted)
        file: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List status, datatype and predicate codes
    Codes {
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
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Stress {
            operations,
            threads,
            workers,
            keys,
            depth,
            shuffle,
            format,
        } => {
            let options = commands::stress::StressOptions {
                operations,
                threads,
                workers,
                keys,
                depth,
                shuffle,
            };
            commands::stress::run(&options, &format)?;
        }
        Commands::Validate { file, format } => {
            commands::validate::run(file.as_deref(), &format)?;
        }
        Commands::Codes { format } => {
            commands::codes::run(&format)?;
        }
        Commands::Version => {
            println!("kvmux CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("kvmux Core v{}", kvmux_core::VERSION);
        }
    }

    Ok(())
}
