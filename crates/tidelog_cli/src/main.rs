//! tidelog CLI
//!
//! Command-line tools for tidelog logs.
//!
//! # Commands
//!
//! - `run` - Build a log with the logging workload, then recover and check it
//! - `dump` - List the records of a log file
//! - `verify` - Scan a log file and report torn tails and corruption

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tidelog_core::LoggingType;
use tracing_subscriber::EnvFilter;

/// tidelog command-line tools.
#[derive(Parser)]
#[command(name = "tidelog")]
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
    /// Build a log with concurrent backends, then recover it
    Run {
        /// Logging type (1 = aries, 2 = peloton)
        #[arg(short = 'l', long, default_value = "aries")]
        logging_type: LoggingType,

        /// Tuples inserted by each backend
        #[arg(short = 't', long, default_value_t = 100)]
        tuple_count: usize,

        /// Number of backend threads
        #[arg(short = 'b', long, default_value_t = 2)]
        backend_count: usize,

        /// Varchar fields after the integer key
        #[arg(short = 'z', long, default_value_t = 10)]
        column_count: usize,

        /// Check the active tuple count after build and recovery
        #[arg(short = 'c', long)]
        check_tuple_count: bool,

        /// Replay every record, committed or not
        #[arg(short = 'r', long)]
        redo_all: bool,

        /// Directory holding the log file
        #[arg(short = 'd', long)]
        dir: Option<PathBuf>,
    },

    /// List the records of a log file
    Dump {
        /// Log file
        file: PathBuf,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Scan a log file for torn tails and corruption
    Verify {
        /// Log file
        file: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            logging_type,
            tuple_count,
            backend_count,
            column_count,
            check_tuple_count,
            redo_all,
            dir,
        } => {
            let defaults = tidelog_testkit::LoggingTestConfig::default();
            let config = tidelog_testkit::LoggingTestConfig {
                logging_type,
                tuple_count,
                backend_count,
                column_count,
                check_tuple_count,
                redo_all,
                dir: dir.unwrap_or(defaults.dir),
            };
            commands::run::run(&config)?;
        }
        Commands::Dump {
            file,
            limit,
            format,
        } => {
            commands::dump::run(&file, limit, &format)?;
        }
        Commands::Verify { file } => {
            commands::verify::run(&file)?;
        }
        Commands::Version => {
            println!("tidelog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("tidelog core v{}", tidelog_core::VERSION);
        }
    }

    Ok(())
}
