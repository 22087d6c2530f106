//! txkv CLI
//!
//! Command-line tools for exercising the txkv transactional overlay.
//!
//! # Commands
//!
//! - `scenario` - Run the reference transaction scenarios
//! - `stress` - Run a contended stress workload
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// txkv command-line tools.
#[derive(Parser)]
#[command(name = "txkv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

/// Workload run by `stress`.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StressMode {
    /// Every transaction commits
    Commit,
    /// Every transaction rolls back
    Rollback,
    /// Committing writers interleaved with gated readers
    Reads,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reference transaction scenarios
    Scenario {
        /// Timeout used by the auto-rollback scenario, in milliseconds
        #[arg(short, long, default_value = "200")]
        timeout_ms: u64,

        /// Run only scenarios whose name contains this text
        #[arg(long)]
        only: Option<String>,
    },

    /// Run a contended stress workload against an in-memory engine
    Stress {
        /// Workload to run
        #[arg(short, long, value_enum, default_value = "commit")]
        mode: StressMode,

        /// Total number of transactions
        #[arg(short, long, default_value = "10000")]
        operations: usize,

        /// Number of concurrent tasks
        #[arg(short, long, default_value = "8")]
        tasks: usize,

        /// Number of distinct keys
        #[arg(short, long, default_value = "16")]
        key_space: usize,

        /// Keys touched per transaction
        #[arg(short, long, default_value = "1")]
        batch_size: usize,

        /// Busy-poll instead of waiting for release notifications
        #[arg(long)]
        poll: bool,
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

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Commands::Scenario { timeout_ms, only } => {
            runtime.block_on(commands::scenario::run(timeout_ms, only.as_deref(), &cli.format))?;
        }
        Commands::Stress {
            mode,
            operations,
            tasks,
            key_space,
            batch_size,
            poll,
        } => {
            let config = txkv_testkit::StressConfig {
                operations,
                tasks,
                key_space,
                batch_size,
            };
            runtime.block_on(commands::stress::run(mode, &config, poll, &cli.format))?;
        }
        Commands::Version => {
            println!("txkv CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
