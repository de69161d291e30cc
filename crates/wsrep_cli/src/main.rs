//! wsrep CLI
//!
//! Stress and diagnostics tool for the replication send monitor and the
//! transaction registry.
//!
//! # Commands
//!
//! - `stress-monitor` - Hammer a send monitor from several threads
//! - `stress-registry` - Hammer a transaction registry from several threads

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wsrep_core::MonitorConfig;

/// wsrep send monitor and registry tools.
#[derive(Parser)]
#[command(name = "wsrep")]
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
    /// Run concurrent schedule/enter/leave cycles against a send monitor
    StressMonitor {
        /// Number of worker threads
        #[arg(short, long, default_value = "4")]
        threads: usize,

        /// Total operations across all threads
        #[arg(short, long, default_value = "10000")]
        operations: usize,

        /// Wait queue length (power of two)
        #[arg(short, long, default_value = "1024")]
        queue_len: usize,

        /// Holders admitted at once
        #[arg(short, long, default_value = "1")]
        concurrency: usize,

        /// Interrupt every n-th waiting ticket (0 disables)
        #[arg(short, long, default_value = "8")]
        interrupt_every: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run concurrent acquire/release cycles against a transaction registry
    StressRegistry {
        /// Number of worker threads
        #[arg(short, long, default_value = "4")]
        threads: usize,

        /// Total operations across all threads
        #[arg(short, long, default_value = "10000")]
        operations: usize,

        /// Number of distinct transaction IDs
        #[arg(short = 'k', long, default_value = "16")]
        trx_keys: usize,

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
        Commands::StressMonitor {
            threads,
            operations,
            queue_len,
            concurrency,
            interrupt_every,
            format,
        } => {
            let monitor = MonitorConfig::new()
                .queue_len(queue_len)
                .concurrency(concurrency);
            commands::monitor::run(&monitor, threads, operations, interrupt_every, &format)?;
        }
        Commands::StressRegistry {
            threads,
            operations,
            trx_keys,
            format,
        } => {
            commands::registry::run(threads, operations, trx_keys, &format)?;
        }
        Commands::Version => {
            println!("wsrep CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("wsrep Core v{}", wsrep_core::VERSION);
        }
    }

    Ok(())
}
