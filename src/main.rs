//! prov-index CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use prov_index::commands::{run_scan, run_serve};
use prov_index::{Cli, Commands, IndexerConfig};

fn main() -> ExitCode {
    match run() {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run() -> prov_index::Result<String> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    init_tracing(&config);

    match &cli.command {
        Commands::Scan(args) => run_scan(&config, args),
        Commands::Serve => run_serve(&config),
    }
}

/// Log to stderr; stdout carries command output. `RUST_LOG` takes
/// precedence over the configured level.
fn init_tracing(config: &IndexerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("prov_index={}", config.log_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
