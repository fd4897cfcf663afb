//! smbseal binary entry point.
//!
//! Parses the command line, initializes logging and prints the result of
//! one engine operation.

mod cli;

use anyhow::Result;
use clap::Parser;

use crate::cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, "running");

    for line in cli.run()? {
        println!("{line}");
    }
    Ok(())
}
