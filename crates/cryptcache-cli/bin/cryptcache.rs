//! cryptcache binary entry point.
//!
//! Parses arguments, initializes logging and hands off to the library.

use anyhow::Result;
use cryptcache_cli::{Cli, run};
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    // Logs go to stderr so `get` output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::from_args();
    tracing::debug!(?cli, "arguments parsed");

    let outcome = run(&cli, &mut std::io::stdout().lock())?;
    Ok(ExitCode::from(outcome.code()))
}
