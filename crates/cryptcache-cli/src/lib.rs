//! Command-line tooling for cryptcache files.
//!
//! The `cryptcache` binary is a thin wrapper around this library:
//!
//! ```no_run
//! use cryptcache_cli::{Cli, run};
//!
//! fn main() -> anyhow::Result<()> {
//!     let cli = Cli::from_args();
//!     let outcome = run(&cli, &mut std::io::stdout().lock())?;
//!     std::process::exit(i32::from(outcome.code()));
//! }
//! ```

#![warn(missing_docs)]

pub mod commands;
pub mod config;

pub use commands::{Outcome, run};
pub use config::{Cli, Command};
