//! Command-line configuration.
//!
//! Global options can also come from the environment:
//! - `CRYPTCACHE_PATH`: cache file location
//! - `CRYPTCACHE_CONFIG`: JSON configuration file
//!
//! When both a JSON file and `--cache` are given, `--cache` wins.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cryptcache_storage::CacheConfig;
use std::path::PathBuf;

/// Inspect and maintain a cryptcache file.
#[derive(Debug, Clone, Parser)]
#[command(name = "cryptcache", about = "Inspect and maintain cryptcache files", version)]
pub struct Cli {
    /// Cache file path
    #[arg(long, global = true, env = "CRYPTCACHE_PATH")]
    pub cache: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true, env = "CRYPTCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List live entry names
    List {
        /// Only names starting with this prefix
        #[arg(default_value = "")]
        prefix: String,

        /// Print a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Print or save an entry
    Get {
        /// Entry name
        name: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Decode the entry as a framed zlib stream
        #[arg(long)]
        uncompress: bool,

        /// Initial output buffer multiplier for --uncompress
        #[arg(long)]
        multiplier: Option<u32>,
    },

    /// Store a file as an entry
    Put {
        /// Entry name
        name: String,

        /// File to store
        file: PathBuf,

        /// Compress and frame the contents before storing
        #[arg(long)]
        compress: bool,
    },

    /// Remove an entry
    Erase {
        /// Entry name
        name: String,
    },

    /// Check whether an entry exists (exit code 1 when absent)
    Exists {
        /// Entry name
        name: String,
    },

    /// Show slot usage totals
    Stats {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show every non-empty slot
    Slots,

    /// Compress a file into a framed stream
    Compress {
        /// Input file
        input: PathBuf,
        /// Output file
        output: PathBuf,
    },

    /// Decode a framed or plain zlib stream
    Uncompress {
        /// Input file
        input: PathBuf,
        /// Output file
        output: PathBuf,

        /// Initial output buffer multiplier
        #[arg(long)]
        multiplier: Option<u32>,
    },
}

impl Cli {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Resolve the cache configuration from the JSON file and `--cache`.
    pub fn cache_config(&self) -> Result<CacheConfig> {
        let mut config = match &self.config {
            Some(path) => CacheConfig::from_json_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => CacheConfig::default(),
        };

        if let Some(path) = &self.cache {
            config = config.with_path(path);
        }

        config.validate()?;
        Ok(config)
    }
}
