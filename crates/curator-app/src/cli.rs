//! CLI argument definitions for the curator binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Curator: rank a pool of news items by importance and drop near-duplicates.
#[derive(Parser, Debug)]
#[command(name = "curator", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score, deduplicate, and select the top items from a JSON file.
    Rank(RankArgs),
    /// Write a configuration file populated with defaults.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RankArgs {
    /// JSON file holding an array of items (or `{"items": [...]}`).
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Where to write the ranked digest; stdout when omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Number of items to keep.
    #[arg(short = 'n', long = "top-n")]
    pub top_n: Option<usize>,

    /// Skip near-duplicate removal.
    #[arg(long = "no-dedup")]
    pub no_dedup: bool,

    /// JSON file with a trend context (`{"summary": ..., "topics": [...]}`).
    #[arg(long = "trends")]
    pub trends: Option<PathBuf>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CURATOR_CONFIG env var > ~/.curator/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CURATOR_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".curator").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".curator").join("config.toml");
    }
    PathBuf::from("config.toml")
}
