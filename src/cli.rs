//! Command-line interface parsing for jsonstash
//!
//! This module handles parsing of CLI arguments using clap and turns them
//! into the settings the binary runs with.

use clap::{ArgAction, Parser};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::fetch::FetchConfig;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The timeout is not a positive number of seconds
    #[error("Invalid timeout: '{0}'. Expected a positive number of seconds")]
    InvalidTimeout(String),

    /// No --cache-dir was given and no user cache directory could be found
    #[error("No cache directory could be determined; pass --cache-dir")]
    NoCacheDir,
}

/// jsonstash - fetch remote JSON, falling back to the last good copy on disk
#[derive(Parser, Debug)]
#[command(name = "jsonstash")]
#[command(about = "Fetch remote JSON with an on-disk fallback for when the source is down")]
#[command(version)]
pub struct Cli {
    /// URLs of the JSON documents to fetch
    ///
    /// With one URL the document is printed as is; with several, a JSON
    /// array of the documents is printed in argument order.
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Directory holding cached copies (defaults to the user cache directory)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Seconds to wait for each live fetch before using the cached copy
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<String>,

    /// Pretty-print the output
    #[arg(long)]
    pub pretty: bool,

    /// Log more detail to stderr (-v for fallbacks, -vv for every request)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Settings derived from CLI arguments
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub urls: Vec<String>,
    pub cache_dir: PathBuf,
    pub fetch: FetchConfig,
    pub pretty: bool,
    /// Default log filter when RUST_LOG is not set
    pub log_filter: &'static str,
}

/// Parses a timeout argument in (possibly fractional) seconds
///
/// # Returns
/// * `Ok(Duration)` for a finite number greater than zero
/// * `Err(CliError::InvalidTimeout)` otherwise
pub fn parse_timeout_arg(s: &str) -> Result<Duration, CliError> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidTimeout(s.to_string()))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(CliError::InvalidTimeout(s.to_string()));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Returns the per-user cache directory (`~/.cache/jsonstash` on Linux)
pub fn default_cache_dir() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "jsonstash")?;
    Some(project_dirs.cache_dir().to_path_buf())
}

fn log_filter_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

impl RunConfig {
    /// Creates a RunConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(RunConfig)` with appropriate settings
    /// * `Err(CliError)` if the timeout is invalid or no cache directory is known
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut fetch = FetchConfig::default();
        if let Some(timeout) = &cli.timeout {
            fetch.timeout = parse_timeout_arg(timeout)?;
        }

        let cache_dir = match &cli.cache_dir {
            Some(dir) => dir.clone(),
            None => default_cache_dir().ok_or(CliError::NoCacheDir)?,
        };

        Ok(RunConfig {
            urls: cli.urls.clone(),
            cache_dir,
            fetch,
            pretty: cli.pretty,
            log_filter: log_filter_for(cli.verbose),
        })
    }
}
