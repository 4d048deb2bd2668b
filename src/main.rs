//! jsonstash - fetch remote JSON with an on-disk fallback
//!
//! Prints the requested documents to stdout. Logs go to stderr so the
//! output can be piped straight into other tools.

use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jsonstash::cli::{Cli, RunConfig};
use jsonstash::fetch::HttpFetcher;
use jsonstash::{RemoteJson, Source};

/// Sets up stderr logging, honouring RUST_LOG when it is set
fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Fetches every URL and renders the output document
async fn run(config: &RunConfig) -> Result<String, Box<dyn std::error::Error>> {
    // The cache itself never creates its directory; as the caller we do.
    std::fs::create_dir_all(&config.cache_dir)?;

    let remote = RemoteJson::with_fetcher(HttpFetcher::with_config(&config.fetch));

    let output = if let [url] = config.urls.as_slice() {
        let fetched = remote.read_json_with_source(url, &config.cache_dir).await?;
        if let Source::Cache { stored_at } = &fetched.source {
            match stored_at {
                Some(at) => info!(url = %url, stored_at = %at, "used cached copy"),
                None => info!(url = %url, "used cached copy"),
            }
        }
        fetched.value
    } else {
        let results = remote
            .read_json_all(config.urls.as_slice(), &config.cache_dir)
            .await;
        let values = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        Value::Array(values)
    };

    let rendered = if config.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    Ok(rendered)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match RunConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(config.log_filter);

    match run(&config).await {
        Ok(rendered) => {
            println!("{}", rendered);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
