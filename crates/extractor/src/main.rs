//! certex - Main entry point
//!
//! Watches a Traefik ACME storage file and keeps per-domain PEM files in sync
//! with it.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};

use certex_config::ExtractorConfig;
use certex_extractor::{wait_for_shutdown, CertIndex, Extractor, Watcher};

/// certex - Traefik ACME certificate extractor
#[derive(Parser, Debug)]
#[command(name = "certex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extract once, print the certificates and exit
    #[arg(long = "check")]
    check: bool,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose")]
    verbose: bool,

    /// Log output format
    #[arg(long = "log-format", env = "CERTEX_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let config = load_config()?;

    if cli.check {
        return check(&config);
    }

    run_watcher(config)
}

fn init_logging(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

/// Load and validate configuration from the environment
fn load_config() -> Result<ExtractorConfig> {
    let config = ExtractorConfig::from_env().context("Failed to load configuration from environment")?;

    let warnings = config
        .validate()
        .into_result()
        .context("Configuration validation failed")?;
    for warning in warnings {
        warn!("{}", warning.message);
    }

    Ok(config)
}

/// Run a single extraction and print the resulting certificates
fn check(config: &ExtractorConfig) -> Result<()> {
    let extractor = Extractor::new(config);
    let snapshot = extractor.run().with_context(|| {
        format!(
            "Failed to extract certificates from {}",
            config.acme_file().display()
        )
    })?;

    let index = CertIndex::new();
    index.replace(snapshot);

    info!(certificates = index.len(), "Certificate extraction completed");

    for cert in index.list() {
        println!(
            "{}\t{}\t{}",
            cert.name,
            cert.not_before_string(),
            cert.not_after_string()
        );
    }

    Ok(())
}

/// Watch the ACME file until a shutdown signal arrives
fn run_watcher(config: ExtractorConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    runtime.block_on(async move {
        let index = CertIndex::new();
        let watcher = Watcher::new(&config, index);

        tokio::select! {
            result = watcher.run() => {
                if let Err(ref e) = result {
                    error!(error = %e, "Certificate watcher stopped");
                }
                result.context("Certificate watcher failed")
            }
            signal = wait_for_shutdown() => {
                info!(signal = ?signal, "Shutdown signal received, stopping");
                Ok(())
            }
        }
    })
}
