//! Vattenfall spot-price exporter.
//!
//! Single-binary Tokio application that fetches hourly electricity spot
//! prices per region and exposes them three ways:
//! 1. One-shot Prometheus text dump to stdout (default)
//! 2. Textfile-collector output via `--output-file prices.prom`
//! 3. HTTP scrape server via `--output-http host:port`, with a JSON
//!    forecast feed alongside the metrics

mod config;
mod output;
mod server;
mod version;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use prometheus::Registry;
use tracing::{error, info};

use collector::{ForecastProjector, RegionCache, SpotPriceCollector};
use vattenfall_client::VattenfallClient;

/// Vattenfall spot-price exporter
#[derive(Parser)]
#[command(
    name = "vattenfall-exporter",
    about = "Exports electricity spot prices as Prometheus metrics",
    disable_version_flag = true
)]
struct Cli {
    /// Price area to export, e.g. SN1. Repeat for multiple areas.
    #[arg(long = "region", value_name = "CODE")]
    region: Vec<String>,

    /// Write metrics to this file (must end in .prom), then exit.
    #[arg(long, value_name = "PATH")]
    output_file: Option<PathBuf>,

    /// host:port to listen on for HTTP scrapes.
    #[arg(long, value_name = "ADDR")]
    output_http: Option<String>,

    /// Print version and build info as JSON, then exit.
    #[arg(long)]
    version: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vattenfall_exporter=info,vattenfall_client=info,collector=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    if cli.version {
        println!("{}", version::version_json());
        return;
    }

    // Load configuration.
    let settings = match config::load_settings(&cli.region) {
        Ok(s) => s,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Regions: {:?}, timezone: {}",
        settings
            .regions
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>(),
        settings.tz,
    );

    // Wire the pipeline: client → cache → collector/projector.
    let client = VattenfallClient::new(&settings.config.upstream, settings.tz);
    let cache = Arc::new(RegionCache::new(
        client,
        &settings.regions,
        &settings.config.cache,
    ));

    let prices = Registry::new();
    let spot_collector =
        match SpotPriceCollector::new(cache.clone(), settings.regions.clone(), settings.tz) {
            Ok(c) => c,
            Err(e) => {
                error!("Collector setup failed: {}", e);
                std::process::exit(1);
            }
        };
    if let Err(e) = prices.register(Box::new(spot_collector)) {
        error!("Collector registration failed: {}", e);
        std::process::exit(1);
    }

    // ── Textfile mode ────────────────────────────────────────────────
    if let Some(path) = cli.output_file {
        if let Err(e) = output::write_textfile(&path, &prices) {
            error!("Textfile write failed: {}", e);
            std::process::exit(1);
        }
        info!("Wrote metrics to {}", path.display());
        return;
    }

    // ── HTTP scrape mode ─────────────────────────────────────────────
    if let Some(addr) = cli.output_http {
        let projector = Arc::new(ForecastProjector::new(
            cache,
            settings.regions.clone(),
            settings.tz,
        ));
        if let Err(e) = server::run(&addr, prices, projector).await {
            error!("Server error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // ── Default: one-shot dump to stdout ─────────────────────────────
    if let Err(e) = output::write_stdout(&prices) {
        error!("Metrics dump failed: {}", e);
        std::process::exit(1);
    }
}
