//! HTTP scrape server: `/metrics`, `/prices`, and the `/forecast` feed.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{IntCounterVec, Opts, Registry};
use tracing::{error, info};

use collector::ForecastProjector;
use common::{Error, Result};
use vattenfall_client::{PriceSource, VattenfallClient};

use crate::output::encode_registry;

const REQUESTS_METRIC: &str = "vattenfall_exporter_requests_total";
const REQUESTS_HELP: &str = "HTTP requests served, by handler.";

/// Shared state for the scrape handlers.
///
/// `prices` holds the spot-price collector; `process` holds the exporter's
/// own runtime metrics and the per-handler request counters.
struct AppState<S> {
    prices: Registry,
    process: Registry,
    requests: IntCounterVec,
    projector: Arc<ForecastProjector<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            prices: self.prices.clone(),
            process: self.process.clone(),
            requests: self.requests.clone(),
            projector: self.projector.clone(),
        }
    }
}

/// Serve scrapes on `addr` until SIGINT/SIGTERM, then drain in-flight
/// requests and return.
pub async fn run(
    addr: &str,
    prices: Registry,
    projector: Arc<ForecastProjector<VattenfallClient>>,
) -> Result<()> {
    let router = build_router(prices, projector)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Exporter listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Exporter shutdown completed");
    Ok(())
}

fn build_router<S: PriceSource + 'static>(
    prices: Registry,
    projector: Arc<ForecastProjector<S>>,
) -> Result<Router> {
    let process = Registry::new();
    let requests = IntCounterVec::new(Opts::new(REQUESTS_METRIC, REQUESTS_HELP), &["handler"])
        .map_err(|e| Error::Metrics(e.to_string()))?;
    process
        .register(Box::new(requests.clone()))
        .map_err(|e| Error::Metrics(e.to_string()))?;
    #[cfg(target_os = "linux")]
    process
        .register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))
        .map_err(|e| Error::Metrics(e.to_string()))?;

    let state = AppState {
        prices,
        process,
        requests,
        projector,
    };

    Ok(Router::new()
        .route("/metrics", get(metrics::<S>))
        .route("/prices", get(spot_prices::<S>))
        .route("/forecast", get(forecast::<S>))
        .with_state(state))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}

/// GET /metrics — exporter process and handler metrics.
async fn metrics<S: PriceSource>(State(state): State<AppState<S>>) -> Response {
    exposition(&state.process)
}

/// GET /prices — spot-price gauges for the current hour.
async fn spot_prices<S: PriceSource>(State(state): State<AppState<S>>) -> Response {
    state.requests.with_label_values(&["prices"]).inc();
    exposition(&state.prices)
}

/// GET /forecast — future price points per region as JSON.
async fn forecast<S: PriceSource>(State(state): State<AppState<S>>) -> Response {
    state.requests.with_label_values(&["forecast"]).inc();
    Json(state.projector.forecast().await).into_response()
}

fn exposition(registry: &Registry) -> Response {
    match encode_registry(registry) {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Metrics encoding failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}
