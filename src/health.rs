//! Health server for Kubernetes probes and Prometheus metrics
//!
//! Provides HTTP endpoints for:
//! - `/healthz` - Liveness probe (is the process alive?)
//! - `/readyz` - Readiness probe (is the webhook accepting requests?)
//! - `/metrics` - Prometheus metrics
//!
//! Metrics are write-only from the admission path; no decision reads them.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::{JoinError, JoinHandle};

/// Outcome of an admission request, as reported in metrics
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum DecisionOutcome {
    Allowed,
    Denied,
    /// The request could not be evaluated (bad request or namespace list failure)
    Error,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionOutcome::Allowed => "allowed",
            DecisionOutcome::Denied => "denied",
            DecisionOutcome::Error => "error",
        }
    }
}

/// Labels for decision metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct DecisionLabels {
    pub outcome: DecisionOutcome,
}

impl prometheus_client::encoding::EncodeLabelSet for DecisionLabels {
    fn encode(
        &self,
        encoder: &mut prometheus_client::encoding::LabelSetEncoder<'_>,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("outcome", self.outcome.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics state
pub struct Metrics {
    /// Admission decisions by outcome
    pub decisions_total: Family<DecisionLabels, Counter>,
    /// Time spent evaluating a request, including the namespace list
    pub decision_duration_seconds: Histogram,

    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let decisions_total = Family::<DecisionLabels, Counter>::default();
        registry.register(
            "namespace_limiter_decisions",
            "Total number of admission decisions",
            decisions_total.clone(),
        );

        let decision_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 15));
        registry.register(
            "namespace_limiter_decision_duration_seconds",
            "Duration of admission decisions in seconds",
            decision_duration_seconds.clone(),
        );

        Self {
            decisions_total,
            decision_duration_seconds,
            registry,
        }
    }

    /// Record one admission decision
    pub fn record_decision(&self, outcome: DecisionOutcome, duration_secs: f64) {
        self.decisions_total
            .get_or_create(&DecisionLabels { outcome })
            .inc();
        self.decision_duration_seconds.observe(duration_secs);
    }

    /// Encode metrics to Prometheus text format
    ///
    /// Returns an empty string if encoding fails.
    fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = encode(&mut buffer, &self.registry) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the webhook listener is bound and serving
    pub ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the webhook as ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the webhook is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 503 Service Unavailable until the webhook listener is up.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Run the health server on plain HTTP
pub async fn run_health_server(state: Arc<HealthState>, addr: SocketAddr) -> io::Result<()> {
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Health server listening on {}", addr);

    axum::serve(listener, app).await
}

/// Run the health server on a background task
///
/// The handle only completes when the server stops.
pub fn spawn_health_server(
    state: Arc<HealthState>,
    addr: SocketAddr,
) -> JoinHandle<io::Result<()>> {
    tokio::spawn(run_health_server(state, addr))
}

/// Turn a finished health server task into the error that stopped it
///
/// The server never stops on its own, so a clean exit is still an error.
pub fn health_server_exit(result: Result<io::Result<()>, JoinError>) -> io::Error {
    match result {
        Ok(Err(e)) => e,
        Ok(Ok(())) => io::Error::other("health server stopped unexpectedly"),
        Err(e) => io::Error::other(format!("health server task failed: {}", e)),
    }
}
