//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 once the tenant index is synced)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

/// Labels for admission request metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct AdmissionLabels {
    pub operation: String,
    pub verdict: String,
}

impl EncodeLabelSet for AdmissionLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("operation", self.operation.as_str()).encode(encoder.encode_label())?;
        ("verdict", self.verdict.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for policy violation metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ViolationLabels {
    pub reason: String,
}

impl EncodeLabelSet for ViolationLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("reason", self.reason.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the webhook
pub struct Metrics {
    /// Admission requests by operation and decision
    pub admission_requests_total: Family<AdmissionLabels, Counter>,
    /// Policy violations by reason
    pub policy_violations_total: Family<ViolationLabels, Counter>,
    /// Admission handling duration
    pub admission_duration_seconds: Histogram,
    /// Tenants currently held in the index
    pub tenants_indexed: Gauge,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admission_requests_total = Family::<AdmissionLabels, Counter>::default();
        registry.register(
            "tenantguard_admission_requests",
            "Total number of Service admission requests",
            admission_requests_total.clone(),
        );

        let policy_violations_total = Family::<ViolationLabels, Counter>::default();
        registry.register(
            "tenantguard_policy_violations",
            "Total number of tenant exposure policy violations",
            policy_violations_total.clone(),
        );

        let admission_duration_seconds = Histogram::new(exponential_buckets(0.0001, 2.0, 15));
        registry.register(
            "tenantguard_admission_duration_seconds",
            "Duration of admission handling in seconds",
            admission_duration_seconds.clone(),
        );

        let tenants_indexed = Gauge::default();
        registry.register(
            "tenantguard_tenants_indexed",
            "Number of tenants held in the namespace index",
            tenants_indexed.clone(),
        );

        Self {
            admission_requests_total,
            policy_violations_total,
            admission_duration_seconds,
            tenants_indexed,
            registry,
        }
    }

    /// Record one handled admission request
    pub fn record_admission(&self, operation: &str, verdict: &str, duration_secs: f64) {
        let labels = AdmissionLabels {
            operation: operation.to_string(),
            verdict: verdict.to_string(),
        };
        self.admission_requests_total.get_or_create(&labels).inc();
        self.admission_duration_seconds.observe(duration_secs);
    }

    /// Record a policy violation
    pub fn record_violation(&self, reason: &str) {
        let labels = ViolationLabels {
            reason: reason.to_string(),
        };
        self.policy_violations_total.get_or_create(&labels).inc();
    }

    /// Update the indexed tenant count
    pub fn set_tenants_indexed(&self, count: i64) {
        self.tenants_indexed.set(count);
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the webhook can serve decisions (tenant index synced)
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the webhook as ready or not ready
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
/// Returns 503 Service Unavailable until the tenant index is synced, so the
/// API server is not routed to a replica that would reject every request.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
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
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server on `port`
pub async fn run_health_server(state: Arc<HealthState>, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port = port, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
