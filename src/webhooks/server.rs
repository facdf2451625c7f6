//! Admission webhook server.
//!
//! Provides the HTTPS endpoint the API server calls for Service admission.
//!
//! To enable webhooks:
//! 1. Deploy cert-manager for TLS certificates
//! 2. Apply the ValidatingWebhookConfiguration printed by `manifests`
//! 3. Mount the TLS certificate secret to the pod at /etc/webhook/certs/
//!
//! The webhook server starts automatically when certificates are present.

use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use tracing::{debug, error, info, warn};

use crate::health::HealthState;
use crate::tenancy::{Notifier, TenantResolver};
use crate::webhooks::decision::{Decision, review_service};
use crate::webhooks::error::WebhookError;
use crate::webhooks::registration::WEBHOOK_PATH;

/// Shared state for webhook handlers
pub struct WebhookState {
    pub resolver: Arc<dyn TenantResolver>,
    pub notifier: Arc<dyn Notifier>,
    pub health_state: Option<Arc<HealthState>>,
}

impl WebhookState {
    pub fn new(
        resolver: Arc<dyn TenantResolver>,
        notifier: Arc<dyn Notifier>,
        health_state: Option<Arc<HealthState>>,
    ) -> Self {
        Self {
            resolver,
            notifier,
            health_state,
        }
    }
}

fn operation_label(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(validate_service))
        .with_state(state)
}

/// Service admission webhook handler
async fn validate_service(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    let started = Instant::now();

    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    let uid = &request.uid;
    debug!(
        uid = %uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing admission request"
    );

    let decision = review_service(&*state.resolver, &*state.notifier, &request);

    if let Some(health) = &state.health_state {
        health.metrics.record_admission(
            operation_label(&request.operation),
            decision.label(),
            started.elapsed().as_secs_f64(),
        );
        if let Decision::Denied(violation) = &decision {
            health.metrics.record_violation(violation.reason());
        }
    }

    match &decision {
        Decision::Allowed => info!(uid = %uid, "Admission request allowed"),
        Decision::Denied(violation) => {
            warn!(uid = %uid, reason = violation.reason(), message = %violation, "Admission request denied")
        }
        Decision::Errored { reason, message } => {
            warn!(uid = %uid, reason = %reason, message = %message, "Admission request rejected")
        }
    }

    (
        StatusCode::OK,
        Json(decision.into_response(&request).into_review()),
    )
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0:`port` and serves the Service admission endpoint.
/// TLS certificates are loaded from the paths specified.
///
/// # Arguments
/// * `state` - Tenant resolver, notifier and metrics
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
/// * `port` - Listening port
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    cert_path: &str,
    key_path: &str,
    port: u16,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port = port, path = WEBHOOK_PATH, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
