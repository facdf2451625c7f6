//! tenant-service-guard - Validating admission webhook for tenant Service exposure.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Creates the Kubernetes client
//! - Starts the tenant index watch, health server and webhook server

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::signal;
use tracing::{error, info, warn};

use tenant_service_guard::health::{HealthState, run_health_server};
use tenant_service_guard::tenancy::{EventNotifier, TenantIndex};
use tenant_service_guard::{Config, WebhookState, run_tenant_index, run_webhook_server};

/// Grace period for in-flight admission requests to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tenant_service_guard=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting tenant-service-guard");

    let config = Config::from_env()?;

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let pod_name = config.pod_name.clone().or_else(|| {
        warn!("POD_NAME not set, using hostname");
        hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().to_string())
    });

    // Create shared health state
    let health_state = Arc::new(HealthState::new());

    // Start health server immediately (probes should work before the index syncs)
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    // Keep the namespace -> tenant index in sync
    let index = Arc::new(TenantIndex::new());
    let index_handle = {
        let index = index.clone();
        let health_state = health_state.clone();
        let index_client = client.clone();
        tokio::spawn(async move {
            run_tenant_index(index_client, index, Some(health_state)).await;
        })
    };

    // Optionally start webhook server if certificates are available
    let webhook_handle = if Path::new(&config.webhook_cert_path).exists()
        && Path::new(&config.webhook_key_path).exists()
    {
        info!("TLS certificates found, starting webhook server");
        let state = Arc::new(WebhookState::new(
            index.clone(),
            Arc::new(EventNotifier::new(client.clone(), pod_name)),
            Some(health_state.clone()),
        ));
        let config = config.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = run_webhook_server(
                state,
                &config.webhook_cert_path,
                &config.webhook_key_path,
                config.webhook_port,
            )
            .await
            {
                error!("Webhook server error: {}", e);
            }
        }))
    } else {
        info!("Webhook certificates not found, webhook server disabled");
        None
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = index_handle => {
            if let Err(e) = result {
                error!("Tenant index task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        result = async {
            match webhook_handle {
                Some(handle) => handle.await,
                None => std::future::pending().await,
            }
        } => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready to stop receiving new admission requests
            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            info!(
                "Waiting {}s for in-flight admission requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("tenant-service-guard stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Signal handler setup failures are fatal.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
