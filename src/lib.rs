//! tenant-service-guard library crate
//!
//! This module exports the Tenant CRD, the Service exposure policies, the
//! admission webhook and the tenant index that feeds it.

pub mod config;
pub mod crd;
pub mod health;
pub mod tenancy;
pub mod webhooks;

pub use config::{Config, ConfigError};
pub use health::HealthState;
pub use webhooks::{WebhookError, WebhookState, run_webhook_server};

use std::pin::pin;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client};
use tracing::{error, info, warn};

use crd::Tenant;
use tenancy::TenantIndex;

/// Create the default watcher configuration.
///
/// - `any_semantic()`: lists and relists may be served from the API server
///   watch cache instead of etcd; the index only needs Tenants to converge
fn default_watcher_config() -> WatcherConfig {
    WatcherConfig::default().any_semantic()
}

/// Keep `index` in sync with the Tenants in the cluster.
///
/// Watches Tenant objects cluster-wide with automatic backoff and applies
/// every event to the index. The webhook is marked ready once the index
/// completes its first sync. Readiness is only raised on that transition.
pub async fn run_tenant_index(
    client: Client,
    index: Arc<TenantIndex>,
    health_state: Option<Arc<HealthState>>,
) {
    info!("Starting tenant index watch");

    let tenants: Api<Tenant> = Api::all(client);
    let mut events = pin!(watcher(tenants, default_watcher_config()).default_backoff());

    while let Some(event) = events.next().await {
        match event {
            Ok(event) => apply_tenant_event(&index, health_state.as_deref(), event).await,
            Err(e) => {
                warn!(error = %e, "Tenant watch error, retrying");
            }
        }
    }

    // This should never complete in normal operation
    error!("Tenant watch stream ended unexpectedly");
}

/// Apply one watch event to the index and publish the resulting state.
async fn apply_tenant_event(
    index: &TenantIndex,
    health_state: Option<&HealthState>,
    event: watcher::Event<Tenant>,
) {
    let was_synced = index.is_synced();
    index.handle_event(event);
    let became_synced = !was_synced && index.is_synced();

    if became_synced {
        info!(tenants = index.len(), "Tenant index synced");
    }
    if let Some(state) = health_state {
        if became_synced {
            state.set_ready(true).await;
        }
        state
            .metrics
            .set_tenants_indexed(i64::try_from(index.len()).unwrap_or(i64::MAX));
    }
}
