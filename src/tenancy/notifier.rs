//! Policy violation notifications.
//!
//! Violations are recorded as Kubernetes warning Events on the Tenant.
//! Publishing runs on a spawned task and its outcome never reaches the
//! admission response.

use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, warn};

use crate::crd::Tenant;
use crate::webhooks::error::PolicyViolation;

/// Field manager and event reporter name
pub const REPORTER_NAME: &str = "tenant-service-guard";

/// Action recorded on admission events
const ADMISSION_ACTION: &str = "Admit";

/// Severity of a notification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Warning,
}

/// A notification attributed to a tenant
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub reason: String,
    pub note: String,
}

impl From<&PolicyViolation> for Notification {
    fn from(violation: &PolicyViolation) -> Self {
        Self {
            severity: Severity::Warning,
            reason: violation.reason().to_string(),
            note: violation.event_note(),
        }
    }
}

/// Sink for notifications about a tenant.
///
/// Implementations must not block the caller; failures are theirs to log.
pub trait Notifier: Send + Sync {
    fn notify(&self, tenant: &Tenant, notification: Notification);
}

/// Publishes notifications as Kubernetes Events
#[derive(Clone)]
pub struct EventNotifier {
    client: Client,
    reporter: Reporter,
}

impl EventNotifier {
    /// Create a notifier reporting as `instance` (usually the pod name)
    pub fn new(client: Client, instance: Option<String>) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: REPORTER_NAME.into(),
                instance,
            },
        }
    }

    /// Create an event recorder for publishing Kubernetes events
    fn recorder(&self) -> Recorder {
        Recorder::new(self.client.clone(), self.reporter.clone())
    }
}

impl Notifier for EventNotifier {
    fn notify(&self, tenant: &Tenant, notification: Notification) {
        let recorder = self.recorder();
        let object_ref: ObjectReference = tenant.object_ref(&());
        let tenant_name = tenant.name_any();

        tokio::spawn(async move {
            let type_ = match notification.severity {
                Severity::Normal => EventType::Normal,
                Severity::Warning => EventType::Warning,
            };
            let reason = notification.reason.clone();
            let event = Event {
                type_,
                reason: notification.reason,
                note: Some(notification.note),
                action: ADMISSION_ACTION.into(),
                secondary: None,
            };

            match recorder.publish(&event, &object_ref).await {
                Ok(()) => debug!(tenant = %tenant_name, reason = %reason, "Published event"),
                Err(e) => {
                    warn!(tenant = %tenant_name, reason = %reason, error = %e, "Failed to publish event")
                }
            }
        });
    }
}
