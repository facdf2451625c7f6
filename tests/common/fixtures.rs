//! Test fixtures and builder patterns for Tenants, Services and admission
//! reviews.

// Each test target uses a different subset of the fixtures
#![allow(dead_code, clippy::panic)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionReview};
use tenant_service_guard::crd::{
    ENABLE_NODE_PORTS_ANNOTATION, ExternalServiceIpsSpec, OwnerSpec, Tenant, TenantSpec,
    TenantStatus,
};
use tenant_service_guard::tenancy::{Notification, Notifier};

/// Builder for creating Tenant test fixtures.
///
/// # Example
/// ```
/// let tenant = TenantBuilder::new("oil")
///     .namespace("oil-dev")
///     .node_ports(false)
///     .allow("10.0.0.0/24")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct TenantBuilder {
    name: String,
    owner: String,
    namespaces: Vec<String>,
    annotations: BTreeMap<String, String>,
    allowed: Option<Vec<String>>,
}

impl TenantBuilder {
    /// Create a new builder with the given tenant name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: "alice".to_string(),
            namespaces: Vec::new(),
            annotations: BTreeMap::new(),
            allowed: None,
        }
    }

    /// Add an owned namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.push(namespace.into());
        self
    }

    /// Set the NodePort annotation to `"true"` or `"false"`.
    pub fn node_ports(self, enabled: bool) -> Self {
        self.annotation(ENABLE_NODE_PORTS_ANNOTATION, enabled.to_string())
    }

    /// Add an annotation to the tenant.
    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Add an allow-list entry, turning the restriction on.
    pub fn allow(mut self, entry: impl Into<String>) -> Self {
        self.allowed.get_or_insert_with(Vec::new).push(entry.into());
        self
    }

    /// Configure an empty allow-list, which admits no external IP.
    pub fn allow_none(mut self) -> Self {
        self.allowed = Some(Vec::new());
        self
    }

    /// Build the Tenant.
    pub fn build(self) -> Tenant {
        let size = u32::try_from(self.namespaces.len()).unwrap_or(u32::MAX);
        Tenant {
            metadata: ObjectMeta {
                name: Some(self.name),
                annotations: if self.annotations.is_empty() {
                    None
                } else {
                    Some(self.annotations)
                },
                ..Default::default()
            },
            spec: TenantSpec {
                owner: OwnerSpec {
                    name: self.owner,
                    ..Default::default()
                },
                external_service_ips: self
                    .allowed
                    .map(|allowed| ExternalServiceIpsSpec { allowed }),
            },
            status: Some(TenantStatus {
                namespaces: self.namespaces,
                size,
            }),
        }
    }
}

/// Builder for creating Service test fixtures.
#[derive(Clone, Debug)]
pub struct ServiceBuilder {
    name: String,
    namespace: String,
    type_: Option<String>,
    external_ips: Option<Vec<String>>,
}

impl ServiceBuilder {
    /// Create a new builder for a Service in `namespace`.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            type_: None,
            external_ips: None,
        }
    }

    /// Set `spec.type`.
    pub fn type_(mut self, type_: impl Into<String>) -> Self {
        self.type_ = Some(type_.into());
        self
    }

    /// Add an entry to `spec.externalIPs`.
    pub fn external_ip(mut self, ip: impl Into<String>) -> Self {
        self.external_ips.get_or_insert_with(Vec::new).push(ip.into());
        self
    }

    /// Build the Service.
    pub fn build(self) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(self.namespace),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: self.type_,
                external_ips: self.external_ips,
                ..Default::default()
            }),
            status: None,
        }
    }
}

/// Wrap `object` into an AdmissionReview request for a Service.
pub fn service_review(operation: &str, object: serde_json::Value) -> serde_json::Value {
    let name = object["metadata"]["name"].clone();
    let namespace = object["metadata"]["namespace"].clone();
    serde_json::json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "c9a5b3f2-4a1e-4c3b-9e8f-1d2c3b4a5f60",
            "kind": { "group": "", "version": "v1", "kind": "Service" },
            "resource": { "group": "", "version": "v1", "resource": "services" },
            "name": name,
            "namespace": namespace,
            "operation": operation,
            "userInfo": { "username": "alice" },
            "object": object,
            "dryRun": false
        }
    })
}

/// Build a decoded admission request for `service`.
pub fn service_request(operation: &str, service: &Service) -> AdmissionRequest<DynamicObject> {
    let object = serde_json::to_value(service).unwrap_or_default();
    let review: AdmissionReview<DynamicObject> =
        serde_json::from_value(service_review(operation, object))
            .unwrap_or_else(|e| panic!("invalid admission review fixture: {}", e));
    review
        .try_into()
        .unwrap_or_else(|e| panic!("admission review without request: {}", e))
}

/// Notifier recording every notification it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Notification)>>,
}

impl RecordingNotifier {
    /// Notifications received so far, with the tenant name.
    pub fn sent(&self) -> Vec<(String, Notification)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, tenant: &Tenant, notification: Notification) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((tenant.name_any(), notification));
        }
    }
}
