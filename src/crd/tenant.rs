//! Tenant Custom Resource Definition.
//!
//! A Tenant groups a set of namespaces under one owner and one
//! network-exposure policy. Tenants are cluster-scoped; the namespaces they
//! own are tracked in `status.namespaces`.

use kube::CustomResource;
use kube::ResourceExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Annotation toggling NodePort services for a tenant.
///
/// Only the exact value `"false"` disables NodePorts; anything else, or no
/// annotation at all, leaves them enabled.
pub const ENABLE_NODE_PORTS_ANNOTATION: &str = "capsule.clastix.io/enable-node-ports";

/// Tenant is a cluster-scoped resource owning a set of namespaces.
///
/// Example:
/// ```yaml
/// apiVersion: capsule.clastix.io/v1alpha1
/// kind: Tenant
/// metadata:
///   name: oil
///   annotations:
///     capsule.clastix.io/enable-node-ports: "false"
/// spec:
///   owner:
///     name: alice
///     kind: User
///   externalServiceIPs:
///     allowed:
///       - 10.20.0.0/16
///       - 192.168.1.1
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "capsule.clastix.io",
    version = "v1alpha1",
    kind = "Tenant",
    plural = "tenants",
    shortname = "tnt",
    status = "TenantStatus",
    printcolumn = r#"{"name":"Namespace count", "type":"integer", "jsonPath":".status.size"}"#,
    printcolumn = r#"{"name":"Owner name", "type":"string", "jsonPath":".spec.owner.name"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TenantSpec {
    /// Owner of the tenant.
    pub owner: OwnerSpec,

    /// External IPs that Services of this tenant may advertise.
    /// When absent, any external IP is accepted.
    #[serde(
        rename = "externalServiceIPs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub external_service_ips: Option<ExternalServiceIpsSpec>,
}

/// Identity owning a tenant.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSpec {
    /// User or group name.
    pub name: String,

    /// Kind of owner.
    #[serde(default)]
    pub kind: OwnerKind,
}

/// Kind of tenant owner.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum OwnerKind {
    #[default]
    User,
    Group,
}

/// Allow-list of external Service IPs.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalServiceIpsSpec {
    /// CIDR blocks (`10.0.0.0/24`) or single addresses (`10.0.0.5`).
    #[serde(default)]
    pub allowed: Vec<String>,
}

/// Observed state of a tenant.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TenantStatus {
    /// Namespaces owned by this tenant.
    #[serde(default)]
    pub namespaces: Vec<String>,

    /// Number of owned namespaces.
    #[serde(default)]
    pub size: u32,
}

/// Exposure policy of a tenant, as consumed by the admission policies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantPolicy {
    /// Whether Services of type NodePort are permitted.
    pub node_ports_enabled: bool,
    /// Allowed external IPs; `None` means unrestricted.
    pub allowed_external_ips: Option<Vec<String>>,
}

impl Default for TenantPolicy {
    fn default() -> Self {
        Self {
            node_ports_enabled: true,
            allowed_external_ips: None,
        }
    }
}

impl Tenant {
    /// Derive the exposure policy from annotations and spec.
    pub fn policy(&self) -> TenantPolicy {
        let node_ports_enabled = self
            .annotations()
            .get(ENABLE_NODE_PORTS_ANNOTATION)
            .is_none_or(|value| value != "false");

        TenantPolicy {
            node_ports_enabled,
            allowed_external_ips: self
                .spec
                .external_service_ips
                .as_ref()
                .map(|ips| ips.allowed.clone()),
        }
    }

    /// Namespaces currently owned by this tenant.
    pub fn namespaces(&self) -> &[String] {
        self.status
            .as_ref()
            .map(|status| status.namespaces.as_slice())
            .unwrap_or_default()
    }
}
