//! Exposure policies for Service admission.
//!
//! Policies are organized into tiers and run in order; the first denial wins:
//! - Tier 1: NodePort permission
//! - Tier 2: External IP allow-list

pub mod cidr;
pub mod external_ips;
pub mod node_ports;

use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;

use crate::crd::TenantPolicy;
use crate::webhooks::error::PolicyViolation;

/// Service exposure type, as declared in `spec.type`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ServiceType {
    #[default]
    ClusterIp,
    NodePort,
    LoadBalancer,
    ExternalName,
    Other(String),
}

impl ServiceType {
    /// Parse `spec.type`; an absent type defaults to ClusterIP.
    pub fn from_spec(value: Option<&str>) -> Self {
        match value {
            None | Some("ClusterIP") => ServiceType::ClusterIp,
            Some("NodePort") => ServiceType::NodePort,
            Some("LoadBalancer") => ServiceType::LoadBalancer,
            Some("ExternalName") => ServiceType::ExternalName,
            Some(other) => ServiceType::Other(other.to_string()),
        }
    }
}

/// The parts of a Service the policies look at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub namespace: String,
    pub name: String,
    pub service_type: ServiceType,
    /// Declared `spec.externalIPs`, in order. Absent is empty.
    pub external_ips: Vec<String>,
}

impl From<&Service> for ServiceDescriptor {
    fn from(service: &Service) -> Self {
        let spec = service.spec.as_ref();
        Self {
            namespace: service.namespace().unwrap_or_default(),
            name: service.name_any(),
            service_type: ServiceType::from_spec(spec.and_then(|s| s.type_.as_deref())),
            external_ips: spec
                .and_then(|s| s.external_ips.clone())
                .unwrap_or_default(),
        }
    }
}

/// Outcome of evaluating a Service against its tenant policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(PolicyViolation),
}

impl Verdict {
    /// Whether the request may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// Context for policy evaluation
pub struct PolicyContext<'a> {
    /// The Service being admitted
    pub service: &'a ServiceDescriptor,
    /// Policy of the owning tenant
    pub tenant: &'a TenantPolicy,
}

/// Evaluate a Service against the policy of its owning tenant.
///
/// Services in namespaces that no tenant owns are always allowed.
pub fn evaluate(service: &ServiceDescriptor, tenant: Option<&TenantPolicy>) -> Verdict {
    let Some(tenant) = tenant else {
        return Verdict::Allow;
    };

    let ctx = PolicyContext { service, tenant };

    // Tier 1: NodePort permission
    let verdict = node_ports::validate(&ctx);
    if !verdict.is_allowed() {
        return verdict;
    }

    // Tier 2: External IP allow-list
    external_ips::validate(&ctx)
}
