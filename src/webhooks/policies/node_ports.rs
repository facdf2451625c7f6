//! NodePort permission policy.
//!
//! Tier 1: Always enforced for tenant-owned namespaces
//!
//! Denies Services of type NodePort when the tenant disabled them through the
//! `capsule.clastix.io/enable-node-ports` annotation.

use super::{PolicyContext, ServiceType, Verdict};
use crate::webhooks::error::PolicyViolation;

/// Validate the Service type against the tenant NodePort setting
pub fn validate(ctx: &PolicyContext<'_>) -> Verdict {
    if ctx.service.service_type == ServiceType::NodePort && !ctx.tenant.node_ports_enabled {
        return Verdict::Deny(PolicyViolation::NodePortDisabled {
            namespace: ctx.service.namespace.clone(),
            name: ctx.service.name.clone(),
        });
    }

    Verdict::Allow
}
