//! External IP allow-list policy.
//!
//! Tier 2: Enforced when the Service declares external IPs and the tenant
//! configured an allow-list
//!
//! Every declared address must fall inside one of the allowed blocks. An
//! address that does not parse is never contained.

use std::net::IpAddr;

use super::{PolicyContext, Verdict, cidr};
use crate::webhooks::error::PolicyViolation;

/// Validate declared external IPs against the tenant allow-list
pub fn validate(ctx: &PolicyContext<'_>) -> Verdict {
    let Some(allowed) = ctx.tenant.allowed_external_ips.as_deref() else {
        return Verdict::Allow;
    };

    let offending = ctx.service.external_ips.iter().find(|external_ip| {
        !external_ip
            .parse::<IpAddr>()
            .is_ok_and(|ip| cidr::contains(ip, allowed))
    });

    match offending {
        Some(ip) => Verdict::Deny(PolicyViolation::ExternalServiceIpForbidden {
            namespace: ctx.service.namespace.clone(),
            name: ctx.service.name.clone(),
            allowed: allowed.to_vec(),
            ip: ip.clone(),
        }),
        None => Verdict::Allow,
    }
}
