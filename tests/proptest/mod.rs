// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for tenant-service-guard.
//!
//! Uses proptest to generate random addresses, allow-lists and Services and
//! verify the policy invariants.

use std::net::{IpAddr, Ipv4Addr};

use proptest::prelude::*;

use tenant_service_guard::crd::TenantPolicy;
use tenant_service_guard::webhooks::policies::cidr::contains;
use tenant_service_guard::webhooks::{
    PolicyViolation, ServiceDescriptor, ServiceType, Verdict, evaluate,
};

/// Strategy for generating IPv4 addresses.
fn any_ipv4() -> impl Strategy<Value = Ipv4Addr> {
    any::<u32>().prop_map(Ipv4Addr::from)
}

/// Strategy for generating allow-list entries: blocks, bare hosts, dotted
/// netmasks and junk.
fn any_entry() -> impl Strategy<Value = String> {
    prop_oneof![
        (any_ipv4(), 0u8..=32).prop_map(|(ip, prefix)| format!("{}/{}", ip, prefix)),
        (any_ipv4(), 0u32..=32).prop_map(|(ip, prefix)| {
            let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
            format!("{}/{}", ip, Ipv4Addr::from(mask))
        }),
        any_ipv4().prop_map(|ip| ip.to_string()),
        "[a-z-]{1,12}",
    ]
}

/// Strategy for generating service types.
fn any_service_type() -> impl Strategy<Value = ServiceType> {
    prop_oneof![
        Just(ServiceType::ClusterIp),
        Just(ServiceType::NodePort),
        Just(ServiceType::LoadBalancer),
        Just(ServiceType::ExternalName),
    ]
}

fn any_service() -> impl Strategy<Value = ServiceDescriptor> {
    (
        any_service_type(),
        prop::collection::vec(any_ipv4().prop_map(|ip| ip.to_string()), 0..4),
    )
        .prop_map(|(service_type, external_ips)| ServiceDescriptor {
            namespace: "oil-dev".to_string(),
            name: "web".to_string(),
            service_type,
            external_ips,
        })
}

fn any_policy() -> impl Strategy<Value = TenantPolicy> {
    (
        any::<bool>(),
        prop::option::of(prop::collection::vec(any_entry(), 0..4)),
    )
        .prop_map(|(node_ports_enabled, allowed_external_ips)| TenantPolicy {
            node_ports_enabled,
            allowed_external_ips,
        })
}

/// Reference containment: mask both sides by the prefix length.
fn entry_contains(entry: &str, ip: Ipv4Addr) -> bool {
    let normalized = if entry.contains('/') {
        entry.to_string()
    } else {
        format!("{}/32", entry)
    };
    let Some((addr, prefix)) = normalized.split_once('/') else {
        return false;
    };
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let (Ok(addr), Ok(prefix)) = (addr.parse::<Ipv4Addr>(), prefix.parse::<u32>()) else {
        return false;
    };
    if prefix > 32 {
        return false;
    }
    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    (u32::from(addr) & mask) == (u32::from(ip) & mask)
}

proptest! {
    /// Property: containment matches per-entry masking over the whole list.
    #[test]
    fn test_contains_matches_reference(
        ip in any_ipv4(),
        allowed in prop::collection::vec(any_entry(), 0..6)
    ) {
        let expected = allowed.iter().any(|entry| entry_contains(entry, ip));
        prop_assert_eq!(contains(IpAddr::V4(ip), &allowed), expected);
    }

    /// Property: a bare address always contains itself.
    #[test]
    fn test_bare_address_contains_itself(ip in any_ipv4()) {
        prop_assert!(contains(IpAddr::V4(ip), &[ip.to_string()]));
    }

    /// Property: allow-list order does not change containment.
    #[test]
    fn test_contains_order_independent(
        ip in any_ipv4(),
        allowed in prop::collection::vec(any_entry(), 0..6)
    ) {
        let mut reversed = allowed.clone();
        reversed.reverse();
        prop_assert_eq!(
            contains(IpAddr::V4(ip), &allowed),
            contains(IpAddr::V4(ip), &reversed)
        );
    }

    /// Property: services outside any tenant are always allowed.
    #[test]
    fn test_no_tenant_always_allows(service in any_service()) {
        prop_assert_eq!(evaluate(&service, None), Verdict::Allow);
    }

    /// Property: disabled NodePorts deny every NodePort service.
    #[test]
    fn test_disabled_node_ports_deny(service in any_service(), policy in any_policy()) {
        let service = ServiceDescriptor { service_type: ServiceType::NodePort, ..service };
        let policy = TenantPolicy { node_ports_enabled: false, ..policy };
        let denied_node_port = matches!(
            evaluate(&service, Some(&policy)),
            Verdict::Deny(PolicyViolation::NodePortDisabled { .. })
        );
        prop_assert!(denied_node_port);
    }

    /// Property: without an allow-list only the NodePort rule can deny.
    #[test]
    fn test_no_allow_list_only_node_port_denies(
        service in any_service(),
        node_ports_enabled in any::<bool>()
    ) {
        let policy = TenantPolicy { node_ports_enabled, allowed_external_ips: None };
        let verdict = evaluate(&service, Some(&policy));
        if service.service_type == ServiceType::NodePort && !node_ports_enabled {
            prop_assert!(!verdict.is_allowed());
        } else {
            prop_assert_eq!(verdict, Verdict::Allow);
        }
    }

    /// Property: evaluation is deterministic.
    #[test]
    fn test_evaluation_deterministic(service in any_service(), policy in any_policy()) {
        prop_assert_eq!(evaluate(&service, Some(&policy)), evaluate(&service, Some(&policy)));
    }

    /// Property: a reported offending address is the first uncontained one.
    #[test]
    fn test_reports_first_offending_address(service in any_service(), policy in any_policy()) {
        if let Verdict::Deny(PolicyViolation::ExternalServiceIpForbidden { ip, allowed, .. }) =
            evaluate(&service, Some(&policy))
        {
            let first = service
                .external_ips
                .iter()
                .find(|candidate| {
                    !contains(candidate.parse::<IpAddr>().unwrap(), &allowed)
                })
                .unwrap();
            prop_assert_eq!(&ip, first);
        }
    }
}
