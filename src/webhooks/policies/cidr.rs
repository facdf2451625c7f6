//! CIDR allow-list matching.
//!
//! Allow-list entries are either CIDR blocks or bare addresses. A bare entry
//! gets `/32` appended before parsing. The prefix must be a decimal length;
//! dotted netmasks (`10.0.0.0/255.255.255.0`) are malformed. Entries that
//! still fail to parse are skipped: they never match and are not reported.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use tracing::debug;

/// Host suffix appended to entries without a prefix length.
const HOST_PREFIX: &str = "/32";

/// Normalize an allow-list entry to CIDR notation.
pub fn normalize(entry: &str) -> String {
    if entry.contains('/') {
        entry.to_string()
    } else {
        format!("{entry}{HOST_PREFIX}")
    }
}

/// Parse an allow-list entry into a network block, if it is well formed.
pub fn parse_entry(entry: &str) -> Option<IpNetwork> {
    let normalized = normalize(entry);
    let prefix_is_decimal = normalized.split_once('/').is_some_and(|(_, prefix)| {
        !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit())
    });
    if !prefix_is_decimal {
        debug!(entry = %entry, "Skipping allow-list entry without a decimal prefix length");
        return None;
    }

    match normalized.parse::<IpNetwork>() {
        Ok(network) => Some(network),
        Err(e) => {
            debug!(entry = %entry, error = %e, "Skipping malformed allow-list entry");
            None
        }
    }
}

/// Check whether `candidate` lies inside any block of `allowed`.
///
/// Returns on the first containing block. An empty list contains nothing.
pub fn contains<S: AsRef<str>>(candidate: IpAddr, allowed: &[S]) -> bool {
    allowed
        .iter()
        .filter_map(|entry| parse_entry(entry.as_ref()))
        .any(|network| network.contains(candidate))
}
