//! Custom Resource Definitions (CRDs) for tenant-service-guard.
//!
//! - `Tenant`: Cluster-scoped owner of namespaces and their exposure policy

mod tenant;

pub use tenant::*;
