// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Functional tests for Service admission.
//!
//! These tests drive complete admission requests through the decision
//! pipeline and the HTTP router WITHOUT requiring a live Kubernetes cluster.
//! Tenants are served from an in-memory index and notifications are recorded.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_single_host_allow_list
//! ```
//!
//! ## Test Categories
//!
//! - **Scenario tests**: Tenant policies against Service requests, end to end
//! - **HTTP tests**: AdmissionReview payloads through the webhook router

#[path = "../common/fixtures.rs"]
mod fixtures;

mod http_tests;
