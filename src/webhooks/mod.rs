//! Webhook module for validating Service admission requests.
//!
//! Services in tenant-owned namespaces are checked against the tenant's
//! exposure policy in tiers:
//! - Tier 1: NodePort permission
//! - Tier 2: External IP allow-list

pub mod decision;
pub mod error;
pub mod policies;
pub mod registration;
mod server;

pub use decision::{Decision, admit_service, decode_service, review_service};
pub use error::{DecodeError, PolicyViolation, WebhookError};
pub use policies::{ServiceDescriptor, ServiceType, Verdict, evaluate};
pub use registration::{WEBHOOK_NAME, WEBHOOK_PATH, validating_webhook_configuration};
pub use server::{WebhookState, create_webhook_router, run_webhook_server};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
