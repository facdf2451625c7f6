//! Error types for the admission webhook.

use thiserror::Error;

/// Event reason for a denied NodePort Service.
pub const REASON_FORBIDDEN_NODE_PORT: &str = "ForbiddenNodePort";
/// Event reason for a denied external Service IP.
pub const REASON_FORBIDDEN_EXTERNAL_SERVICE_IP: &str = "ForbiddenExternalServiceIP";

/// Tenant exposure policy violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    /// The tenant forbids Services of type NodePort
    #[error("NodePort service types are forbidden for the current Tenant (Service {namespace}/{name})")]
    NodePortDisabled { namespace: String, name: String },

    /// An external IP lies outside the tenant allow-list
    #[error(
        "The selected external IPs for the service are violating the following enforced CIDRs: {}; Service {namespace}/{name} external IP {ip} is forbidden",
        allowed.join(", ")
    )]
    ExternalServiceIpForbidden {
        namespace: String,
        name: String,
        allowed: Vec<String>,
        ip: String,
    },
}

impl PolicyViolation {
    /// Machine-readable reason code, shared by events and responses.
    pub fn reason(&self) -> &'static str {
        match self {
            PolicyViolation::NodePortDisabled { .. } => REASON_FORBIDDEN_NODE_PORT,
            PolicyViolation::ExternalServiceIpForbidden { .. } => {
                REASON_FORBIDDEN_EXTERNAL_SERVICE_IP
            }
        }
    }

    /// Note attached to the warning event recorded against the tenant.
    pub fn event_note(&self) -> String {
        match self {
            PolicyViolation::NodePortDisabled { namespace, name } => format!(
                "Service {}/{} cannot be type of NodePort for the current Tenant",
                namespace, name
            ),
            PolicyViolation::ExternalServiceIpForbidden {
                namespace, name, ip, ..
            } => format!(
                "Service {}/{} external IP {} is forbidden for the current Tenant",
                namespace, name, ip
            ),
        }
    }
}

/// The inbound object could not be decoded into a Service.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The admission request carried no object
    #[error("admission request has no object")]
    MissingObject,

    /// The object is not a valid core/v1 Service
    #[error("failed to decode Service: {0}")]
    InvalidObject(String),
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}
