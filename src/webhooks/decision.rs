//! Admission decision for Services.
//!
//! Resolves the owning tenant, evaluates the exposure policies and maps the
//! verdict onto the admission response vocabulary. Violations are reported to
//! the tenant through a `Notifier` before the response is returned.

use k8s_openapi::api::core::v1::Service;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use tracing::{debug, error, warn};

use crate::tenancy::{Notification, Notifier, TenantResolver};
use crate::webhooks::error::{DecodeError, PolicyViolation};
use crate::webhooks::policies::{ServiceDescriptor, Verdict, evaluate};

/// HTTP-equivalent status for every rejected request
pub const BAD_REQUEST: u16 = 400;

/// Reason attached to decode failures
const REASON_DECODE: &str = "InvalidService";
/// Reason attached to tenant lookup failures
const REASON_TENANT_LOOKUP: &str = "TenantLookupFailed";

/// Expected kind of admitted objects
const SERVICE_KIND: &str = "Service";

/// Outcome of one admission request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed
    Allowed,
    /// The Service violates its tenant policy
    Denied(PolicyViolation),
    /// The request could not be evaluated
    Errored { reason: String, message: String },
}

impl Decision {
    /// Metric label for this decision
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Allowed => "allowed",
            Decision::Denied(_) => "denied",
            Decision::Errored { .. } => "errored",
        }
    }

    /// Status code carried by the admission response, if rejected
    pub fn code(&self) -> Option<u16> {
        match self {
            Decision::Allowed => None,
            Decision::Denied(_) | Decision::Errored { .. } => Some(BAD_REQUEST),
        }
    }

    /// Build the admission response for `request`.
    ///
    /// Rejections carry code 400 with the reason embedded in the message as
    /// `[reason] message`, since the API server only surfaces the message.
    pub fn into_response<T>(self, request: &AdmissionRequest<T>) -> AdmissionResponse
    where
        T: kube::Resource,
    {
        let (reason, message) = match self {
            Decision::Allowed => return AdmissionResponse::from(request),
            Decision::Denied(violation) => (violation.reason().to_string(), violation.to_string()),
            Decision::Errored { reason, message } => (reason, message),
        };

        let mut response = AdmissionResponse::from(request).deny(format!("[{}] {}", reason, message));
        response.result.code = BAD_REQUEST;
        response.result.reason = reason;
        response
    }
}

/// Decode the admitted object into a Service.
pub fn decode_service(request: &AdmissionRequest<DynamicObject>) -> Result<Service, DecodeError> {
    if request.kind.kind != SERVICE_KIND {
        return Err(DecodeError::InvalidObject(format!(
            "expected kind {}, got {}",
            SERVICE_KIND, request.kind.kind
        )));
    }

    let object = request.object.as_ref().ok_or(DecodeError::MissingObject)?;
    serde_json::to_value(object)
        .and_then(serde_json::from_value::<Service>)
        .map_err(|e| DecodeError::InvalidObject(e.to_string()))
}

/// Decide on a decoded Service.
///
/// Namespaces without an owning tenant are unconstrained. Denials notify the
/// tenant before returning.
pub fn admit_service<R, N>(resolver: &R, notifier: &N, service: &Service) -> Decision
where
    R: TenantResolver + ?Sized,
    N: Notifier + ?Sized,
{
    let descriptor = ServiceDescriptor::from(service);

    let tenant = match resolver.find_owning_tenant(&descriptor.namespace) {
        Ok(tenant) => tenant,
        Err(e) => {
            error!(namespace = %descriptor.namespace, error = %e, "Failed to resolve owning tenant");
            return Decision::Errored {
                reason: REASON_TENANT_LOOKUP.to_string(),
                message: e.to_string(),
            };
        }
    };

    let Some(tenant) = tenant else {
        debug!(namespace = %descriptor.namespace, "Namespace not owned by any tenant");
        return Decision::Allowed;
    };

    match evaluate(&descriptor, Some(&tenant.policy())) {
        Verdict::Allow => Decision::Allowed,
        Verdict::Deny(violation) => {
            warn!(
                namespace = %descriptor.namespace,
                name = %descriptor.name,
                reason = violation.reason(),
                "Service violates tenant exposure policy"
            );
            notifier.notify(&tenant, Notification::from(&violation));
            Decision::Denied(violation)
        }
    }
}

/// Decide on a full admission request.
///
/// DELETE and CONNECT are allowed without evaluation. CREATE and UPDATE
/// decode the Service first; a decode failure is rejected without notifying
/// anyone.
pub fn review_service<R, N>(
    resolver: &R,
    notifier: &N,
    request: &AdmissionRequest<DynamicObject>,
) -> Decision
where
    R: TenantResolver + ?Sized,
    N: Notifier + ?Sized,
{
    match request.operation {
        Operation::Delete | Operation::Connect => return Decision::Allowed,
        Operation::Create | Operation::Update => {}
    }

    match decode_service(request) {
        Ok(service) => admit_service(resolver, notifier, &service),
        Err(e) => {
            error!(uid = %request.uid, error = %e, "Failed to decode Service");
            Decision::Errored {
                reason: REASON_DECODE.to_string(),
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::crd::{
        ENABLE_NODE_PORTS_ANNOTATION, ExternalServiceIpsSpec, Tenant, TenantSpec, TenantStatus,
    };
    use crate::tenancy::{ResolveError, TenantIndex};
    use k8s_openapi::api::core::v1::ServiceSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::core::admission::AdmissionReview;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, Notification)>>,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<(String, Notification)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, tenant: &Tenant, notification: Notification) {
            use kube::ResourceExt;
            self.sent
                .lock()
                .unwrap()
                .push((tenant.name_any(), notification));
        }
    }

    struct FailingResolver;

    impl TenantResolver for FailingResolver {
        fn find_owning_tenant(&self, _: &str) -> Result<Option<Arc<Tenant>>, ResolveError> {
            Err(ResolveError::NotSynced)
        }
    }

    fn tenant(node_ports: Option<&str>, allowed: Option<&[&str]>) -> Tenant {
        let mut annotations = BTreeMap::new();
        if let Some(value) = node_ports {
            annotations.insert(ENABLE_NODE_PORTS_ANNOTATION.to_string(), value.to_string());
        }
        Tenant {
            metadata: ObjectMeta {
                name: Some("oil".to_string()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: TenantSpec {
                external_service_ips: allowed.map(|a| ExternalServiceIpsSpec {
                    allowed: a.iter().map(|s| s.to_string()).collect(),
                }),
                ..Default::default()
            },
            status: Some(TenantStatus {
                namespaces: vec!["oil-dev".to_string()],
                size: 1,
            }),
        }
    }

    fn service(namespace: &str, type_: &str, external_ips: &[&str]) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some(type_.to_string()),
                external_ips: Some(external_ips.iter().map(|s| s.to_string()).collect()),
                ..Default::default()
            }),
            status: None,
        }
    }

    fn request(operation: &str, object: serde_json::Value) -> AdmissionRequest<DynamicObject> {
        let review: AdmissionReview<DynamicObject> = serde_json::from_value(serde_json::json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": { "group": "", "version": "v1", "kind": "Service" },
                "resource": { "group": "", "version": "v1", "resource": "services" },
                "name": "web",
                "namespace": "oil-dev",
                "operation": operation,
                "userInfo": { "username": "alice" },
                "object": object,
                "dryRun": false
            }
        }))
        .unwrap();
        review.try_into().unwrap()
    }

    #[test]
    fn test_unowned_namespace_allowed() {
        let resolver = TenantIndex::with_tenants([tenant(Some("false"), Some(&[]))]);
        let notifier = RecordingNotifier::default();

        let decision = admit_service(
            &resolver,
            &notifier,
            &service("default", "NodePort", &["203.0.113.1"]),
        );
        assert_eq!(decision, Decision::Allowed);
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn test_node_port_denial_notifies_tenant() {
        let resolver = TenantIndex::with_tenants([tenant(Some("false"), None)]);
        let notifier = RecordingNotifier::default();

        let decision = admit_service(&resolver, &notifier, &service("oil-dev", "NodePort", &[]));
        assert!(matches!(
            decision,
            Decision::Denied(PolicyViolation::NodePortDisabled { .. })
        ));
        assert_eq!(decision.code(), Some(400));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "oil");
        assert_eq!(sent[0].1.reason, "ForbiddenNodePort");
        assert_eq!(
            sent[0].1.note,
            "Service oil-dev/web cannot be type of NodePort for the current Tenant"
        );
    }

    #[test]
    fn test_external_ip_denial_notifies_tenant() {
        let resolver = TenantIndex::with_tenants([tenant(None, Some(&["10.0.0.0/24"]))]);
        let notifier = RecordingNotifier::default();

        let decision = admit_service(
            &resolver,
            &notifier,
            &service("oil-dev", "ClusterIP", &["10.0.0.200", "10.0.1.1"]),
        );
        match &decision {
            Decision::Denied(PolicyViolation::ExternalServiceIpForbidden { ip, allowed, .. }) => {
                assert_eq!(ip, "10.0.1.1");
                assert_eq!(allowed, &vec!["10.0.0.0/24".to_string()]);
            }
            other => panic!("expected external IP denial, got {:?}", other),
        }

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.reason, "ForbiddenExternalServiceIP");
        assert_eq!(
            sent[0].1.note,
            "Service oil-dev/web external IP 10.0.1.1 is forbidden for the current Tenant"
        );
    }

    #[test]
    fn test_allowed_service_sends_nothing() {
        let resolver = TenantIndex::with_tenants([tenant(None, Some(&["10.0.0.5"]))]);
        let notifier = RecordingNotifier::default();

        let decision = admit_service(
            &resolver,
            &notifier,
            &service("oil-dev", "LoadBalancer", &["10.0.0.5"]),
        );
        assert_eq!(decision, Decision::Allowed);
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn test_lookup_failure_fails_closed() {
        let notifier = RecordingNotifier::default();
        let decision = admit_service(
            &FailingResolver,
            &notifier,
            &service("oil-dev", "ClusterIP", &[]),
        );

        assert_eq!(decision.label(), "errored");
        assert_eq!(decision.code(), Some(400));
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn test_delete_allowed_without_lookup() {
        let notifier = RecordingNotifier::default();
        let req = request("DELETE", serde_json::Value::Null);

        assert_eq!(
            review_service(&FailingResolver, &notifier, &req),
            Decision::Allowed
        );
    }

    #[test]
    fn test_malformed_object_rejected_without_notification() {
        let resolver = TenantIndex::with_tenants([tenant(Some("false"), None)]);
        let notifier = RecordingNotifier::default();
        let req = request(
            "CREATE",
            serde_json::json!({
                "apiVersion": "v1",
                "kind": "Service",
                "metadata": { "name": "web", "namespace": "oil-dev" },
                "spec": { "externalIPs": "not-a-list" }
            }),
        );

        let decision = review_service(&resolver, &notifier, &req);
        match &decision {
            Decision::Errored { reason, .. } => assert_eq!(reason, "InvalidService"),
            other => panic!("expected decode error, got {:?}", other),
        }
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn test_update_is_evaluated() {
        let resolver = TenantIndex::with_tenants([tenant(Some("false"), None)]);
        let notifier = RecordingNotifier::default();
        let req = request(
            "UPDATE",
            serde_json::json!({
                "apiVersion": "v1",
                "kind": "Service",
                "metadata": { "name": "web", "namespace": "oil-dev" },
                "spec": { "type": "NodePort" }
            }),
        );

        assert_eq!(review_service(&resolver, &notifier, &req).label(), "denied");
    }

    #[test]
    fn test_denied_response_carries_code_and_reason() {
        let req = request(
            "CREATE",
            serde_json::json!({
                "apiVersion": "v1",
                "kind": "Service",
                "metadata": { "name": "web", "namespace": "oil-dev" }
            }),
        );
        let decision = Decision::Denied(PolicyViolation::NodePortDisabled {
            namespace: "oil-dev".to_string(),
            name: "web".to_string(),
        });

        let response = decision.into_response(&req);
        assert!(!response.allowed);
        assert_eq!(response.result.code, 400);
        assert_eq!(response.result.reason, "ForbiddenNodePort");
        assert!(response.result.message.starts_with("[ForbiddenNodePort] "));
    }

    #[test]
    fn test_allowed_response() {
        let req = request("DELETE", serde_json::Value::Null);
        let response = Decision::Allowed.into_response(&req);
        assert!(response.allowed);
        assert_eq!(response.uid, "705ab4f5-6393-11e8-b7cc-42010a800002");
    }
}
