//! Webhook registration metadata.
//!
//! Builds the `ValidatingWebhookConfiguration` the API server needs to route
//! Service CREATE and UPDATE requests to this webhook. The configuration
//! fails closed and declares no side effects.

use std::collections::BTreeMap;

use k8s_openapi::api::admissionregistration::v1::{
    RuleWithOperations, ServiceReference, ValidatingWebhook, ValidatingWebhookConfiguration,
    WebhookClientConfig,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// HTTP path serving Service admission
pub const WEBHOOK_PATH: &str = "/validating-external-service-ips";
/// Name of the registered webhook
pub const WEBHOOK_NAME: &str = "validating-external-service-ips.capsule.clastix.io";
/// Name of the ValidatingWebhookConfiguration object
pub const CONFIGURATION_NAME: &str = "tenant-service-guard";

/// cert-manager annotation injecting the CA bundle from a Certificate
const INJECT_CA_ANNOTATION: &str = "cert-manager.io/inject-ca-from";

/// API server timeout for one admission call
const TIMEOUT_SECONDS: i32 = 10;

/// Where the webhook Service lives in the cluster
#[derive(Clone, Debug)]
pub struct WebhookService {
    pub namespace: String,
    pub name: String,
    pub port: u16,
    /// cert-manager Certificate (in `namespace`) whose CA is injected
    pub certificate: Option<String>,
}

/// Build the validating webhook configuration for Service admission.
pub fn validating_webhook_configuration(
    service: &WebhookService,
) -> ValidatingWebhookConfiguration {
    let annotations = service.certificate.as_ref().map(|certificate| {
        BTreeMap::from([(
            INJECT_CA_ANNOTATION.to_string(),
            format!("{}/{}", service.namespace, certificate),
        )])
    });

    ValidatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(CONFIGURATION_NAME.to_string()),
            annotations,
            ..Default::default()
        },
        webhooks: Some(vec![ValidatingWebhook {
            name: WEBHOOK_NAME.to_string(),
            admission_review_versions: vec!["v1".to_string()],
            client_config: WebhookClientConfig {
                service: Some(ServiceReference {
                    namespace: service.namespace.clone(),
                    name: service.name.clone(),
                    path: Some(WEBHOOK_PATH.to_string()),
                    port: Some(i32::from(service.port)),
                }),
                ..Default::default()
            },
            rules: Some(vec![RuleWithOperations {
                api_groups: Some(vec![String::new()]),
                api_versions: Some(vec!["v1".to_string()]),
                operations: Some(vec!["CREATE".to_string(), "UPDATE".to_string()]),
                resources: Some(vec!["services".to_string()]),
                scope: Some("Namespaced".to_string()),
            }]),
            failure_policy: Some("Fail".to_string()),
            side_effects: "None".to_string(),
            timeout_seconds: Some(TIMEOUT_SECONDS),
            ..Default::default()
        }]),
    }
}
