//! Print the Tenant CRD and the ValidatingWebhookConfiguration as a JSON
//! `List`, ready for `kubectl apply -f -`.
//!
//! The webhook Service location is taken from `WEBHOOK_SERVICE_NAMESPACE`,
//! `WEBHOOK_SERVICE_NAME`, `WEBHOOK_SERVICE_PORT` and `WEBHOOK_CERTIFICATE`.

use kube::CustomResourceExt;

use tenant_service_guard::crd::Tenant;
use tenant_service_guard::webhooks::registration::{
    WebhookService, validating_webhook_configuration,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let service = WebhookService {
        namespace: std::env::var("WEBHOOK_SERVICE_NAMESPACE")
            .unwrap_or_else(|_| "capsule-system".to_string()),
        name: std::env::var("WEBHOOK_SERVICE_NAME")
            .unwrap_or_else(|_| "tenant-service-guard".to_string()),
        port: match std::env::var("WEBHOOK_SERVICE_PORT") {
            Ok(port) => port.parse()?,
            Err(_) => 443,
        },
        certificate: std::env::var("WEBHOOK_CERTIFICATE").ok(),
    };

    let list = serde_json::json!({
        "apiVersion": "v1",
        "kind": "List",
        "items": [
            Tenant::crd(),
            validating_webhook_configuration(&service),
        ],
    });

    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}
