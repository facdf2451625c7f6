//! AdmissionReview payloads through the webhook router.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::fixtures::{RecordingNotifier, TenantBuilder, service_review};
use tenant_service_guard::HealthState;
use tenant_service_guard::tenancy::TenantIndex;
use tenant_service_guard::webhooks::{WEBHOOK_PATH, WebhookState, create_webhook_router};

fn router() -> (Router, Arc<RecordingNotifier>, Arc<HealthState>) {
    let index = TenantIndex::with_tenants([TenantBuilder::new("oil")
        .namespace("oil-dev")
        .allow("10.0.0.0/24")
        .build()]);
    let notifier = Arc::new(RecordingNotifier::default());
    let health = Arc::new(HealthState::new());
    let state = Arc::new(WebhookState::new(
        Arc::new(index),
        notifier.clone(),
        Some(health.clone()),
    ));
    (create_webhook_router(state), notifier, health)
}

async fn post(app: Router, body: String) -> (StatusCode, serde_json::Value) {
    let request = Request::post(WEBHOOK_PATH)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or_default())
}

fn service(external_ips: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": { "name": "web", "namespace": "oil-dev" },
        "spec": {
            "type": "LoadBalancer",
            "externalIPs": external_ips,
            "ports": [{ "port": 80 }]
        }
    })
}

#[tokio::test]
async fn test_forbidden_external_ip_response() {
    let (app, notifier, health) = router();
    let body = service_review("CREATE", service(serde_json::json!(["10.0.0.7", "10.9.9.9"])));

    let (status, review) = post(app, body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    let response = &review["response"];
    assert_eq!(response["uid"], "c9a5b3f2-4a1e-4c3b-9e8f-1d2c3b4a5f60");
    assert_eq!(response["allowed"], false);
    assert_eq!(response["status"]["code"], 400);
    assert_eq!(response["status"]["reason"], "ForbiddenExternalServiceIP");

    let message = response["status"]["message"].as_str().unwrap();
    assert!(message.contains("10.0.0.0/24"));
    assert!(message.contains("10.9.9.9"));

    assert_eq!(notifier.sent().len(), 1);
    let metrics = health.metrics.encode();
    assert!(metrics.contains("verdict=\"denied\""));
    assert!(metrics.contains("reason=\"ForbiddenExternalServiceIP\""));
}

#[tokio::test]
async fn test_allowed_external_ip_response() {
    let (app, notifier, _) = router();
    let body = service_review("CREATE", service(serde_json::json!(["10.0.0.7"])));

    let (status, review) = post(app, body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["allowed"], true);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_undecodable_service_rejected_without_event() {
    let (app, notifier, _) = router();
    let body = service_review("CREATE", service(serde_json::json!({ "not": "a list" })));

    let (status, review) = post(app, body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["allowed"], false);
    assert_eq!(review["response"]["status"]["code"], 400);
    assert_eq!(review["response"]["status"]["reason"], "InvalidService");
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_delete_allowed() {
    let (app, _, health) = router();
    let mut body = service_review("DELETE", serde_json::Value::Null);
    body["request"]["name"] = "web".into();
    body["request"]["namespace"] = "oil-dev".into();

    let (status, review) = post(app, body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["allowed"], true);
    assert!(health.metrics.encode().contains("operation=\"DELETE\""));
}

#[tokio::test]
async fn test_non_json_body_rejected_by_extractor() {
    let (app, _, _) = router();

    let (status, _) = post(app, "not json".to_string()).await;

    assert!(status.is_client_error());
}
