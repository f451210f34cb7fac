use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{FixedOffset, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use crmdash::client::RawResponse;
use crmdash::server::{router, AppState};
use crmdash::{CacheAside, CacheConfig, CrmClient, CrmDash, RetryPolicy, Transport};

/// Answers every path with a fixed status and body, counting calls.
struct FixedTransport {
    status: u16,
    body: Value,
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for FixedTransport {
    async fn get(&self, _path: &str, _query: &[(String, String)]) -> crmdash::Result<RawResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawResponse::new(self.status, self.body.to_string()))
    }
}

fn app_with(status: u16, body: Value) -> (Router, Arc<FixedTransport>) {
    let transport = Arc::new(FixedTransport {
        status,
        body,
        calls: AtomicUsize::new(0),
    });
    let client = CrmClient::new(
        transport.clone(),
        RetryPolicy::default().with_max_attempts(1),
    );
    let dash = CrmDash::new(
        client,
        CacheAside::new(CacheConfig::default()),
        FixedOffset::east_opt(3 * 3600).unwrap(),
    )
    .with_clock(|| Utc.with_ymd_and_hms(2025, 3, 12, 9, 0, 0).unwrap());
    let state = AppState::new(Arc::new(dash), "https://acme.amocrm.ru").unwrap();
    (router(state), transport)
}

fn leads_body() -> Value {
    json!({ "_embedded": { "leads": [
        { "id": 1, "status_id": 142, "price": 120, "status": { "name": "Won" } },
        { "id": 2, "status_id": 7, "price": 30, "status": { "name": "New" } }
    ] } })
}

async fn get(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

#[tokio::test]
async fn test_healthz() {
    let (app, transport) = app_with(200, json!([]));
    let (status, _, body) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let (app, _) = app_with(200, json!([]));
    for uri in ["/healthz", "/api/tasks", "/missing"] {
        let (_, headers, _) = get(&app, uri).await;
        assert_eq!(
            headers.get("content-security-policy").unwrap(),
            "frame-ancestors 'self' https://acme.amocrm.ru"
        );
        assert_eq!(headers.get("x-robots-tag").unwrap(), "noindex, nofollow");
    }
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (app, _) = app_with(200, json!([]));
    let (status, _, body) = get(&app, "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "not found" }));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, transport) = app_with(200, leads_body());
    let (status, _, body) = get(&app, "/api/metrics?range=7d&pipeline_id=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["leads_created"], 2);
    assert_eq!(body["leads_won"], 1);
    assert_eq!(body["conversion_rate"], 50.0);
    assert_eq!(body["revenue_won"], 120.0);
    assert_eq!(body["avg_ticket"], 120.0);
    assert!(body["avg_first_touch_seconds"].is_null());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

    // Second identical request is served from cache.
    get(&app, "/api/metrics?range=7d&pipeline_id=3").await;
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_funnels_endpoint() {
    let (app, _) = app_with(200, leads_body());
    let (status, _, body) = get(&app, "/api/funnels?range=today").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            { "stage_name": "Won", "count": 1, "value_sum": 120.0 },
            { "stage_name": "New", "count": 1, "value_sum": 30.0 }
        ])
    );
}

#[tokio::test]
async fn test_timeseries_requires_metric() {
    let (app, transport) = app_with(200, leads_body());
    let (status, _, body) = get(&app, "/api/timeseries?range=7d").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "metric is required" }));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_timeseries_endpoint() {
    let (app, _) = app_with(200, json!([]));
    let (status, _, body) = get(&app, "/api/timeseries?metric=leads_won&range=30d").await;
    assert_eq!(status, StatusCode::OK);
    let points = body.as_array().unwrap();
    assert_eq!(points.len(), 30);
    assert!(points.iter().all(|p| p["value"] == 0.0));
    assert!(points[0]["date"].as_str().unwrap() < points[29]["date"].as_str().unwrap());
}

#[tokio::test]
async fn test_pipelines_pass_through() {
    let (app, _) = app_with(
        200,
        json!({ "_embedded": { "pipelines": [{ "id": 1, "name": "Sales" }] } }),
    );
    let (status, _, body) = get(&app, "/api/pipelines").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "id": 1, "name": "Sales" }]));
}

#[tokio::test]
async fn test_upstream_error_is_generic_500() {
    let (app, _) = app_with(401, json!({ "detail": "token expired" }));
    let (status, _, body) = get(&app, "/api/users").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "internal error" }));
}

#[tokio::test]
async fn test_exhausted_retries_are_503() {
    let (app, transport) = app_with(429, json!({}));
    let (status, _, body) = get(&app, "/api/tasks?user_id=1").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "error": "upstream unavailable" }));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_malformed_query_is_json_400() {
    let (app, transport) = app_with(200, leads_body());
    let (status, _, body) = get(&app, "/api/metrics?range=7d&range=30d").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "invalid query string" }));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_range_is_json_400() {
    let (app, transport) = app_with(200, json!([]));
    let (status, _, body) = get(
        &app,
        "/api/timeseries?metric=leads_created&range=custom&from=2025-01-01&to=%2B262142-12-31",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "range is longer than 732 days" }));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_extreme_custom_date_does_not_crash() {
    let (app, _) = app_with(200, json!([]));
    let (status, _, body) = get(
        &app,
        "/api/timeseries?metric=leads_created&range=custom&from=-262143-01-01&to=2025-01-01",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "date": "2025-03-12", "value": 0.0 }]));
}
