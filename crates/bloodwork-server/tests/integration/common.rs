use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bloodwork_core::{EhrReport, EhrStore, PipelineConfig};
use bloodwork_server::routes;
use bloodwork_server::state::AppState;
use bloodwork_store::JsonFileStore;

pub const TEST_API_KEY: &str = "test-secret-key";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub oracle: MockServer,
    pub store: JsonFileStore,
    _dir: TempDir,
}

/// App wired to a mock chat endpoint and a store in a temporary directory.
/// Retries run without delay.
pub async fn setup_test_app() -> TestApp {
    let oracle = MockServer::start().await;
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = JsonFileStore::new(dir.path().join("ehr_database.json"));

    let vars: HashMap<&str, String> = HashMap::from([
        ("BLOODWORK_API_KEYS", "key-a,key-b".to_string()),
        ("BLOODWORK_BASE_URL", oracle.uri()),
        ("BLOODWORK_RETRY_DELAY_MS", "0".to_string()),
    ]);
    let config = PipelineConfig::from_lookup(|name| vars.get(name).cloned())
        .expect("Failed to build config");

    let state = Arc::new(
        AppState::build(&config, store.clone(), TEST_API_KEY).expect("Failed to build state"),
    );

    TestApp {
        router: routes::router(state.clone()),
        state,
        oracle,
        store,
        _dir: dir,
    }
}

pub fn page_document(category: &str, parameter: &str, value: &str) -> serde_json::Value {
    json!({
        "Patient Information": {"Name": "Jane Roe", "Age": "42", "Sex": "F", "Lab ID": "LAB-77"},
        "Tests": [{
            "Test Category": category,
            "Test Components": [{
                "Name": category,
                "SubTests": [{"Parameter": parameter, "Value": value, "Unit": "", "Reference Range": ""}]
            }]
        }],
        "Report Notes": {"Comments": [format!("{parameter} measured")]}
    })
}

/// Extraction calls whose page text contains `marker` answer with `document`
/// wrapped in a code fence.
pub async fn mock_page(oracle: &MockServer, marker: &str, document: serde_json::Value) {
    let text = format!("```json\n{document}\n```");
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_string_contains("Extract ALL details"))
        .and(body_string_contains(marker))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": text})))
        .with_priority(1)
        .mount(oracle)
        .await;
}

pub async fn mock_failing_page(oracle: &MockServer, marker: &str) {
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_string_contains(marker))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .with_priority(1)
        .mount(oracle)
        .await;
}

pub async fn mock_analysis(oracle: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_string_contains("medical data analyst"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": text})))
        .mount(oracle)
        .await;
}

pub async fn seed_patient(store: &JsonFileStore, patient_id: &str, report: serde_json::Value) {
    let report: EhrReport = serde_json::from_value(report).expect("Invalid seed report");
    store
        .merge_report(patient_id, report)
        .await
        .expect("Failed to seed patient");
}

pub fn authed_get(uri: impl AsRef<str>) -> Request<Body> {
    Request::get(uri.as_ref())
        .header("authorization", format!("Bearer {TEST_API_KEY}"))
        .body(Body::empty())
        .unwrap()
}

pub fn authed_post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("authorization", format!("Bearer {TEST_API_KEY}"))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

pub async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(router, request).await;
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Poll a job until it reaches a terminal status.
pub async fn wait_for_job(router: &Router, job_id: &str) -> serde_json::Value {
    for _ in 0..200 {
        let (status, json) = send_json(router, authed_get(format!("/v1/jobs/{job_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        if json["status"] == "completed" || json["status"] == "failed" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("Job {job_id} did not finish");
}
