use axum::body::Body;
use axum::http::{Request, StatusCode};
use bloodwork_core::EhrStore;
use serde_json::json;

use crate::integration::common::{
    authed_get, authed_post_json, mock_analysis, mock_failing_page, mock_page, page_document,
    seed_patient, send, send_json, setup_test_app, wait_for_job,
};

const REPORT_TEXT: &str = "--- Page 1 ---\nMARKER-CBC Hemoglobin 13.9\n--- Page 2 ---\nMARKER-LIPID LDL 131\n--- Page 3 ---\nMARKER-THYROID TSH 2.1\n";

fn seeded_report() -> serde_json::Value {
    json!({
        "Patient": {"Name": "John Doe", "Lab ID": "p-9"},
        "Lab Results": [{
            "Test Category": "Complete Blood Count",
            "Test Components": [{
                "Name": "Haemogram",
                "SubTests": [{"Parameter": "Hemoglobin", "Value": "12.1", "Unit": "g/dL", "Reference Range": "13.8-17.2"}]
            }]
        }],
        "Report Notes": {"Interpretations": ["Mild anaemia"]},
        "Report Generated On": "2024-03-01T09:00:00Z"
    })
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let (status, json) = send_json(
        &app.router,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["store"], "ok");
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app().await;

    let (status, json) = send_json(
        &app.router,
        Request::get("/v1/jobs").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn wrong_api_key_returns_401() {
    let app = setup_test_app().await;

    let (status, _) = send(
        &app.router,
        Request::get("/v1/patients")
            .header("authorization", "Bearer wrong-key")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn openapi_document_is_public() {
    let app = setup_test_app().await;

    let (status, json) = send_json(
        &app.router,
        Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/v1/reports"].is_object());
    assert!(json["paths"]["/v1/patients/{id}/analysis/stream"].is_object());
}

#[tokio::test]
async fn report_upload_builds_patient_record() {
    let app = setup_test_app().await;
    mock_page(&app.oracle, "MARKER-CBC", page_document("Complete Blood Count", "Hemoglobin", "13.9")).await;
    mock_page(&app.oracle, "MARKER-LIPID", page_document("Lipid Profile", "LDL", "131")).await;
    mock_page(&app.oracle, "MARKER-THYROID", page_document("Thyroid Function Test", "TSH", "2.1")).await;

    let (status, json) = send_json(
        &app.router,
        authed_post_json("/v1/reports", &json!({"patient_id": "p-1", "text": REPORT_TEXT})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "pending");
    let job_id = json["job_id"].as_str().unwrap().to_string();

    let job = wait_for_job(&app.router, &job_id).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress_percent"], 100);
    assert_eq!(job["total_pages"], 3);
    assert_eq!(job["failed_pages"], json!([]));

    let (status, json) = send_json(&app.router, authed_get("/v1/patients/p-1")).await;
    assert_eq!(status, StatusCode::OK);
    let record = &json["record"];
    assert_eq!(record["Patient"]["Name"], "Jane Roe");
    assert_eq!(record["Patient"]["Lab ID"], "p-1");

    let categories: Vec<&str> = record["Reports"][0]["Lab Results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["Test Category"].as_str().unwrap())
        .collect();
    assert_eq!(
        categories,
        vec!["Complete Blood Count", "Lipid Profile", "Thyroid Function Test"]
    );
}

#[tokio::test]
async fn failed_page_is_reported_on_completed_job() {
    let app = setup_test_app().await;
    mock_page(&app.oracle, "MARKER-CBC", page_document("Complete Blood Count", "WBC", "7.0")).await;
    mock_failing_page(&app.oracle, "MARKER-LIPID").await;
    mock_page(&app.oracle, "MARKER-THYROID", page_document("Thyroid Function Test", "TSH", "2.1")).await;

    let (_, json) = send_json(
        &app.router,
        authed_post_json("/v1/reports", &json!({"patient_id": "p-2", "text": REPORT_TEXT})),
    )
    .await;
    let job = wait_for_job(&app.router, json["job_id"].as_str().unwrap()).await;

    assert_eq!(job["status"], "completed");
    assert_eq!(job["failed_pages"], json!([2]));

    let stored = app.store.get_patient("p-2").await.unwrap().unwrap();
    assert_eq!(stored.reports[0].lab_results.len(), 2);
}

#[tokio::test]
async fn job_fails_when_no_page_extracts() {
    let app = setup_test_app().await;
    mock_failing_page(&app.oracle, "MARKER").await;

    let (_, json) = send_json(
        &app.router,
        authed_post_json("/v1/reports", &json!({"patient_id": "p-3", "text": REPORT_TEXT})),
    )
    .await;
    let job = wait_for_job(&app.router, json["job_id"].as_str().unwrap()).await;

    assert_eq!(job["status"], "failed");
    assert_eq!(job["failed_pages"], json!([1, 2, 3]));
    assert!(job["error_message"].as_str().unwrap().contains("3 page(s)"));

    let (status, _) = send(&app.router, authed_get("/v1/patients/p-3")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_patient_id_returns_400() {
    let app = setup_test_app().await;

    let (status, json) = send_json(
        &app.router,
        authed_post_json("/v1/reports", &json!({"patient_id": "  ", "text": REPORT_TEXT})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn blank_text_returns_400() {
    let app = setup_test_app().await;

    let (status, _) = send(
        &app.router,
        authed_post_json("/v1/reports", &json!({"patient_id": "p-1", "text": "\n  \n"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.state.registry.list().is_empty());
}

#[tokio::test]
async fn unknown_job_returns_404() {
    let app = setup_test_app().await;

    let (status, json) = send_json(
        &app.router,
        authed_get("/v1/jobs/00000000-0000-0000-0000-000000000000"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn list_jobs_filters_by_status() {
    let app = setup_test_app().await;
    let pending = app.state.registry.create("p-1");
    let done = app.state.registry.create("p-2");
    app.state.registry.mark_running(done.id, 1);
    app.state.registry.complete(done.id, vec![]);

    let (status, json) = send_json(&app.router, authed_get("/v1/jobs?status=pending")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["jobs"][0]["id"], pending.id.to_string());

    let (status, _) = send(&app.router, authed_get("/v1/jobs?status=bogus")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_patients_returns_summaries() {
    let app = setup_test_app().await;
    seed_patient(&app.store, "p-9", seeded_report()).await;

    let (status, json) = send_json(&app.router, authed_get("/v1/patients")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["patients"][0]["patient_id"], "p-9");
    assert_eq!(json["patients"][0]["name"], "John Doe");
    assert_eq!(json["patients"][0]["report_count"], 1);
}

#[tokio::test]
async fn trends_for_seeded_patient() {
    let app = setup_test_app().await;
    seed_patient(&app.store, "p-9", seeded_report()).await;

    let (status, json) = send_json(&app.router, authed_get("/v1/patients/p-9/trends")).await;

    assert_eq!(status, StatusCode::OK);
    let trends = json["trends"].as_array().unwrap();
    assert_eq!(trends.len(), 1);
    assert_eq!(trends[0]["test"], "Hemoglobin");
    assert_eq!(trends[0]["points"][0]["value"], 12.1);
    assert_eq!(trends[0]["points"][0]["in_range"], false);
}

#[tokio::test]
async fn unknown_patient_trends_returns_404() {
    let app = setup_test_app().await;

    let (status, _) = send(&app.router, authed_get("/v1/patients/nobody/trends")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analysis_returns_markdown() {
    let app = setup_test_app().await;
    seed_patient(&app.store, "p-9", seeded_report()).await;
    mock_analysis(&app.oracle, "- Hemoglobin is below range.\n- Recheck in 3 months.").await;

    let (status, json) = send_json(&app.router, authed_get("/v1/patients/p-9/analysis")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["patient_id"], "p-9");
    assert_eq!(
        json["analysis"],
        "- Hemoglobin is below range.\n- Recheck in 3 months."
    );
}

#[tokio::test]
async fn analysis_error_is_returned_as_text() {
    let app = setup_test_app().await;
    seed_patient(&app.store, "p-9", seeded_report()).await;
    mock_failing_page(&app.oracle, "medical data analyst").await;

    let (status, json) = send_json(&app.router, authed_get("/v1/patients/p-9/analysis")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(
        json["analysis"]
            .as_str()
            .unwrap()
            .starts_with("Error generating analysis:")
    );
}

#[tokio::test]
async fn analysis_stream_sends_one_event_per_line() {
    let app = setup_test_app().await;
    seed_patient(&app.store, "p-9", seeded_report()).await;
    mock_analysis(&app.oracle, "- First point\n- Second point").await;

    let (status, body) = send(&app.router, authed_get("/v1/patients/p-9/analysis/stream")).await;

    assert_eq!(status, StatusCode::OK);
    let body = String::from_utf8(body).unwrap();
    assert!(body.contains("data: - First point\n\n"));
    assert!(body.contains("data: - Second point\n\n"));
}
