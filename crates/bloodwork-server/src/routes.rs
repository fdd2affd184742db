use std::convert::Infallible;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use futures::Stream;
use serde::Deserialize;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use bloodwork_core::analysis::analysis_lines;
use bloodwork_core::{AppError, EhrStore, JobStatus, PatientRecord, lab_trends, split_pages};

use crate::auth::require_api_key;
use crate::dto::{
    AnalysisResponse, CreateReportRequest, CreateReportResponse, HealthResponse, JobListResponse,
    JobResponse, PatientListResponse, PatientResponse, PatientSummaryResponse, TrendsResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/reports", post(create_report))
        .route("/v1/jobs", get(list_jobs))
        .route("/v1/jobs/{id}", get(get_job))
        .route("/v1/patients", get(list_patients))
        .route("/v1/patients/{id}", get(get_patient))
        .route("/v1/patients/{id}/trends", get(get_trends))
        .route("/v1/patients/{id}/analysis", get(get_analysis))
        .route("/v1/patients/{id}/analysis/stream", get(stream_analysis))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

async fn load_patient(state: &AppState, patient_id: &str) -> Result<PatientRecord, ApiError> {
    state
        .reports
        .store()
        .get_patient(patient_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Patient not found: {patient_id}")).into())
}

// ---------------------------------------------------------------------------
// Reports & jobs
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/reports",
    request_body = CreateReportRequest,
    responses(
        (status = 202, description = "Report accepted for processing", body = CreateReportResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "reports"
)]
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<CreateReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let patient_id = body.patient_id.trim().to_string();
    if patient_id.is_empty() {
        return Err(AppError::InvalidInput("patient_id must not be empty".into()).into());
    }
    let pages = split_pages(&body.text);
    if pages.is_empty() {
        return Err(AppError::InvalidInput("text contains no report pages".into()).into());
    }

    let job = state.registry.create(&patient_id);
    let response = CreateReportResponse {
        job_id: job.id,
        status: job.status.to_string(),
    };

    let worker_state = state.clone();
    tokio::spawn(async move {
        // The outcome is recorded in the registry; the error is already logged.
        let _ = worker_state
            .reports
            .process_job(&worker_state.registry, job.id, &patient_id, pages)
            .await;
    });

    Ok((StatusCode::ACCEPTED, axum::Json(response)))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/v1/jobs",
    params(ListJobsQuery),
    responses(
        (status = 200, description = "List of jobs, newest first", body = JobListResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "jobs"
)]
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListJobsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status_filter: Option<JobStatus> = query
        .status
        .map(|s| s.parse().map_err(AppError::InvalidInput))
        .transpose()?;

    let limit = query.limit.unwrap_or(20).min(100);
    let jobs: Vec<JobResponse> = state
        .registry
        .list()
        .into_iter()
        .filter(|job| status_filter.is_none_or(|status| job.status == status))
        .take(limit)
        .map(JobResponse::from)
        .collect();
    let total = jobs.len();

    Ok(axum::Json(JobListResponse { jobs, total }))
}

#[utoipa::path(
    get,
    path = "/v1/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job status and progress", body = JobResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "jobs"
)]
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .registry
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Job not found: {id}")))?;

    Ok(axum::Json(JobResponse::from(job)))
}

// ---------------------------------------------------------------------------
// Patients
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/patients",
    responses(
        (status = 200, description = "Stored patients", body = PatientListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "patients"
)]
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let patients: Vec<PatientSummaryResponse> = state
        .reports
        .store()
        .list_patients()
        .await?
        .into_iter()
        .map(PatientSummaryResponse::from)
        .collect();
    let total = patients.len();

    Ok(axum::Json(PatientListResponse { patients, total }))
}

#[utoipa::path(
    get,
    path = "/v1/patients/{id}",
    params(
        ("id" = String, Path, description = "Patient ID")
    ),
    responses(
        (status = 200, description = "Full patient record", body = PatientResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "patients"
)]
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = load_patient(&state, &id).await?;
    let record = serde_json::to_value(record).map_err(AppError::from)?;

    Ok(axum::Json(PatientResponse {
        patient_id: id,
        record,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/patients/{id}/trends",
    params(
        ("id" = String, Path, description = "Patient ID")
    ),
    responses(
        (status = 200, description = "Tracked lab values over time", body = TrendsResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "patients"
)]
pub async fn get_trends(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = load_patient(&state, &id).await?;
    let trends = lab_trends(&record).into_iter().map(Into::into).collect();

    Ok(axum::Json(TrendsResponse {
        patient_id: id,
        trends,
    }))
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/patients/{id}/analysis",
    params(
        ("id" = String, Path, description = "Patient ID")
    ),
    responses(
        (status = 200, description = "Markdown analysis of the patient's reports", body = AnalysisResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "analysis"
)]
pub async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = load_patient(&state, &id).await?;
    let analysis = state.analyzer.analyze(&record).await;

    Ok(axum::Json(AnalysisResponse {
        patient_id: id,
        analysis,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/patients/{id}/analysis/stream",
    params(
        ("id" = String, Path, description = "Patient ID")
    ),
    responses(
        (status = 200, description = "Analysis as server-sent events, one line per event", content_type = "text/event-stream", body = String),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "analysis"
)]
pub async fn stream_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let record = load_patient(&state, &id).await?;
    let analysis = state.analyzer.analyze(&record).await;

    // Event data may not carry carriage returns.
    let events = analysis_lines(&analysis)
        .into_iter()
        .map(|line| Ok(Event::default().data(line.replace('\r', ""))));

    Ok(Sse::new(futures::stream::iter(events)))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_status = match state.reports.store().list_patients().await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            "error"
        }
    };

    let (status, label) = if store_status == "ok" {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status,
        axum::Json(HealthResponse {
            status: label,
            store: store_status,
        }),
    )
}
