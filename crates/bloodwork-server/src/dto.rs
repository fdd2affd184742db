use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bloodwork_core::job::ReportJob;
use bloodwork_core::schema::PatientSummary;
use bloodwork_core::trends::TrendSeries;

// ---------------------------------------------------------------------------
// Reports & jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateReportRequest {
    /// Identity the report is filed under; overrides any lab id in the text.
    pub patient_id: String,
    /// Page-delimited report text (`--- Page N ---` markers).
    pub text: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreateReportResponse {
    pub job_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct JobResponse {
    pub id: Uuid,
    pub patient_id: String,
    pub status: String,
    pub progress_percent: u8,
    pub completed_pages: usize,
    pub total_pages: usize,
    pub failed_pages: Vec<usize>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<ReportJob> for JobResponse {
    fn from(job: ReportJob) -> Self {
        Self {
            id: job.id,
            patient_id: job.patient_id,
            status: job.status.to_string(),
            progress_percent: job.progress.percent(),
            completed_pages: job.progress.completed,
            total_pages: job.progress.total,
            failed_pages: job.failed_pages,
            created_at: job.created_at,
            updated_at: job.updated_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error_message: job.error_message,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Patients
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PatientSummaryResponse {
    pub patient_id: String,
    pub name: String,
    pub report_count: usize,
    pub last_report_on: Option<DateTime<Utc>>,
}

impl From<PatientSummary> for PatientSummaryResponse {
    fn from(s: PatientSummary) -> Self {
        Self {
            patient_id: s.patient_id,
            name: s.name,
            report_count: s.report_count,
            last_report_on: s.last_report_on,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PatientListResponse {
    pub patients: Vec<PatientSummaryResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PatientResponse {
    pub patient_id: String,
    /// Stored record: `{"Patient": {...}, "Reports": [...]}`.
    pub record: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TrendPointResponse {
    pub date: DateTime<Utc>,
    pub value: f64,
    pub in_range: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TrendSeriesResponse {
    pub category: String,
    pub test: String,
    pub range_low: f64,
    pub range_high: f64,
    pub points: Vec<TrendPointResponse>,
}

impl From<TrendSeries> for TrendSeriesResponse {
    fn from(s: TrendSeries) -> Self {
        Self {
            category: s.category,
            test: s.test,
            range_low: s.range.low,
            range_high: s.range.high,
            points: s
                .points
                .into_iter()
                .map(|p| TrendPointResponse {
                    date: p.date,
                    value: p.value,
                    in_range: p.in_range,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TrendsResponse {
    pub patient_id: String,
    pub trends: Vec<TrendSeriesResponse>,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AnalysisResponse {
    pub patient_id: String,
    /// Markdown text.
    pub analysis: String,
}

// ---------------------------------------------------------------------------
// Health & errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
