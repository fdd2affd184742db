use std::future::Future;

use crate::error::AppError;
use crate::models::{CompletionRequest, PageText};
use crate::schema::{EhrReport, PatientRecord, PatientSummary};

/// Text-completion service used for both extraction and analysis.
///
/// The credential is supplied per call so that a single client can serve
/// every key in the rotation pool.
pub trait CompletionClient: Send + Sync + Clone {
    /// Sends one request under `api_key` and returns the raw completion text.
    fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns one page of report text into structured JSON.
pub trait PageExtractor: Send + Sync + Clone {
    fn extract_page(
        &self,
        page: &PageText,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;
}

/// Persists longitudinal patient records.
pub trait EhrStore: Send + Sync + Clone {
    /// Merge a newly aggregated report into the record for `patient_id`,
    /// creating the record if needed. Returns the updated record.
    fn merge_report(
        &self,
        patient_id: &str,
        report: EhrReport,
    ) -> impl Future<Output = Result<PatientRecord, AppError>> + Send;

    fn get_patient(
        &self,
        patient_id: &str,
    ) -> impl Future<Output = Result<Option<PatientRecord>, AppError>> + Send;

    /// All stored patients, ordered by patient id.
    fn list_patients(&self) -> impl Future<Output = Result<Vec<PatientSummary>, AppError>> + Send;
}
