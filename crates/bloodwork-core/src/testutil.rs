//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ehr::merge_report;
use crate::error::AppError;
use crate::models::{CompletionRequest, PageText};
use crate::schema::{EhrDatabase, EhrReport, PatientRecord, PatientSummary};
use crate::traits::{CompletionClient, EhrStore, PageExtractor};

// ---------------------------------------------------------------------------
// MockCompletionClient
// ---------------------------------------------------------------------------

/// Recorded call: (api_key, request).
pub type CompletionCall = (String, CompletionRequest);

/// Mock completion client with a queue of scripted responses.
#[derive(Clone)]
pub struct MockCompletionClient {
    /// Each call pops the first element; once empty, `fallback` is returned.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    fallback: String,
    pub calls: Arc<Mutex<Vec<CompletionCall>>>,
}

impl MockCompletionClient {
    /// Always answers with `text`.
    pub fn new(text: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            fallback: text.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            fallback: "{\"Tests\": []}".to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl CompletionClient for MockCompletionClient {
    async fn complete(&self, api_key: &str, request: &CompletionRequest) -> Result<String, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((api_key.to_string(), request.clone()));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.fallback.clone())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockPageExtractor
// ---------------------------------------------------------------------------

/// Mock page extractor with per-page scripts.
///
/// Unscripted pages succeed with `{"page": n, "content": "<page text>"}`.
#[derive(Clone, Default)]
pub struct MockPageExtractor {
    scripts: Arc<Mutex<HashMap<usize, Vec<Result<serde_json::Value, AppError>>>>>,
    always_fail: Arc<Mutex<HashSet<usize>>>,
    delays: Arc<Mutex<HashMap<usize, Duration>>>,
    attempts: Arc<Mutex<HashMap<usize, u32>>>,
}

impl MockPageExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses for `page`, consumed in order; later attempts succeed.
    pub fn with_script(
        self,
        page: usize,
        responses: Vec<Result<serde_json::Value, AppError>>,
    ) -> Self {
        self.scripts.lock().unwrap().insert(page, responses);
        self
    }

    /// Every attempt for `page` fails.
    pub fn failing_page(self, page: usize) -> Self {
        self.always_fail.lock().unwrap().insert(page);
        self
    }

    /// Delay each attempt for `page`, to force a completion order.
    pub fn with_delay(self, page: usize, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(page, delay);
        self
    }

    pub fn attempts_for(&self, page: usize) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(&page)
            .copied()
            .unwrap_or(0)
    }

    pub fn success_value(page: &PageText) -> serde_json::Value {
        serde_json::json!({"page": page.page_number, "content": page.content})
    }
}

impl PageExtractor for MockPageExtractor {
    async fn extract_page(&self, page: &PageText) -> Result<serde_json::Value, AppError> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(page.page_number)
            .or_insert(0) += 1;

        let delay = self.delays.lock().unwrap().get(&page.page_number).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.always_fail.lock().unwrap().contains(&page.page_number) {
            return Err(AppError::NetworkError("connection reset".into()));
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&page.page_number)
            .filter(|responses| !responses.is_empty())
            .map(|responses| responses.remove(0));

        scripted.unwrap_or_else(|| Ok(Self::success_value(page)))
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory patient store that can be told to fail on write.
#[derive(Clone, Default)]
pub struct MockStore {
    pub db: Arc<Mutex<EhrDatabase>>,
    merge_error: Arc<Mutex<Option<AppError>>>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_merge_error(error: AppError) -> Self {
        Self {
            db: Arc::new(Mutex::new(EhrDatabase::default())),
            merge_error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl EhrStore for MockStore {
    async fn merge_report(
        &self,
        patient_id: &str,
        report: EhrReport,
    ) -> Result<PatientRecord, AppError> {
        if let Some(e) = self.merge_error.lock().unwrap().take() {
            return Err(e);
        }
        let mut db = self.db.lock().unwrap();
        Ok(merge_report(&mut db, patient_id, report).clone())
    }

    async fn get_patient(&self, patient_id: &str) -> Result<Option<PatientRecord>, AppError> {
        Ok(self.db.lock().unwrap().patients.get(patient_id).cloned())
    }

    async fn list_patients(&self) -> Result<Vec<PatientSummary>, AppError> {
        Ok(self
            .db
            .lock()
            .unwrap()
            .patients
            .iter()
            .map(|(id, record)| PatientSummary::from_record(id, record))
            .collect())
    }
}
