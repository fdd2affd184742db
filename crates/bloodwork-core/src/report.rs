use chrono::Utc;
use uuid::Uuid;

use crate::ehr::generate_ehr;
use crate::error::AppError;
use crate::models::{ExtractionOutput, PageText};
use crate::pages::split_pages;
use crate::registry::JobRegistry;
use crate::scheduler::ExtractionScheduler;
use crate::schema::{EhrReport, PatientRecord};
use crate::traits::{EhrStore, PageExtractor};

/// What one upload produced.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ReportOutcome {
    pub report: EhrReport,
    pub failed_pages: Vec<usize>,
    pub total_pages: usize,
}

/// Orchestrates one upload: split → schedule → aggregate → merge.
///
/// Generic over the page extractor and the record store so the whole flow
/// runs against mocks in tests.
#[derive(Clone)]
pub struct ReportService<E, S>
where
    E: PageExtractor,
    S: EhrStore,
{
    scheduler: ExtractionScheduler<E>,
    store: S,
}

impl<E, S> ReportService<E, S>
where
    E: PageExtractor,
    S: EhrStore,
{
    pub fn new(scheduler: ExtractionScheduler<E>, store: S) -> Self {
        Self { scheduler, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run the page pipeline over `raw_text` and aggregate the result,
    /// without touching the store.
    ///
    /// Fails only when the text has no pages or no page could be extracted;
    /// a partial extraction still yields a report.
    pub async fn extract<F>(&self, raw_text: &str, on_progress: F) -> Result<ReportOutcome, AppError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        self.extract_pages(split_pages(raw_text), on_progress).await
    }

    /// Like [`extract`](Self::extract), for text that is already split.
    pub async fn extract_pages<F>(
        &self,
        pages: Vec<PageText>,
        on_progress: F,
    ) -> Result<ReportOutcome, AppError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        if pages.is_empty() {
            return Err(AppError::Generic(
                "Report text contains no pages".into(),
            ));
        }

        let ExtractionOutput {
            documents,
            failed_pages,
            total_pages,
        } = self.scheduler.run(pages, on_progress).await;

        let report = generate_ehr(&documents, Utc::now()).ok_or_else(|| {
            AppError::Generic(format!(
                "No structured data could be extracted from {total_pages} page(s)"
            ))
        })?;

        Ok(ReportOutcome {
            report,
            failed_pages,
            total_pages,
        })
    }

    /// Extract `raw_text` and merge the report into `patient_id`'s record.
    pub async fn ingest<F>(
        &self,
        patient_id: &str,
        raw_text: &str,
        on_progress: F,
    ) -> Result<(ReportOutcome, PatientRecord), AppError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let outcome = self.extract(raw_text, on_progress).await?;
        let record = self.store_outcome(patient_id, &outcome).await?;
        Ok((outcome, record))
    }

    async fn store_outcome(
        &self,
        patient_id: &str,
        outcome: &ReportOutcome,
    ) -> Result<PatientRecord, AppError> {
        let record = self
            .store
            .merge_report(patient_id, outcome.report.clone())
            .await?;

        tracing::info!(
            %patient_id,
            reports = record.reports.len(),
            failed_pages = outcome.failed_pages.len(),
            "Report stored"
        );
        Ok(record)
    }

    /// Run a registered job over `pages` to a terminal state, reporting
    /// progress to `registry` as pages finish.
    ///
    /// An extraction failure marks every page failed; a store failure
    /// leaves the failed-page list empty since every page was read.
    pub async fn process_job(
        &self,
        registry: &JobRegistry,
        job_id: Uuid,
        patient_id: &str,
        pages: Vec<PageText>,
    ) -> Result<ReportOutcome, AppError> {
        let total = pages.len();
        registry.mark_running(job_id, total);
        tracing::info!(%job_id, %patient_id, total, "Processing report job");

        let extracted = self
            .extract_pages(pages, |completed, total| {
                registry.update_progress(job_id, completed, total);
            })
            .await;

        let outcome = match extracted {
            Ok(outcome) => outcome,
            Err(e) => {
                registry.fail(job_id, &e.to_string(), (1..=total).collect());
                tracing::error!(%job_id, error = %e, "Job failed during extraction");
                return Err(e);
            }
        };

        if let Err(e) = self.store_outcome(patient_id, &outcome).await {
            registry.fail(job_id, &e.to_string(), Vec::new());
            tracing::error!(%job_id, error = %e, "Job failed while storing the report");
            return Err(e);
        }

        registry.complete(job_id, outcome.failed_pages.clone());
        tracing::info!(%job_id, failed_pages = ?outcome.failed_pages, "Job completed");
        Ok(outcome)
    }
}
