//! Aggregation of per-page extraction output into patient records.

use chrono::{DateTime, Utc};

use crate::schema::{EhrDatabase, EhrReport, PageDocument, PatientRecord, ReportNotes};

/// Build one report from the ordered page documents of a single upload.
///
/// Patient information comes from the first page that carries any; test
/// categories and notes are concatenated in page order. Pages that are not
/// JSON objects are skipped. Returns `None` when there is nothing to build
/// from.
pub fn generate_ehr(pages: &[serde_json::Value], generated_on: DateTime<Utc>) -> Option<EhrReport> {
    if pages.is_empty() {
        tracing::warn!("No structured data to build a report from");
        return None;
    }

    let documents: Vec<PageDocument> = pages
        .iter()
        .enumerate()
        .filter_map(|(idx, page)| match serde_json::from_value(page.clone()) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!(position = idx, error = %e, "Skipping unreadable page document");
                None
            }
        })
        .collect();

    if documents.is_empty() {
        return None;
    }

    let patient = documents
        .iter()
        .map(|doc| &doc.patient_information)
        .find(|info| !info.is_empty())
        .cloned()
        .unwrap_or_default();

    let mut lab_results = Vec::new();
    let mut report_notes = ReportNotes::default();
    for doc in documents {
        lab_results.extend(doc.tests);
        report_notes.extend(doc.report_notes);
    }

    Some(EhrReport {
        patient,
        lab_results,
        report_notes,
        generated_on,
    })
}

/// Merge `report` into the record for `patient_id`.
///
/// The report's lab id is overwritten with `patient_id`, which is the
/// identity the caller vouches for. An existing patient gets the report
/// appended and their basic info replaced by this report's.
pub fn merge_report<'a>(
    db: &'a mut EhrDatabase,
    patient_id: &str,
    mut report: EhrReport,
) -> &'a PatientRecord {
    report.patient.lab_id = patient_id.to_string();

    let record = db
        .patients
        .entry(patient_id.to_string())
        .or_insert_with(PatientRecord::default);
    record.patient = report.patient.clone();
    record.reports.push(report);

    tracing::info!(
        %patient_id,
        reports = record.reports.len(),
        "Merged report into patient record"
    );
    record
}
