//! Typed view of the lab-report JSON the completion service is asked to emit,
//! and of the aggregated patient record built from it.
//!
//! Field names serialize to the exact keys of the extraction prompt, so a
//! stored record reads the same as raw model output. Every field is lenient
//! on the way in (see [`crate::lenient`]).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lenient;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleDetails {
    #[serde(rename = "Type", default, deserialize_with = "lenient::string_list")]
    pub sample_type: Vec<String>,
    #[serde(
        rename = "Collection DateTime",
        default,
        deserialize_with = "lenient::string"
    )]
    pub collection_datetime: String,
    #[serde(rename = "Receipt DateTime", default, deserialize_with = "lenient::string")]
    pub receipt_datetime: String,
    #[serde(
        rename = "Additional Info",
        default,
        deserialize_with = "lenient::string_list"
    )]
    pub additional_info: Vec<String>,
}

impl SampleDetails {
    pub fn is_empty(&self) -> bool {
        self.sample_type.is_empty()
            && self.collection_datetime.is_empty()
            && self.receipt_datetime.is_empty()
            && self.additional_info.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInformation {
    #[serde(rename = "Name", default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(rename = "Age", default, deserialize_with = "lenient::string")]
    pub age: String,
    #[serde(rename = "Sex", default, deserialize_with = "lenient::string")]
    pub sex: String,
    #[serde(rename = "Lab ID", default, deserialize_with = "lenient::string")]
    pub lab_id: String,
    #[serde(rename = "Sample Details", default, deserialize_with = "lenient::object")]
    pub sample_details: SampleDetails,
}

impl PatientInformation {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.age.is_empty()
            && self.sex.is_empty()
            && self.lab_id.is_empty()
            && self.sample_details.is_empty()
    }
}

/// One measured parameter, e.g. `Hemoglobin = 13.5 g/dL`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubTest {
    #[serde(rename = "Parameter", default, deserialize_with = "lenient::string")]
    pub parameter: String,
    #[serde(rename = "Value", default, deserialize_with = "lenient::string")]
    pub value: String,
    #[serde(rename = "Unit", default, deserialize_with = "lenient::string")]
    pub unit: String,
    #[serde(rename = "Reference Range", default, deserialize_with = "lenient::string")]
    pub reference_range: String,
    #[serde(rename = "Flag", default, deserialize_with = "lenient::string")]
    pub flag: String,
    #[serde(rename = "Method", default, deserialize_with = "lenient::string")]
    pub method: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestComponent {
    #[serde(rename = "Name", default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(rename = "SubTests", default, deserialize_with = "lenient::list")]
    pub sub_tests: Vec<SubTest>,
    #[serde(rename = "Comments", default, deserialize_with = "lenient::string")]
    pub comments: String,
    #[serde(rename = "Interpretation", default, deserialize_with = "lenient::string")]
    pub interpretation: String,
    /// Some reports put a single result directly on the component.
    #[serde(
        rename = "Value",
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "String::is_empty"
    )]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCategory {
    #[serde(rename = "Test Category", default, deserialize_with = "lenient::string")]
    pub category: String,
    #[serde(rename = "Test Components", default, deserialize_with = "lenient::list")]
    pub components: Vec<TestComponent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportNotes {
    #[serde(
        rename = "Interpretations",
        default,
        deserialize_with = "lenient::string_list"
    )]
    pub interpretations: Vec<String>,
    #[serde(rename = "Comments", default, deserialize_with = "lenient::string_list")]
    pub comments: Vec<String>,
    #[serde(rename = "Disclaimers", default, deserialize_with = "lenient::string_list")]
    pub disclaimers: Vec<String>,
    #[serde(
        rename = "Quality Control",
        default,
        deserialize_with = "lenient::string_list"
    )]
    pub quality_control: Vec<String>,
}

impl ReportNotes {
    /// Notes as `(heading, entries)` pairs in their canonical order.
    pub fn sections(&self) -> [(&'static str, &[String]); 4] {
        [
            ("Interpretations", self.interpretations.as_slice()),
            ("Comments", self.comments.as_slice()),
            ("Disclaimers", self.disclaimers.as_slice()),
            ("Quality Control", self.quality_control.as_slice()),
        ]
    }

    pub fn extend(&mut self, other: ReportNotes) {
        self.interpretations.extend(other.interpretations);
        self.comments.extend(other.comments);
        self.disclaimers.extend(other.disclaimers);
        self.quality_control.extend(other.quality_control);
    }
}

/// Structured data extracted from a single page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageDocument {
    #[serde(
        rename = "Patient Information",
        default,
        deserialize_with = "lenient::object"
    )]
    pub patient_information: PatientInformation,
    #[serde(rename = "Tests", default, deserialize_with = "lenient::list")]
    pub tests: Vec<TestCategory>,
    #[serde(rename = "Report Notes", default, deserialize_with = "lenient::object")]
    pub report_notes: ReportNotes,
}

/// One uploaded report, aggregated across all of its pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EhrReport {
    #[serde(rename = "Patient", default)]
    pub patient: PatientInformation,
    #[serde(rename = "Lab Results", default)]
    pub lab_results: Vec<TestCategory>,
    #[serde(rename = "Report Notes", default)]
    pub report_notes: ReportNotes,
    #[serde(rename = "Report Generated On")]
    pub generated_on: DateTime<Utc>,
}

/// Longitudinal record for one patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Basic info from the most recently merged report.
    #[serde(rename = "Patient", default)]
    pub patient: PatientInformation,
    #[serde(rename = "Reports", default)]
    pub reports: Vec<EhrReport>,
}

/// The whole persisted record set, keyed by patient id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EhrDatabase {
    #[serde(default)]
    pub patients: BTreeMap<String, PatientRecord>,
}

/// Listing entry for a stored patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSummary {
    pub patient_id: String,
    pub name: String,
    pub report_count: usize,
    pub last_report_on: Option<DateTime<Utc>>,
}

impl PatientSummary {
    pub fn from_record(patient_id: &str, record: &PatientRecord) -> Self {
        Self {
            patient_id: patient_id.to_string(),
            name: record.patient.name.clone(),
            report_count: record.reports.len(),
            last_report_on: record.reports.iter().map(|r| r.generated_on).max(),
        }
    }
}
