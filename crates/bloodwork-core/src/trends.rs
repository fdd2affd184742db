//! Per-test value series across a patient's reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::schema::{PatientRecord, TestComponent};

/// Acceptable range for a tracked test, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceRange {
    pub low: f64,
    pub high: f64,
}

impl ReferenceRange {
    pub fn contains(&self, value: f64) -> bool {
        (self.low..=self.high).contains(&value)
    }
}

/// A test followed over time.
#[derive(Debug, Clone, Copy)]
pub struct TrackedTest {
    pub category: &'static str,
    pub name: &'static str,
    pub range: ReferenceRange,
}

const fn tracked(category: &'static str, name: &'static str, low: f64, high: f64) -> TrackedTest {
    TrackedTest {
        category,
        name,
        range: ReferenceRange { low, high },
    }
}

const CBC: &str = "Complete Blood Count";
const URINE: &str = "Urine Routine";
const LFT: &str = "Liver Function Test";
const RFT: &str = "Renal Function Test";
const DIABETIC: &str = "Diabetic Profile";
const THYROID: &str = "Thyroid Function Test";
const LIPID: &str = "Lipid Profile";

/// Tracked tests in display order.
pub const TRACKED_TESTS: &[TrackedTest] = &[
    tracked(CBC, "WBC", 4.0, 11.0),
    tracked(CBC, "RBC", 4.7, 6.1),
    tracked(CBC, "Hemoglobin", 13.8, 17.2),
    tracked(CBC, "Platelets", 150.0, 450.0),
    tracked(URINE, "pH", 4.5, 8.0),
    tracked(URINE, "Protein", 0.0, 0.2),
    tracked(URINE, "Glucose", 0.0, 0.8),
    tracked(LFT, "ALT", 7.0, 56.0),
    tracked(LFT, "AST", 10.0, 40.0),
    tracked(LFT, "Bilirubin", 0.1, 1.2),
    tracked(RFT, "Creatinine", 0.6, 1.2),
    tracked(RFT, "Urea", 7.0, 20.0),
    tracked(RFT, "Electrolytes", 135.0, 145.0),
    tracked(DIABETIC, "Fasting Blood Sugar", 70.0, 100.0),
    tracked(DIABETIC, "Postprandial Blood Sugar", 70.0, 140.0),
    tracked(DIABETIC, "HbA1c", 4.0, 5.6),
    tracked(THYROID, "TSH", 0.4, 4.0),
    tracked(THYROID, "T3", 80.0, 200.0),
    tracked(THYROID, "T4", 4.5, 11.2),
    tracked(LIPID, "Cholesterol", 125.0, 200.0),
    tracked(LIPID, "Triglycerides", 0.0, 150.0),
    tracked(LIPID, "HDL", 40.0, 60.0),
    tracked(LIPID, "LDL", 0.0, 100.0),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: DateTime<Utc>,
    pub value: f64,
    pub in_range: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub category: String,
    pub test: String,
    pub range: ReferenceRange,
    /// Sorted by date, oldest first.
    pub points: Vec<TrendPoint>,
}

fn parse_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Value for `test` in one component: the first sub-test whose parameter
/// contains the test name (case-insensitive) and carries a number, else the
/// component's own value when the component is named for the test.
fn component_value(component: &TestComponent, test_lower: &str) -> Option<f64> {
    let from_sub_test = component
        .sub_tests
        .iter()
        .filter(|sub| sub.parameter.to_lowercase().contains(test_lower))
        .find_map(|sub| parse_value(&sub.value));

    from_sub_test.or_else(|| {
        if component.name.to_lowercase().contains(test_lower) {
            parse_value(&component.value)
        } else {
            None
        }
    })
}

fn series_for(record: &PatientRecord, test: &TrackedTest) -> Vec<TrendPoint> {
    let test_lower = test.name.to_lowercase();
    let mut points = Vec::new();
    for report in &record.reports {
        let components = report
            .lab_results
            .iter()
            .filter(|category| category.category == test.category)
            .flat_map(|category| &category.components);
        for component in components {
            if let Some(value) = component_value(component, &test_lower) {
                points.push(TrendPoint {
                    date: report.generated_on,
                    value,
                    in_range: test.range.contains(value),
                });
            }
        }
    }

    points.sort_by_key(|point| point.date);
    points
}

/// Series for every tracked test that has at least one numeric value in the
/// patient's reports.
pub fn lab_trends(record: &PatientRecord) -> Vec<TrendSeries> {
    TRACKED_TESTS
        .iter()
        .filter_map(|test| {
            let points = series_for(record, test);
            (!points.is_empty()).then(|| TrendSeries {
                category: test.category.to_string(),
                test: test.name.to_string(),
                range: test.range,
                points,
            })
        })
        .collect()
}
