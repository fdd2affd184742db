//! Free-form analysis of a patient's full record.
//!
//! A single completion call, not part of the page pipeline. Failures are
//! folded into the returned text so callers can always show something.

use std::fmt::Write;

use chrono::SecondsFormat;

use crate::keys::KeyManager;
use crate::models::CompletionRequest;
use crate::prompt::combine;
use crate::schema::PatientRecord;
use crate::traits::CompletionClient;

pub const ANALYSIS_MAX_TOKENS: u32 = 300;
pub const ANALYSIS_TEMPERATURE: f32 = 0.2;
pub const EMPTY_ANALYSIS: &str = "No analysis could be generated.";

/// Render every report in `record` as a Markdown digest.
pub fn render_lab_summary(record: &PatientRecord) -> String {
    if record.reports.is_empty() {
        return "No reports available.".to_string();
    }

    let mut out = String::new();
    for report in &record.reports {
        let date = report.generated_on.to_rfc3339_opts(SecondsFormat::Secs, true);
        let _ = writeln!(out, "**Report Date:** {date}\n");

        for category in &report.lab_results {
            let _ = writeln!(out, "- **Test Category:** {}", category.category);
            for component in &category.components {
                let _ = write!(out, "  - **{}:** ", component.name);
                if component.sub_tests.is_empty() {
                    out.push_str("No subtests available.\n");
                    continue;
                }
                let details: Vec<String> = component
                    .sub_tests
                    .iter()
                    .map(|sub| {
                        format!(
                            "{} = {} {} (Ref: {})",
                            sub.parameter, sub.value, sub.unit, sub.reference_range
                        )
                    })
                    .collect();
                let _ = writeln!(out, "{}", details.join("; "));
            }
        }

        for (heading, entries) in report.report_notes.sections() {
            if !entries.is_empty() {
                let _ = writeln!(out, "- **{heading}:** {}", entries.join("; "));
            }
        }
        out.push('\n');
    }
    out
}

/// Analyst instruction wrapping the rendered patient data.
pub fn analysis_prompt(summary: &str) -> String {
    format!(
        "You are a highly experienced medical data analyst. Based on the following aggregated patient lab report data in Markdown, provide a concise, bullet-point analysis.\n\
         Your analysis should include:\n\
         - Summary of trends across the reports.\n\
         - Identification of abnormal values or anomalies.\n\
         - Diagnostic insights and recommendations.\n\
         Keep your analysis under 250 words. Format your response in Markdown.\n\n\
         Patient Data:\n{summary}\n"
    )
}

/// Split an analysis into the lines sent as individual stream events.
pub fn analysis_lines(analysis: &str) -> Vec<String> {
    analysis.lines().map(str::to_string).collect()
}

/// Produces Markdown analysis for a patient using a leased key.
#[derive(Clone)]
pub struct PatientAnalyzer<C: CompletionClient> {
    client: C,
    keys: KeyManager,
    model: String,
}

impl<C: CompletionClient> PatientAnalyzer<C> {
    pub fn new(client: C, keys: KeyManager, model: impl Into<String>) -> Self {
        Self {
            client,
            keys,
            model: model.into(),
        }
    }

    pub fn build_request(&self, record: &PatientRecord) -> CompletionRequest {
        let prompt = analysis_prompt(&render_lab_summary(record));
        CompletionRequest {
            model: self.model.clone(),
            message: combine(&prompt, "Provide analysis in Markdown."),
            max_tokens: ANALYSIS_MAX_TOKENS,
            temperature: ANALYSIS_TEMPERATURE,
        }
    }

    /// Never fails: errors and empty completions become readable text.
    pub async fn analyze(&self, record: &PatientRecord) -> String {
        let request = self.build_request(record);
        let lease = self.keys.lease().await;

        match self.client.complete(lease.api_key(), &request).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::warn!("Analysis came back empty");
                    EMPTY_ANALYSIS.to_string()
                } else {
                    text.to_string()
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Analysis call failed");
                format!("Error generating analysis: {e}")
            }
        }
    }
}
