pub mod analysis;
pub mod config;
pub mod ehr;
pub mod error;
pub mod extractor;
pub mod job;
pub mod keys;
pub mod lenient;
pub mod models;
pub mod pages;
pub mod processor;
pub mod prompt;
pub mod recover;
pub mod registry;
pub mod report;
pub mod scheduler;
pub mod schema;
#[cfg(test)]
pub mod testutil;
pub mod traits;
pub mod trends;

pub use analysis::PatientAnalyzer;
pub use config::PipelineConfig;
pub use error::AppError;
pub use extractor::{ExtractionSettings, StructuredExtractor};
pub use job::{JobStatus, ProgressState, ReportJob};
pub use keys::{KeyManager, KeyQuota, Lease};
pub use models::{CompletionRequest, ExtractionOutput, PageText};
pub use pages::split_pages;
pub use processor::{PageProcessor, RetryConfig};
pub use registry::JobRegistry;
pub use report::{ReportOutcome, ReportService};
pub use scheduler::ExtractionScheduler;
pub use schema::{EhrDatabase, EhrReport, PatientRecord, PatientSummary};
pub use traits::{CompletionClient, EhrStore, PageExtractor};
pub use trends::{TrendSeries, lab_trends};
