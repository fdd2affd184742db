use bloodwork_client::CohereClient;
use bloodwork_core::{
    AppError, ExtractionScheduler, JobRegistry, PageProcessor, PatientAnalyzer, PipelineConfig,
    ReportService, StructuredExtractor,
};
use bloodwork_store::JsonFileStore;

pub type Extractor = StructuredExtractor<CohereClient>;
pub type Reports = ReportService<Extractor, JsonFileStore>;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub reports: Reports,
    pub analyzer: PatientAnalyzer<CohereClient>,
    pub registry: JobRegistry,
    /// Bearer token required on every `/v1` route.
    pub api_key: String,
}

impl AppState {
    /// Wire the pipeline from configuration. Extraction and analysis share
    /// one key pool, so both count against the same quota.
    pub fn build(
        config: &PipelineConfig,
        store: JsonFileStore,
        api_key: impl Into<String>,
    ) -> Result<Self, AppError> {
        let keys = config.key_manager()?;
        let client = CohereClient::with_base_url(&config.base_url)?
            .with_timeout(config.request_timeout)?;

        let extractor =
            StructuredExtractor::new(client.clone(), keys.clone(), config.extraction_settings());
        let processor = PageProcessor::new(extractor, config.retry.clone());
        let scheduler = ExtractionScheduler::new(processor, keys.len());

        Ok(Self {
            reports: ReportService::new(scheduler, store),
            analyzer: PatientAnalyzer::new(client, keys, config.model.clone()),
            registry: JobRegistry::new(),
            api_key: api_key.into(),
        })
    }
}
