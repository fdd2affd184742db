use crate::error::AppError;
use crate::keys::KeyManager;
use crate::models::{CompletionRequest, PageText};
use crate::prompt::{EXTRACTION_SYSTEM_PROMPT, combine, extraction_user_message};
use crate::recover::recover_json;
use crate::traits::{CompletionClient, PageExtractor};

pub const DEFAULT_MODEL: &str = "command-r";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4000;
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Model parameters for page extraction.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub model: String,
    pub max_tokens: u32,
    /// Kept low so repeated runs over the same page agree.
    pub temperature: f32,
    pub system_prompt: String,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: EXTRACTION_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl ExtractionSettings {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Extracts one page into structured JSON through a leased API key.
///
/// The key is leased when the call is made, not when the page is queued, so
/// a page waiting behind a saturated pool holds no quota.
#[derive(Clone)]
pub struct StructuredExtractor<C: CompletionClient> {
    client: C,
    keys: KeyManager,
    settings: ExtractionSettings,
}

impl<C: CompletionClient> StructuredExtractor<C> {
    pub fn new(client: C, keys: KeyManager, settings: ExtractionSettings) -> Self {
        Self {
            client,
            keys,
            settings,
        }
    }

    fn build_request(&self, page: &PageText) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            message: combine(
                &self.settings.system_prompt,
                &extraction_user_message(&page.content),
            ),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        }
    }
}

impl<C: CompletionClient> PageExtractor for StructuredExtractor<C> {
    async fn extract_page(&self, page: &PageText) -> Result<serde_json::Value, AppError> {
        let lease = self.keys.lease().await;
        let request = self.build_request(page);

        tracing::debug!(page = page.page_number, slot = lease.slot(), "Calling model");

        let text = match self.client.complete(lease.api_key(), &request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(page = page.page_number, error = %e, "Model call failed");
                return Err(e);
            }
        };

        match recover_json(text.trim()) {
            Ok(value) => {
                tracing::info!(page = page.page_number, "Extracted structured data");
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(
                    page = page.page_number,
                    error = %e,
                    "Model response did not contain valid JSON"
                );
                Err(e)
            }
        }
    }
}
