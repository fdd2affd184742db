use std::time::Duration;

use bloodwork_core::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use bloodwork_core::error::AppError;
use bloodwork_core::models::CompletionRequest;
use bloodwork_core::traits::CompletionClient;
use reqwest::Client;
use serde::Deserialize;

/// Cohere chat client.
///
/// Holds no credential of its own: every call carries the key leased for it,
/// so one client (and one connection pool) serves the whole key rotation.
#[derive(Clone)]
pub struct CohereClient {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl CohereClient {
    pub fn with_base_url(base_url: &str) -> Result<Self, AppError> {
        Self::build(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        Self::build(&self.base_url, timeout)
    }

    fn build(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }
}

// ---- Cohere API types ----

#[derive(Deserialize)]
struct ChatResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl CompletionClient for CohereClient {
    async fn complete(&self, api_key: &str, request: &CompletionRequest) -> Result<String, AppError> {
        let url = format!("{}/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            if status_code == 429 {
                tracing::warn!("Chat API rate limited the request");
                return Err(AppError::RateLimitExceeded);
            }

            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status_code, "Chat API returned an error status");
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.message)
                .unwrap_or_else(|_| format!("HTTP {status_code}: {body}"));

            return Err(AppError::LlmError {
                message,
                status_code,
                retryable: status_code >= 500,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse chat response: {e}")))?;

        chat_response.text.ok_or_else(|| AppError::LlmError {
            message: "Chat response carried no text".into(),
            status_code: status.as_u16(),
            retryable: false,
        })
    }
}
