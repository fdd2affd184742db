use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::extractor::{
    DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, ExtractionSettings,
};
use crate::keys::{KeyManager, KeyQuota};
use crate::processor::RetryConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.cohere.ai/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Settings for the extraction pipeline and the completion service.
#[derive(Clone)]
pub struct PipelineConfig {
    pub api_keys: Vec<String>,
    pub model: String,
    pub base_url: String,
    pub quota: KeyQuota,
    pub retry: RetryConfig,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub request_timeout: Duration,
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("quota", &self.quota)
            .field("retry", &self.retry)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl PipelineConfig {
    /// Read configuration from environment variables.
    ///
    /// - `BLOODWORK_API_KEYS` (required, comma-separated)
    /// - `BLOODWORK_MODEL` (default `command-r`)
    /// - `BLOODWORK_BASE_URL` (default `https://api.cohere.ai/v1`)
    /// - `BLOODWORK_KEY_QUOTA` (default 39)
    /// - `BLOODWORK_KEY_WINDOW_SECS` (default 60)
    /// - `BLOODWORK_MAX_ATTEMPTS` (default 3)
    /// - `BLOODWORK_RETRY_DELAY_MS` (default 1000)
    /// - `BLOODWORK_MAX_OUTPUT_TOKENS` (default 4000)
    /// - `BLOODWORK_TEMPERATURE` (default 0.1)
    /// - `BLOODWORK_REQUEST_TIMEOUT_SECS` (default 120)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, AppError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let raw_keys = lookup("BLOODWORK_API_KEYS").ok_or_else(|| {
            AppError::ConfigError(
                "BLOODWORK_API_KEYS not set. Provide one or more comma-separated API keys.".into(),
            )
        })?;
        let api_keys = parse_key_list(&raw_keys);
        if api_keys.is_empty() {
            return Err(AppError::ConfigError(
                "BLOODWORK_API_KEYS contains no keys".into(),
            ));
        }

        let non_empty = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let max_calls: u32 = positive(&lookup, "BLOODWORK_KEY_QUOTA", 39)?;
        let window_secs: u64 = positive(&lookup, "BLOODWORK_KEY_WINDOW_SECS", 60)?;
        let max_attempts: u32 = positive(&lookup, "BLOODWORK_MAX_ATTEMPTS", 3)?;
        let delay_ms: u64 = parsed(&lookup, "BLOODWORK_RETRY_DELAY_MS", 1000)?;
        let max_output_tokens: u32 =
            positive(&lookup, "BLOODWORK_MAX_OUTPUT_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS)?;
        let timeout_secs: u64 =
            positive(&lookup, "BLOODWORK_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;

        let temperature: f32 = parsed(&lookup, "BLOODWORK_TEMPERATURE", DEFAULT_TEMPERATURE)?;
        if !(0.0..=5.0).contains(&temperature) {
            return Err(AppError::ConfigError(format!(
                "BLOODWORK_TEMPERATURE must be between 0 and 5, got {temperature}"
            )));
        }

        Ok(Self {
            api_keys,
            model: non_empty("BLOODWORK_MODEL", DEFAULT_MODEL),
            base_url: non_empty("BLOODWORK_BASE_URL", DEFAULT_BASE_URL),
            quota: KeyQuota {
                max_calls,
                window: Duration::from_secs(window_secs),
            },
            retry: RetryConfig {
                max_attempts,
                delay: Duration::from_millis(delay_ms),
            },
            max_output_tokens,
            temperature,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn key_manager(&self) -> Result<KeyManager, AppError> {
        KeyManager::new(self.api_keys.clone(), self.quota.clone())
    }

    pub fn extraction_settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            max_tokens: self.max_output_tokens,
            temperature: self.temperature,
            ..ExtractionSettings::default()
        }
        .with_model(&self.model)
    }
}

fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

fn parsed<L, T>(lookup: &L, name: &str, default: T) -> Result<T, AppError>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigError(format!("Invalid {name} '{raw}'"))
        }),
    }
}

fn positive<L, T>(lookup: &L, name: &str, default: T) -> Result<T, AppError>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr + PartialEq + Default,
{
    let value = parsed(lookup, name, default)?;
    if value == T::default() {
        return Err(AppError::ConfigError(format!("{name} must be at least 1")));
    }
    Ok(value)
}
