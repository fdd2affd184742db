use std::path::PathBuf;

use bloodwork_core::AppError;

pub const DEFAULT_DB_PATH: &str = "ehr_database.json";

/// Location of the patient record file.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl StoreConfig {
    /// Read configuration from environment variables.
    ///
    /// - `BLOODWORK_EHR_DB` (optional, defaults to `ehr_database.json`)
    pub fn from_env() -> Result<Self, AppError> {
        let path = match std::env::var("BLOODWORK_EHR_DB") {
            Err(_) => PathBuf::from(DEFAULT_DB_PATH),
            Ok(raw) if raw.trim().is_empty() => {
                return Err(AppError::ConfigError(
                    "BLOODWORK_EHR_DB is set but empty".into(),
                ));
            }
            Ok(raw) => PathBuf::from(raw.trim()),
        };

        Ok(Self { path })
    }
}
