use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bloodwork_core::ehr::merge_report;
use bloodwork_core::error::AppError;
use bloodwork_core::schema::{EhrDatabase, EhrReport, PatientRecord, PatientSummary};
use bloodwork_core::traits::EhrStore;
use tokio::sync::Mutex;

use crate::config::StoreConfig;

/// Patient records kept in a single JSON document on disk.
///
/// Every operation reads the file afresh, so edits made by another process
/// between calls are picked up. Writes from this process are serialized and
/// replace the file atomically via a temporary sibling and a rename.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole database. A missing file is an empty database.
    pub async fn load(&self) -> Result<EhrDatabase, AppError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No database file yet");
                return Ok(EhrDatabase::default());
            }
            Err(e) => {
                return Err(AppError::StoreError(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::StoreError(format!("Corrupt database {}: {e}", self.path.display()))
        })
    }

    async fn save(&self, db: &EhrDatabase) -> Result<(), AppError> {
        let json = serde_json::to_vec_pretty(db)?;
        let tmp = self.path.with_extension("json.tmp");

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::StoreError(format!("Failed to create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| AppError::StoreError(format!("Failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AppError::StoreError(format!("Failed to replace {}: {e}", self.path.display()))
        })
    }
}

impl EhrStore for JsonFileStore {
    async fn merge_report(
        &self,
        patient_id: &str,
        report: EhrReport,
    ) -> Result<PatientRecord, AppError> {
        let _guard = self.write_lock.lock().await;

        let mut db = self.load().await?;
        let record = merge_report(&mut db, patient_id, report).clone();
        self.save(&db).await?;

        tracing::info!(
            %patient_id,
            path = %self.path.display(),
            "Saved patient record"
        );
        Ok(record)
    }

    async fn get_patient(&self, patient_id: &str) -> Result<Option<PatientRecord>, AppError> {
        Ok(self.load().await?.patients.remove(patient_id))
    }

    async fn list_patients(&self) -> Result<Vec<PatientSummary>, AppError> {
        Ok(self
            .load()
            .await?
            .patients
            .iter()
            .map(|(id, record)| PatientSummary::from_record(id, record))
            .collect())
    }
}
