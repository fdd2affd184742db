//! In-process registry of report jobs.
//!
//! The registry is constructed by the service layer and handed to whoever
//! needs it; there is no process-wide instance. All methods are synchronous
//! so they can be called from the scheduler's progress callback.
//!
//! Finished jobs are kept for a retention window and pruned when new jobs
//! are created, so a long-running server does not accumulate them forever.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use crate::job::{JobStatus, ProgressState, ReportJob};

/// How long a completed or failed job stays visible.
pub const DEFAULT_JOB_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, ReportJob>>>,
    retention: TimeDelta,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_JOB_RETENTION)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retention: TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, ReportJob>> {
        self.jobs.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned job registry lock");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, ReportJob>> {
        self.jobs.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned job registry lock");
            poisoned.into_inner()
        })
    }

    /// Register a new pending job and return a copy of it. Finished jobs
    /// past the retention window are dropped first.
    pub fn create(&self, patient_id: &str) -> ReportJob {
        let job = ReportJob::new(patient_id);
        let mut jobs = self.write();

        if let Some(cutoff) = Utc::now().checked_sub_signed(self.retention) {
            let before = jobs.len();
            jobs.retain(|_, existing| {
                !(existing.status.is_terminal()
                    && existing.completed_at.is_some_and(|done| done <= cutoff))
            });
            let pruned = before - jobs.len();
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned expired jobs");
            }
        }

        jobs.insert(job.id, job.clone());
        drop(jobs);
        tracing::info!(job_id = %job.id, %patient_id, "Job created");
        job
    }

    pub fn get(&self, job_id: Uuid) -> Option<ReportJob> {
        self.read().get(&job_id).cloned()
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<ReportJob> {
        let mut jobs: Vec<ReportJob> = self.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    fn update(&self, job_id: Uuid, apply: impl FnOnce(&mut ReportJob)) -> bool {
        match self.write().get_mut(&job_id) {
            Some(job) => {
                apply(job);
                job.updated_at = Utc::now();
                true
            }
            None => {
                tracing::warn!(%job_id, "Update for unknown job ignored");
                false
            }
        }
    }

    pub fn mark_running(&self, job_id: Uuid, total_pages: usize) -> bool {
        self.update(job_id, |job| {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
            job.progress = ProgressState {
                completed: 0,
                total: total_pages,
            };
        })
    }

    pub fn update_progress(&self, job_id: Uuid, completed: usize, total: usize) -> bool {
        self.update(job_id, |job| {
            job.progress = ProgressState { completed, total };
        })
    }

    /// Mark the job completed. Failed pages are recorded but do not fail the
    /// job.
    pub fn complete(&self, job_id: Uuid, failed_pages: Vec<usize>) -> bool {
        self.update(job_id, |job| {
            job.status = JobStatus::Completed;
            job.progress.completed = job.progress.total;
            job.failed_pages = failed_pages;
            job.completed_at = Some(Utc::now());
        })
    }

    pub fn fail(&self, job_id: Uuid, error: &str, failed_pages: Vec<usize>) -> bool {
        self.update(job_id, |job| {
            job.status = JobStatus::Failed;
            job.error_message = Some(error.to_string());
            job.failed_pages = failed_pages;
            job.completed_at = Some(Utc::now());
        })
    }
}
