//! Job log stream.
//!
//! Every stage a run or a finalize goes through is appended to the job's
//! persisted log and mirrored as a [`JobEvent::Progress`] for live listeners.

use std::sync::Arc;

use super::events::{EventBus, JobEvent};
use crate::db::{FullRepository, RepositoryResult};
use crate::models::{JobId, JobLogEntry, JobStage};

#[derive(Clone)]
pub struct JobTracker {
    repo: Arc<dyn FullRepository>,
    events: EventBus,
}

impl JobTracker {
    pub fn new(repo: Arc<dyn FullRepository>, events: EventBus) -> Self {
        Self { repo, events }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Append an informational entry.
    pub async fn log(&self, job: JobId, stage: JobStage, message: impl Into<String>) -> RepositoryResult<()> {
        let message = message.into();
        log::info!("[Job {}][{:?}] {}", job.short(), stage, message);
        self.append(job, JobLogEntry::new(stage, message, false)).await
    }

    /// Append an entry flagged as an error without failing the job.
    pub async fn warn(&self, job: JobId, stage: JobStage, message: impl Into<String>) -> RepositoryResult<()> {
        let message = message.into();
        log::warn!("[Job {}][{:?}] {}", job.short(), stage, message);
        self.append(job, JobLogEntry::new(stage, message, true)).await
    }

    /// Append several entries at once, e.g. progress collected during a synchronous pass.
    pub async fn log_batch(&self, job: JobId, entries: Vec<JobLogEntry>) -> RepositoryResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.repo.append_logs(job, &entries).await?;
        for entry in entries {
            self.events.publish(JobEvent::Progress {
                job_id: job,
                stage: entry.stage,
                message: entry.message,
            });
        }
        Ok(())
    }

    /// Record a system error and announce it.
    ///
    /// The event goes out even if the log entry cannot be stored.
    pub async fn fail(&self, job: JobId, error: impl Into<String>) -> RepositoryResult<()> {
        let error = error.into();
        log::error!("[Job {}] {}", job.short(), error);
        let stored = self
            .repo
            .append_logs(job, &[JobLogEntry::new(JobStage::Error, error.clone(), true)])
            .await;
        self.events.publish(JobEvent::Failed { job_id: job, error });
        stored
    }

    pub async fn get_logs(&self, job: JobId) -> RepositoryResult<Vec<JobLogEntry>> {
        Ok(self.repo.get_job(job).await?.logs)
    }

    async fn append(&self, job: JobId, entry: JobLogEntry) -> RepositoryResult<()> {
        self.repo.append_logs(job, std::slice::from_ref(&entry)).await?;
        self.events.publish(JobEvent::Progress {
            job_id: job,
            stage: entry.stage,
            message: entry.message,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{JobRepository, LocalRepository};
    use crate::models::{ScheduleJob, ScheduleParams};
    use chrono::NaiveDate;

    async fn setup() -> (JobTracker, JobId) {
        let repo = Arc::new(LocalRepository::new());
        let job = ScheduleJob::new(
            JobId::generate(),
            ScheduleParams {
                intake_start_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
                intake_end_date: NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
                success_threshold: 0.8,
                class_start_anchor: None,
            },
        );
        repo.create_job(&job).await.unwrap();
        (JobTracker::new(repo, EventBus::default()), job.id)
    }

    #[tokio::test]
    async fn test_log_persists_and_publishes() {
        let (tracker, job) = setup().await;
        let mut rx = tracker.events().subscribe();
        tracker.log(job, JobStage::Load, "loading").await.unwrap();
        tracker.warn(job, JobStage::DraftReady, "low rate").await.unwrap();

        let logs = tracker.get_logs(job).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(!logs[0].is_error);
        assert!(logs[1].is_error);
        assert!(matches!(
            rx.recv().await.unwrap(),
            JobEvent::Progress { stage: JobStage::Load, .. }
        ));
    }

    #[tokio::test]
    async fn test_fail_publishes_even_for_unknown_job() {
        let (tracker, _) = setup().await;
        let mut rx = tracker.events().subscribe();
        let ghost = JobId::generate();
        assert!(tracker.fail(ghost, "boom").await.is_err());
        assert_eq!(
            rx.recv().await.unwrap(),
            JobEvent::Failed {
                job_id: ghost,
                error: "boom".into()
            }
        );
    }
}
