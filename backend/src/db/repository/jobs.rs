//! ScheduleJob persistence.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{JobId, JobLogEntry, JobStatus, ScheduleJob};

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// # Errors
    /// `ConflictError` if a job with the same id exists.
    async fn create_job(&self, job: &ScheduleJob) -> RepositoryResult<()>;

    async fn get_job(&self, id: JobId) -> RepositoryResult<ScheduleJob>;

    /// All jobs, newest first.
    async fn list_jobs(&self) -> RepositoryResult<Vec<ScheduleJob>>;

    /// Replace the stored job with `job`.
    ///
    /// The stored log stream is kept as is; logs only grow through [`append_logs`](Self::append_logs).
    async fn update_job(&self, job: &ScheduleJob) -> RepositoryResult<()>;

    /// Move a job from `from` to `to`, only if its stored status is still `from`.
    ///
    /// Returns the updated job, logs included.
    ///
    /// # Errors
    /// - `ConflictError` when the stored status is not `from`;
    /// - `ValidationError` when `from -> to` is not a job state transition.
    async fn transition_job(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    ) -> RepositoryResult<ScheduleJob>;

    async fn delete_job(&self, id: JobId) -> RepositoryResult<()>;

    async fn append_logs(&self, id: JobId, entries: &[JobLogEntry]) -> RepositoryResult<()>;
}
