//! Persisted classes and their dated sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::RepositoryResult;
use crate::models::{
    ClassId, ClassRecord, JobId, NewClass, RoomId, ScheduleJob, SessionId, SessionRecord,
    TeacherId,
};

/// Number of records removed by [`TimetableRepository::delete_job_outputs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletedOutputs {
    pub classes: usize,
    pub sessions: usize,
}

#[async_trait]
pub trait TimetableRepository: Send + Sync {
    /// Every class, canceled ones included.
    async fn list_classes(&self) -> RepositoryResult<Vec<ClassRecord>>;

    /// Sessions whose start falls inside `[from, until)`, any status.
    async fn list_sessions_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> RepositoryResult<Vec<SessionRecord>>;

    async fn find_classes_by_job(&self, job: JobId) -> RepositoryResult<Vec<ClassRecord>>;

    /// Live classes with at least one weekly slot taught by `teacher`.
    async fn classes_for_teacher(&self, teacher: TeacherId) -> RepositoryResult<Vec<ClassRecord>>;

    /// First booking session overlapping `[start, end)` on either the teacher or the room.
    ///
    /// `exclude` skips one session, typically the one being moved.
    async fn find_overlapping_session(
        &self,
        exclude: Option<SessionId>,
        teacher: TeacherId,
        room: RoomId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Option<SessionRecord>>;

    /// Whether any of `classes` has a hold, confirmed or waitlisted enrollment.
    async fn has_live_enrollments(&self, classes: &[ClassId]) -> RepositoryResult<bool>;

    /// Insert all classes and sessions of one job and store the job as `completed`,
    /// as a single unit.
    ///
    /// `job` is the `completed` record that replaces the stored `finalizing` one;
    /// the stored logs are kept. Nothing is written unless every check passes:
    /// - the stored job is `finalizing`;
    /// - no class already references `job`;
    /// - no live class carries the same schedule signature;
    /// - no new session shares a (teacher, start) or (room, start) key with, or
    ///   overlaps, a booking session or another new session.
    ///
    /// # Errors
    /// `NotFound` for an unknown job, `ConflictError` on any of the above,
    /// `ValidationError` on malformed input or a `job` that is not `completed`.
    async fn commit_finalization(
        &self,
        job: &ScheduleJob,
        classes: Vec<NewClass>,
    ) -> RepositoryResult<Vec<ClassRecord>>;

    /// Remove every session and class created by `job`.
    async fn delete_job_outputs(&self, job: JobId) -> RepositoryResult<DeletedOutputs>;
}
