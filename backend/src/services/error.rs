//! Errors surfaced by the scheduling services.

use crate::db::RepositoryError;
use crate::models::{InvalidTransition, JobId, JobStatus};
use crate::scheduling::ConfigError;

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Another job holds the center-wide scheduling lock.
    #[error("a scheduling run is already in progress (job {0})")]
    Busy(JobId),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("job {job} is {status}: {message}")]
    InvalidState {
        job: JobId,
        status: JobStatus,
        message: String,
    },

    #[error("job {0} has already been finalized")]
    AlreadyFinalized(JobId),

    /// The draft collides with live timetable data.
    #[error("schedule collision: {0}")]
    Collision(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// Whether a failed finalize should leave the job in `draft` for correction.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SchedulerError::Collision(_)
            | SchedulerError::AlreadyFinalized(_)
            | SchedulerError::InvalidRequest(_)
            | SchedulerError::InvalidState { .. } => true,
            SchedulerError::Repository(e) => matches!(
                e,
                RepositoryError::ConflictError { .. } | RepositoryError::ValidationError { .. }
            ),
            _ => false,
        }
    }
}

impl From<ConfigError> for SchedulerError {
    fn from(err: ConfigError) -> Self {
        SchedulerError::Configuration(err.to_string())
    }
}

impl From<InvalidTransition> for SchedulerError {
    fn from(err: InvalidTransition) -> Self {
        SchedulerError::Internal(err.to_string())
    }
}
