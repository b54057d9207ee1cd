//! Push-style notifications about job progress.
//!
//! Events are fanned out over a `tokio::sync::broadcast` channel. Publishing
//! never blocks and never fails the caller: with no subscribers the event is
//! dropped, and a slow subscriber sees `Lagged` rather than stalling a run.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{ClassId, JobId, JobStage, TeacherId};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    Progress {
        job_id: JobId,
        stage: JobStage,
        message: String,
    },
    /// The run reached `draft`, or a finalize reached `completed`.
    Completed { job_id: JobId },
    Failed { job_id: JobId, error: String },
    /// A teacher was given new classes by a finalize.
    TeacherAssigned {
        teacher_id: TeacherId,
        class_ids: Vec<ClassId>,
    },
}

impl JobEvent {
    /// The job this event is about, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            JobEvent::Progress { job_id, .. }
            | JobEvent::Completed { job_id }
            | JobEvent::Failed { job_id, .. } => Some(*job_id),
            JobEvent::TeacherAssigned { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: JobEvent) {
        if self.sender.send(event).is_err() {
            log::trace!("No event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
