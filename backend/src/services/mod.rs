//! Service layer: job orchestration on top of the repository and the engine.
//!
//! The scheduling engine itself is synchronous and storage-free. Services load
//! its inputs through [`FullRepository`](crate::db::FullRepository), run it in
//! a background task, persist the draft and drive finalize.

pub mod conflict;
pub mod error;
pub mod events;
pub mod finalize;
pub mod job_tracker;
pub mod lock;
pub mod orchestrator;

pub use conflict::{has_conflict, Conflict, ConflictSide};
pub use error::{SchedulerError, SchedulerResult};
pub use events::{EventBus, JobEvent};
pub use finalize::{effective_anchor, FinalizeCommitter, FinalizeSummary};
pub use job_tracker::JobTracker;
pub use lock::{SchedulingGuard, SchedulingLock};
pub use orchestrator::{JobAnalytics, ScheduleOrchestrator, SchedulerStatus, TriggeredJob};
