//! The synchronous scheduling engine.
//!
//! Data flows leaves-first:
//!
//! ```text
//! ResourceSnapshot ──► DemandAnalyzer ──► VirtualClass list
//!                                              │
//!                      ScheduleState ◄─────────┤
//!                            │                 ▼
//!                    PlacementSearch ──► ScoringHeuristic
//!                            │
//!                            ▼
//!                     GreedyScheduler ──► draft groups + report
//! ```
//!
//! Nothing in here touches storage or the clock; the services layer loads the
//! inputs, runs the engine and persists what comes out.

pub mod calendar;
pub mod demand;
pub mod greedy;
pub mod placement;
pub mod scoring;
pub mod snapshot;
pub mod state;

pub use calendar::{HolidayCalendar, HolidayInfo, HolidayList};
pub use demand::{DemandAnalyzer, DemandInputs};
pub use greedy::{GreedyScheduler, RetryWithTeacherUnlocked, ScheduleOutcome};
pub use placement::{Candidate, PlacementSearch};
pub use scoring::{ScoringHeuristic, ScoringWeights};
pub use snapshot::ResourceSnapshot;
pub use state::{Cell, Placement, ScheduleState};

use crate::models::DayOfWeek;

/// Problems with the center's resources or calendar that make a run impossible.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no active teachers")]
    NoActiveTeachers,
    #[error("no active rooms")]
    NoActiveRooms,
    #[error("center has no active days of week")]
    NoActiveDays,
    #[error("center has no shifts configured")]
    NoShifts,
    #[error("day {0} is not a valid day of week")]
    InvalidDay(DayOfWeek),
    #[error("shift '{0}' has an invalid minute window")]
    InvalidShift(String),
    #[error("day {day} whitelists unknown shift '{shift}'")]
    UnknownShift { day: DayOfWeek, shift: String },
}
