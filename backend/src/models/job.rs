//! Schedule job record: intake parameters, analysis snapshot, draft timetable,
//! result report and the job's own log stream.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CourseId, DayOfWeek, JobId, Level, RoomId, ScoreRange, TeacherId};

/// Job status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Draft,
    Finalizing,
    Completed,
    SystemError,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Draft => "draft",
            JobStatus::Finalizing => "finalizing",
            JobStatus::Completed => "completed",
            JobStatus::SystemError => "system_error",
        }
    }

    /// Edges of the job state machine.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, SystemError)
                | (Running, Draft)
                | (Running, SystemError)
                | (Draft, Finalizing)
                | (Finalizing, Completed)
                | (Finalizing, Draft)
                | (Finalizing, SystemError)
        )
    }

    /// A run that has not produced a draft yet.
    pub fn is_in_flight(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move job from {from} to {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Stage tag on every job log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStage {
    Start,
    Load,
    Analyze,
    AnalyzeDone,
    ScheduleStart,
    ScheduleProgress,
    DraftReady,
    Finalizing,
    Completed,
    Error,
}

/// A single log entry with timestamp and message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub timestamp: DateTime<Utc>,
    pub stage: JobStage,
    pub message: String,
    pub is_error: bool,
}

impl JobLogEntry {
    pub fn new(stage: JobStage, message: impl Into<String>, is_error: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            stage,
            message: message.into(),
            is_error,
        }
    }
}

/// Intake parameters supplied when a run is triggered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleParams {
    pub intake_start_date: NaiveDate,
    pub intake_end_date: NaiveDate,
    pub success_threshold: f64,
    #[serde(default)]
    pub class_start_anchor: Option<NaiveDate>,
}

impl ScheduleParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.intake_start_date > self.intake_end_date {
            return Err(format!(
                "intake window is inverted: {} > {}",
                self.intake_start_date, self.intake_end_date
            ));
        }
        if !(0.0..=1.0).contains(&self.success_threshold) {
            return Err(format!(
                "success threshold must be within 0..1, got {}",
                self.success_threshold
            ));
        }
        Ok(())
    }
}

/// Per-course demand breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandEntry {
    pub course_id: CourseId,
    pub course_name: String,
    pub level: Level,
    pub input_range: ScoreRange,
    pub new_demand: u32,
    pub waiting_demand: u32,
    pub total: u32,
}

/// Demand left over below a course's minimum class size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEntry {
    pub course_id: CourseId,
    pub course_name: String,
    pub student_count: u32,
    pub min_required: u32,
    pub shortfall: u32,
}

/// Run-scoped index of a virtual class inside the job's analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualClassId(pub usize);

impl fmt::Display for VirtualClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VC-{}", self.0)
    }
}

/// Demand grouped into one schedulable class before any Class record exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualClass {
    pub id: VirtualClassId,
    pub course: CourseId,
    pub course_name: String,
    pub category: String,
    pub level: Level,
    pub student_count: u32,
    pub required_slots: usize,
    pub duration_minutes: u32,
    #[serde(default)]
    pub preferred_teacher: Option<TeacherId>,
}

impl VirtualClass {
    pub fn label(&self) -> String {
        format!("{} ({} students)", self.course_name, self.student_count)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputAnalysis {
    pub demand: Vec<DemandEntry>,
    pub virtual_classes: Vec<VirtualClass>,
    pub pending: Vec<PendingEntry>,
}

/// One weekly placement of a virtual class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub virtual_class: VirtualClassId,
    pub course: CourseId,
    pub day: DayOfWeek,
    pub shift_name: String,
    pub start_minute: u32,
    pub end_minute: u32,
    pub teacher: TeacherId,
    pub room: RoomId,
    pub violates_availability: bool,
}

/// Why a virtual class could not be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    NoTeacherSkill,
    LockedTeacherUnavailable,
    NoRoomCapacity,
    AllSlotsTaken,
}

impl FailureReason {
    pub fn code(self) -> &'static str {
        match self {
            FailureReason::NoTeacherSkill => "NO_TEACHER_SKILL",
            FailureReason::LockedTeacherUnavailable => "LOCKED_TEACHER_UNAVAILABLE",
            FailureReason::NoRoomCapacity => "NO_ROOM_CAPACITY",
            FailureReason::AllSlotsTaken => "ALL_SLOTS_TAKEN",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            FailureReason::NoTeacherSkill => "No active teacher is qualified for this course",
            FailureReason::LockedTeacherUnavailable => {
                "The locked teacher has no free slot for this class"
            }
            FailureReason::NoRoomCapacity => "No active room is large enough for this class",
            FailureReason::AllSlotsTaken => "Every compatible teacher/room/time slot is taken",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedClass {
    pub virtual_class: VirtualClassId,
    pub course_id: CourseId,
    pub course_name: String,
    pub student_count: u32,
    pub reason: FailureReason,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleWarning {
    pub virtual_class: VirtualClassId,
    pub course_name: String,
    pub teacher_id: TeacherId,
    pub teacher_name: String,
    pub day: DayOfWeek,
    pub shift: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultReport {
    pub total_classes: usize,
    pub successful_count: usize,
    pub failed_count: usize,
    pub success_rate: f64,
    pub failed_classes: Vec<FailedClass>,
    pub warnings: Vec<ScheduleWarning>,
}

/// Persistent record wrapping one scheduling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleJob {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(flatten)]
    pub params: ScheduleParams,
    #[serde(default)]
    pub analysis: InputAnalysis,
    #[serde(default)]
    pub draft_schedule: Vec<Vec<Assignment>>,
    #[serde(default)]
    pub result_report: Option<ResultReport>,
    #[serde(default)]
    pub logs: Vec<JobLogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScheduleJob {
    pub fn new(id: JobId, params: ScheduleParams) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            params,
            analysis: InputAnalysis::default(),
            draft_schedule: Vec::new(),
            result_report: None,
            logs: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Move along the state machine, refusing edges it does not have.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        if next == JobStatus::Completed {
            self.completed_at = Some(self.updated_at);
        }
        Ok(())
    }

    pub fn assignment_count(&self) -> usize {
        self.draft_schedule.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ScheduleParams {
        ScheduleParams {
            intake_start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            intake_end_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            success_threshold: 0.8,
            class_start_anchor: None,
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = ScheduleJob::new(JobId::generate(), params());
        job.transition(JobStatus::Running).unwrap();
        job.transition(JobStatus::Draft).unwrap();
        job.transition(JobStatus::Finalizing).unwrap();
        job.transition(JobStatus::Completed).unwrap();
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_rejects_skipping_draft() {
        let mut job = ScheduleJob::new(JobId::generate(), params());
        let err = job.transition(JobStatus::Finalizing).unwrap_err();
        assert_eq!(err.from, JobStatus::Pending);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(err.to_string(), "cannot move job from pending to finalizing");
    }

    #[test]
    fn test_finalize_failure_returns_to_draft() {
        assert!(JobStatus::Finalizing.can_transition_to(JobStatus::Draft));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Finalizing));
    }

    #[test]
    fn test_params_validation() {
        let mut p = params();
        assert!(p.validate().is_ok());
        p.success_threshold = 1.5;
        assert!(p.validate().is_err());
        p = params();
        std::mem::swap(&mut p.intake_start_date, &mut p.intake_end_date);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_status_and_reason_wire_names() {
        assert_eq!(
            serde_json::to_string(&JobStatus::SystemError).unwrap(),
            "\"system_error\""
        );
        assert_eq!(
            serde_json::to_string(&FailureReason::LockedTeacherUnavailable).unwrap(),
            "\"LOCKED_TEACHER_UNAVAILABLE\""
        );
        assert_eq!(
            serde_json::to_string(&JobStage::AnalyzeDone).unwrap(),
            "\"ANALYZE_DONE\""
        );
    }
}
