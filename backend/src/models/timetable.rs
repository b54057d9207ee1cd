//! Persisted timetable records: classes with their weekly pattern, and dated sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ClassId, CourseId, DayOfWeek, JobId, RoomId, SessionId, TeacherId};

/// One recurring weekly slot of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySlot {
    pub day_of_week: DayOfWeek,
    pub start_minute: u32,
    pub end_minute: u32,
    pub room: RoomId,
    pub teacher: TeacherId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    Approved,
    Ongoing,
    Finished,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: ClassId,
    pub name: String,
    pub code: String,
    pub course: CourseId,
    pub weekly_schedules: Vec<WeeklySlot>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: ClassStatus,
    pub capacity: u32,
    #[serde(default)]
    pub created_by_job: Option<JobId>,
    #[serde(default)]
    pub schedule_signature: Option<String>,
}

impl ClassRecord {
    /// Canceled classes no longer hold any resource.
    pub fn is_live(&self) -> bool {
        self.status != ClassStatus::Canceled
    }

    pub fn teachers(&self) -> impl Iterator<Item = TeacherId> + '_ {
        self.weekly_schedules.iter().map(|s| s.teacher)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Published,
    Completed,
    Canceled,
}

impl SessionStatus {
    /// Statuses that still book their teacher and room.
    pub fn is_booking(self) -> bool {
        matches!(self, SessionStatus::Scheduled | SessionStatus::Published)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub class: ClassId,
    pub course: CourseId,
    pub teacher: TeacherId,
    pub room: RoomId,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub session_no: u32,
    #[serde(default)]
    pub created_by_job: Option<JobId>,
}

impl SessionRecord {
    /// Half-open interval overlap with `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_at < end && start < self.end_at
    }
}

/// A class about to be inserted, together with its expanded sessions.
#[derive(Debug, Clone)]
pub struct NewClass {
    pub name: String,
    pub code: String,
    pub course: CourseId,
    pub weekly_schedules: Vec<WeeklySlot>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub capacity: u32,
    pub created_by_job: JobId,
    pub schedule_signature: String,
    pub sessions: Vec<NewSession>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub teacher: TeacherId,
    pub room: RoomId,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub session_no: u32,
}
