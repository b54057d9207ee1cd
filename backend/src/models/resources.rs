//! Teachers and rooms: the two resources a placement books.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Course, DayOfWeek, Level, RoomId, TeacherId};

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// One teaching skill: a category plus the levels it covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherSkill {
    pub category: String,
    #[serde(default)]
    pub levels: Vec<Level>,
    #[serde(default)]
    pub include_lower_levels: bool,
    #[serde(default)]
    pub any_level: bool,
}

impl TeacherSkill {
    pub fn covers(&self, category: &str, level: Level) -> bool {
        if self.category != category {
            return false;
        }
        if self.any_level || self.levels.contains(&level) {
            return true;
        }
        self.include_lower_levels && self.levels.iter().any(|l| level <= *l)
    }
}

/// Declared weekly availability for one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub day_of_week: DayOfWeek,
    #[serde(default)]
    pub shifts: Vec<String>,
    #[serde(default)]
    pub effective: Option<DateRange>,
}

impl AvailabilityWindow {
    fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.effective.map(|r| r.contains(date)).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub skills: Vec<TeacherSkill>,
    #[serde(default)]
    pub availability: Vec<AvailabilityWindow>,
}

fn default_active() -> bool {
    true
}

impl Teacher {
    /// Whether any skill qualifies this teacher for the course's category and level.
    pub fn can_teach(&self, course: &Course) -> bool {
        self.qualifies(&course.category, course.level)
    }

    pub fn qualifies(&self, category: &str, level: Level) -> bool {
        self.skills.iter().any(|skill| skill.covers(category, level))
    }

    /// Whether declared availability lists `shift_name` on `day` as of `on`.
    pub fn is_available(&self, day: DayOfWeek, shift_name: &str, on: NaiveDate) -> bool {
        self.availability.iter().any(|window| {
            window.day_of_week == day
                && window.is_effective_on(on)
                && window.shifts.iter().any(|s| s == shift_name)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Active,
    Maintenance,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: u32,
    #[serde(default = "default_room_status")]
    pub status: RoomStatus,
}

fn default_room_status() -> RoomStatus {
    RoomStatus::Active
}
