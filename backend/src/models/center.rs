//! Center operating calendar: active days, named shifts and the per-day whitelist.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::DayOfWeek;

/// A named minute-of-day window in which sessions may run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub name: String,
    pub start_minute: u32,
    pub end_minute: u32,
}

impl Shift {
    pub fn new(name: impl Into<String>, start_minute: u32, end_minute: u32) -> Self {
        Self {
            name: name.into(),
            start_minute,
            end_minute,
        }
    }

    pub fn length(&self) -> u32 {
        self.end_minute.saturating_sub(self.start_minute)
    }

    /// Whether a `[start, end)` minute window sits entirely inside this shift.
    pub fn contains(&self, start_minute: u32, end_minute: u32) -> bool {
        start_minute >= self.start_minute
            && end_minute <= self.end_minute
            && end_minute.saturating_sub(start_minute) <= self.length()
    }
}

/// Center-wide scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CenterConfig {
    /// Days the center operates, in the order the search visits them.
    #[serde(default = "default_active_days")]
    pub active_days: Vec<DayOfWeek>,
    #[serde(default = "default_shifts")]
    pub shifts: Vec<Shift>,
    /// Day -> shift names allowed on that day. Empty means every shift on every active day.
    #[serde(default)]
    pub day_shifts: BTreeMap<DayOfWeek, BTreeSet<String>>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

fn default_active_days() -> Vec<DayOfWeek> {
    vec![1, 2, 3, 4, 5, 6, 0]
}

fn default_shifts() -> Vec<Shift> {
    vec![
        Shift::new("morning", 480, 720),
        Shift::new("afternoon", 780, 1020),
        Shift::new("evening", 1080, 1320),
    ]
}

fn default_timezone() -> String {
    "Asia/Bangkok".to_string()
}

fn default_utc_offset_minutes() -> i32 {
    7 * 60
}

impl Default for CenterConfig {
    fn default() -> Self {
        Self {
            active_days: default_active_days(),
            shifts: default_shifts(),
            day_shifts: BTreeMap::new(),
            timezone: default_timezone(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

impl CenterConfig {
    /// Index of the shift with the given name.
    pub fn shift_index(&self, name: &str) -> Option<usize> {
        self.shifts.iter().position(|s| s.name == name)
    }

    /// First shift that fully contains `[start_minute, end_minute)`.
    pub fn find_shift_by_minute(&self, start_minute: u32, end_minute: u32) -> Option<usize> {
        self.shifts
            .iter()
            .position(|s| s.contains(start_minute, end_minute))
    }

    /// Whether `shift_name` may be used on `day`.
    pub fn allows(&self, day: DayOfWeek, shift_name: &str) -> bool {
        if !self.active_days.contains(&day) {
            return false;
        }
        if self.day_shifts.is_empty() {
            return true;
        }
        self.day_shifts
            .get(&day)
            .map(|names| names.contains(shift_name))
            .unwrap_or(false)
    }

    /// The center's fixed UTC offset, falling back to UTC for out-of-range values.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}
