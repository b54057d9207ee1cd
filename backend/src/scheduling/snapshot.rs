//! Immutable point-in-time view of the resources a run plans against.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

use super::ConfigError;
use crate::models::{
    CenterConfig, Course, CourseId, Room, RoomId, RoomStatus, Teacher, TeacherId,
};

/// Active teachers, active rooms, courses and the normalized center calendar.
///
/// Teacher and room positions in the vectors are the stable arena indices
/// [`ScheduleState`](super::ScheduleState) is keyed by.
#[derive(Debug, Clone)]
pub struct ResourceSnapshot {
    pub config: CenterConfig,
    pub teachers: Vec<Teacher>,
    pub rooms: Vec<Room>,
    pub courses: Vec<Course>,
    /// Date teacher availability ranges are evaluated against.
    pub reference_date: NaiveDate,
    teacher_index: HashMap<TeacherId, usize>,
    room_index: HashMap<RoomId, usize>,
    course_index: HashMap<CourseId, usize>,
}

impl ResourceSnapshot {
    /// Build a snapshot, dropping inactive resources and validating the calendar.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when there is nothing to schedule with: no active
    /// teachers or rooms, no operating days or shifts, or a whitelist that names
    /// an unknown shift.
    pub fn new(
        config: CenterConfig,
        teachers: Vec<Teacher>,
        rooms: Vec<Room>,
        courses: Vec<Course>,
        reference_date: NaiveDate,
    ) -> Result<Self, ConfigError> {
        let config = normalize_config(config)?;

        let teachers: Vec<Teacher> = teachers.into_iter().filter(|t| t.active).collect();
        if teachers.is_empty() {
            return Err(ConfigError::NoActiveTeachers);
        }
        let rooms: Vec<Room> = rooms
            .into_iter()
            .filter(|r| r.status == RoomStatus::Active && r.capacity > 0)
            .collect();
        if rooms.is_empty() {
            return Err(ConfigError::NoActiveRooms);
        }

        let teacher_index = teachers.iter().enumerate().map(|(i, t)| (t.id, i)).collect();
        let room_index = rooms.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
        let course_index = courses.iter().enumerate().map(|(i, c)| (c.id, i)).collect();

        Ok(Self {
            config,
            teachers,
            rooms,
            courses,
            reference_date,
            teacher_index,
            room_index,
            course_index,
        })
    }

    pub fn teacher_idx(&self, id: TeacherId) -> Option<usize> {
        self.teacher_index.get(&id).copied()
    }

    pub fn room_idx(&self, id: RoomId) -> Option<usize> {
        self.room_index.get(&id).copied()
    }

    pub fn course(&self, id: CourseId) -> Option<&Course> {
        self.course_index.get(&id).map(|&i| &self.courses[i])
    }

    pub fn max_room_capacity(&self) -> u32 {
        self.rooms.iter().map(|r| r.capacity).max().unwrap_or(0)
    }

    pub fn shift_count(&self) -> usize {
        self.config.shifts.len()
    }
}

fn normalize_config(mut config: CenterConfig) -> Result<CenterConfig, ConfigError> {
    let mut seen = BTreeSet::new();
    config.active_days.retain(|d| seen.insert(*d));
    if let Some(&day) = config.active_days.iter().find(|&&d| d > 6) {
        return Err(ConfigError::InvalidDay(day));
    }
    if config.active_days.is_empty() {
        return Err(ConfigError::NoActiveDays);
    }
    if config.shifts.is_empty() {
        return Err(ConfigError::NoShifts);
    }
    for shift in &config.shifts {
        if shift.start_minute >= shift.end_minute || shift.end_minute > 24 * 60 {
            return Err(ConfigError::InvalidShift(shift.name.clone()));
        }
    }
    for (day, names) in &config.day_shifts {
        if *day > 6 {
            return Err(ConfigError::InvalidDay(*day));
        }
        if let Some(unknown) = names.iter().find(|n| config.shift_index(n).is_none()) {
            return Err(ConfigError::UnknownShift {
                day: *day,
                shift: unknown.clone(),
            });
        }
    }

    if config.day_shifts.is_empty() {
        let all: BTreeSet<String> = config.shifts.iter().map(|s| s.name.clone()).collect();
        config.day_shifts = config
            .active_days
            .iter()
            .map(|&day| (day, all.clone()))
            .collect();
    }
    Ok(config)
}
