//! Occupancy grid over (resource, day, shift) for one run.
//!
//! Teachers and rooms are addressed by their index in the
//! [`ResourceSnapshot`], shifts by their index in the center config, days by
//! `0..7`. Cells live in flat vectors so `apply`/`revert` are O(1).

use chrono::{DateTime, Utc};

use super::calendar::utc_to_local;
use super::ResourceSnapshot;
use crate::models::{ClassRecord, DayOfWeek, JobId, SessionRecord, VirtualClassId};

const DAYS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Free,
    /// Booked by a commitment that existed before the run; never cleared.
    Sentinel,
    Class(VirtualClassId),
}

/// Arena coordinates of one weekly placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub teacher: usize,
    pub room: usize,
    pub day: DayOfWeek,
    pub shift: usize,
}

#[derive(Debug, Clone)]
pub struct ScheduleState {
    shifts: usize,
    teacher_cells: Vec<Cell>,
    room_cells: Vec<Cell>,
    workload: Vec<u32>,
}

impl ScheduleState {
    /// An empty grid sized for the snapshot's resources.
    pub fn new(snapshot: &ResourceSnapshot) -> Self {
        let shifts = snapshot.shift_count();
        Self {
            shifts,
            teacher_cells: vec![Cell::Free; snapshot.teachers.len() * DAYS * shifts],
            room_cells: vec![Cell::Free; snapshot.rooms.len() * DAYS * shifts],
            workload: vec![0; snapshot.teachers.len() * DAYS],
        }
    }

    fn cell_index(&self, resource: usize, day: DayOfWeek, shift: usize) -> usize {
        (resource * DAYS + day as usize) * self.shifts + shift
    }

    pub fn teacher_cell(&self, teacher: usize, day: DayOfWeek, shift: usize) -> Cell {
        self.teacher_cells[self.cell_index(teacher, day, shift)]
    }

    pub fn room_cell(&self, room: usize, day: DayOfWeek, shift: usize) -> Cell {
        self.room_cells[self.cell_index(room, day, shift)]
    }

    pub fn is_teacher_free(&self, teacher: usize, day: DayOfWeek, shift: usize) -> bool {
        self.teacher_cell(teacher, day, shift) == Cell::Free
    }

    pub fn is_room_free(&self, room: usize, day: DayOfWeek, shift: usize) -> bool {
        self.room_cell(room, day, shift) == Cell::Free
    }

    pub fn workload(&self, teacher: usize, day: DayOfWeek) -> u32 {
        self.workload[teacher * DAYS + day as usize]
    }

    /// Book both resources for `class` and count the session against the teacher's day.
    pub fn apply(&mut self, class: VirtualClassId, placement: Placement) {
        let t = self.cell_index(placement.teacher, placement.day, placement.shift);
        let r = self.cell_index(placement.room, placement.day, placement.shift);
        self.teacher_cells[t] = Cell::Class(class);
        self.room_cells[r] = Cell::Class(class);
        self.workload[placement.teacher * DAYS + placement.day as usize] += 1;
    }

    /// Undo [`apply`](Self::apply). Cells holding anything other than `class` are left alone.
    pub fn revert(&mut self, class: VirtualClassId, placement: Placement) {
        let t = self.cell_index(placement.teacher, placement.day, placement.shift);
        if self.teacher_cells[t] == Cell::Class(class) {
            self.teacher_cells[t] = Cell::Free;
            let w = &mut self.workload[placement.teacher * DAYS + placement.day as usize];
            *w = w.saturating_sub(1);
        }
        let r = self.cell_index(placement.room, placement.day, placement.shift);
        if self.room_cells[r] == Cell::Class(class) {
            self.room_cells[r] = Cell::Free;
        }
    }

    fn mark_teacher(&mut self, teacher: usize, day: DayOfWeek, shift: usize) {
        let i = self.cell_index(teacher, day, shift);
        self.teacher_cells[i] = Cell::Sentinel;
    }

    fn mark_room(&mut self, room: usize, day: DayOfWeek, shift: usize) {
        let i = self.cell_index(room, day, shift);
        self.room_cells[i] = Cell::Sentinel;
    }

    /// Mark the weekly patterns of live classes as sentinel-occupied.
    ///
    /// Classes created by `exclude_job` are skipped. Returns the number of slots marked.
    pub fn seed_weekly(
        &mut self,
        snapshot: &ResourceSnapshot,
        classes: &[ClassRecord],
        exclude_job: Option<JobId>,
    ) -> usize {
        let mut marked = 0;
        for class in classes.iter().filter(|c| c.is_live()) {
            if exclude_job.is_some() && class.created_by_job == exclude_job {
                continue;
            }
            for slot in &class.weekly_schedules {
                let Some(shift) = snapshot
                    .config
                    .find_shift_by_minute(slot.start_minute, slot.end_minute)
                else {
                    continue;
                };
                if slot.day_of_week as usize >= DAYS {
                    continue;
                }
                if let Some(t) = snapshot.teacher_idx(slot.teacher) {
                    self.mark_teacher(t, slot.day_of_week, shift);
                }
                if let Some(r) = snapshot.room_idx(slot.room) {
                    self.mark_room(r, slot.day_of_week, shift);
                }
                marked += 1;
            }
        }
        marked
    }

    /// Mark booking sessions starting inside `[from, until)` as sentinel-occupied.
    pub fn seed_sessions(
        &mut self,
        snapshot: &ResourceSnapshot,
        sessions: &[SessionRecord],
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        exclude_job: Option<JobId>,
    ) -> usize {
        let offset = snapshot.config.offset();
        let mut marked = 0;
        for session in sessions.iter().filter(|s| s.status.is_booking()) {
            if session.start_at < from || session.start_at >= until {
                continue;
            }
            if exclude_job.is_some() && session.created_by_job == exclude_job {
                continue;
            }
            let (_, day, start_minute) = utc_to_local(session.start_at, offset);
            let length = (session.end_at - session.start_at).num_minutes().max(0) as u32;
            let Some(shift) = snapshot
                .config
                .find_shift_by_minute(start_minute, start_minute + length)
            else {
                continue;
            };
            if let Some(t) = snapshot.teacher_idx(session.teacher) {
                self.mark_teacher(t, day, shift);
            }
            if let Some(r) = snapshot.room_idx(session.room) {
                self.mark_room(r, day, shift);
            }
            marked += 1;
        }
        marked
    }
}
