//! Candidate enumeration for one weekly slot of one virtual class.

use super::state::Placement;
use super::{ResourceSnapshot, ScheduleState};
use crate::models::{DayOfWeek, FailureReason, TeacherId, VirtualClass};

/// A feasible (day, shift, teacher, room) for the slot being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub placement: Placement,
    pub start_minute: u32,
    /// Room capacity left over after seating the class.
    pub room_surplus: u32,
    /// The teacher's declared availability does not list this (day, shift).
    pub violates_availability: bool,
}

/// Cyclic distance between two days of the week (0..=3).
pub fn cyclic_day_distance(a: DayOfWeek, b: DayOfWeek) -> u8 {
    let d = a.abs_diff(b) % 7;
    d.min(7 - d)
}

/// Enumerates every placement satisfying the hard constraints.
pub struct PlacementSearch<'a> {
    snapshot: &'a ResourceSnapshot,
    min_gap_days: u8,
}

impl<'a> PlacementSearch<'a> {
    pub fn new(snapshot: &'a ResourceSnapshot, min_gap_days: u8) -> Self {
        Self {
            snapshot,
            min_gap_days,
        }
    }

    /// Teacher indices whose skills cover the class's category and level.
    pub fn qualified_teachers(&self, class: &VirtualClass) -> Vec<usize> {
        self.snapshot
            .teachers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.qualifies(&class.category, class.level))
            .map(|(i, _)| i)
            .collect()
    }

    /// Whether `day` sits within the minimum gap of any day already used by the class.
    pub fn violates_spacing(&self, day: DayOfWeek, placed: &[Placement]) -> bool {
        placed
            .iter()
            .any(|p| cyclic_day_distance(p.day, day) < self.min_gap_days + 1)
    }

    /// All candidates for the next slot of `class`, in discovery order.
    ///
    /// Discovery order is active days as configured, then shifts, then teachers,
    /// then rooms. `placed` holds the slots this class already occupies and
    /// `locked` restricts the search to one teacher.
    ///
    /// # Errors
    /// The [`FailureReason`] of the first filter that leaves nothing behind.
    pub fn find(
        &self,
        state: &ScheduleState,
        class: &VirtualClass,
        placed: &[Placement],
        locked: Option<TeacherId>,
    ) -> Result<Vec<Candidate>, FailureReason> {
        let mut teachers = self.qualified_teachers(class);
        if teachers.is_empty() {
            return Err(FailureReason::NoTeacherSkill);
        }
        if let Some(locked) = locked {
            teachers.retain(|&t| self.snapshot.teachers[t].id == locked);
            if teachers.is_empty() {
                return Err(FailureReason::LockedTeacherUnavailable);
            }
        }

        let rooms: Vec<usize> = self
            .snapshot
            .rooms
            .iter()
            .enumerate()
            .filter(|(_, r)| r.capacity >= class.student_count)
            .map(|(i, _)| i)
            .collect();
        if rooms.is_empty() {
            return Err(FailureReason::NoRoomCapacity);
        }

        let config = &self.snapshot.config;
        let mut candidates = Vec::new();
        for &day in &config.active_days {
            if self.violates_spacing(day, placed) {
                continue;
            }
            for (shift_idx, shift) in config.shifts.iter().enumerate() {
                if !config.allows(day, &shift.name) || shift.length() < class.duration_minutes {
                    continue;
                }
                if placed.iter().any(|p| p.day == day && p.shift == shift_idx) {
                    continue;
                }
                for &t in &teachers {
                    if !state.is_teacher_free(t, day, shift_idx) {
                        continue;
                    }
                    let violates_availability = !self.snapshot.teachers[t].is_available(
                        day,
                        &shift.name,
                        self.snapshot.reference_date,
                    );
                    for &r in &rooms {
                        if !state.is_room_free(r, day, shift_idx) {
                            continue;
                        }
                        candidates.push(Candidate {
                            placement: Placement {
                                teacher: t,
                                room: r,
                                day,
                                shift: shift_idx,
                            },
                            start_minute: shift.start_minute,
                            room_surplus: self.snapshot.rooms[r].capacity - class.student_count,
                            violates_availability,
                        });
                    }
                }
            }
        }

        if candidates.is_empty() {
            return Err(if locked.is_some() {
                FailureReason::LockedTeacherUnavailable
            } else {
                FailureReason::AllSlotsTaken
            });
        }
        log::debug!("{}: {} candidates", class.label(), candidates.len());
        Ok(candidates)
    }
}
