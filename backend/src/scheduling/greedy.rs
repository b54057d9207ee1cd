//! Greedy placement of virtual classes, one class at a time, all-or-nothing per class.

use super::placement::Candidate;
use super::{PlacementSearch, ResourceSnapshot, ScheduleState, ScoringHeuristic, ScoringWeights};
use crate::models::{
    day_name, Assignment, FailedClass, FailureReason, ResultReport, ScheduleWarning, TeacherId,
    VirtualClass,
};

/// One-shot permission to drop a class's teacher lock and search unrestricted.
///
/// Granted only for [`FailureReason::LockedTeacherUnavailable`] while a lock is
/// held, and at most once per class.
#[derive(Debug, Clone)]
pub struct RetryWithTeacherUnlocked {
    remaining: u8,
}

impl RetryWithTeacherUnlocked {
    pub fn new() -> Self {
        Self { remaining: 1 }
    }

    /// Whether `reason` allows an unlocked retry. Consumes the retry when it does.
    pub fn should_retry(&mut self, reason: FailureReason, locked: Option<TeacherId>) -> bool {
        if reason != FailureReason::LockedTeacherUnavailable || locked.is_none() {
            return false;
        }
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn is_spent(&self) -> bool {
        self.remaining == 0
    }
}

impl Default for RetryWithTeacherUnlocked {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a scheduling pass.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    /// One group per successfully placed class, each with `required_slots` assignments.
    pub groups: Vec<Vec<Assignment>>,
    pub report: ResultReport,
}

pub struct GreedyScheduler<'a> {
    snapshot: &'a ResourceSnapshot,
    search: PlacementSearch<'a>,
    scoring: ScoringHeuristic<'a>,
    progress_every: usize,
}

impl<'a> GreedyScheduler<'a> {
    pub fn new(
        snapshot: &'a ResourceSnapshot,
        weights: &'a ScoringWeights,
        min_gap_days: u8,
        progress_every: usize,
    ) -> Self {
        Self {
            snapshot,
            search: PlacementSearch::new(snapshot, min_gap_days),
            scoring: ScoringHeuristic::new(snapshot, weights),
            progress_every: progress_every.max(1),
        }
    }

    /// Processing order: classes with a preferred teacher first, then larger
    /// classes, then longer sessions.
    pub fn order(classes: &[VirtualClass]) -> Vec<&VirtualClass> {
        let mut ordered: Vec<&VirtualClass> = classes.iter().collect();
        ordered.sort_by(|a, b| {
            b.preferred_teacher
                .is_some()
                .cmp(&a.preferred_teacher.is_some())
                .then(b.student_count.cmp(&a.student_count))
                .then(b.duration_minutes.cmp(&a.duration_minutes))
        });
        ordered
    }

    /// Place every class into `state`.
    ///
    /// `on_progress(processed, total)` fires every `progress_every` classes and
    /// once more after the last one. The pass is synchronous, so callers that
    /// persist or broadcast these entries can only publish them after it returns.
    pub fn run(
        &self,
        state: &mut ScheduleState,
        classes: &[VirtualClass],
        mut on_progress: impl FnMut(usize, usize),
    ) -> ScheduleOutcome {
        let mut outcome = ScheduleOutcome::default();
        let total = classes.len();

        for (n, class) in Self::order(classes).into_iter().enumerate() {
            match self.schedule_class(state, class) {
                Ok(placed) => {
                    let group = self.to_assignments(class, &placed, &mut outcome.report.warnings);
                    outcome.groups.push(group);
                }
                Err(reason) => {
                    log::warn!("{} not scheduled: {}", class.label(), reason);
                    outcome.report.failed_classes.push(FailedClass {
                        virtual_class: class.id,
                        course_id: class.course,
                        course_name: class.course_name.clone(),
                        student_count: class.student_count,
                        reason,
                        message: format!(
                            "{} (could not find {} weekly slots)",
                            reason.message(),
                            class.required_slots
                        ),
                    });
                }
            }

            let processed = n + 1;
            if processed % self.progress_every == 0 || processed == total {
                on_progress(processed, total);
            }
        }

        let report = &mut outcome.report;
        report.total_classes = total;
        report.successful_count = outcome.groups.len();
        report.failed_count = report.failed_classes.len();
        report.success_rate = if total == 0 {
            1.0
        } else {
            report.successful_count as f64 / total as f64
        };
        outcome
    }

    /// Place all weekly slots of one class or none of them.
    pub fn schedule_class(
        &self,
        state: &mut ScheduleState,
        class: &VirtualClass,
    ) -> Result<Vec<Candidate>, FailureReason> {
        let mut placed: Vec<Candidate> = Vec::with_capacity(class.required_slots);
        let mut locked = class.preferred_teacher;
        let mut retry = RetryWithTeacherUnlocked::new();

        for slot in 0..class.required_slots {
            let positions: Vec<_> = placed.iter().map(|c| c.placement).collect();
            let found = match self.search.find(state, class, &positions, locked) {
                Err(reason) if retry.should_retry(reason, locked) => {
                    log::debug!("{}: unlocking teacher for slot {}", class.label(), slot + 1);
                    locked = None;
                    self.search.find(state, class, &positions, None)
                }
                other => other,
            };

            let best = found.and_then(|candidates| {
                self.scoring
                    .best(candidates, class, state)
                    .ok_or(FailureReason::AllSlotsTaken)
            });
            let best = match best {
                Ok(best) => best,
                Err(reason) => {
                    for c in &placed {
                        state.revert(class.id, c.placement);
                    }
                    return Err(reason);
                }
            };

            if locked.is_none() {
                locked = Some(self.snapshot.teachers[best.placement.teacher].id);
            }
            state.apply(class.id, best.placement);
            placed.push(best);
        }
        Ok(placed)
    }

    fn to_assignments(
        &self,
        class: &VirtualClass,
        placed: &[Candidate],
        warnings: &mut Vec<ScheduleWarning>,
    ) -> Vec<Assignment> {
        placed
            .iter()
            .map(|c| {
                let p = c.placement;
                let teacher = &self.snapshot.teachers[p.teacher];
                let shift = &self.snapshot.config.shifts[p.shift];
                if c.violates_availability {
                    warnings.push(ScheduleWarning {
                        virtual_class: class.id,
                        course_name: class.course_name.clone(),
                        teacher_id: teacher.id,
                        teacher_name: teacher.name.clone(),
                        day: p.day,
                        shift: shift.name.clone(),
                        message: format!(
                            "{} is scheduled outside declared availability on {} {}",
                            teacher.name,
                            day_name(p.day),
                            shift.name
                        ),
                    });
                }
                Assignment {
                    virtual_class: class.id,
                    course: class.course,
                    day: p.day,
                    shift_name: shift.name.clone(),
                    start_minute: c.start_minute,
                    end_minute: c.start_minute + class.duration_minutes,
                    teacher: teacher.id,
                    room: self.snapshot.rooms[p.room].id,
                    violates_availability: c.violates_availability,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AvailabilityWindow, CenterConfig, CourseId, Level, Room, RoomId, RoomStatus, Shift,
        Teacher, TeacherSkill, VirtualClassId,
    };
    use crate::scheduling::{Cell, Placement};
    use chrono::NaiveDate;

    fn teacher(id: i64) -> Teacher {
        Teacher {
            id: TeacherId::new(id),
            name: format!("T{}", id),
            active: true,
            skills: vec![TeacherSkill {
                category: "IELTS".into(),
                levels: vec![Level::Beginner],
                include_lower_levels: false,
                any_level: false,
            }],
            availability: (0..7)
                .map(|day| AvailabilityWindow {
                    day_of_week: day,
                    shifts: vec!["morning".into(), "evening".into()],
                    effective: None,
                })
                .collect(),
        }
    }

    fn snapshot(days: Vec<u8>, teachers: usize, rooms: usize) -> ResourceSnapshot {
        let config = CenterConfig {
            active_days: days,
            shifts: vec![Shift::new("morning", 480, 720), Shift::new("evening", 1080, 1320)],
            ..CenterConfig::default()
        };
        ResourceSnapshot::new(
            config,
            (1..=teachers as i64).map(teacher).collect(),
            (1..=rooms as i64)
                .map(|i| Room {
                    id: RoomId::new(i),
                    name: format!("R{}", i),
                    capacity: 20,
                    status: RoomStatus::Active,
                })
                .collect(),
            vec![],
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        )
        .unwrap()
    }

    fn class(id: usize, students: u32, slots: usize, preferred: Option<i64>) -> VirtualClass {
        VirtualClass {
            id: VirtualClassId(id),
            course: CourseId::new(1),
            course_name: "IELTS Beginner".into(),
            category: "IELTS".into(),
            level: Level::Beginner,
            student_count: students,
            required_slots: slots,
            duration_minutes: 90,
            preferred_teacher: preferred.map(TeacherId::new),
        }
    }

    #[test]
    fn test_retry_policy_is_one_shot() {
        let mut retry = RetryWithTeacherUnlocked::new();
        let locked = Some(TeacherId::new(1));
        assert!(!retry.should_retry(FailureReason::AllSlotsTaken, locked));
        assert!(!retry.should_retry(FailureReason::LockedTeacherUnavailable, None));
        assert!(retry.should_retry(FailureReason::LockedTeacherUnavailable, locked));
        assert!(retry.is_spent());
        assert!(!retry.should_retry(FailureReason::LockedTeacherUnavailable, locked));
    }

    #[test]
    fn test_order_puts_preferred_then_larger_first() {
        let classes = vec![
            class(0, 10, 1, None),
            class(1, 18, 1, None),
            class(2, 5, 1, Some(1)),
        ];
        let ids: Vec<_> = GreedyScheduler::order(&classes).iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![2, 1, 0]);
    }

    #[test]
    fn test_first_teacher_is_locked_for_remaining_slots() {
        let snapshot = snapshot(vec![1, 3, 5], 2, 1);
        let weights = ScoringWeights::default();
        let scheduler = GreedyScheduler::new(&snapshot, &weights, 1, 5);
        let mut state = ScheduleState::new(&snapshot);
        let outcome = scheduler.run(&mut state, &[class(0, 10, 3, None)], |_, _| {});
        assert_eq!(outcome.groups.len(), 1);
        let group = &outcome.groups[0];
        assert_eq!(group.len(), 3);
        assert!(group.iter().all(|a| a.teacher == group[0].teacher));
        let days: Vec<_> = group.iter().map(|a| a.day).collect();
        assert_eq!(days, vec![1, 3, 5]);
        assert_eq!(group[0].end_minute, group[0].start_minute + 90);
    }

    #[test]
    fn test_locked_teacher_retry_completes_class() {
        // Teacher 1 is preferred but already busy on Wednesday and Friday.
        let snapshot = snapshot(vec![1, 3, 5], 2, 2);
        let weights = ScoringWeights::default();
        let scheduler = GreedyScheduler::new(&snapshot, &weights, 1, 5);
        let mut state = ScheduleState::new(&snapshot);
        for day in [3, 5] {
            for shift in 0..2 {
                state.apply(
                    VirtualClassId(99),
                    Placement {
                        teacher: 0,
                        room: 1,
                        day,
                        shift,
                    },
                );
            }
        }
        let outcome = scheduler.run(&mut state, &[class(0, 10, 2, Some(1))], |_, _| {});
        assert!(outcome.report.failed_classes.is_empty());
        let group = &outcome.groups[0];
        assert_eq!(group.len(), 2);
        assert_eq!(group[0].teacher, TeacherId::new(1));
        assert_eq!(group[1].teacher, TeacherId::new(2));
    }

    #[test]
    fn test_failed_class_is_rolled_back() {
        // Two slots are needed but only Monday and Tuesday exist; spacing forbids both.
        // The derived lock is dropped once, then the open search also comes up empty.
        let snapshot = snapshot(vec![1, 2], 1, 1);
        let weights = ScoringWeights::default();
        let scheduler = GreedyScheduler::new(&snapshot, &weights, 1, 5);
        let mut state = ScheduleState::new(&snapshot);
        let outcome = scheduler.run(&mut state, &[class(0, 10, 2, None)], |_, _| {});
        assert!(outcome.groups.is_empty());
        let failed = &outcome.report.failed_classes[0];
        assert_eq!(failed.reason, FailureReason::AllSlotsTaken);
        assert!(failed.message.ends_with("(could not find 2 weekly slots)"));
        for day in [1, 2] {
            for shift in 0..2 {
                assert_eq!(state.teacher_cell(0, day, shift), Cell::Free);
                assert_eq!(state.room_cell(0, day, shift), Cell::Free);
            }
            assert_eq!(state.workload(0, day), 0);
        }
        assert_eq!(outcome.report.success_rate, 0.0);
    }

    #[test]
    fn test_availability_warning_is_reported() {
        let mut snapshot = snapshot(vec![1], 1, 1);
        snapshot.teachers[0].availability.clear();
        let weights = ScoringWeights::default();
        let scheduler = GreedyScheduler::new(&snapshot, &weights, 1, 5);
        let mut state = ScheduleState::new(&snapshot);
        let outcome = scheduler.run(&mut state, &[class(0, 10, 1, None)], |_, _| {});
        assert_eq!(outcome.groups.len(), 1);
        assert!(outcome.groups[0][0].violates_availability);
        assert_eq!(outcome.report.warnings.len(), 1);
        assert_eq!(outcome.report.warnings[0].day, 1);
    }

    #[test]
    fn test_progress_cadence() {
        let snapshot = snapshot(vec![0, 1, 2, 3, 4, 5, 6], 4, 4);
        let weights = ScoringWeights::default();
        let scheduler = GreedyScheduler::new(&snapshot, &weights, 1, 5);
        let mut state = ScheduleState::new(&snapshot);
        let classes: Vec<_> = (0..12).map(|i| class(i, 10, 1, None)).collect();
        let mut ticks = Vec::new();
        scheduler.run(&mut state, &classes, |done, total| ticks.push((done, total)));
        assert_eq!(ticks, vec![(5, 12), (10, 12), (12, 12)]);
    }
}
