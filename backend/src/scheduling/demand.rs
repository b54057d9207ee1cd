//! Demand aggregation: turns students waiting for a course into virtual classes.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;

use super::calendar::local_to_utc;
use super::ResourceSnapshot;
use crate::models::{
    ClassId, ClassRecord, Course, DemandEntry, Enrollment, EnrollmentStatus, InputAnalysis,
    PendingEntry, Student, StudentId, VirtualClass, VirtualClassId,
};

/// Student-side records the analyzer reads.
#[derive(Debug, Clone, Copy)]
pub struct DemandInputs<'a> {
    pub students: &'a [Student],
    pub enrollments: &'a [Enrollment],
    pub classes: &'a [ClassRecord],
}

/// Computes per-course demand for an intake window and slices it into virtual classes.
pub struct DemandAnalyzer<'a> {
    snapshot: &'a ResourceSnapshot,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
}

impl<'a> DemandAnalyzer<'a> {
    /// The window covers whole local days, `intake_start` 00:00 up to the end of `intake_end`.
    pub fn new(snapshot: &'a ResourceSnapshot, intake_start: NaiveDate, intake_end: NaiveDate) -> Self {
        let offset = snapshot.config.offset();
        let end_exclusive = intake_end.succ_opt().unwrap_or(intake_end);
        Self {
            snapshot,
            window_start: local_to_utc(intake_start, 0, offset),
            window_end: local_to_utc(end_exclusive, 0, offset),
        }
    }

    pub fn analyze(&self, inputs: DemandInputs<'_>) -> InputAnalysis {
        let mut analysis = InputAnalysis::default();
        let max_room_capacity = self.snapshot.max_room_capacity();

        for course in &self.snapshot.courses {
            let new_demand = self.new_demand(course, inputs.students);
            let waiting_demand = self.waiting_demand(course, inputs);
            let total = new_demand + waiting_demand;

            analysis.demand.push(DemandEntry {
                course_id: course.id,
                course_name: course.name.clone(),
                level: course.level,
                input_range: course.input_score_range,
                new_demand,
                waiting_demand,
                total,
            });

            let (sizes, remainder) = bucket_sizes(
                total,
                course.min_student,
                course.max_student,
                max_room_capacity,
            );
            for size in sizes {
                let id = VirtualClassId(analysis.virtual_classes.len());
                analysis.virtual_classes.push(VirtualClass {
                    id,
                    course: course.id,
                    course_name: course.name.clone(),
                    category: course.category.clone(),
                    level: course.level,
                    student_count: size,
                    required_slots: course.required_slots(),
                    duration_minutes: course.duration_minutes,
                    preferred_teacher: None,
                });
            }
            if remainder > 0 {
                analysis.pending.push(PendingEntry {
                    course_id: course.id,
                    course_name: format!("{} (Level {})", course.name, course.level),
                    student_count: remainder,
                    min_required: course.min_student,
                    shortfall: course.min_student.saturating_sub(remainder),
                });
            }
        }

        log::info!(
            "Demand analysis: {} courses, {} virtual classes, {} pending groups",
            analysis.demand.len(),
            analysis.virtual_classes.len(),
            analysis.pending.len()
        );
        analysis
    }

    /// Tested, not enrolled, in category, score in range, tested inside the window.
    fn new_demand(&self, course: &Course, students: &[Student]) -> u32 {
        students
            .iter()
            .filter(|s| s.tested && !s.enrolled)
            .filter(|s| s.category.as_deref() == Some(course.category.as_str()))
            .filter(|s| {
                s.test_score
                    .map(|score| course.input_score_range.contains(score))
                    .unwrap_or(false)
            })
            .filter(|s| {
                s.test_result_at
                    .map(|at| at >= self.window_start && at < self.window_end)
                    .unwrap_or(false)
            })
            .count() as u32
    }

    /// Students who finished the level directly below this course and aim at least this high.
    fn waiting_demand(&self, course: &Course, inputs: DemandInputs<'_>) -> u32 {
        let Some(previous_level) = course.level.previous() else {
            return 0;
        };

        let previous_courses: HashSet<_> = self
            .snapshot
            .courses
            .iter()
            .filter(|c| c.level == previous_level && c.category == course.category)
            .map(|c| c.id)
            .collect();
        if previous_courses.is_empty() {
            return 0;
        }

        let ended_classes: HashSet<ClassId> = inputs
            .classes
            .iter()
            .filter(|c| c.is_live() && previous_courses.contains(&c.course))
            .filter(|c| c.end_at < self.window_start)
            .map(|c| c.id)
            .collect();
        if ended_classes.is_empty() {
            return 0;
        }

        let completed: HashSet<StudentId> = inputs
            .enrollments
            .iter()
            .filter(|e| e.status == EnrollmentStatus::Confirmed && ended_classes.contains(&e.class))
            .map(|e| e.student)
            .collect();

        inputs
            .students
            .iter()
            .filter(|s| completed.contains(&s.id) && !s.enrolled)
            .filter(|s| {
                s.learning_goal
                    .as_ref()
                    .map(|goal| goal.target_level >= course.level)
                    .unwrap_or(false)
            })
            .count() as u32
    }
}

/// Slice `total` students into class sizes; returns the sizes and the unplaced remainder.
///
/// Each class takes as many students as fit under `min(max_student, max_room_capacity)`
/// but never fewer than `min_student`.
pub fn bucket_sizes(
    total: u32,
    min_student: u32,
    max_student: u32,
    max_room_capacity: u32,
) -> (Vec<u32>, u32) {
    let min_student = min_student.max(1);
    let cap = if max_room_capacity > 0 {
        max_student.min(max_room_capacity)
    } else {
        max_student
    };

    let mut sizes = Vec::new();
    let mut remaining = total;
    while remaining >= min_student {
        let size = remaining.min(cap).max(min_student);
        sizes.push(size);
        remaining -= size;
    }
    (sizes, remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CenterConfig, ClassStatus, CourseId, EnrollmentId, LearningGoal, Level, Room, RoomId,
        RoomStatus, ScoreRange, Teacher, TeacherId,
    };
    use chrono::TimeZone;

    #[test]
    fn test_bucket_sizes_split_evenly_at_cap() {
        assert_eq!(bucket_sizes(35, 15, 20, 20), (vec![20, 15], 0));
        assert_eq!(bucket_sizes(40, 15, 20, 20), (vec![20, 20], 0));
    }

    #[test]
    fn test_bucket_sizes_below_minimum_is_pending() {
        assert_eq!(bucket_sizes(10, 15, 20, 20), (vec![], 10));
        assert_eq!(bucket_sizes(0, 15, 20, 20), (vec![], 0));
    }

    #[test]
    fn test_bucket_sizes_leaves_small_remainder() {
        assert_eq!(bucket_sizes(38, 15, 20, 20), (vec![20, 18], 0));
        assert_eq!(bucket_sizes(52, 15, 20, 20), (vec![20, 20], 12));
    }

    #[test]
    fn test_bucket_sizes_room_cap_tightens_max() {
        assert_eq!(bucket_sizes(30, 5, 20, 12), (vec![12, 12, 6], 0));
    }

    fn course(id: i64, level: Level, min_score: f64) -> Course {
        Course {
            id: CourseId::new(id),
            name: format!("IELTS {}", level),
            category: "IELTS".into(),
            level,
            sessions_per_week: 2,
            duration_minutes: 90,
            total_sessions: 16,
            min_student: 2,
            max_student: 4,
            input_score_range: ScoreRange {
                min: min_score,
                max: min_score + 2.0,
            },
        }
    }

    fn snapshot() -> ResourceSnapshot {
        ResourceSnapshot::new(
            CenterConfig::default(),
            vec![Teacher {
                id: TeacherId::new(1),
                name: "T".into(),
                active: true,
                skills: vec![],
                availability: vec![],
            }],
            vec![Room {
                id: RoomId::new(1),
                name: "R".into(),
                capacity: 10,
                status: RoomStatus::Active,
            }],
            vec![
                course(1, Level::Beginner, 3.0),
                course(2, Level::Elementary, 6.0),
            ],
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        )
        .unwrap()
    }

    fn tester(id: i64, score: f64, day: u32) -> Student {
        Student {
            id: StudentId::new(id),
            name: format!("S{}", id),
            category: Some("IELTS".into()),
            tested: true,
            test_score: Some(score),
            test_result_at: Some(Utc.with_ymd_and_hms(2026, 2, day, 3, 0, 0).unwrap()),
            enrolled: false,
            learning_goal: None,
        }
    }

    #[test]
    fn test_new_demand_respects_window_and_range() {
        let snapshot = snapshot();
        let analyzer = DemandAnalyzer::new(
            &snapshot,
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 14).unwrap(),
        );
        let mut enrolled = tester(4, 4.0, 5);
        enrolled.enrolled = true;
        let students = vec![
            tester(1, 4.0, 2),
            tester(2, 5.0, 14),
            tester(3, 6.5, 3),  // out of range
            enrolled,
            tester(5, 3.0, 20), // after the window
        ];
        let analysis = analyzer.analyze(DemandInputs {
            students: &students,
            enrollments: &[],
            classes: &[],
        });
        let beginner = &analysis.demand[0];
        assert_eq!(beginner.new_demand, 2);
        assert_eq!(analysis.virtual_classes.len(), 1);
        assert_eq!(analysis.virtual_classes[0].student_count, 2);
        assert_eq!(analysis.virtual_classes[0].required_slots, 2);
    }

    #[test]
    fn test_waiting_demand_single_level_lookback() {
        let snapshot = snapshot();
        let analyzer = DemandAnalyzer::new(
            &snapshot,
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 14).unwrap(),
        );
        let finished = ClassRecord {
            id: ClassId::new(10),
            name: "old".into(),
            code: "OLD".into(),
            course: CourseId::new(1),
            weekly_schedules: vec![],
            start_at: Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap(),
            status: ClassStatus::Finished,
            capacity: 10,
            created_by_job: None,
            schedule_signature: None,
        };
        let graduate = |id: i64, target: Level| Student {
            id: StudentId::new(id),
            name: format!("G{}", id),
            category: Some("IELTS".into()),
            tested: false,
            test_score: None,
            test_result_at: None,
            enrolled: false,
            learning_goal: Some(LearningGoal {
                category: None,
                target_level: target,
            }),
        };
        let students = vec![
            graduate(1, Level::Advanced),
            graduate(2, Level::Elementary),
            graduate(3, Level::Beginner), // goal already reached
        ];
        let enrollment = |id: i64, student: i64, status| Enrollment {
            id: EnrollmentId::new(id),
            student: StudentId::new(student),
            class: ClassId::new(10),
            status,
        };
        let enrollments = vec![
            enrollment(1, 1, EnrollmentStatus::Confirmed),
            enrollment(2, 2, EnrollmentStatus::Confirmed),
            enrollment(3, 3, EnrollmentStatus::Confirmed),
            enrollment(4, 1, EnrollmentStatus::Confirmed),
        ];
        let analysis = analyzer.analyze(DemandInputs {
            students: &students,
            enrollments: &enrollments,
            classes: &[finished],
        });
        let elementary = &analysis.demand[1];
        assert_eq!(elementary.waiting_demand, 2);
        assert_eq!(elementary.total, 2);
        // Beginner has no lower course to graduate from in this catalog
        assert_eq!(analysis.demand[0].waiting_demand, 0);
    }

    #[test]
    fn test_pending_entry_reports_shortfall() {
        let snapshot = snapshot();
        let analyzer = DemandAnalyzer::new(
            &snapshot,
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 14).unwrap(),
        );
        let students = vec![tester(1, 4.0, 2)];
        let analysis = analyzer.analyze(DemandInputs {
            students: &students,
            enrollments: &[],
            classes: &[],
        });
        assert!(analysis.virtual_classes.is_empty());
        assert_eq!(analysis.pending.len(), 1);
        assert_eq!(analysis.pending[0].student_count, 1);
        assert_eq!(analysis.pending[0].shortfall, 1);
    }
}
