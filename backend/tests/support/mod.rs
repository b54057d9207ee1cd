//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use timetable_engine::config::EngineConfig;
use timetable_engine::db::{FullRepository, LocalRepository};
use timetable_engine::models::{
    AvailabilityWindow, CenterConfig, Course, CourseId, JobId, JobStatus, Level, Room, RoomId,
    RoomStatus, ScheduleJob, ScheduleParams, ScoreRange, Shift, Student, StudentId, Teacher,
    TeacherId, TeacherSkill,
};
use timetable_engine::services::{EventBus, ScheduleOrchestrator};

pub const CATEGORY: &str = "IELTS";

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// Restores variables on unwind and serializes access to the process-global
/// environment, since tests run in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

// ==================== Catalog fixtures ====================

pub fn course(id: i64, level: Level, sessions_per_week: u32, total_sessions: u32) -> Course {
    Course {
        id: CourseId::new(id),
        name: format!("IELTS {}", level),
        category: CATEGORY.to_string(),
        level,
        sessions_per_week,
        duration_minutes: 90,
        total_sessions,
        min_student: 5,
        max_student: 10,
        input_score_range: ScoreRange { min: 0.0, max: 4.5 },
    }
}

/// A teacher qualified for every IELTS level and available in every shift.
pub fn teacher(id: i64, config: &CenterConfig) -> Teacher {
    Teacher {
        id: TeacherId::new(id),
        name: format!("Teacher {}", id),
        active: true,
        skills: vec![TeacherSkill {
            category: CATEGORY.to_string(),
            levels: Vec::new(),
            include_lower_levels: false,
            any_level: true,
        }],
        availability: config
            .active_days
            .iter()
            .map(|&day| AvailabilityWindow {
                day_of_week: day,
                shifts: config.shifts.iter().map(|s| s.name.clone()).collect(),
                effective: None,
            })
            .collect(),
    }
}

pub fn room(id: i64, capacity: u32) -> Room {
    Room {
        id: RoomId::new(id),
        name: format!("Room {}", id),
        capacity,
        status: RoomStatus::Active,
    }
}

/// `count` freshly tested students scoring inside [`course`]'s input range.
pub fn tested_students(first_id: i64, count: usize, tested_at: DateTime<Utc>) -> Vec<Student> {
    (0..count as i64)
        .map(|i| Student {
            id: StudentId::new(first_id + i),
            name: format!("Student {}", first_id + i),
            category: Some(CATEGORY.to_string()),
            tested: true,
            test_score: Some(3.0),
            test_result_at: Some(tested_at),
            enrolled: false,
            learning_goal: None,
        })
        .collect()
}

/// Monday-only center with a single morning shift.
pub fn monday_morning_center() -> CenterConfig {
    CenterConfig {
        active_days: vec![1],
        shifts: vec![Shift::new("morning", 480, 720)],
        ..CenterConfig::default()
    }
}

/// Default center, `teachers` teachers, `rooms` rooms of 10 seats, one
/// course with `students` tested students.
pub fn seeded_repo(
    config: CenterConfig,
    teachers: i64,
    rooms: i64,
    course: Course,
    students: usize,
) -> LocalRepository {
    let repo = LocalRepository::new();
    for id in 1..=teachers {
        repo.add_teacher(teacher(id, &config));
    }
    for id in 1..=rooms {
        repo.add_room(room(id, 10));
    }
    repo.add_course(course);
    for student in tested_students(1, students, Utc::now() - chrono::Duration::days(1)) {
        repo.add_student(student);
    }
    repo.set_center_config(config);
    repo
}

pub fn orchestrator(repo: &LocalRepository) -> ScheduleOrchestrator {
    let repo: Arc<dyn FullRepository> = Arc::new(repo.clone());
    ScheduleOrchestrator::new(repo, EventBus::default(), &EngineConfig::default())
}

/// Intake window covering the last month.
pub fn params(anchor: Option<NaiveDate>) -> ScheduleParams {
    let today = Utc::now().date_naive();
    ScheduleParams {
        intake_start_date: today - chrono::Duration::days(30),
        intake_end_date: today + chrono::Duration::days(1),
        success_threshold: 0.8,
        class_start_anchor: anchor,
    }
}

/// The first Monday at least two weeks out.
pub fn future_monday() -> NaiveDate {
    let mut date = Utc::now().date_naive() + chrono::Duration::days(14);
    while date.weekday().num_days_from_sunday() != 1 {
        date = date.succ_opt().unwrap();
    }
    date
}

/// Trigger a run and wait until it leaves `pending`/`running`.
pub async fn run_to_draft(orch: &ScheduleOrchestrator, params: ScheduleParams) -> ScheduleJob {
    let triggered = orch.trigger(params).await.unwrap();
    triggered.handle.await.unwrap();
    orch.get_job(triggered.job.id).await.unwrap()
}

/// Poll until the job reaches `status`, failing after two seconds.
pub async fn wait_for_status(orch: &ScheduleOrchestrator, job: JobId, status: JobStatus) -> ScheduleJob {
    for _ in 0..100 {
        let current = orch.get_job(job).await.unwrap();
        if current.status == status {
            return current;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {} never reached {}", job, status);
}
