mod support;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};
use parking_lot::Mutex;
use timetable_engine::config::EngineConfig;
use timetable_engine::db::{
    CatalogRepository, DeletedOutputs, FullRepository, JobRepository, LocalRepository,
    RepositoryError, RepositoryResult, TimetableRepository,
};
use timetable_engine::models::{
    CenterConfig, ClassId, ClassRecord, Course, CourseId, Enrollment, JobId, JobLogEntry,
    JobStage, JobStatus, Level, NewClass, Room, RoomId, ScheduleJob, SessionId, SessionRecord,
    SessionStatus, Student, Teacher, TeacherId,
};
use timetable_engine::scheduling::calendar::{first_on_or_after, local_to_utc, utc_to_local};
use timetable_engine::scheduling::{HolidayInfo, HolidayList};
use timetable_engine::services::{EventBus, JobEvent, ScheduleOrchestrator, SchedulerError};

use support::*;

#[tokio::test]
async fn test_finalize_creates_classes_and_sessions() {
    let repo = seeded_repo(Default::default(), 2, 2, course(1, Level::Beginner, 2, 8), 15);
    let orch = orchestrator(&repo);
    let mut events = orch.events().subscribe();
    let job = run_to_draft(&orch, params(None)).await;

    let summary = orch.finalize(job.id).await.unwrap();

    assert_eq!(summary.classes.len(), 2);
    assert_eq!(summary.session_count, 16);
    assert_eq!(repo.class_count(), 2);
    assert_eq!(repo.session_count(), 16);

    let mut capacities: Vec<u32> = summary.classes.iter().map(|c| c.capacity).collect();
    capacities.sort_unstable();
    assert_eq!(capacities, vec![5, 10]);
    for class in &summary.classes {
        assert_eq!(class.created_by_job, Some(job.id));
        assert_eq!(class.name, "IELTS Beginner | 2 sessions/week");
        assert!(class.code.contains(&job.id.short()));
        assert!(class.schedule_signature.is_some());

        let sessions = repo.sessions_for_class(class.id);
        assert_eq!(sessions.len(), 8);
        let numbers: Vec<u32> = sessions.iter().map(|s| s.session_no).collect();
        assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
        assert!(sessions.iter().all(|s| s.status == SessionStatus::Scheduled));
        assert_eq!(class.start_at, sessions[0].start_at);
        assert_eq!(class.end_at, sessions[7].end_at);
    }

    let stored = orch.get_job(job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(stored.completed_at.is_some());
    assert!(stored.logs.iter().any(|l| l.stage == JobStage::Completed));
    assert!(!orch.status().is_scheduling);

    let mut assigned = 0;
    let mut completions = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            JobEvent::TeacherAssigned { class_ids, .. } => {
                assert!(!class_ids.is_empty());
                assigned += class_ids.len();
            }
            JobEvent::Completed { .. } => completions += 1,
            _ => {}
        }
    }
    assert!(assigned >= 2);
    // draft, then completed
    assert_eq!(completions, 2);
}

#[tokio::test]
async fn test_second_finalize_creates_nothing() {
    let repo = seeded_repo(Default::default(), 2, 2, course(1, Level::Beginner, 2, 4), 15);
    let orch = orchestrator(&repo);
    let job = run_to_draft(&orch, params(None)).await;
    orch.finalize(job.id).await.unwrap();
    let (classes, sessions) = (repo.class_count(), repo.session_count());

    let err = orch.finalize(job.id).await.unwrap_err();

    assert!(matches!(err, SchedulerError::AlreadyFinalized(id) if id == job.id));
    assert_eq!(repo.class_count(), classes);
    assert_eq!(repo.session_count(), sessions);
}

#[tokio::test]
async fn test_finalize_rejects_unfinished_job() {
    let repo = seeded_repo(Default::default(), 1, 1, course(1, Level::Beginner, 1, 4), 5);
    let orch = orchestrator(&repo);

    let triggered = orch.trigger(params(None)).await.unwrap();
    let err = orch.finalize(triggered.job.id).await.unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::InvalidState {
            status: JobStatus::Pending,
            ..
        }
    ));
    triggered.handle.await.unwrap();
    assert_eq!(repo.class_count(), 0);
}

#[tokio::test]
async fn test_conflicting_session_blocks_finalize() {
    let repo = seeded_repo(Default::default(), 2, 2, course(1, Level::Beginner, 2, 8), 15);
    let orch = orchestrator(&repo);
    let anchor = future_monday();
    let job = run_to_draft(&orch, params(Some(anchor))).await;
    let assignment = job.draft_schedule[0][0].clone();

    // someone books the drafted teacher after the draft was produced
    let offset = repo.get_center_config().await.unwrap().offset();
    let date = first_on_or_after(anchor, assignment.day);
    let start = local_to_utc(date, assignment.start_minute, offset);
    repo.insert_session(SessionRecord {
        id: SessionId::new(500),
        class: ClassId::new(900),
        course: CourseId::new(1),
        teacher: assignment.teacher,
        room: RoomId::new(99),
        start_at: start,
        end_at: start + Duration::minutes(90),
        status: SessionStatus::Scheduled,
        session_no: 1,
        created_by_job: None,
    });

    let err = orch.finalize(job.id).await.unwrap_err();

    match &err {
        SchedulerError::Collision(message) => {
            assert!(message.contains(&format!("teacher {}", assignment.teacher)))
        }
        other => panic!("expected Collision, got {}", other),
    }
    assert_eq!(repo.class_count(), 0);
    assert_eq!(repo.session_count(), 1);

    let stored = orch.get_job(job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Draft);
    assert!(stored
        .logs
        .iter()
        .any(|l| l.is_error && l.message.starts_with("Finalize aborted")));
    assert!(!orch.status().is_scheduling);
}

#[tokio::test]
async fn test_finalize_succeeds_after_conflict_is_canceled() {
    let repo = seeded_repo(Default::default(), 1, 1, course(1, Level::Beginner, 1, 2), 5);
    let orch = orchestrator(&repo);
    let anchor = future_monday();
    let job = run_to_draft(&orch, params(Some(anchor))).await;
    let assignment = job.draft_schedule[0][0].clone();

    let offset = repo.get_center_config().await.unwrap().offset();
    let start = local_to_utc(
        first_on_or_after(anchor, assignment.day),
        assignment.start_minute,
        offset,
    );
    let mut blocker = SessionRecord {
        id: SessionId::new(700),
        class: ClassId::new(901),
        course: CourseId::new(1),
        teacher: assignment.teacher,
        room: assignment.room,
        start_at: start,
        end_at: start + Duration::minutes(90),
        status: SessionStatus::Scheduled,
        session_no: 1,
        created_by_job: None,
    };
    repo.insert_session(blocker.clone());
    assert!(orch.finalize(job.id).await.is_err());

    blocker.status = SessionStatus::Canceled;
    repo.insert_session(blocker);
    let summary = orch.finalize(job.id).await.unwrap();
    assert_eq!(summary.classes.len(), 1);
    assert_eq!(summary.session_count, 2);
}

#[tokio::test]
async fn test_holidays_shift_sessions_without_consuming_numbers() {
    let repo = seeded_repo(monday_morning_center(), 1, 1, course(1, Level::Beginner, 1, 3), 5);
    let anchor = future_monday();
    let orch = orchestrator(&repo).with_holidays(Arc::new(HolidayList::new([HolidayInfo {
        date: anchor,
        name: "Center closed".into(),
    }])));
    let job = run_to_draft(&orch, params(Some(anchor))).await;

    let summary = orch.finalize(job.id).await.unwrap();

    let offset = repo.get_center_config().await.unwrap().offset();
    let class = &summary.classes[0];
    let sessions = repo.sessions_for_class(class.id);
    let dates: Vec<_> = sessions
        .iter()
        .map(|s| utc_to_local(s.start_at, offset).0)
        .collect();
    assert_eq!(
        dates,
        vec![
            anchor + Duration::days(7),
            anchor + Duration::days(14),
            anchor + Duration::days(21)
        ]
    );
    assert!(dates.iter().all(|d| d.weekday().num_days_from_sunday() == 1));
    assert_eq!(
        sessions.iter().map(|s| s.session_no).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[tokio::test]
async fn test_finalized_classes_are_seen_by_next_run() {
    let repo = seeded_repo(monday_morning_center(), 1, 1, course(1, Level::Beginner, 1, 4), 5);
    let orch = orchestrator(&repo);
    let first = run_to_draft(&orch, params(None)).await;
    orch.finalize(first.id).await.unwrap();

    let second = run_to_draft(&orch, params(None)).await;

    let report = second.result_report.unwrap();
    assert_eq!(report.successful_count, 0);
    assert_eq!(report.failed_count, 1);

    let teacher = first.draft_schedule[0][0].teacher;
    let classes = repo.classes_for_teacher(teacher).await.unwrap();
    assert_eq!(classes.len(), 1);
}

/// Local repository with injectable storage faults and slow class lookups.
#[derive(Default)]
struct FaultyRepository {
    inner: LocalRepository,
    fail_completed_updates: AtomicBool,
    fail_commit: AtomicBool,
    class_lookup_delays: Mutex<VecDeque<u64>>,
}

impl FaultyRepository {
    fn wrap(inner: &LocalRepository) -> Self {
        Self {
            inner: inner.clone(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl CatalogRepository for FaultyRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.inner.health_check().await
    }

    async fn get_center_config(&self) -> RepositoryResult<CenterConfig> {
        self.inner.get_center_config().await
    }

    async fn list_teachers(&self) -> RepositoryResult<Vec<Teacher>> {
        self.inner.list_teachers().await
    }

    async fn list_rooms(&self) -> RepositoryResult<Vec<Room>> {
        self.inner.list_rooms().await
    }

    async fn list_courses(&self) -> RepositoryResult<Vec<Course>> {
        self.inner.list_courses().await
    }

    async fn list_students(&self) -> RepositoryResult<Vec<Student>> {
        self.inner.list_students().await
    }

    async fn list_enrollments(&self) -> RepositoryResult<Vec<Enrollment>> {
        self.inner.list_enrollments().await
    }
}

#[async_trait]
impl TimetableRepository for FaultyRepository {
    async fn list_classes(&self) -> RepositoryResult<Vec<ClassRecord>> {
        self.inner.list_classes().await
    }

    async fn list_sessions_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> RepositoryResult<Vec<SessionRecord>> {
        self.inner.list_sessions_between(from, until).await
    }

    async fn find_classes_by_job(&self, job: JobId) -> RepositoryResult<Vec<ClassRecord>> {
        let delay = self.class_lookup_delays.lock().pop_front().unwrap_or(0);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        self.inner.find_classes_by_job(job).await
    }

    async fn classes_for_teacher(&self, teacher: TeacherId) -> RepositoryResult<Vec<ClassRecord>> {
        self.inner.classes_for_teacher(teacher).await
    }

    async fn find_overlapping_session(
        &self,
        exclude: Option<SessionId>,
        teacher: TeacherId,
        room: RoomId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Option<SessionRecord>> {
        self.inner
            .find_overlapping_session(exclude, teacher, room, start, end)
            .await
    }

    async fn has_live_enrollments(&self, classes: &[ClassId]) -> RepositoryResult<bool> {
        self.inner.has_live_enrollments(classes).await
    }

    async fn commit_finalization(
        &self,
        job: &ScheduleJob,
        classes: Vec<NewClass>,
    ) -> RepositoryResult<Vec<ClassRecord>> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(RepositoryError::connection("store went away"));
        }
        self.inner.commit_finalization(job, classes).await
    }

    async fn delete_job_outputs(&self, job: JobId) -> RepositoryResult<DeletedOutputs> {
        self.inner.delete_job_outputs(job).await
    }
}

#[async_trait]
impl JobRepository for FaultyRepository {
    async fn create_job(&self, job: &ScheduleJob) -> RepositoryResult<()> {
        self.inner.create_job(job).await
    }

    async fn get_job(&self, id: JobId) -> RepositoryResult<ScheduleJob> {
        self.inner.get_job(id).await
    }

    async fn list_jobs(&self) -> RepositoryResult<Vec<ScheduleJob>> {
        self.inner.list_jobs().await
    }

    async fn update_job(&self, job: &ScheduleJob) -> RepositoryResult<()> {
        if job.status == JobStatus::Completed && self.fail_completed_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::connection("write timed out"));
        }
        self.inner.update_job(job).await
    }

    async fn transition_job(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    ) -> RepositoryResult<ScheduleJob> {
        self.inner.transition_job(id, from, to).await
    }

    async fn delete_job(&self, id: JobId) -> RepositoryResult<()> {
        self.inner.delete_job(id).await
    }

    async fn append_logs(&self, id: JobId, entries: &[JobLogEntry]) -> RepositoryResult<()> {
        self.inner.append_logs(id, entries).await
    }
}

fn orchestrator_over(repo: &Arc<FaultyRepository>) -> ScheduleOrchestrator {
    let repo: Arc<dyn FullRepository> = repo.clone();
    ScheduleOrchestrator::new(repo, EventBus::default(), &EngineConfig::default())
}

#[tokio::test]
async fn test_completion_is_written_with_the_commit() {
    let local = seeded_repo(Default::default(), 2, 2, course(1, Level::Beginner, 2, 4), 15);
    let repo = Arc::new(FaultyRepository::wrap(&local));
    repo.fail_completed_updates.store(true, Ordering::SeqCst);
    let orch = orchestrator_over(&repo);
    let job = run_to_draft(&orch, params(None)).await;

    let summary = orch.finalize(job.id).await.unwrap();

    let stored = orch.get_job(job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(local.class_count(), summary.classes.len());
    assert!(matches!(
        orch.finalize(job.id).await.unwrap_err(),
        SchedulerError::AlreadyFinalized(_)
    ));
    let deleted = orch.delete_job(job.id).await.unwrap();
    assert_eq!(deleted.classes, summary.classes.len());
    assert_eq!(local.class_count(), 0);
}

#[tokio::test]
async fn test_failed_commit_leaves_no_records() {
    let local = seeded_repo(Default::default(), 2, 2, course(1, Level::Beginner, 2, 4), 15);
    let repo = Arc::new(FaultyRepository::wrap(&local));
    let orch = orchestrator_over(&repo);
    let job = run_to_draft(&orch, params(None)).await;
    repo.fail_commit.store(true, Ordering::SeqCst);

    let err = orch.finalize(job.id).await.unwrap_err();

    assert!(matches!(err, SchedulerError::Repository(RepositoryError::ConnectionError { .. })));
    assert_eq!(local.class_count(), 0);
    assert_eq!(local.session_count(), 0);
    let stored = orch.get_job(job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::SystemError);
    assert!(stored.logs.iter().any(|l| l.is_error && l.message.contains("store went away")));
    assert!(!orch.status().is_scheduling);
}

#[tokio::test]
async fn test_overlapping_finalize_calls_commit_once() {
    let local = seeded_repo(Default::default(), 2, 2, course(1, Level::Beginner, 2, 4), 15);
    let repo = Arc::new(FaultyRepository::wrap(&local));
    let orch = orchestrator_over(&repo);
    let job = run_to_draft(&orch, params(None)).await;
    // one caller stalls after its status check; the other runs to completion meanwhile
    repo.class_lookup_delays.lock().extend([100, 0]);

    let (first, second) = tokio::join!(orch.finalize(job.id), orch.finalize(job.id));

    let (summary, err) = match (first, second) {
        (Ok(summary), Err(err)) | (Err(err), Ok(summary)) => (summary, err),
        (first, second) => panic!("expected one success, got {:?} and {:?}", first.err(), second.err()),
    };
    assert!(matches!(err, SchedulerError::AlreadyFinalized(id) if id == job.id));
    let stored = orch.get_job(job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(local.class_count(), summary.classes.len());
    assert!(!orch.status().is_scheduling);

    orch.delete_job(job.id).await.unwrap();
    assert_eq!(local.class_count(), 0);
}
