//! In-memory local repository implementation.
//!
//! All data lives behind one `parking_lot::RwLock`, which makes every trait
//! method a single critical section. `commit_finalization` relies on that: its
//! checks and inserts happen under one write guard, so a finalize is applied
//! entirely or not at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::db::repository::timetable::DeletedOutputs;
use crate::db::repository::*;
use crate::db::seed::SeedData;
use crate::models::{
    CenterConfig, ClassId, ClassRecord, ClassStatus, Course, Enrollment, JobId, JobLogEntry,
    JobStatus, NewClass, Room, RoomId, ScheduleJob, SessionId, SessionRecord, SessionStatus, Student,
    Teacher, TeacherId,
};

/// In-memory local repository.
///
/// Used by the server when no external store is configured, and by tests that
/// need isolation and speed.
///
/// # Example
/// ```
/// use timetable_engine::db::repositories::LocalRepository;
/// use timetable_engine::db::CatalogRepository;
///
/// # tokio_test_block(async {
/// let repo = LocalRepository::new();
/// assert!(repo.health_check().await.unwrap());
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone, Default)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    center: CenterConfig,
    teachers: Vec<Teacher>,
    rooms: Vec<Room>,
    courses: Vec<Course>,
    students: Vec<Student>,
    enrollments: Vec<Enrollment>,

    classes: BTreeMap<ClassId, ClassRecord>,
    sessions: BTreeMap<SessionId, SessionRecord>,
    jobs: HashMap<JobId, ScheduleJob>,

    // ID counters
    next_class_id: i64,
    next_session_id: i64,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            center: CenterConfig::default(),
            teachers: Vec::new(),
            rooms: Vec::new(),
            courses: Vec::new(),
            students: Vec::new(),
            enrollments: Vec::new(),
            classes: BTreeMap::new(),
            sessions: BTreeMap::new(),
            jobs: HashMap::new(),
            next_class_id: 1,
            next_session_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository with the default center calendar.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let repo = Self::new();
        repo.set_center_config(seed.center);
        {
            let mut data = repo.data.write();
            data.teachers = seed.teachers;
            data.rooms = seed.rooms;
            data.courses = seed.courses;
            data.students = seed.students;
            data.enrollments = seed.enrollments;
        }
        for class in seed.classes {
            repo.insert_class(class);
        }
        for session in seed.sessions {
            repo.insert_session(session);
        }
        repo
    }

    pub fn from_seed_file<P: AsRef<Path>>(path: P) -> RepositoryResult<Self> {
        let seed = SeedData::from_file(path)?;
        log::info!(
            "Seeded local repository: {} teachers, {} rooms, {} courses, {} students",
            seed.teachers.len(),
            seed.rooms.len(),
            seed.courses.len(),
            seed.students.len()
        );
        Ok(Self::from_seed(seed))
    }

    // ==================== Setup helpers ====================

    pub fn set_center_config(&self, config: CenterConfig) {
        self.data.write().center = config;
    }

    pub fn add_teacher(&self, teacher: Teacher) {
        self.data.write().teachers.push(teacher);
    }

    pub fn add_room(&self, room: Room) {
        self.data.write().rooms.push(room);
    }

    pub fn add_course(&self, course: Course) {
        self.data.write().courses.push(course);
    }

    pub fn add_student(&self, student: Student) {
        self.data.write().students.push(student);
    }

    pub fn add_enrollment(&self, enrollment: Enrollment) {
        self.data.write().enrollments.push(enrollment);
    }

    /// Store a class as-is, keeping its id.
    pub fn insert_class(&self, class: ClassRecord) -> ClassId {
        let mut data = self.data.write();
        let id = class.id;
        data.next_class_id = data.next_class_id.max(id.value() + 1);
        data.classes.insert(id, class);
        id
    }

    /// Store a session as-is, keeping its id.
    pub fn insert_session(&self, session: SessionRecord) -> SessionId {
        let mut data = self.data.write();
        let id = session.id;
        data.next_session_id = data.next_session_id.max(id.value() + 1);
        data.sessions.insert(id, session);
        id
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    pub fn class_count(&self) -> usize {
        self.data.read().classes.len()
    }

    pub fn session_count(&self) -> usize {
        self.data.read().sessions.len()
    }

    /// Sessions of one class ordered by session number.
    pub fn sessions_for_class(&self, class: ClassId) -> Vec<SessionRecord> {
        let data = self.data.read();
        let mut sessions: Vec<_> = data
            .sessions
            .values()
            .filter(|s| s.class == class)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.session_no);
        sessions
    }

    /// Helper to check health and return error if unhealthy.
    fn check_health(&self) -> RepositoryResult<()> {
        if !self.data.read().is_healthy {
            return Err(RepositoryError::connection("local repository is not healthy"));
        }
        Ok(())
    }
}

/// Whether a new session collides with an existing one on teacher or room.
fn collision_message(
    teacher: TeacherId,
    room: RoomId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    other: &SessionRecord,
) -> Option<String> {
    let same_start = other.start_at == start;
    if !(same_start || other.overlaps(start, end)) {
        return None;
    }
    let at = start.format("%Y-%m-%d %H:%M UTC");
    if other.teacher == teacher {
        Some(format!(
            "teacher {} is already booked at {} by class {}",
            teacher, at, other.class
        ))
    } else if other.room == room {
        Some(format!(
            "room {} is already booked at {} by class {}",
            room, at, other.class
        ))
    } else {
        None
    }
}

#[async_trait]
impl CatalogRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn get_center_config(&self) -> RepositoryResult<CenterConfig> {
        self.check_health()?;
        Ok(self.data.read().center.clone())
    }

    async fn list_teachers(&self) -> RepositoryResult<Vec<Teacher>> {
        self.check_health()?;
        Ok(self.data.read().teachers.clone())
    }

    async fn list_rooms(&self) -> RepositoryResult<Vec<Room>> {
        self.check_health()?;
        Ok(self.data.read().rooms.clone())
    }

    async fn list_courses(&self) -> RepositoryResult<Vec<Course>> {
        self.check_health()?;
        Ok(self.data.read().courses.clone())
    }

    async fn list_students(&self) -> RepositoryResult<Vec<Student>> {
        self.check_health()?;
        Ok(self.data.read().students.clone())
    }

    async fn list_enrollments(&self) -> RepositoryResult<Vec<Enrollment>> {
        self.check_health()?;
        Ok(self.data.read().enrollments.clone())
    }
}

#[async_trait]
impl TimetableRepository for LocalRepository {
    async fn list_classes(&self) -> RepositoryResult<Vec<ClassRecord>> {
        self.check_health()?;
        Ok(self.data.read().classes.values().cloned().collect())
    }

    async fn list_sessions_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> RepositoryResult<Vec<SessionRecord>> {
        self.check_health()?;
        Ok(self
            .data
            .read()
            .sessions
            .values()
            .filter(|s| s.start_at >= from && s.start_at < until)
            .cloned()
            .collect())
    }

    async fn find_classes_by_job(&self, job: JobId) -> RepositoryResult<Vec<ClassRecord>> {
        self.check_health()?;
        Ok(self
            .data
            .read()
            .classes
            .values()
            .filter(|c| c.created_by_job == Some(job))
            .cloned()
            .collect())
    }

    async fn classes_for_teacher(&self, teacher: TeacherId) -> RepositoryResult<Vec<ClassRecord>> {
        self.check_health()?;
        Ok(self
            .data
            .read()
            .classes
            .values()
            .filter(|c| c.is_live() && c.teachers().any(|t| t == teacher))
            .cloned()
            .collect())
    }

    async fn find_overlapping_session(
        &self,
        exclude: Option<SessionId>,
        teacher: TeacherId,
        room: RoomId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Option<SessionRecord>> {
        self.check_health()?;
        let data = self.data.read();
        Ok(data
            .sessions
            .values()
            .filter(|s| s.status.is_booking() && Some(s.id) != exclude)
            .filter(|s| s.teacher == teacher || s.room == room)
            .filter(|s| s.overlaps(start, end))
            .min_by_key(|s| (s.start_at, s.id))
            .cloned())
    }

    async fn has_live_enrollments(&self, classes: &[ClassId]) -> RepositoryResult<bool> {
        self.check_health()?;
        Ok(self
            .data
            .read()
            .enrollments
            .iter()
            .any(|e| e.status.is_live() && classes.contains(&e.class)))
    }

    async fn commit_finalization(
        &self,
        job: &ScheduleJob,
        classes: Vec<NewClass>,
    ) -> RepositoryResult<Vec<ClassRecord>> {
        self.check_health()?;
        let mut data = self.data.write();
        let job_id = job.id;
        let ctx = || ErrorContext::new("commit_finalization").with_entity_id(job_id);

        if job.status != JobStatus::Completed {
            return Err(RepositoryError::validation_with_context(
                format!("job {} is {}, not completed", job_id, job.status),
                ctx().with_entity("job"),
            ));
        }
        match data.jobs.get(&job_id).map(|stored| stored.status) {
            None => {
                return Err(RepositoryError::not_found_with_context(
                    format!("job {} not found", job_id),
                    ctx().with_entity("job"),
                ))
            }
            Some(JobStatus::Finalizing) => {}
            Some(status) => {
                return Err(RepositoryError::conflict_with_context(
                    format!("job {} is {}, not finalizing", job_id, status),
                    ctx().with_entity("job"),
                ))
            }
        }
        if data.classes.values().any(|c| c.created_by_job == Some(job_id)) {
            return Err(RepositoryError::conflict_with_context(
                format!("job {} already has classes", job_id),
                ctx().with_entity("job"),
            ));
        }

        let mut signatures: Vec<&str> = data
            .classes
            .values()
            .filter(|c| c.is_live())
            .filter_map(|c| c.schedule_signature.as_deref())
            .collect();
        for class in &classes {
            if class.sessions.is_empty() || class.weekly_schedules.is_empty() {
                return Err(RepositoryError::validation_with_context(
                    format!("class {} has no schedule", class.code),
                    ctx().with_entity("class"),
                ));
            }
            if signatures.contains(&class.schedule_signature.as_str()) {
                return Err(RepositoryError::conflict_with_context(
                    format!("an identical timetable already exists for class {}", class.code),
                    ctx()
                        .with_entity("class")
                        .with_details(class.schedule_signature.clone()),
                ));
            }
            signatures.push(&class.schedule_signature);
        }

        let booking: Vec<&SessionRecord> = data
            .sessions
            .values()
            .filter(|s| s.status.is_booking())
            .collect();
        let mut staged: Vec<SessionRecord> = Vec::new();
        let mut next_class_id = data.next_class_id;
        let mut next_session_id = data.next_session_id;
        let mut records = Vec::with_capacity(classes.len());

        for class in classes {
            let class_id = ClassId::new(next_class_id);
            next_class_id += 1;
            for s in &class.sessions {
                let hit = booking
                    .iter()
                    .copied()
                    .chain(staged.iter())
                    .find_map(|other| collision_message(s.teacher, s.room, s.start_at, s.end_at, other));
                if let Some(message) = hit {
                    return Err(RepositoryError::conflict_with_context(
                        message,
                        ctx().with_entity("session"),
                    ));
                }
                staged.push(SessionRecord {
                    id: SessionId::new(next_session_id),
                    class: class_id,
                    course: class.course,
                    teacher: s.teacher,
                    room: s.room,
                    start_at: s.start_at,
                    end_at: s.end_at,
                    status: SessionStatus::Scheduled,
                    session_no: s.session_no,
                    created_by_job: Some(job_id),
                });
                next_session_id += 1;
            }
            records.push(ClassRecord {
                id: class_id,
                name: class.name,
                code: class.code,
                course: class.course,
                weekly_schedules: class.weekly_schedules,
                start_at: class.start_at,
                end_at: class.end_at,
                status: ClassStatus::Approved,
                capacity: class.capacity,
                created_by_job: Some(job_id),
                schedule_signature: Some(class.schedule_signature),
            });
        }
        drop(booking);

        for session in staged {
            data.sessions.insert(session.id, session);
        }
        for record in &records {
            data.classes.insert(record.id, record.clone());
        }
        data.next_class_id = next_class_id;
        data.next_session_id = next_session_id;
        if let Some(stored) = data.jobs.get_mut(&job_id) {
            replace_job(stored, job);
        }
        Ok(records)
    }

    async fn delete_job_outputs(&self, job: JobId) -> RepositoryResult<DeletedOutputs> {
        self.check_health()?;
        let mut data = self.data.write();
        let sessions_before = data.sessions.len();
        let classes_before = data.classes.len();
        data.sessions.retain(|_, s| s.created_by_job != Some(job));
        data.classes.retain(|_, c| c.created_by_job != Some(job));
        Ok(DeletedOutputs {
            classes: classes_before - data.classes.len(),
            sessions: sessions_before - data.sessions.len(),
        })
    }
}

#[async_trait]
impl JobRepository for LocalRepository {
    async fn create_job(&self, job: &ScheduleJob) -> RepositoryResult<()> {
        self.check_health()?;
        let mut data = self.data.write();
        if data.jobs.contains_key(&job.id) {
            return Err(RepositoryError::conflict_with_context(
                format!("job {} already exists", job.id),
                ErrorContext::new("create_job").with_entity("job"),
            ));
        }
        data.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> RepositoryResult<ScheduleJob> {
        self.check_health()?;
        self.data.read().jobs.get(&id).cloned().ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("job {} not found", id),
                ErrorContext::new("get_job").with_entity("job").with_entity_id(id),
            )
        })
    }

    async fn list_jobs(&self) -> RepositoryResult<Vec<ScheduleJob>> {
        self.check_health()?;
        let mut jobs: Vec<_> = self.data.read().jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn update_job(&self, job: &ScheduleJob) -> RepositoryResult<()> {
        self.check_health()?;
        let mut data = self.data.write();
        let stored = data.jobs.get_mut(&job.id).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("job {} not found", job.id),
                ErrorContext::new("update_job").with_entity("job"),
            )
        })?;
        replace_job(stored, job);
        Ok(())
    }

    async fn transition_job(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    ) -> RepositoryResult<ScheduleJob> {
        self.check_health()?;
        let mut data = self.data.write();
        let ctx = || ErrorContext::new("transition_job").with_entity("job").with_entity_id(id);
        let job = data.jobs.get_mut(&id).ok_or_else(|| {
            RepositoryError::not_found_with_context(format!("job {} not found", id), ctx())
        })?;
        if job.status != from {
            return Err(RepositoryError::conflict_with_context(
                format!("job {} is {}, expected {}", id, job.status, from),
                ctx(),
            ));
        }
        job.transition(to)
            .map_err(|e| RepositoryError::validation_with_context(e.to_string(), ctx()))?;
        Ok(job.clone())
    }

    async fn delete_job(&self, id: JobId) -> RepositoryResult<()> {
        self.check_health()?;
        self.data.write().jobs.remove(&id).map(|_| ()).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("job {} not found", id),
                ErrorContext::new("delete_job").with_entity("job"),
            )
        })
    }

    async fn append_logs(&self, id: JobId, entries: &[JobLogEntry]) -> RepositoryResult<()> {
        self.check_health()?;
        let mut data = self.data.write();
        let job = data.jobs.get_mut(&id).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("job {} not found", id),
                ErrorContext::new("append_logs").with_entity("job"),
            )
        })?;
        job.logs.extend_from_slice(entries);
        job.updated_at = Utc::now();
        Ok(())
    }
}

/// Overwrite a stored job, keeping its log stream.
fn replace_job(stored: &mut ScheduleJob, job: &ScheduleJob) {
    let logs = std::mem::take(&mut stored.logs);
    *stored = job.clone();
    stored.logs = logs;
}
