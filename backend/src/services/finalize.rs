//! Turning an approved draft into persisted classes and dated sessions.
//!
//! The committer re-validates the draft against live storage in two passes
//! before writing anything:
//!
//! 1. weekly granularity: every (teacher, day, shift) and (room, day, shift) of
//!    the draft must be free of live weekly patterns and of booking sessions
//!    inside the horizon;
//! 2. exact granularity: every expanded session must not overlap a live
//!    booking session of its teacher or room.
//!
//! The write itself is a single [`TimetableRepository::commit_finalization`]
//! call, which repeats the exact checks under the store's own lock and marks
//! the job `completed` in the same unit.
//!
//! [`TimetableRepository::commit_finalization`]: crate::db::TimetableRepository::commit_finalization

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::error::{SchedulerError, SchedulerResult};
use crate::config::SchedulerSettings;
use crate::db::{schedule_signature, FullRepository, RepositoryError};
use crate::models::{
    day_name, Assignment, CenterConfig, ClassId, ClassRecord, Course, CourseId, DayOfWeek,
    JobStatus, NewClass, NewSession, RoomId, ScheduleJob, TeacherId, WeeklySlot,
};
use crate::scheduling::calendar::{expand_weekly, local_to_utc, utc_to_local};
use crate::scheduling::HolidayCalendar;

/// What a successful finalize created.
#[derive(Debug, Clone)]
pub struct FinalizeSummary {
    pub classes: Vec<ClassRecord>,
    pub session_count: usize,
    /// New classes per involved teacher.
    pub teacher_classes: BTreeMap<TeacherId, BTreeSet<ClassId>>,
}

pub struct FinalizeCommitter<'a> {
    repo: &'a dyn FullRepository,
    holidays: &'a dyn HolidayCalendar,
    settings: &'a SchedulerSettings,
}

/// Start date for a job's classes: its anchor, never earlier than `today`.
pub fn effective_anchor(anchor: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    anchor.unwrap_or(today).max(today)
}

/// Generated class code, unique within one job.
pub fn class_code(course: &Course, anchor: NaiveDate, job: &ScheduleJob, seq: usize) -> String {
    let category: String = course
        .category
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase();
    format!(
        "{}-{}-{}-{}-{:02}",
        category,
        course.level.code(),
        anchor.format("%y%m%d"),
        job.id.short(),
        seq
    )
}

fn format_local(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string()
}

/// Live weekly occupancy keyed by (resource, day, shift index).
#[derive(Default)]
struct WeeklyOccupancy {
    teachers: HashSet<(TeacherId, DayOfWeek, usize)>,
    rooms: HashSet<(RoomId, DayOfWeek, usize)>,
}

impl<'a> FinalizeCommitter<'a> {
    pub fn new(
        repo: &'a dyn FullRepository,
        holidays: &'a dyn HolidayCalendar,
        settings: &'a SchedulerSettings,
    ) -> Self {
        Self {
            repo,
            holidays,
            settings,
        }
    }

    /// Validate and persist the draft of `job`, which must be stored as `finalizing`.
    ///
    /// On success the stored job is `completed`; on any error nothing is written.
    ///
    /// # Errors
    /// - `Collision` when live data clashes with the draft;
    /// - `InvalidRequest` when the draft references a missing course or cannot be expanded;
    /// - `Repository` for storage failures.
    pub async fn commit(&self, job: &ScheduleJob, today: NaiveDate) -> SchedulerResult<FinalizeSummary> {
        let config = self.repo.get_center_config().await?;
        let offset = config.offset();
        let anchor = effective_anchor(job.params.class_start_anchor, today);

        let courses: HashMap<CourseId, Course> = self
            .repo
            .list_courses()
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let occupancy = self.weekly_occupancy(&config, job, anchor).await?;
        for assignment in job.draft_schedule.iter().flatten() {
            self.freeze_check_weekly(&config, &occupancy, assignment)?;
        }

        let mut classes = Vec::with_capacity(job.draft_schedule.len());
        for (n, group) in job.draft_schedule.iter().enumerate() {
            let Some(first) = group.first() else {
                continue;
            };
            let course = courses.get(&first.course).ok_or_else(|| {
                SchedulerError::InvalidRequest(format!(
                    "course {} in the draft no longer exists",
                    first.course
                ))
            })?;
            let class = self.build_class(job, group, course, anchor, n + 1, offset)?;
            for session in &class.sessions {
                self.freeze_check_exact(session, offset).await?;
            }
            classes.push(class);
        }

        let session_count = classes.iter().map(|c| c.sessions.len()).sum();
        let mut completed = job.clone();
        completed.transition(JobStatus::Completed)?;
        let created = self
            .repo
            .commit_finalization(&completed, classes)
            .await
            .map_err(|e| match e {
                RepositoryError::ConflictError { message, .. } => SchedulerError::Collision(message),
                other => SchedulerError::Repository(other),
            })?;

        let mut teacher_classes: BTreeMap<TeacherId, BTreeSet<ClassId>> = BTreeMap::new();
        for class in &created {
            for teacher in class.teachers() {
                teacher_classes.entry(teacher).or_default().insert(class.id);
            }
        }

        Ok(FinalizeSummary {
            classes: created,
            session_count,
            teacher_classes,
        })
    }

    async fn weekly_occupancy(
        &self,
        config: &CenterConfig,
        job: &ScheduleJob,
        anchor: NaiveDate,
    ) -> SchedulerResult<WeeklyOccupancy> {
        let mut occupancy = WeeklyOccupancy::default();

        for class in self.repo.list_classes().await? {
            if !class.is_live() || class.created_by_job == Some(job.id) {
                continue;
            }
            for slot in &class.weekly_schedules {
                if let Some(shift) = config.find_shift_by_minute(slot.start_minute, slot.end_minute) {
                    occupancy.teachers.insert((slot.teacher, slot.day_of_week, shift));
                    occupancy.rooms.insert((slot.room, slot.day_of_week, shift));
                }
            }
        }

        let offset = config.offset();
        let from = local_to_utc(anchor, 0, offset);
        let until = from + Duration::weeks(i64::from(self.settings.horizon_weeks));
        for session in self.repo.list_sessions_between(from, until).await? {
            if !session.status.is_booking() || session.created_by_job == Some(job.id) {
                continue;
            }
            let (_, day, start) = utc_to_local(session.start_at, offset);
            let length = (session.end_at - session.start_at).num_minutes().max(0) as u32;
            if let Some(shift) = config.find_shift_by_minute(start, start + length) {
                occupancy.teachers.insert((session.teacher, day, shift));
                occupancy.rooms.insert((session.room, day, shift));
            }
        }
        Ok(occupancy)
    }

    fn freeze_check_weekly(
        &self,
        config: &CenterConfig,
        occupancy: &WeeklyOccupancy,
        a: &Assignment,
    ) -> SchedulerResult<()> {
        let Some(shift) = config
            .shift_index(&a.shift_name)
            .or_else(|| config.find_shift_by_minute(a.start_minute, a.end_minute))
        else {
            return Err(SchedulerError::InvalidRequest(format!(
                "shift '{}' is no longer configured",
                a.shift_name
            )));
        };
        if occupancy.teachers.contains(&(a.teacher, a.day, shift)) {
            return Err(SchedulerError::Collision(format!(
                "teacher {} already teaches on {} {}",
                a.teacher,
                day_name(a.day),
                a.shift_name
            )));
        }
        if occupancy.rooms.contains(&(a.room, a.day, shift)) {
            return Err(SchedulerError::Collision(format!(
                "room {} is already booked on {} {}",
                a.room,
                day_name(a.day),
                a.shift_name
            )));
        }
        Ok(())
    }

    async fn freeze_check_exact(&self, session: &NewSession, offset: FixedOffset) -> SchedulerResult<()> {
        let hit = self
            .repo
            .find_overlapping_session(None, session.teacher, session.room, session.start_at, session.end_at)
            .await?;
        match hit {
            None => Ok(()),
            Some(other) if other.teacher == session.teacher => Err(SchedulerError::Collision(format!(
                "teacher {} already has a session at {} (class {})",
                session.teacher,
                format_local(other.start_at, offset),
                other.class
            ))),
            Some(other) => Err(SchedulerError::Collision(format!(
                "room {} already has a session at {} (class {})",
                session.room,
                format_local(other.start_at, offset),
                other.class
            ))),
        }
    }

    fn build_class(
        &self,
        job: &ScheduleJob,
        group: &[Assignment],
        course: &Course,
        anchor: NaiveDate,
        seq: usize,
        offset: FixedOffset,
    ) -> SchedulerResult<NewClass> {
        let weekly_schedules: Vec<WeeklySlot> = group
            .iter()
            .map(|a| WeeklySlot {
                day_of_week: a.day,
                start_minute: a.start_minute,
                end_minute: a.end_minute,
                room: a.room,
                teacher: a.teacher,
            })
            .collect();
        let code = class_code(course, anchor, job, seq);

        let occurrences = expand_weekly(
            &weekly_schedules,
            anchor,
            course.total_sessions,
            self.holidays,
            offset,
            self.settings.max_expansion_weeks,
        )
        .map_err(|e| SchedulerError::InvalidRequest(format!("class {}: {}", code, e)))?;
        let (Some(first), Some(last)) = (occurrences.first(), occurrences.last()) else {
            return Err(SchedulerError::InvalidRequest(format!(
                "class {}: course {} has no sessions",
                code, course.id
            )));
        };
        let (start_at, end_at) = (first.start_at, last.end_at);

        let capacity = job
            .analysis
            .virtual_classes
            .iter()
            .find(|vc| vc.id == group[0].virtual_class)
            .map(|vc| vc.student_count)
            .unwrap_or(course.max_student);

        let sessions = occurrences
            .iter()
            .map(|o| {
                let slot = &weekly_schedules[o.slot];
                NewSession {
                    teacher: slot.teacher,
                    room: slot.room,
                    start_at: o.start_at,
                    end_at: o.end_at,
                    session_no: o.session_no,
                }
            })
            .collect();

        Ok(NewClass {
            name: format!("{} | {} sessions/week", course.name, weekly_schedules.len()),
            code,
            course: course.id,
            schedule_signature: schedule_signature(course.id, &weekly_schedules),
            weekly_schedules,
            start_at,
            end_at,
            capacity,
            created_by_job: job.id,
            sessions,
        })
    }
}
