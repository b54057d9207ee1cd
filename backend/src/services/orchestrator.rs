//! ScheduleJob lifecycle: trigger, background run, finalize, delete and queries.
//!
//! ```text
//! pending ──► running ──► draft ──► finalizing ──► completed
//!    │           │                      │
//!    └───────────┴──► system_error ◄────┘ (or back to draft)
//! ```
//!
//! The center-wide [`SchedulingLock`] is taken when a run is triggered and
//! released once it reaches `draft` or `system_error`; a finalize takes it again
//! for the duration of the commit. Finalize claims the job with a status
//! compare-and-set, so two overlapping calls cannot both commit.

use chrono::{Duration, NaiveDate, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::error::{SchedulerError, SchedulerResult};
use super::events::{EventBus, JobEvent};
use super::finalize::{effective_anchor, FinalizeCommitter, FinalizeSummary};
use super::job_tracker::JobTracker;
use super::lock::{SchedulingGuard, SchedulingLock};
use crate::config::{EngineConfig, SchedulerSettings};
use crate::db::{DeletedOutputs, FullRepository, RepositoryError};
use crate::models::{
    ClassId, JobId, JobLogEntry, JobStage, JobStatus, ResultReport, ScheduleJob, ScheduleParams,
};
use crate::scheduling::calendar::local_to_utc;
use crate::scheduling::{
    DemandAnalyzer, DemandInputs, GreedyScheduler, HolidayCalendar, ResourceSnapshot,
    ScheduleState, ScoringWeights,
};

/// A freshly triggered job and the task running it.
pub struct TriggeredJob {
    pub job: ScheduleJob,
    pub handle: JoinHandle<()>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub is_scheduling: bool,
    pub job_id: Option<JobId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobAnalytics {
    pub total_jobs: usize,
    pub by_status: BTreeMap<JobStatus, usize>,
    /// Mean success rate over jobs that produced a report.
    pub average_success_rate: Option<f64>,
    pub classes_scheduled: usize,
    pub classes_failed: usize,
}

#[derive(Clone)]
pub struct ScheduleOrchestrator {
    repo: Arc<dyn FullRepository>,
    tracker: JobTracker,
    lock: SchedulingLock,
    settings: Arc<SchedulerSettings>,
    weights: Arc<ScoringWeights>,
    holidays: Arc<dyn HolidayCalendar>,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl ScheduleOrchestrator {
    pub fn new(repo: Arc<dyn FullRepository>, events: EventBus, config: &EngineConfig) -> Self {
        Self {
            tracker: JobTracker::new(Arc::clone(&repo), events),
            repo,
            lock: SchedulingLock::new(),
            settings: Arc::new(config.scheduler.clone()),
            weights: Arc::new(config.scoring.clone()),
            holidays: Arc::new(config.holiday_calendar()),
        }
    }

    /// Replace the holiday source, e.g. with a national calendar.
    pub fn with_holidays(mut self, holidays: Arc<dyn HolidayCalendar>) -> Self {
        self.holidays = holidays;
        self
    }

    pub fn events(&self) -> &EventBus {
        self.tracker.events()
    }

    pub fn repository(&self) -> &Arc<dyn FullRepository> {
        &self.repo
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    async fn today(&self) -> SchedulerResult<NaiveDate> {
        let offset = self.repo.get_center_config().await?.offset();
        Ok(Utc::now().with_timezone(&offset).date_naive())
    }

    // ==================== Run ====================

    /// Create a `pending` job and start it in the background.
    ///
    /// Returns as soon as the job is stored; the run holds the scheduling lock
    /// until it reaches `draft` or `system_error`.
    pub async fn trigger(&self, params: ScheduleParams) -> SchedulerResult<TriggeredJob> {
        params.validate().map_err(SchedulerError::InvalidRequest)?;

        let job_id = JobId::generate();
        let guard = self.lock.try_acquire(job_id).map_err(SchedulerError::Busy)?;

        let job = ScheduleJob::new(job_id, params);
        self.repo.create_job(&job).await?;
        self.tracker
            .log(
                job_id,
                JobStage::Start,
                format!(
                    "Run queued for intake {} .. {}",
                    job.params.intake_start_date, job.params.intake_end_date
                ),
            )
            .await?;

        let this = self.clone();
        let handle = tokio::spawn(async move { this.run_job(job_id, guard).await });
        Ok(TriggeredJob { job, handle })
    }

    /// Execute a run to completion, turning any error or panic into `system_error`.
    async fn run_job(self, job_id: JobId, guard: SchedulingGuard) {
        let outcome = AssertUnwindSafe(self.execute(job_id)).catch_unwind().await;
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(payload) => Some(format!("run panicked: {}", panic_message(payload.as_ref()))),
        };
        log::debug!("Job {} releases the scheduling lock", guard.job().short());
        drop(guard);

        match failure {
            None => self.events().publish(JobEvent::Completed { job_id }),
            Some(message) => self.mark_system_error(job_id, &message).await,
        }
    }

    async fn mark_system_error(&self, job_id: JobId, message: &str) {
        match self.repo.get_job(job_id).await {
            Ok(mut job) if job.status.can_transition_to(JobStatus::SystemError) => {
                if job.transition(JobStatus::SystemError).is_ok() {
                    if let Err(e) = self.repo.update_job(&job).await {
                        log::error!("Could not mark job {} as system_error: {}", job_id, e);
                    }
                }
            }
            Ok(job) => log::error!("Job {} failed while {}: {}", job_id, job.status, message),
            Err(e) => log::error!("Could not load failed job {}: {}", job_id, e),
        }
        if let Err(e) = self.tracker.fail(job_id, message).await {
            log::error!("Could not store failure of job {}: {}", job_id, e);
        }
    }

    async fn execute(&self, job_id: JobId) -> SchedulerResult<()> {
        let mut job = self.repo.get_job(job_id).await?;
        job.transition(JobStatus::Running)?;
        self.repo.update_job(&job).await?;
        self.tracker.log(job_id, JobStage::Start, "Scheduling run started").await?;

        self.tracker
            .log(job_id, JobStage::Load, "Loading teachers, rooms, courses and center config")
            .await?;
        let config = self.repo.get_center_config().await?;
        let today = Utc::now().with_timezone(&config.offset()).date_naive();
        let reference = effective_anchor(job.params.class_start_anchor, today);
        let snapshot = ResourceSnapshot::new(
            config,
            self.repo.list_teachers().await?,
            self.repo.list_rooms().await?,
            self.repo.list_courses().await?,
            reference,
        )?;

        self.tracker
            .log(
                job_id,
                JobStage::Analyze,
                format!("Analyzing demand from {}", job.params.intake_start_date),
            )
            .await?;
        let students = self.repo.list_students().await?;
        let enrollments = self.repo.list_enrollments().await?;
        let classes = self.repo.list_classes().await?;
        let analysis = DemandAnalyzer::new(
            &snapshot,
            job.params.intake_start_date,
            job.params.intake_end_date,
        )
        .analyze(DemandInputs {
            students: &students,
            enrollments: &enrollments,
            classes: &classes,
        });
        let class_count = analysis.virtual_classes.len();
        job.analysis = analysis;
        self.repo.update_job(&job).await?;
        self.tracker
            .log(
                job_id,
                JobStage::AnalyzeDone,
                format!(
                    "Analysis done: {} virtual classes, {} pending groups",
                    class_count,
                    job.analysis.pending.len()
                ),
            )
            .await?;

        if class_count == 0 {
            job.result_report = Some(ResultReport {
                success_rate: 1.0,
                ..ResultReport::default()
            });
            job.transition(JobStatus::Draft)?;
            self.repo.update_job(&job).await?;
            self.tracker
                .log(job_id, JobStage::DraftReady, "No demand to schedule; draft is empty")
                .await?;
            return Ok(());
        }

        self.tracker
            .log(
                job_id,
                JobStage::ScheduleStart,
                format!("Scheduling {} classes", class_count),
            )
            .await?;
        let offset = snapshot.config.offset();
        let from = local_to_utc(reference, 0, offset);
        let until = from + Duration::weeks(i64::from(self.settings.horizon_weeks));
        let sessions = self.repo.list_sessions_between(from, until).await?;

        let mut state = ScheduleState::new(&snapshot);
        let weekly = state.seed_weekly(&snapshot, &classes, Some(job_id));
        let dated = state.seed_sessions(&snapshot, &sessions, from, until, Some(job_id));
        log::debug!(
            "Job {}: seeded {} weekly slots and {} sessions",
            job_id.short(),
            weekly,
            dated
        );

        // SCHEDULE_PROGRESS entries reach the log and listeners in one batch after the pass.
        let mut progress = Vec::new();
        let outcome = GreedyScheduler::new(
            &snapshot,
            &self.weights,
            self.settings.min_gap_days,
            self.settings.progress_every,
        )
        .run(&mut state, &job.analysis.virtual_classes, |done, total| {
            progress.push(JobLogEntry::new(
                JobStage::ScheduleProgress,
                format!("Processed {}/{} classes", done, total),
                false,
            ));
        });
        self.tracker.log_batch(job_id, progress).await?;

        let report = outcome.report;
        let (successful, total, rate) =
            (report.successful_count, report.total_classes, report.success_rate);
        job.draft_schedule = outcome.groups;
        job.result_report = Some(report);
        job.transition(JobStatus::Draft)?;
        self.repo.update_job(&job).await?;
        self.tracker
            .log(
                job_id,
                JobStage::DraftReady,
                format!("Scheduling finished: {}/{} classes placed", successful, total),
            )
            .await?;

        if rate < job.params.success_threshold {
            self.tracker
                .warn(
                    job_id,
                    JobStage::DraftReady,
                    format!(
                        "Success rate {:.2}% is below the threshold of {:.2}%",
                        rate * 100.0,
                        job.params.success_threshold * 100.0
                    ),
                )
                .await?;
        }
        Ok(())
    }

    // ==================== Finalize ====================

    fn ensure_finalizable(job: &ScheduleJob) -> SchedulerResult<()> {
        match job.status {
            JobStatus::Draft => Ok(()),
            JobStatus::Completed => Err(SchedulerError::AlreadyFinalized(job.id)),
            status => Err(SchedulerError::InvalidState {
                job: job.id,
                status,
                message: "only draft jobs can be finalized".into(),
            }),
        }
    }

    /// Commit a `draft` job's timetable.
    ///
    /// The job is claimed with a `draft -> finalizing` compare-and-set while the
    /// scheduling lock is held, and the commit marks it `completed` together with
    /// its classes and sessions. On a collision or another recoverable problem
    /// the job returns to `draft`; storage or internal failures mark it
    /// `system_error`.
    pub async fn finalize(&self, job_id: JobId) -> SchedulerResult<FinalizeSummary> {
        let job = self.repo.get_job(job_id).await?;
        Self::ensure_finalizable(&job)?;
        if !self.repo.find_classes_by_job(job_id).await?.is_empty() {
            return Err(SchedulerError::AlreadyFinalized(job_id));
        }
        if job.draft_schedule.is_empty() {
            return Err(SchedulerError::InvalidRequest(
                "job has no draft schedule to finalize".into(),
            ));
        }

        let today = self.today().await?;
        let guard = self.lock.try_acquire(job_id).map_err(SchedulerError::Busy)?;

        // The job may have been finalized between the read above and the lock.
        let job = match self
            .repo
            .transition_job(job_id, JobStatus::Draft, JobStatus::Finalizing)
            .await
        {
            Ok(job) => job,
            Err(RepositoryError::ConflictError { .. }) => {
                let current = self.repo.get_job(job_id).await?;
                Self::ensure_finalizable(&current)?;
                return Err(SchedulerError::InvalidState {
                    job: job_id,
                    status: current.status,
                    message: "job changed while waiting to finalize".into(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let committed: SchedulerResult<FinalizeSummary> = async {
            self.tracker
                .log(
                    job_id,
                    JobStage::Finalizing,
                    format!(
                        "Finalizing {} classes ({} weekly slots)",
                        job.draft_schedule.len(),
                        job.assignment_count()
                    ),
                )
                .await?;
            FinalizeCommitter::new(self.repo.as_ref(), self.holidays.as_ref(), &self.settings)
                .commit(&job, today)
                .await
        }
        .await;

        let outcome = match committed {
            Ok(summary) => Ok(summary),
            Err(e) if e.is_recoverable() => {
                match self
                    .repo
                    .transition_job(job_id, JobStatus::Finalizing, JobStatus::Draft)
                    .await
                {
                    Ok(_) => {
                        if let Err(log_err) = self
                            .tracker
                            .warn(job_id, JobStage::Error, format!("Finalize aborted: {}", e))
                            .await
                        {
                            log::warn!("Could not log aborted finalize of job {}: {}", job_id, log_err);
                        }
                    }
                    Err(restore) => {
                        self.mark_system_error(
                            job_id,
                            &format!("Finalize aborted ({}) and the draft could not be restored: {}", e, restore),
                        )
                        .await;
                    }
                }
                Err(e)
            }
            Err(e) => {
                self.mark_system_error(job_id, &format!("Finalize failed: {}", e))
                    .await;
                Err(e)
            }
        };
        drop(guard);

        let summary = outcome?;
        if let Err(e) = self
            .tracker
            .log(
                job_id,
                JobStage::Completed,
                format!(
                    "Created {} classes and {} sessions",
                    summary.classes.len(),
                    summary.session_count
                ),
            )
            .await
        {
            log::warn!("Could not log completion of job {}: {}", job_id, e);
        }
        for (teacher, classes) in &summary.teacher_classes {
            self.events().publish(JobEvent::TeacherAssigned {
                teacher_id: *teacher,
                class_ids: classes.iter().copied().collect::<Vec<ClassId>>(),
            });
        }
        self.events().publish(JobEvent::Completed { job_id });
        Ok(summary)
    }

    // ==================== Delete ====================

    /// Delete a job.
    ///
    /// Pending and running jobs are dropped and release the lock. Completed
    /// jobs are deleted with their classes and sessions, unless one of those
    /// classes has live enrollments.
    pub async fn delete_job(&self, job_id: JobId) -> SchedulerResult<DeletedOutputs> {
        let job = self.repo.get_job(job_id).await?;
        match job.status {
            status if status.is_in_flight() => {
                self.repo.delete_job(job_id).await?;
                if self.lock.force_release(job_id) {
                    log::info!("Released scheduling lock held by deleted job {}", job_id);
                }
                Ok(DeletedOutputs::default())
            }
            JobStatus::Completed => {
                let class_ids: Vec<ClassId> = self
                    .repo
                    .find_classes_by_job(job_id)
                    .await?
                    .iter()
                    .map(|c| c.id)
                    .collect();
                if self.repo.has_live_enrollments(&class_ids).await? {
                    return Err(SchedulerError::InvalidState {
                        job: job_id,
                        status: job.status,
                        message: "its classes have live enrollments".into(),
                    });
                }
                let deleted = self.repo.delete_job_outputs(job_id).await?;
                self.repo.delete_job(job_id).await?;
                log::info!(
                    "Deleted job {} with {} classes and {} sessions",
                    job_id,
                    deleted.classes,
                    deleted.sessions
                );
                Ok(deleted)
            }
            status => Err(SchedulerError::InvalidState {
                job: job_id,
                status,
                message: "only pending, running or completed jobs can be deleted".into(),
            }),
        }
    }

    // ==================== Queries ====================

    pub async fn get_job(&self, job_id: JobId) -> SchedulerResult<ScheduleJob> {
        Ok(self.repo.get_job(job_id).await?)
    }

    pub async fn list_jobs(&self) -> SchedulerResult<Vec<ScheduleJob>> {
        Ok(self.repo.list_jobs().await?)
    }

    pub fn status(&self) -> SchedulerStatus {
        let job_id = self.lock.holder();
        SchedulerStatus {
            is_scheduling: job_id.is_some(),
            job_id,
        }
    }

    pub async fn analytics(&self) -> SchedulerResult<JobAnalytics> {
        let jobs = self.repo.list_jobs().await?;
        let mut by_status = BTreeMap::new();
        let mut rates = Vec::new();
        let (mut scheduled, mut failed) = (0, 0);
        for job in &jobs {
            *by_status.entry(job.status).or_insert(0) += 1;
            if let Some(report) = &job.result_report {
                rates.push(report.success_rate);
                scheduled += report.successful_count;
                failed += report.failed_count;
            }
        }
        let average_success_rate =
            (!rates.is_empty()).then(|| rates.iter().sum::<f64>() / rates.len() as f64);
        Ok(JobAnalytics {
            total_jobs: jobs.len(),
            by_status,
            average_success_rate,
            classes_scheduled: scheduled,
            classes_failed: failed,
        })
    }
}
