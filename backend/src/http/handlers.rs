//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! service layer.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use super::dto::{
    ConflictCheckRequest, ConflictCheckResponse, DeleteJobResponse, FinalizeResponse,
    HealthResponse, JobListResponse, JobSummaryDto, RunScheduleRequest, RunScheduleResponse,
};
use super::error::AppError;
use super::state::AppState;
use crate::models::{JobId, JobStatus, ScheduleJob};
use crate::services::{has_conflict, JobAnalytics, SchedulerStatus};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

const LOG_POLL_INTERVAL: Duration = Duration::from_millis(200);

fn parse_job_id(raw: &str) -> Result<JobId, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid job id: {}", raw)))
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match state.repository().health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Scheduling runs
// =============================================================================

/// POST /v1/schedule/run
///
/// Start a run in the background. Returns 202 with the new job id, or 409
/// when another run holds the scheduling lock.
pub async fn run_schedule(
    State(state): State<AppState>,
    Json(request): Json<RunScheduleRequest>,
) -> Result<(StatusCode, Json<RunScheduleResponse>), AppError> {
    let params =
        request.into_params(state.orchestrator.settings().default_success_threshold);
    let triggered = state.orchestrator.trigger(params).await?;
    let job_id = triggered.job.id;

    Ok((
        StatusCode::ACCEPTED,
        Json(RunScheduleResponse {
            job_id,
            status: triggered.job.status,
            message: format!(
                "Scheduling started. Track progress at /v1/schedule/jobs/{}/events",
                job_id
            ),
        }),
    ))
}

/// GET /v1/schedule/jobs
pub async fn list_jobs(State(state): State<AppState>) -> HandlerResult<JobListResponse> {
    let jobs: Vec<JobSummaryDto> = state
        .orchestrator
        .list_jobs()
        .await?
        .iter()
        .map(JobSummaryDto::from)
        .collect();
    let total = jobs.len();
    Ok(Json(JobListResponse { jobs, total }))
}

/// GET /v1/schedule/jobs/{job_id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> HandlerResult<ScheduleJob> {
    let job_id = parse_job_id(&job_id)?;
    Ok(Json(state.orchestrator.get_job(job_id).await?))
}

/// POST /v1/schedule/jobs/{job_id}/finalize
pub async fn finalize_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> HandlerResult<FinalizeResponse> {
    let job_id = parse_job_id(&job_id)?;
    let summary = state.orchestrator.finalize(job_id).await?;
    Ok(Json(FinalizeResponse::new(job_id, &summary)))
}

/// DELETE /v1/schedule/jobs/{job_id}
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> HandlerResult<DeleteJobResponse> {
    let job_id = parse_job_id(&job_id)?;
    let deleted = state.orchestrator.delete_job(job_id).await?;
    Ok(Json(DeleteJobResponse {
        job_id,
        deleted_classes: deleted.classes,
        deleted_sessions: deleted.sessions,
    }))
}

/// GET /v1/schedule/jobs/{job_id}/events
///
/// Stream the job's log entries via Server-Sent Events, then one `complete`
/// event once the job stops moving (`draft`, `completed` or `system_error`).
pub async fn stream_job_events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let job_id = parse_job_id(&job_id)?;
    // 404 before the stream opens
    state.orchestrator.get_job(job_id).await?;

    let repo = state.repository().clone();
    let stream = async_stream::stream! {
        let mut sent = 0;
        loop {
            let job = match repo.get_job(job_id).await {
                Ok(job) => job,
                Err(e) => {
                    yield Ok(Event::default().event("error").data(e.to_string()));
                    break;
                }
            };

            for entry in job.logs.iter().skip(sent) {
                let data = serde_json::to_string(entry).unwrap_or_default();
                yield Ok(Event::default().event("log").data(data));
            }
            sent = job.logs.len();

            if matches!(
                job.status,
                JobStatus::Draft | JobStatus::Completed | JobStatus::SystemError
            ) {
                let final_event = serde_json::json!({
                    "status": job.status,
                    "result": job.result_report,
                });
                yield Ok(Event::default()
                    .event("complete")
                    .data(serde_json::to_string(&final_event).unwrap_or_default()));
                break;
            }

            tokio::time::sleep(LOG_POLL_INTERVAL).await;
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(1))
            .text("keep-alive"),
    ))
}

/// GET /v1/events
///
/// Relay every published [`JobEvent`](crate::services::JobEvent) as it happens.
pub async fn stream_all_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.orchestrator.events().subscribe();
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(Event::default().event("job").data(data));
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Event stream lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// GET /v1/schedule/status
pub async fn scheduler_status(State(state): State<AppState>) -> HandlerResult<SchedulerStatus> {
    Ok(Json(state.orchestrator.status()))
}

/// GET /v1/schedule/analytics
pub async fn job_analytics(State(state): State<AppState>) -> HandlerResult<JobAnalytics> {
    Ok(Json(state.orchestrator.analytics().await?))
}

// =============================================================================
// Sessions
// =============================================================================

/// POST /v1/sessions/conflicts
pub async fn check_conflict(
    State(state): State<AppState>,
    Json(request): Json<ConflictCheckRequest>,
) -> HandlerResult<ConflictCheckResponse> {
    let conflict = has_conflict(
        state.repository().as_ref(),
        request.exclude_session_id,
        request.teacher_id,
        request.room_id,
        request.start_at,
        request.end_at,
    )
    .await?;

    Ok(Json(ConflictCheckResponse {
        has_conflict: conflict.is_some(),
        conflict,
    }))
}
