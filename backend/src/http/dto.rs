//! Data Transfer Objects for the HTTP API.
//!
//! Full job records are returned as-is (`ScheduleJob` already serializes);
//! the types here cover requests and the slimmer list/summary responses.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    ClassId, JobId, JobStatus, RoomId, ScheduleJob, ScheduleParams, SessionId, TeacherId,
};
use crate::services::{Conflict, FinalizeSummary};

/// Request body for `POST /v1/schedule/run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunScheduleRequest {
    pub intake_start_date: NaiveDate,
    pub intake_end_date: NaiveDate,
    /// Falls back to `[scheduler] default_success_threshold`.
    #[serde(default)]
    pub success_threshold: Option<f64>,
    #[serde(default)]
    pub class_start_anchor: Option<NaiveDate>,
}

impl RunScheduleRequest {
    pub fn into_params(self, default_threshold: f64) -> ScheduleParams {
        ScheduleParams {
            intake_start_date: self.intake_start_date,
            intake_end_date: self.intake_end_date,
            success_threshold: self.success_threshold.unwrap_or(default_threshold),
            class_start_anchor: self.class_start_anchor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunScheduleResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
}

/// One row of `GET /v1/schedule/jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummaryDto {
    pub job_id: JobId,
    pub status: JobStatus,
    pub intake_start_date: NaiveDate,
    pub intake_end_date: NaiveDate,
    pub class_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&ScheduleJob> for JobSummaryDto {
    fn from(job: &ScheduleJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            intake_start_date: job.params.intake_start_date,
            intake_end_date: job.params.intake_end_date,
            class_count: job.analysis.virtual_classes.len(),
            success_rate: job.result_report.as_ref().map(|r| r.success_rate),
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobSummaryDto>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedClassDto {
    pub class_id: ClassId,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub job_id: JobId,
    pub classes: Vec<CreatedClassDto>,
    pub session_count: usize,
}

impl FinalizeResponse {
    pub fn new(job_id: JobId, summary: &FinalizeSummary) -> Self {
        Self {
            job_id,
            classes: summary
                .classes
                .iter()
                .map(|c| CreatedClassDto {
                    class_id: c.id,
                    code: c.code.clone(),
                    name: c.name.clone(),
                })
                .collect(),
            session_count: summary.session_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteJobResponse {
    pub job_id: JobId,
    pub deleted_classes: usize,
    pub deleted_sessions: usize,
}

/// Request body for `POST /v1/sessions/conflicts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckRequest {
    #[serde(default)]
    pub exclude_session_id: Option<SessionId>,
    pub teacher_id: TeacherId,
    pub room_id: RoomId,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflict: Option<Conflict>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}
