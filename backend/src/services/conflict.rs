//! Stand-alone session conflict check, shared with workflows that move
//! individual sessions (substitutions, reschedules).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::{ErrorContext, RepositoryError, RepositoryResult, TimetableRepository};
use crate::models::{ClassId, RoomId, SessionId, TeacherId};

/// Which of the two requested resources is already booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSide {
    Teacher,
    Room,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub side: ConflictSide,
    pub session_id: SessionId,
    pub class_id: ClassId,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

/// The first booking session overlapping `[start, end)` for `teacher` or `room`.
///
/// A teacher clash is reported in preference to a room clash on the same session.
pub async fn has_conflict<R: TimetableRepository + ?Sized>(
    repo: &R,
    exclude: Option<SessionId>,
    teacher: TeacherId,
    room: RoomId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> RepositoryResult<Option<Conflict>> {
    if start >= end {
        return Err(RepositoryError::validation_with_context(
            format!("empty interval {} .. {}", start, end),
            ErrorContext::new("has_conflict"),
        ));
    }
    let hit = repo
        .find_overlapping_session(exclude, teacher, room, start, end)
        .await?;
    Ok(hit.map(|session| Conflict {
        side: if session.teacher == teacher {
            ConflictSide::Teacher
        } else {
            ConflictSide::Room
        },
        session_id: session.id,
        class_id: session.class,
        start_at: session.start_at,
        end_at: session.end_at,
    }))
}
