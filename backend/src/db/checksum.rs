//! Checksums used to recognise identical weekly timetables.

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::models::{CourseId, WeeklySlot};

/// SHA-256 of `content`, hex encoded.
pub fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Stable signature of a course's weekly pattern.
///
/// Slots are sorted by (day, start, end, room, teacher) before hashing, so the
/// order in which they were placed does not matter.
pub fn schedule_signature(course: CourseId, slots: &[WeeklySlot]) -> String {
    let mut keys: Vec<(u8, u32, u32, i64, i64)> = slots
        .iter()
        .map(|s| {
            (
                s.day_of_week,
                s.start_minute,
                s.end_minute,
                s.room.value(),
                s.teacher.value(),
            )
        })
        .collect();
    keys.sort_unstable();

    let canonical = json!({
        "c": course.value(),
        "slots": keys
            .iter()
            .map(|(d, s, e, r, t)| json!({ "d": d, "s": s, "e": e, "r": r, "t": t }))
            .collect::<Vec<_>>(),
    });
    calculate_checksum(&canonical.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RoomId, TeacherId};

    fn slot(day: u8, start: u32, room: i64, teacher: i64) -> WeeklySlot {
        WeeklySlot {
            day_of_week: day,
            start_minute: start,
            end_minute: start + 90,
            room: RoomId::new(room),
            teacher: TeacherId::new(teacher),
        }
    }

    #[test]
    fn test_checksum_consistency() {
        let content = r#"{"test": "data"}"#;
        assert_eq!(calculate_checksum(content), calculate_checksum(content));
        assert_eq!(calculate_checksum(content).len(), 64);
    }

    #[test]
    fn test_signature_ignores_slot_order() {
        let a = [slot(1, 480, 1, 1), slot(3, 480, 1, 1)];
        let b = [slot(3, 480, 1, 1), slot(1, 480, 1, 1)];
        assert_eq!(
            schedule_signature(CourseId::new(7), &a),
            schedule_signature(CourseId::new(7), &b)
        );
    }

    #[test]
    fn test_signature_depends_on_course_and_resources() {
        let slots = [slot(1, 480, 1, 1)];
        let base = schedule_signature(CourseId::new(7), &slots);
        assert_ne!(base, schedule_signature(CourseId::new(8), &slots));
        assert_ne!(base, schedule_signature(CourseId::new(7), &[slot(1, 480, 2, 1)]));
        assert_ne!(base, schedule_signature(CourseId::new(7), &[slot(1, 480, 1, 2)]));
    }
}
