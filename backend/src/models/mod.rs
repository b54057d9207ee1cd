//! Domain records shared by the scheduling engine, the repositories and the HTTP layer.
//!
//! Everything here is plain data: serde-friendly structs and enums plus a few
//! small helpers (level ordering, shift lookups, teacher qualification). The
//! algorithms that consume them live in [`crate::scheduling`].

pub mod macros;

pub mod center;
pub mod course;
pub mod job;
pub mod level;
pub mod resources;
pub mod student;
pub mod timetable;

pub use center::*;
pub use course::*;
pub use job::*;
pub use level::*;
pub use resources::*;
pub use student::*;
pub use timetable::*;

crate::define_id_type!(i64, TeacherId);
crate::define_id_type!(i64, RoomId);
crate::define_id_type!(i64, CourseId);
crate::define_id_type!(i64, StudentId);
crate::define_id_type!(i64, EnrollmentId);
crate::define_id_type!(i64, ClassId);
crate::define_id_type!(i64, SessionId);
crate::define_id_type!(uuid::Uuid, JobId);

impl JobId {
    /// Fresh random job id.
    pub fn generate() -> Self {
        JobId(uuid::Uuid::new_v4())
    }

    /// First eight hex digits, used in generated class codes.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_uppercase()
    }
}

/// Day of week, `0` = Sunday through `6` = Saturday.
pub type DayOfWeek = u8;

/// Human readable day name for logs and messages.
pub fn day_name(day: DayOfWeek) -> &'static str {
    match day {
        0 => "Sunday",
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        6 => "Saturday",
        _ => "Unknown",
    }
}
