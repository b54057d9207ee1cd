use serde::{Deserialize, Serialize};

use super::{CourseId, Level};

/// Inclusive placement-test score range a course accepts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl ScoreRange {
    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score <= self.max
    }
}

/// A course template that classes are instantiated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub category: String,
    pub level: Level,
    #[serde(default = "default_sessions_per_week")]
    pub sessions_per_week: u32,
    pub duration_minutes: u32,
    pub total_sessions: u32,
    pub min_student: u32,
    pub max_student: u32,
    pub input_score_range: ScoreRange,
}

fn default_sessions_per_week() -> u32 {
    1
}

impl Course {
    /// Weekly slots a class of this course needs; never less than one.
    pub fn required_slots(&self) -> usize {
        self.sessions_per_week.max(1) as usize
    }
}
