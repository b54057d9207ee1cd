use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ClassId, EnrollmentId, Level, StudentId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningGoal {
    #[serde(default)]
    pub category: Option<String>,
    pub target_level: Level,
}

/// A student as seen by demand analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tested: bool,
    #[serde(default)]
    pub test_score: Option<f64>,
    #[serde(default)]
    pub test_result_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub enrolled: bool,
    #[serde(default)]
    pub learning_goal: Option<LearningGoal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Hold,
    Confirmed,
    Waitlisted,
    Canceled,
    Refunded,
}

impl EnrollmentStatus {
    /// Whether the enrollment still ties the student to the class.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            EnrollmentStatus::Hold | EnrollmentStatus::Confirmed | EnrollmentStatus::Waitlisted
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student: StudentId,
    pub class: ClassId,
    pub status: EnrollmentStatus,
}
