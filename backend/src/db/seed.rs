//! JSON seed documents for the local repository.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::repository::{ErrorContext, RepositoryError, RepositoryResult};
use crate::models::{
    CenterConfig, ClassRecord, Course, Enrollment, Room, SessionRecord, Student, Teacher,
};

/// Everything the local repository can be pre-populated with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub center: CenterConfig,
    pub teachers: Vec<Teacher>,
    pub rooms: Vec<Room>,
    pub courses: Vec<Course>,
    pub students: Vec<Student>,
    pub enrollments: Vec<Enrollment>,
    pub classes: Vec<ClassRecord>,
    pub sessions: Vec<SessionRecord>,
}

impl SeedData {
    pub fn from_json(content: &str) -> RepositoryResult<Self> {
        serde_json::from_str(content).map_err(|e| {
            RepositoryError::validation_with_context(
                format!("invalid seed document: {}", e),
                ErrorContext::new("load_seed"),
            )
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> RepositoryResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| RepositoryError::ConfigurationError {
            message: format!("failed to read seed file: {}", e),
            context: ErrorContext::new("load_seed").with_details(path.display().to_string()),
        })?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let seed = SeedData::from_json("{}").unwrap();
        assert!(seed.teachers.is_empty());
        assert_eq!(seed.center.shifts.len(), 3);
    }

    #[test]
    fn test_partial_document() {
        let seed = SeedData::from_json(
            r#"{
                "rooms": [{"id": 1, "name": "A1", "capacity": 20}],
                "teachers": [{"id": 3, "name": "Lan", "skills": [{"category": "IELTS", "any_level": true}]}]
            }"#,
        )
        .unwrap();
        assert_eq!(seed.rooms[0].capacity, 20);
        assert!(seed.teachers[0].active);
        assert!(seed.teachers[0].skills[0].any_level);
    }

    #[test]
    fn test_malformed_document_is_validation_error() {
        let err = SeedData::from_json("{\"rooms\": 3}").unwrap_err();
        assert!(matches!(err, RepositoryError::ValidationError { .. }));
    }
}
