//! Reference data consumed by a scheduling run.
//!
//! These records are owned by other parts of the center's system; the engine
//! only ever reads them.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{CenterConfig, Course, Enrollment, Room, Student, Teacher};

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Check if the store is reachable.
    ///
    /// # Returns
    /// - `Ok(true)` if healthy
    /// - `Ok(false)` if unhealthy but no error occurred
    async fn health_check(&self) -> RepositoryResult<bool>;

    async fn get_center_config(&self) -> RepositoryResult<CenterConfig>;

    /// All teachers, including inactive ones.
    async fn list_teachers(&self) -> RepositoryResult<Vec<Teacher>>;

    /// All rooms regardless of status.
    async fn list_rooms(&self) -> RepositoryResult<Vec<Room>>;

    async fn list_courses(&self) -> RepositoryResult<Vec<Course>>;

    async fn list_students(&self) -> RepositoryResult<Vec<Student>>;

    async fn list_enrollments(&self) -> RepositoryResult<Vec<Enrollment>>;
}
