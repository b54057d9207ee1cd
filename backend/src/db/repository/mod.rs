//! Repository trait definitions for storage operations.
//!
//! Responsibilities are split across focused traits so an implementation (or a
//! test double) can be written one concern at a time:
//!
//! - [`error`]: Error types for repository operations
//! - [`catalog`]: Read-only reference data the engine snapshots (center config,
//!   teachers, rooms, courses, students, enrollments)
//! - [`timetable`]: Persisted classes and dated sessions, including the atomic
//!   finalize commit
//! - [`jobs`]: ScheduleJob records and their log streams
//!
//! # Trait Composition
//!
//! For code that needs every capability, use the [`FullRepository`] bound:
//!
//! ```ignore
//! async fn finalize<R: FullRepository + ?Sized>(repo: &R, job: JobId) -> RepositoryResult<()> {
//!     let job = repo.get_job(job).await?;
//!     let live = repo.list_classes().await?;
//!     // ...
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod error;
pub mod jobs;
pub mod timetable;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

pub use catalog::CatalogRepository;
pub use jobs::JobRepository;
pub use timetable::TimetableRepository;

/// Composite trait bound for a complete repository implementation.
pub trait FullRepository: CatalogRepository + TimetableRepository + JobRepository {}

// Blanket implementation: any type implementing all three traits is a FullRepository
impl<T> FullRepository for T where T: CatalogRepository + TimetableRepository + JobRepository {}
