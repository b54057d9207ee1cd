//! Storage for reference data, the persisted timetable and schedule jobs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  HTTP layer / binaries                                   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  services - job orchestration, finalize, conflict check │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository traits (repository/) - abstract interface    │
//! │  CatalogRepository + TimetableRepository + JobRepository │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌──────────────────────────────────────────────┐
//!     │             Local Repository                  │
//!     │    (in-memory, optionally JSON-seeded)        │
//!     └──────────────────────────────────────────────┘
//! ```
//!
//! Services take `Arc<dyn FullRepository>`, so another backend only has to
//! implement the three traits.

pub mod checksum;
pub mod repositories;
pub mod repository;
pub mod seed;

pub use checksum::{calculate_checksum, schedule_signature};
pub use repositories::LocalRepository;
pub use repository::timetable::DeletedOutputs;
pub use repository::{
    CatalogRepository, ErrorContext, FullRepository, JobRepository, RepositoryError,
    RepositoryResult, TimetableRepository,
};
pub use seed::SeedData;
