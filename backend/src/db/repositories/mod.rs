//! Repository implementations.
//!
//! - `local`: in-memory implementation backing the server and the tests
pub mod local;

pub use local::LocalRepository;
