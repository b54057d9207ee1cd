//! # Timetable Engine
//!
//! Demand-driven class timetabling for a tutoring center.
//!
//! A run turns placement-test results and waiting students into virtual
//! classes, places each class on weekly (day, shift) slots with a teacher and
//! a room without double-booking anyone, and stores the result as a `draft`
//! job. Finalizing a draft re-checks it against live data and commits the
//! classes together with their dated sessions.
//!
//! ## Architecture
//!
//! - [`models`]: domain records and typed ids
//! - [`scheduling`]: the synchronous engine (demand, occupancy, search, scoring)
//! - [`db`]: repository traits and the in-memory repository
//! - [`services`]: job orchestration, finalize, conflict check, events
//! - [`config`]: TOML configuration with environment overrides
//! - `http`: Axum-based HTTP server (feature `http-server`)

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod config;
pub mod db;
pub mod models;
pub mod scheduling;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
