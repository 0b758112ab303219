//! Database access layer for cw-progress
//!
//! Per-entity query modules over the shared pool, plus the progress record
//! store. Every call is a direct durable read/write; there is no caching
//! layer between handlers and the database.

pub mod enrollment;
pub mod packages;
pub mod placements;
pub mod progress;
