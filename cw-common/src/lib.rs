//! # Courseware Common Library
//!
//! Shared code for the courseware backend services including:
//! - Database schema, models, and pool initialization
//! - Request context (explicit user/course/client identity)
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod context;
pub mod db;
pub mod error;

pub use context::RequestContext;
pub use error::{Error, Result};
