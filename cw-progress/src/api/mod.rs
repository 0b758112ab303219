//! HTTP API handlers for cw-progress

pub mod handlers;
