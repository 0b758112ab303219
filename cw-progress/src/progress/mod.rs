//! Progress domain layer
//!
//! Pure completion evaluation, the shared-completion propagator, and the
//! interaction entrypoints that all transport handlers funnel through.

pub mod engine;
pub mod propagation;
pub mod threshold;

pub use engine::{mark_completed, resume_position, update_progress, ProgressSignal, ResumePosition};
