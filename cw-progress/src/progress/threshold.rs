//! Completion threshold evaluation
//!
//! Pure functions converting raw interaction signal into a completion
//! decision. SCORM completion is token-driven (the player reports a
//! terminal lesson_status); audio completion is derived from listened
//! percentage against a per-package threshold. Both treat an already
//! completed record as absorbing: the stored flag is ORed into the result,
//! so recomputation can never un-complete.

/// lesson_status tokens treated as terminal completion.
/// `failed` is terminal for the runtime but is not a completion here.
pub const SCORM_TERMINAL_STATUSES: &[&str] = &["completed", "passed"];

/// Round to two decimal places
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// True when the token is one of the recognized terminal values
pub fn is_terminal_scorm_status(status: &str) -> bool {
    let normalized = status.trim().to_ascii_lowercase();
    SCORM_TERMINAL_STATUSES.contains(&normalized.as_str())
}

/// SCORM completion: explicit terminal token, or already completed
pub fn scorm_completed(lesson_status: Option<&str>, already_completed: bool) -> bool {
    already_completed || lesson_status.is_some_and(is_terminal_scorm_status)
}

/// Percent of the asset listened, rounded to two decimals.
/// A zero (or negative) duration always yields 0 and never completes.
pub fn listened_percentage(current_time: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return 0.0;
    }
    round2(current_time / duration * 100.0)
}

/// Audio completion: listened percentage meets the threshold, or already
/// completed
pub fn audio_completed(
    current_time: f64,
    duration: f64,
    completion_threshold: f64,
    already_completed: bool,
) -> bool {
    already_completed || listened_percentage(current_time, duration) >= completion_threshold
}
