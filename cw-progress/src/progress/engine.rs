//! Interaction entrypoints
//!
//! Every transport handler (AJAX update, immediate-save, beacon-save,
//! batch) funnels through [`update_progress`]; they differ only in how
//! they were invoked, not in semantics. The record moves
//! `not_started → in_progress → completed`, and completed is absorbing:
//! the store enforces the latch, and the evaluators OR the stored flag in.

use crate::db::{enrollment, packages, progress};
use crate::db::progress::ProgressUpdate;
use crate::error::{Error, Result};
use crate::progress::{propagation, threshold};
use chrono::Utc;
use cw_common::db::models::{
    AudioPayload, ContentKind, ContentPackageRef, PlacementKey, ProgressPayload, ProgressRecord,
    ScormPayload,
};
use cw_common::RequestContext;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

/// Raw interaction signal from a content player
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProgressSignal {
    Scorm {
        lesson_status: Option<String>,
        lesson_location: Option<String>,
        #[serde(default)]
        session_seconds: f64,
        suspend_data: Option<String>,
        #[serde(default)]
        interactions: serde_json::Value,
        #[serde(default)]
        objectives: serde_json::Value,
        score_raw: Option<f64>,
        score_min: Option<f64>,
        score_max: Option<f64>,
        /// True on a fresh launch (counts against max_attempts)
        #[serde(default)]
        new_attempt: bool,
    },
    Audio {
        #[serde(default)]
        current_time: f64,
        #[serde(default)]
        duration: f64,
        playback_status: Option<String>,
        playback_speed: Option<f64>,
        notes: Option<String>,
        #[serde(default)]
        new_attempt: bool,
    },
}

impl ProgressSignal {
    fn kind(&self) -> ContentKind {
        match self {
            ProgressSignal::Scorm { .. } => ContentKind::Scorm,
            ProgressSignal::Audio { .. } => ContentKind::Audio,
        }
    }

    fn is_new_attempt(&self) -> bool {
        match self {
            ProgressSignal::Scorm { new_attempt, .. } => *new_attempt,
            ProgressSignal::Audio { new_attempt, .. } => *new_attempt,
        }
    }
}

/// Resume state returned to players; zeroed when no record exists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePosition {
    pub position: f64,
    pub duration: f64,
    pub percent: f64,
}

impl Default for ResumePosition {
    fn default() -> Self {
        Self {
            position: 0.0,
            duration: 0.0,
            percent: 0.0,
        }
    }
}

/// Record one interaction event against a placement.
///
/// Get-or-creates the record, evaluates completion against the package's
/// threshold, applies a latch-aware partial update, and on any completed
/// interaction fans the terminal state out to sibling placements and
/// recomputes the course aggregate.
pub async fn update_progress(
    pool: &SqlitePool,
    ctx: &RequestContext,
    placement: &PlacementKey,
    package: &ContentPackageRef,
    signal: &ProgressSignal,
) -> Result<ProgressRecord> {
    if !ctx.is_complete() {
        return Err(Error::MissingParameters(
            "user_id, course_id and client_id are required".to_string(),
        ));
    }
    if signal.kind() != package.kind {
        return Err(Error::InvalidInput(format!(
            "Signal kind {} does not match package kind {}",
            signal.kind().as_str(),
            package.kind.as_str()
        )));
    }

    if !enrollment::has_course_access(pool, ctx).await? {
        return Err(Error::NotAuthorized(format!(
            "User {} has no access to course {}",
            ctx.user_id, ctx.course_id
        )));
    }

    let metadata = packages::get_package_metadata(pool, package.package_id)
        .await?
        .ok_or_else(|| Error::PackageNotFound(package.package_id.to_string()))?;

    let record = progress::get_or_create(pool, ctx, placement, package).await?;

    if signal.is_new_attempt() {
        if let Some(max) = metadata.max_attempts {
            if record.play_count >= max {
                return Err(Error::AttemptLimit(format!(
                    "Package {} allows {} attempts",
                    package.package_id, max
                )));
            }
        }
    }

    let changes = evaluate_signal(&record, signal, metadata.completion_threshold);

    if !progress::update(pool, record.guid, &changes).await? {
        return Err(Error::RecordNotFound(record.guid.to_string()));
    }

    // Runs on every completed interaction, not only the first: propagate is
    // idempotent, and a sibling whose earlier fan-out write failed gets its
    // record on the next event.
    if changes.set_completed {
        finish_completion(pool, ctx, package, placement).await;
    }

    progress::get_by_id(pool, record.guid)
        .await?
        .ok_or_else(|| Error::RecordNotFound(record.guid.to_string()))
}

/// Explicit terminal transition by record id (SCORM players report
/// completion out-of-band from the threshold path).
///
/// Returns false (not an error) when the record no longer exists.
pub async fn mark_completed(pool: &SqlitePool, record_id: Uuid) -> Result<bool> {
    let Some(record) = progress::get_by_id(pool, record_id).await? else {
        return Ok(false);
    };

    let ctx = RequestContext::new(record.user_id, record.course_id, record.client_id);
    if !enrollment::has_course_access(pool, &ctx).await? {
        return Err(Error::NotAuthorized(format!(
            "User {} has no access to course {}",
            ctx.user_id, ctx.course_id
        )));
    }

    let applied = progress::update(
        pool,
        record.guid,
        &ProgressUpdate {
            status: Some("completed".to_string()),
            set_completed: true,
            completed_at: Some(Utc::now()),
            ..Default::default()
        },
    )
    .await?;
    if !applied {
        return Ok(false);
    }

    let package = ContentPackageRef {
        package_id: record.package_id,
        kind: record.kind,
    };
    finish_completion(pool, &ctx, &package, &record.placement).await;

    Ok(true)
}

/// Read-only resume state for a placement; zeroed defaults when no record
/// exists (never an error).
pub async fn resume_position(
    pool: &SqlitePool,
    ctx: &RequestContext,
    placement: &PlacementKey,
) -> Result<ResumePosition> {
    let record = progress::find_by_placement(pool, ctx, placement).await?;
    Ok(record
        .map(|r| ResumePosition {
            position: r.position_seconds,
            duration: r.duration_seconds,
            percent: r.percent_progress,
        })
        .unwrap_or_default())
}

/// Fan out a confirmed completion and refresh the course aggregate.
///
/// Both steps are best-effort amplification of an already-durable
/// completion: failures are logged for operational follow-up, never
/// surfaced to the caller whose own placement completed.
async fn finish_completion(
    pool: &SqlitePool,
    ctx: &RequestContext,
    package: &ContentPackageRef,
    placement: &PlacementKey,
) {
    if let Err(e) = propagation::propagate(pool, ctx, package, placement).await {
        warn!(
            user_id = %ctx.user_id,
            course_id = %ctx.course_id,
            package_id = %package.package_id,
            "Completion propagation failed: {}",
            e
        );
    }

    if let Err(e) = enrollment::recalculate_course_progress(pool, ctx).await {
        warn!(
            user_id = %ctx.user_id,
            course_id = %ctx.course_id,
            "Course progress recalculation failed: {}",
            e
        );
    }
}

/// Convert a raw signal into a partial update, with completion decided by
/// the threshold evaluators (stored flag ORed in, so recomputation never
/// regresses).
fn evaluate_signal(
    record: &ProgressRecord,
    signal: &ProgressSignal,
    completion_threshold: f64,
) -> ProgressUpdate {
    match signal {
        ProgressSignal::Scorm {
            lesson_status,
            lesson_location,
            session_seconds,
            suspend_data,
            interactions,
            objectives,
            score_raw,
            score_min,
            score_max,
            new_attempt,
        } => {
            let completed = threshold::scorm_completed(lesson_status.as_deref(), record.is_completed);

            let mut payload = match &record.payload {
                ProgressPayload::Scorm(p) => p.clone(),
                _ => ScormPayload::default(),
            };
            if suspend_data.is_some() {
                payload.suspend_data = suspend_data.clone();
            }
            if lesson_location.is_some() {
                payload.lesson_location = lesson_location.clone();
            }
            if !interactions.is_null() {
                payload.interactions = interactions.clone();
            }
            if !objectives.is_null() {
                payload.objectives = objectives.clone();
            }
            if score_raw.is_some() {
                payload.score_raw = *score_raw;
            }
            if score_min.is_some() {
                payload.score_min = *score_min;
            }
            if score_max.is_some() {
                payload.score_max = *score_max;
            }

            ProgressUpdate {
                position_seconds: (*session_seconds > 0.0).then_some(*session_seconds),
                duration_seconds: None,
                percent_progress: completed.then_some(100.0),
                status: lesson_status.clone(),
                set_completed: completed,
                completed_at: completed.then(Utc::now),
                increment_play_count: *new_attempt,
                payload: Some(ProgressPayload::Scorm(payload)),
            }
        }
        ProgressSignal::Audio {
            current_time,
            duration,
            playback_status,
            playback_speed,
            notes,
            new_attempt,
        } => {
            let percent = threshold::listened_percentage(*current_time, *duration);
            let completed = threshold::audio_completed(
                *current_time,
                *duration,
                completion_threshold,
                record.is_completed,
            );

            let mut payload = match &record.payload {
                ProgressPayload::Audio(p) => p.clone(),
                _ => AudioPayload::default(),
            };
            if notes.is_some() {
                payload.notes = notes.clone();
            }
            if playback_speed.is_some() {
                payload.playback_speed = *playback_speed;
            }

            let status = playback_status
                .clone()
                .or_else(|| completed.then(|| "completed".to_string()));

            ProgressUpdate {
                position_seconds: Some(*current_time),
                duration_seconds: Some(*duration),
                percent_progress: Some(percent),
                status,
                set_completed: completed,
                completed_at: completed.then(Utc::now),
                increment_play_count: *new_attempt,
                payload: Some(ProgressPayload::Audio(payload)),
            }
        }
    }
}
