//! Shared database models
//!
//! The progress record is the central row type: one per
//! (user, course, client, placement), tagged with the content package it
//! tracks and carrying a kind-specific payload as a JSON column.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of trackable content package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Scorm,
    Audio,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Scorm => "scorm",
            ContentKind::Audio => "audio",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "scorm" => Ok(ContentKind::Scorm),
            "audio" => Ok(ContentKind::Audio),
            other => Err(Error::InvalidInput(format!(
                "Unknown content kind: {}",
                other
            ))),
        }
    }
}

/// Identifies what is being tracked, independent of where it is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPackageRef {
    pub package_id: Uuid,
    pub kind: ContentKind,
}

/// Identifies where a content package is attached inside a course.
///
/// A module placement is a row in the course's module-content listing, a
/// prerequisite placement is a row in the prerequisite listing, and a
/// postrequisite placement has the module-content shape but gates course
/// completion instead of module access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "placement_type", rename_all = "snake_case")]
pub enum PlacementKey {
    Module { module_content_id: Uuid },
    Prerequisite { prerequisite_row_id: Uuid },
    Postrequisite { module_content_id: Uuid },
}

impl PlacementKey {
    /// Discriminant stored in the `placement_type` column
    pub fn type_str(&self) -> &'static str {
        match self {
            PlacementKey::Module { .. } => "module",
            PlacementKey::Prerequisite { .. } => "prerequisite",
            PlacementKey::Postrequisite { .. } => "postrequisite",
        }
    }

    /// Row id stored in the `placement_id` column
    pub fn row_id(&self) -> Uuid {
        match self {
            PlacementKey::Module { module_content_id } => *module_content_id,
            PlacementKey::Prerequisite { prerequisite_row_id } => *prerequisite_row_id,
            PlacementKey::Postrequisite { module_content_id } => *module_content_id,
        }
    }

    /// Reconstruct from the two stored columns
    pub fn from_parts(placement_type: &str, row_id: Uuid) -> Result<Self> {
        match placement_type {
            "module" => Ok(PlacementKey::Module {
                module_content_id: row_id,
            }),
            "prerequisite" => Ok(PlacementKey::Prerequisite {
                prerequisite_row_id: row_id,
            }),
            "postrequisite" => Ok(PlacementKey::Postrequisite {
                module_content_id: row_id,
            }),
            other => Err(Error::InvalidInput(format!(
                "Unknown placement type: {}",
                other
            ))),
        }
    }
}

/// Kind-specific progress payload, stored as a JSON column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProgressPayload {
    Scorm(ScormPayload),
    Audio(AudioPayload),
}

impl ProgressPayload {
    /// Zeroed payload for a freshly created record
    pub fn empty(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Scorm => ProgressPayload::Scorm(ScormPayload::default()),
            ContentKind::Audio => ProgressPayload::Audio(AudioPayload::default()),
        }
    }
}

/// SCORM runtime fields persisted between launches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScormPayload {
    pub suspend_data: Option<String>,
    pub lesson_location: Option<String>,
    #[serde(default)]
    pub interactions: serde_json::Value,
    #[serde(default)]
    pub objectives: serde_json::Value,
    pub score_raw: Option<f64>,
    pub score_min: Option<f64>,
    pub score_max: Option<f64>,
}

/// Audio player fields persisted between sessions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioPayload {
    pub notes: Option<String>,
    pub playback_speed: Option<f64>,
}

/// Lifecycle state of a progress record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    NotStarted,
    InProgress,
    Completed,
}

/// One learner's progress against one placement of one content package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub guid: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub client_id: Uuid,
    pub placement: PlacementKey,
    pub package_id: Uuid,
    pub kind: ContentKind,
    /// Current position: seconds elapsed for audio, derived from the lesson
    /// location for SCORM content that reports one
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub percent_progress: f64,
    /// Raw status token: lesson_status for SCORM, playback_status for audio
    pub status: String,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub play_count: i64,
    pub last_interaction_at: DateTime<Utc>,
    pub payload: ProgressPayload,
}

impl ProgressRecord {
    /// Derived lifecycle state (completed is absorbing)
    pub fn state(&self) -> ProgressState {
        if self.is_completed {
            ProgressState::Completed
        } else if self.position_seconds > 0.0
            || self.percent_progress > 0.0
            || self.play_count > 0
        {
            ProgressState::InProgress
        } else {
            ProgressState::NotStarted
        }
    }
}
