//! Data models for the recognition workflow

use crate::backend::{RecordStatus, SaveImageResult};
use serde::Serialize;
use uuid::Uuid;

/// Backend handle for the image of the current workflow instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedImage {
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "imageId")]
    pub image_id: String,
}

impl From<SaveImageResult> for UploadedImage {
    fn from(saved: SaveImageResult) -> Self {
        Self {
            file_path: saved.file_path,
            image_id: saved.image_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelConfidence {
    pub label: String,
    pub confidence: f64,
}

impl LabelConfidence {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Canonical inference outcome
///
/// A success always has at least one match and `top_prediction == matches[0]`;
/// a failure carries only the error message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NormalizedResult {
    Success {
        matches: Vec<LabelConfidence>,
        #[serde(rename = "topPrediction")]
        top_prediction: LabelConfidence,
        #[serde(rename = "modelType", skip_serializing_if = "Option::is_none")]
        model_type: Option<String>,
    },
    Failed { error: String },
}

impl NormalizedResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed { error: error.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn matches(&self) -> &[LabelConfidence] {
        match self {
            Self::Success { matches, .. } => matches,
            Self::Failed { .. } => &[],
        }
    }

    pub fn top_prediction(&self) -> Option<&LabelConfidence> {
        match self {
            Self::Success { top_prediction, .. } => Some(top_prediction),
            Self::Failed { .. } => None,
        }
    }

    pub fn model_type(&self) -> Option<&str> {
        match self {
            Self::Success { model_type, .. } => model_type.as_deref(),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }
}

/// Where the current workflow instance stands
///
/// `Uploading`, `Processing` and `Saving` are the only phases in which a
/// backend call is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Idle,
    Uploading,
    Uploaded,
    Processing,
    Processed { succeeded: bool },
    Saving,
    Saved,
    SaveFailed,
}

impl WorkflowPhase {
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Uploading | Self::Processing | Self::Saving)
    }
}

/// Result of a `save_history` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The backend stored the record
    Saved,
    /// A previous call already stored this result
    AlreadySaved,
    /// Another save for the same image is running
    InFlight,
    /// No image or no result to persist
    NothingToSave,
    /// The result is a model error; marked failed locally, backend not called
    MarkedFailed(String),
    /// The backend answered `success: false`
    Rejected(String),
    /// The persist call itself failed
    Failed(String),
    /// A new upload started while the save was running; its outcome was dropped
    Superseded,
}

impl SaveOutcome {
    /// Label used for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Saved => "saved",
            Self::AlreadySaved => "already_saved",
            Self::InFlight => "in_flight",
            Self::NothingToSave => "nothing_to_save",
            Self::MarkedFailed(_) => "marked_failed",
            Self::Rejected(_) => "rejected",
            Self::Failed(_) => "failed",
            Self::Superseded => "superseded",
        }
    }
}

/// Read-only view of the current workflow instance
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSnapshot {
    pub instance_id: Uuid,
    pub phase: WorkflowPhase,
    pub image: Option<UploadedImage>,
    pub result: Option<NormalizedResult>,
    pub save_status: Option<RecordStatus>,
    pub saved: bool,
    pub last_error: Option<String>,
}
