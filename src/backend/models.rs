//! Wire models for the recognition backend

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle returned by the backend after storing an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveImageResult {
    pub file_path: String,
    pub image_id: String,
}

/// One entry of a ranked prediction list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPrediction {
    pub class: String,
    pub probability: f64,
}

/// One entry of a label distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Inference payload exactly as the backend sends it
///
/// Every field is optional because different model scripts emit different
/// shapes. [`RawInferenceResult`] decides which shape this is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferencePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_probabilities: Option<IndexMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_predictions: Option<Vec<RankedPrediction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Vec<LabelScore>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Backend inference result, one variant per known shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "InferencePayload", into = "InferencePayload")]
pub enum RawInferenceResult {
    /// Flat label -> probability object, in backend order
    ScoreMap {
        prediction: String,
        confidence: f64,
        scores: IndexMap<String, f64>,
        model_type: Option<String>,
    },
    /// List already ranked by the backend
    Ranked {
        prediction: String,
        confidence: f64,
        ranked: Vec<RankedPrediction>,
        model_type: Option<String>,
    },
    /// Unordered label/score list
    Distribution {
        prediction: String,
        confidence: f64,
        distribution: Vec<LabelScore>,
        model_type: Option<String>,
    },
    /// The model ran but reported an error
    Failure { error: String },
}

impl RawInferenceResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    pub fn model_type(&self) -> Option<&str> {
        match self {
            Self::ScoreMap { model_type, .. }
            | Self::Ranked { model_type, .. }
            | Self::Distribution { model_type, .. } => model_type.as_deref(),
            Self::Failure { .. } => None,
        }
    }

    /// Top-line confidence reported by the backend
    pub fn confidence(&self) -> Option<f64> {
        match self {
            Self::ScoreMap { confidence, .. }
            | Self::Ranked { confidence, .. }
            | Self::Distribution { confidence, .. } => Some(*confidence),
            Self::Failure { .. } => None,
        }
    }
}

impl TryFrom<InferencePayload> for RawInferenceResult {
    type Error = String;

    fn try_from(payload: InferencePayload) -> Result<Self, Self::Error> {
        // An error field wins over any partial scores sent alongside it
        if let Some(error) = payload.error {
            return Ok(Self::Failure { error });
        }

        let prediction = payload
            .prediction
            .ok_or_else(|| "inference result has neither `error` nor `prediction`".to_string())?;
        let confidence = payload
            .confidence
            .ok_or_else(|| "inference result is missing `confidence`".to_string())?;
        let model_type = payload.model_type;

        if let Some(ranked) = payload.top_predictions {
            Ok(Self::Ranked { prediction, confidence, ranked, model_type })
        } else if let Some(scores) = payload.class_probabilities {
            Ok(Self::ScoreMap { prediction, confidence, scores, model_type })
        } else if let Some(distribution) = payload.distribution {
            Ok(Self::Distribution { prediction, confidence, distribution, model_type })
        } else {
            Err("inference result carries no scores".to_string())
        }
    }
}

impl From<RawInferenceResult> for InferencePayload {
    fn from(raw: RawInferenceResult) -> Self {
        match raw {
            RawInferenceResult::ScoreMap { prediction, confidence, scores, model_type } => Self {
                prediction: Some(prediction),
                confidence: Some(confidence),
                class_probabilities: Some(scores),
                model_type,
                ..Default::default()
            },
            RawInferenceResult::Ranked { prediction, confidence, ranked, model_type } => Self {
                prediction: Some(prediction),
                confidence: Some(confidence),
                top_predictions: Some(ranked),
                model_type,
                ..Default::default()
            },
            RawInferenceResult::Distribution { prediction, confidence, distribution, model_type } => Self {
                prediction: Some(prediction),
                confidence: Some(confidence),
                distribution: Some(distribution),
                model_type,
                ..Default::default()
            },
            RawInferenceResult::Failure { error } => Self {
                error: Some(error),
                ..Default::default()
            },
        }
    }
}

/// Lifecycle status of a history record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }

    /// Parse a backend status string, ignoring case and surrounding whitespace
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persist call input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistHistoryRequest {
    pub image_id: String,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RawInferenceResult>,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Persist call output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveHistoryResponse {
    pub success: bool,
    pub message: String,
}

/// History row as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDto {
    pub id: String,
    /// Creation time, epoch milliseconds
    pub created_at: i64,
    pub image_id: String,
    pub model_name: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub confidence: Option<f64>,
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Image metadata attached to a history row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDto {
    pub id: String,
    #[serde(default)]
    pub original_file_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub format: Option<String>,
}

/// `{history, image}` pair returned by every list call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryWithImage {
    pub history: HistoryDto,
    #[serde(default)]
    pub image: Option<ImageDto>,
}

/// Model known to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model_type: String,
    #[serde(default)]
    pub num_classes: u32,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableModels {
    pub models: Vec<ModelInfo>,
    pub active_model_id: String,
}
