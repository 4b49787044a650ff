//! Image recognition workflow
//!
//! Drives one image at a time through:
//! - upload to the backend, yielding an image handle
//! - inference, normalized into a single result shape
//! - a single history record per successful result

pub mod models;
pub mod normalize;
pub mod orchestrator;

pub use models::{
    LabelConfidence, NormalizedResult, SaveOutcome, UploadedImage, WorkflowPhase,
    WorkflowSnapshot,
};
pub use normalize::normalize;
pub use orchestrator::RecognitionWorkflow;
