//! Recognition backend contract
//!
//! The inference and storage service is reached only through
//! [`RecognitionBackend`]. Every call is single-shot; transport failures come
//! back as [`RecognitionError::Transport`](crate::error::RecognitionError::Transport),
//! model-level failures as [`RawInferenceResult::Failure`].

pub mod http_client;
pub mod models;

pub use http_client::HttpBackend;
pub use models::{
    AvailableModels, HistoryDto, HistoryWithImage, ImageDto, InferencePayload, LabelScore,
    ModelInfo, PersistHistoryRequest, RankedPrediction, RawInferenceResult, RecordStatus,
    SaveHistoryResponse, SaveImageResult,
};

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Backend RPC surface consumed by the client
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    /// Store an uploaded file and return its handle
    async fn upload_image(&self, file_data: Bytes, file_name: &str) -> Result<SaveImageResult>;

    /// Run the active model on a stored image
    async fn run_inference(&self, image_path: &str) -> Result<RawInferenceResult>;

    /// Write one history record. Idempotency is the caller's job.
    async fn persist_history(&self, request: PersistHistoryRequest) -> Result<SaveHistoryResponse>;

    /// Plain paginated listing
    async fn list_history(&self, limit: u32, skip: u32) -> Result<Vec<HistoryWithImage>>;

    async fn list_history_by_status(
        &self,
        status: RecordStatus,
        limit: u32,
    ) -> Result<Vec<HistoryWithImage>>;

    async fn list_history_by_model(
        &self,
        model_name: &str,
        limit: u32,
    ) -> Result<Vec<HistoryWithImage>>;

    async fn count_history(&self) -> Result<u64>;

    /// Delete a single record; `Ok(false)` when the backend refused
    async fn delete_history(&self, id: &str) -> Result<bool>;

    async fn list_models(&self) -> Result<AvailableModels>;

    async fn switch_model(&self, model_id: &str) -> Result<ModelInfo>;
}
