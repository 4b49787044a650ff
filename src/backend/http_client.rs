//! HTTP implementation of the recognition backend

use super::models::*;
use super::RecognitionBackend;
use crate::config::BackendConfig;
use crate::error::{RecognitionError, Result};
use crate::time_backend_call;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Backend reached over JSON/HTTP
pub struct HttpBackend {
    http: Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Create a new HTTP backend
    pub fn new(config: BackendConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RecognitionError::Configuration(e.to_string()))?;

        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.service_url.trim_end_matches('/'), path)
    }

    /// `path` with `segment` appended as one percent-encoded path segment
    fn url_with_segment(&self, path: &str, segment: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|e| RecognitionError::Configuration(format!("Invalid service url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| RecognitionError::Configuration("Service url cannot take a path".to_string()))?
            .push(segment);
        Ok(url)
    }

    /// Attach auth, send, and decode a JSON body
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let mut request = request;

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RecognitionError::Transport(format!("Timeout: {}", e))
            } else {
                RecognitionError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Backend returned {}: {}", status, error_text);
            return Err(RecognitionError::Transport(format!(
                "Status {}: {}",
                status, error_text
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RecognitionError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl RecognitionBackend for HttpBackend {
    async fn upload_image(&self, file_data: Bytes, file_name: &str) -> Result<SaveImageResult> {
        debug!("Uploading {} ({} bytes)", file_name, file_data.len());

        let request = self
            .http
            .post(self.url("/api/images"))
            .query(&[("file_name", file_name)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(file_data);

        time_backend_call!("upload", self.send_json::<SaveImageResult>(request).await)
    }

    async fn run_inference(&self, image_path: &str) -> Result<RawInferenceResult> {
        debug!("Requesting inference for {}", image_path);

        let request = self
            .http
            .post(self.url("/api/inference"))
            .json(&serde_json::json!({ "image_path": image_path }));

        time_backend_call!("inference", self.send_json::<RawInferenceResult>(request).await)
    }

    async fn persist_history(&self, request: PersistHistoryRequest) -> Result<SaveHistoryResponse> {
        debug!("Persisting history for image {}", request.image_id);

        let request = self.http.post(self.url("/api/history")).json(&request);

        time_backend_call!("persist_history", self.send_json::<SaveHistoryResponse>(request).await)
    }

    async fn list_history(&self, limit: u32, skip: u32) -> Result<Vec<HistoryWithImage>> {
        let request = self
            .http
            .get(self.url("/api/history"))
            .query(&[("limit", limit), ("skip", skip)]);

        time_backend_call!("list_history", self.send_json::<Vec<HistoryWithImage>>(request).await)
    }

    async fn list_history_by_status(
        &self,
        status: RecordStatus,
        limit: u32,
    ) -> Result<Vec<HistoryWithImage>> {
        let request = self
            .http
            .get(self.url(&format!("/api/history/by-status/{}", status.as_str())))
            .query(&[("limit", limit)]);

        time_backend_call!("list_history_by_status", self.send_json::<Vec<HistoryWithImage>>(request).await)
    }

    async fn list_history_by_model(
        &self,
        model_name: &str,
        limit: u32,
    ) -> Result<Vec<HistoryWithImage>> {
        let limit = limit.to_string();
        let request = self
            .http
            .get(self.url("/api/history/by-model"))
            .query(&[("model_name", model_name), ("limit", limit.as_str())]);

        time_backend_call!("list_history_by_model", self.send_json::<Vec<HistoryWithImage>>(request).await)
    }

    async fn count_history(&self) -> Result<u64> {
        let request = self.http.get(self.url("/api/history/count"));

        time_backend_call!("count_history", self.send_json::<u64>(request).await)
    }

    async fn delete_history(&self, id: &str) -> Result<bool> {
        let request = self.http.delete(self.url_with_segment("/api/history", id)?);

        time_backend_call!("delete_history", self.send_json::<bool>(request).await)
    }

    async fn list_models(&self) -> Result<AvailableModels> {
        let request = self.http.get(self.url("/api/models"));

        time_backend_call!("list_models", self.send_json::<AvailableModels>(request).await)
    }

    async fn switch_model(&self, model_id: &str) -> Result<ModelInfo> {
        let request = self
            .http
            .post(self.url("/api/models/active"))
            .json(&serde_json::json!({ "model_id": model_id }));

        time_backend_call!("switch_model", self.send_json::<ModelInfo>(request).await)
    }
}
