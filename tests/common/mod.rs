//! In-memory backend for integration tests
//!
//! Every call is logged. A call can be held open with [`ScriptedBackend::hold`]
//! so tests can act while it is suspended.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;
use recognition_client::backend::{
    AvailableModels, HistoryDto, HistoryWithImage, ImageDto, ModelInfo, PersistHistoryRequest,
    RawInferenceResult, RecognitionBackend, RecordStatus, SaveHistoryResponse, SaveImageResult,
};
use recognition_client::{RecognitionError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Handle on a held call: `started` fires when the call begins, `release` lets it finish
#[derive(Clone)]
pub struct Hold {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl Hold {
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    calls: Mutex<Vec<String>>,
    holds: Mutex<HashMap<String, Hold>>,
    records: Mutex<Vec<HistoryWithImage>>,
    persisted: Mutex<Vec<PersistHistoryRequest>>,
    inference: Mutex<Option<std::result::Result<RawInferenceResult, String>>>,
    failing_deletes: Mutex<HashSet<String>>,
    upload_failure: Mutex<Option<String>>,
    reject_persist: AtomicBool,
    fail_lists: AtomicBool,
    uploads: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_records(records: Vec<HistoryWithImage>) -> Arc<Self> {
        let backend = Self::default();
        *backend.records.lock().unwrap() = records;
        Arc::new(backend)
    }

    /// Hold the next call named `call` until released
    pub fn hold(&self, call: &str) -> Hold {
        let hold = Hold {
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        self.holds.lock().unwrap().insert(call.to_string(), hold.clone());
        hold
    }

    pub fn set_inference(&self, result: RawInferenceResult) {
        *self.inference.lock().unwrap() = Some(Ok(result));
    }

    pub fn fail_inference(&self, message: &str) {
        *self.inference.lock().unwrap() = Some(Err(message.to_string()));
    }

    /// Fail every upload with a transport error carrying `message`
    pub fn fail_upload(&self, message: &str) {
        *self.upload_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_delete(&self, id: &str) {
        self.failing_deletes.lock().unwrap().insert(id.to_string());
    }

    pub fn reject_persist(&self, reject: bool) {
        self.reject_persist.store(reject, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of logged calls whose entry starts with `prefix`
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn persisted(&self) -> Vec<PersistHistoryRequest> {
        self.persisted.lock().unwrap().clone()
    }

    pub fn record_ids(&self) -> Vec<String> {
        self.records.lock().unwrap().iter().map(|r| r.history.id.clone()).collect()
    }

    async fn enter(&self, entry: String, call: &str) {
        self.calls.lock().unwrap().push(entry);
        let hold = { self.holds.lock().unwrap().remove(call) };
        if let Some(hold) = hold {
            hold.started.notify_one();
            hold.release.notified().await;
        }
    }

    fn check_lists(&self) -> Result<()> {
        if self.fail_lists.load(Ordering::SeqCst) {
            Err(RecognitionError::Transport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecognitionBackend for ScriptedBackend {
    async fn upload_image(&self, file_data: Bytes, file_name: &str) -> Result<SaveImageResult> {
        self.enter(format!("upload_image:{}:{}", file_name, file_data.len()), "upload_image").await;
        if let Some(message) = self.upload_failure.lock().unwrap().clone() {
            return Err(RecognitionError::Transport(message));
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SaveImageResult {
            file_path: format!("/uploads/{}-{}", n, file_name),
            image_id: format!("img-{}", n),
        })
    }

    async fn run_inference(&self, image_path: &str) -> Result<RawInferenceResult> {
        self.enter(format!("run_inference:{}", image_path), "run_inference").await;
        match self.inference.lock().unwrap().clone() {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(message)) => Err(RecognitionError::Transport(message)),
            None => Ok(score_map(&[("cat", 0.7), ("dog", 0.2), ("fox", 0.1)], Some("ResNet34"))),
        }
    }

    async fn persist_history(&self, request: PersistHistoryRequest) -> Result<SaveHistoryResponse> {
        self.enter(format!("persist_history:{}", request.image_id), "persist_history").await;
        self.persisted.lock().unwrap().push(request);
        if self.reject_persist.load(Ordering::SeqCst) {
            Ok(SaveHistoryResponse { success: false, message: "duplicate record".to_string() })
        } else {
            Ok(SaveHistoryResponse { success: true, message: "saved".to_string() })
        }
    }

    async fn list_history(&self, limit: u32, skip: u32) -> Result<Vec<HistoryWithImage>> {
        self.enter(format!("list_history:{}:{}", limit, skip), "list_history").await;
        self.check_lists()?;
        let records = self.records.lock().unwrap();
        Ok(records.iter().skip(skip as usize).take(limit as usize).cloned().collect())
    }

    async fn list_history_by_status(&self, status: RecordStatus, limit: u32) -> Result<Vec<HistoryWithImage>> {
        self.enter(format!("list_history_by_status:{}:{}", status, limit), "list_history_by_status").await;
        self.check_lists()?;
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.history.status.eq_ignore_ascii_case(status.as_str()))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_history_by_model(&self, model_name: &str, limit: u32) -> Result<Vec<HistoryWithImage>> {
        self.enter(format!("list_history_by_model:{}:{}", model_name, limit), "list_history_by_model").await;
        self.check_lists()?;
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.history.model_name == model_name)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_history(&self) -> Result<u64> {
        self.enter("count_history".to_string(), "count_history").await;
        Ok(self.records.lock().unwrap().len() as u64)
    }

    async fn delete_history(&self, id: &str) -> Result<bool> {
        self.enter(format!("delete_history:{}", id), "delete_history").await;
        if self.failing_deletes.lock().unwrap().contains(id) {
            return Err(RecognitionError::Transport(format!("Status 500 Internal Server Error: cannot delete {}", id)));
        }
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.history.id != id);
        Ok(records.len() < before)
    }

    async fn list_models(&self) -> Result<AvailableModels> {
        self.enter("list_models".to_string(), "list_models").await;
        Ok(AvailableModels {
            models: vec![model("resnet34", "ResNet34"), model("mobilenet", "MobileNetV3-Small")],
            active_model_id: "resnet34".to_string(),
        })
    }

    async fn switch_model(&self, model_id: &str) -> Result<ModelInfo> {
        self.enter(format!("switch_model:{}", model_id), "switch_model").await;
        match model_id {
            "resnet34" => Ok(model("resnet34", "ResNet34")),
            "mobilenet" => Ok(model("mobilenet", "MobileNetV3-Small")),
            other => Err(RecognitionError::Transport(format!("Status 404 Not Found: {}", other))),
        }
    }
}

pub fn model(id: &str, name: &str) -> ModelInfo {
    ModelInfo {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        model_type: "classification".to_string(),
        num_classes: 10,
        is_active: false,
    }
}

pub fn score_map(entries: &[(&str, f64)], model_type: Option<&str>) -> RawInferenceResult {
    let scores: IndexMap<String, f64> = entries.iter().map(|(l, s)| (l.to_string(), *s)).collect();
    let (prediction, confidence) = entries
        .iter()
        .fold(("", f64::MIN), |best, (l, s)| if *s > best.1 { (*l, *s) } else { best });
    RawInferenceResult::ScoreMap {
        prediction: prediction.to_string(),
        confidence,
        scores,
        model_type: model_type.map(str::to_string),
    }
}

/// History row created at `created_at` epoch millis
pub fn record(id: &str, created_at: i64, model: &str, status: &str, confidence: Option<f64>) -> HistoryWithImage {
    HistoryWithImage {
        history: HistoryDto {
            id: id.to_string(),
            created_at,
            image_id: format!("img-{}", id),
            model_name: model.to_string(),
            result: None,
            confidence,
            status: status.to_string(),
            error_message: None,
        },
        image: Some(ImageDto {
            id: format!("img-{}", id),
            original_file_name: Some(format!("{}.png", id)),
            image_url: Some(format!("/uploads/{}.png", id)),
            file_size: Some(2048),
            format: Some("png".to_string()),
        }),
    }
}

/// `count` successful records, newest first, one minute apart
pub fn population(count: usize) -> Vec<HistoryWithImage> {
    let base = 1_704_067_200_000i64; // 2024-01-01T00:00:00Z
    (0..count)
        .map(|i| {
            let created_at = base + ((count - i) as i64) * 60_000;
            record(&format!("r{:03}", i), created_at, "ResNet34", "success", Some(0.5))
        })
        .collect()
}
