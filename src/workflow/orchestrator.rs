//! Upload -> inference -> persistence pipeline for a single image

use super::models::*;
use super::normalize::normalize;
use crate::backend::{PersistHistoryRequest, RawInferenceResult, RecognitionBackend, RecordStatus};
use crate::error::{RecognitionError, Result};
use crate::gate::RequestGate;
use crate::metrics::METRICS;
use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Mutable state of the current workflow instance
#[derive(Debug)]
struct WorkflowSlot {
    instance_id: Uuid,
    /// Bumped whenever a new instance starts; late completions compare against it
    generation: u64,
    phase: WorkflowPhase,
    image: Option<UploadedImage>,
    raw: Option<RawInferenceResult>,
    result: Option<NormalizedResult>,
    saved: bool,
    save_status: Option<RecordStatus>,
    last_error: Option<String>,
    active_model: Option<String>,
}

impl WorkflowSlot {
    fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            generation: 0,
            phase: WorkflowPhase::Idle,
            image: None,
            raw: None,
            result: None,
            saved: false,
            save_status: None,
            last_error: None,
            active_model: None,
        }
    }

    /// Drop everything tied to the previous image
    fn start_instance(&mut self, phase: WorkflowPhase) -> u64 {
        self.instance_id = Uuid::new_v4();
        self.generation += 1;
        self.phase = phase;
        self.image = None;
        self.raw = None;
        self.result = None;
        self.saved = false;
        self.save_status = None;
        self.last_error = None;
        self.generation
    }
}

/// Orchestrates one image at a time through upload, inference and history save
pub struct RecognitionWorkflow {
    backend: Arc<dyn RecognitionBackend>,
    gate: RequestGate,
    slot: Mutex<WorkflowSlot>,
    default_model_name: String,
}

impl RecognitionWorkflow {
    pub fn new(backend: Arc<dyn RecognitionBackend>, default_model_name: impl Into<String>) -> Self {
        Self {
            backend,
            gate: RequestGate::new(),
            slot: Mutex::new(WorkflowSlot::new()),
            default_model_name: default_model_name.into(),
        }
    }

    /// Share a gate with other components
    pub fn with_gate(mut self, gate: RequestGate) -> Self {
        self.gate = gate;
        self
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Name recorded with saved history when the result does not carry one
    pub fn set_active_model(&self, model_name: Option<String>) {
        self.lock().active_model = model_name;
    }

    /// Upload a file and make it the current image
    ///
    /// Any previous result and its save state are discarded. Rejected with
    /// `Busy` while an upload or inference is outstanding.
    pub async fn upload(&self, file_data: impl Into<Bytes>, file_name: &str) -> Result<UploadedImage> {
        let file_data = file_data.into();
        if file_data.is_empty() {
            return Err(RecognitionError::Precondition("file is empty".to_string()));
        }

        let (generation, instance_id) = {
            let mut slot = self.lock();
            if matches!(slot.phase, WorkflowPhase::Uploading | WorkflowPhase::Processing) {
                return Err(RecognitionError::Busy(format!(
                    "cannot upload while {:?}",
                    slot.phase
                )));
            }
            let generation = slot.start_instance(WorkflowPhase::Uploading);
            (generation, slot.instance_id)
        };

        info!(instance = %instance_id, file = file_name, bytes = file_data.len(), "Uploading image");

        let response = self.backend.upload_image(file_data, file_name).await;

        let mut slot = self.lock();
        if slot.generation != generation {
            warn!(instance = %instance_id, "Upload finished for a superseded instance");
            return Err(RecognitionError::Busy("upload superseded".to_string()));
        }

        match response {
            Ok(saved) => {
                let image = UploadedImage::from(saved);
                debug!(instance = %instance_id, image_id = %image.image_id, "Upload complete");
                slot.image = Some(image.clone());
                slot.phase = WorkflowPhase::Uploaded;
                METRICS.record_upload(true);
                Ok(image)
            }
            Err(e) => {
                error!(instance = %instance_id, "Upload failed: {}", e);
                slot.phase = WorkflowPhase::Idle;
                slot.last_error = Some(e.user_message());
                METRICS.record_upload(false);
                Err(e)
            }
        }
    }

    /// Run inference on the current image
    ///
    /// Transport and model failures come back as `NormalizedResult::Failed`.
    /// A successful result is saved to history automatically unless a save
    /// already happened or is running.
    pub async fn process(&self) -> Result<NormalizedResult> {
        let (generation, instance_id, image) = {
            let mut slot = self.lock();
            if slot.phase.is_suspended() {
                return Err(RecognitionError::Busy(format!(
                    "cannot process while {:?}",
                    slot.phase
                )));
            }
            let image = slot
                .image
                .clone()
                .ok_or_else(|| RecognitionError::Precondition("no image uploaded".to_string()))?;
            slot.phase = WorkflowPhase::Processing;
            slot.raw = None;
            slot.result = None;
            slot.last_error = None;
            (slot.generation, slot.instance_id, image)
        };

        info!(instance = %instance_id, image_id = %image.image_id, "Running inference");

        let (raw, result) = match self.backend.run_inference(&image.file_path).await {
            Ok(raw) => {
                let result = normalize(&raw);
                let status = if result.is_success() { "success" } else { "model_error" };
                METRICS.record_inference(status);
                (Some(raw), result)
            }
            Err(e) => {
                error!(instance = %instance_id, "Inference call failed: {}", e);
                METRICS.record_inference("transport_error");
                (None, NormalizedResult::failed(format!("Processing failed: {}", e.user_message())))
            }
        };

        let should_save = {
            let mut slot = self.lock();
            if slot.generation != generation {
                warn!(instance = %instance_id, "Inference finished for a superseded instance");
                return Ok(result);
            }
            slot.raw = raw;
            slot.result = Some(result.clone());
            slot.phase = WorkflowPhase::Processed {
                succeeded: result.is_success(),
            };
            if let Some(error) = result.error() {
                slot.last_error = Some(error.to_string());
            }
            result.is_success() && !slot.saved && !self.gate.is_in_flight(&save_key(&image))
        };

        if should_save {
            let outcome = self.save_history().await;
            debug!(instance = %instance_id, outcome = outcome.as_str(), "Automatic history save finished");
        }

        Ok(result)
    }

    /// Upload then process, the usual single-action entry point
    pub async fn recognize(&self, file_data: impl Into<Bytes>, file_name: &str) -> Result<NormalizedResult> {
        self.upload(file_data, file_name).await?;
        self.process().await
    }

    /// Persist the current result to history
    ///
    /// Idempotent: once saved, further calls are no-ops until the next upload.
    /// A save already running for the same image makes this call return
    /// `InFlight` without touching the backend.
    pub async fn save_history(&self) -> SaveOutcome {
        let outcome = self.save_history_inner().await;
        METRICS.record_save(outcome.as_str());
        outcome
    }

    async fn save_history_inner(&self) -> SaveOutcome {
        let (generation, instance_id, request, _permit) = {
            let mut slot = self.lock();
            if slot.saved {
                return SaveOutcome::AlreadySaved;
            }

            let (image, result) = match (&slot.image, &slot.result) {
                (Some(image), Some(result)) => (image.clone(), result.clone()),
                _ => return SaveOutcome::NothingToSave,
            };

            if let NormalizedResult::Failed { error } = &result {
                debug!(instance = %slot.instance_id, "Result is an error, marking failed without saving");
                slot.save_status = Some(RecordStatus::Failed);
                return SaveOutcome::MarkedFailed(error.clone());
            }

            let permit = match self.gate.try_acquire(save_key(&image)) {
                Some(permit) => permit,
                None => return SaveOutcome::InFlight,
            };

            slot.save_status = Some(RecordStatus::Pending);

            let model_name = slot
                .raw
                .as_ref()
                .and_then(|raw| raw.model_type())
                .or_else(|| result.model_type())
                .map(str::to_string)
                .or_else(|| slot.active_model.clone())
                .unwrap_or_else(|| self.default_model_name.clone());

            let request = PersistHistoryRequest {
                image_id: image.image_id.clone(),
                model_name,
                result: slot.raw.clone(),
                status: RecordStatus::Success,
                error_message: None,
            };

            slot.phase = WorkflowPhase::Saving;
            slot.save_status = Some(RecordStatus::Processing);

            (slot.generation, slot.instance_id, request, permit)
        };

        info!(instance = %instance_id, image_id = %request.image_id, "Saving history record");

        let response = self.backend.persist_history(request).await;

        let mut slot = self.lock();
        if slot.generation != generation {
            warn!(instance = %instance_id, "Save finished after a new upload started, dropping outcome");
            return SaveOutcome::Superseded;
        }

        match response {
            Ok(response) if response.success => {
                slot.saved = true;
                slot.save_status = Some(RecordStatus::Success);
                slot.phase = WorkflowPhase::Saved;
                info!(instance = %instance_id, "History record saved");
                SaveOutcome::Saved
            }
            Ok(response) => {
                warn!(instance = %instance_id, "Backend rejected history save: {}", response.message);
                slot.save_status = Some(RecordStatus::Failed);
                slot.phase = WorkflowPhase::SaveFailed;
                slot.last_error = Some(response.message.clone());
                SaveOutcome::Rejected(response.message)
            }
            Err(e) => {
                error!(instance = %instance_id, "History save failed: {}", e);
                let message = e.user_message();
                slot.save_status = Some(RecordStatus::Error);
                slot.phase = WorkflowPhase::SaveFailed;
                slot.last_error = Some(message.clone());
                SaveOutcome::Failed(message)
            }
        }
    }

    /// Return to `Idle`, discarding the current image and result
    pub fn reset(&self) -> Result<()> {
        let mut slot = self.lock();
        if slot.phase.is_suspended() {
            return Err(RecognitionError::Busy(format!("cannot reset while {:?}", slot.phase)));
        }
        slot.start_instance(WorkflowPhase::Idle);
        Ok(())
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.lock().phase
    }

    pub fn is_saved(&self) -> bool {
        self.lock().saved
    }

    pub fn current_result(&self) -> Option<NormalizedResult> {
        self.lock().result.clone()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let slot = self.lock();
        WorkflowSnapshot {
            instance_id: slot.instance_id,
            phase: slot.phase,
            image: slot.image.clone(),
            result: slot.result.clone(),
            save_status: slot.save_status,
            saved: slot.saved,
            last_error: slot.last_error.clone(),
        }
    }
}

fn save_key(image: &UploadedImage) -> String {
    format!("history:save:{}", image.image_id)
}
