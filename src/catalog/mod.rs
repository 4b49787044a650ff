//! Model catalog: which recognition models the backend offers and which one is active

use crate::backend::{AvailableModels, ModelInfo, RecognitionBackend};
use crate::error::{RecognitionError, Result};
use crate::gate::RequestGate;
use crate::workflow::RecognitionWorkflow;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const SWITCH_KEY: &str = "models:switch";

/// Cached view of the backend's model list
pub struct ModelCatalog {
    backend: Arc<dyn RecognitionBackend>,
    gate: RequestGate,
    models: Arc<RwLock<Option<AvailableModels>>>,
}

impl ModelCatalog {
    pub fn new(backend: Arc<dyn RecognitionBackend>) -> Self {
        Self {
            backend,
            gate: RequestGate::new(),
            models: Arc::new(RwLock::new(None)),
        }
    }

    /// Fetch the model list and cache it
    ///
    /// `is_active` flags are rewritten from `active_model_id` so exactly one
    /// model (or none, if the id matches nothing) is marked active.
    pub async fn fetch_models(&self) -> Result<AvailableModels> {
        let mut available = self.backend.list_models().await?;
        mark_active(&mut available);

        if !available.models.iter().any(|m| m.is_active) {
            warn!(active = %available.active_model_id, "Active model id not in model list");
        }
        debug!(count = available.models.len(), "Fetched model list");

        *self.models.write().await = Some(available.clone());
        Ok(available)
    }

    /// Make `model_id` the active model
    ///
    /// Rejected with `Busy` while another switch is running, and with
    /// `Precondition` when the cached list does not contain `model_id`.
    pub async fn switch_model(&self, model_id: &str) -> Result<ModelInfo> {
        let _permit = self
            .gate
            .try_acquire(SWITCH_KEY)
            .ok_or_else(|| RecognitionError::Busy("model switch in flight".to_string()))?;

        if let Some(available) = self.models.read().await.as_ref() {
            if !available.models.iter().any(|m| m.id == model_id) {
                return Err(RecognitionError::Precondition(format!("unknown model: {}", model_id)));
            }
        }

        let mut info = self.backend.switch_model(model_id).await?;
        info.is_active = true;
        info!(model = %info.name, "Switched active model");

        if let Some(available) = self.models.write().await.as_mut() {
            available.active_model_id = info.id.clone();
            mark_active(available);
        }

        Ok(info)
    }

    /// Active model from the cached list
    pub async fn active_model(&self) -> Option<ModelInfo> {
        self.models
            .read()
            .await
            .as_ref()
            .and_then(|available| available.models.iter().find(|m| m.is_active).cloned())
    }

    pub async fn models(&self) -> Vec<ModelInfo> {
        self.models
            .read()
            .await
            .as_ref()
            .map(|available| available.models.clone())
            .unwrap_or_default()
    }

    /// Tell `workflow` which model name to record with saved history
    pub async fn apply_to(&self, workflow: &RecognitionWorkflow) {
        workflow.set_active_model(self.active_model().await.map(|m| m.name));
    }
}

fn mark_active(available: &mut AvailableModels) {
    let active_id = available.active_model_id.clone();
    for model in &mut available.models {
        model.is_active = model.id == active_id;
    }
}
