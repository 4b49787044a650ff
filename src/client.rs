//! Top-level client wiring the workflow, history and catalog to one backend

use crate::backend::{HttpBackend, RecognitionBackend};
use crate::catalog::ModelCatalog;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::gate::RequestGate;
use crate::history::HistoryQueryEngine;
use crate::workflow::RecognitionWorkflow;
use std::sync::Arc;
use tracing::info;

/// Components sharing one backend and one request gate
pub struct RecognitionClient {
    pub workflow: RecognitionWorkflow,
    pub history: HistoryQueryEngine,
    pub catalog: ModelCatalog,
    gate: RequestGate,
}

impl RecognitionClient {
    /// Build a client talking HTTP to `config.backend.service_url`
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let backend = HttpBackend::new(config.backend.clone())?;
        info!(url = %config.backend.service_url, "Recognition client configured");
        Ok(Self::with_backend(Arc::new(backend), config))
    }

    /// Build a client over any backend implementation
    pub fn with_backend(backend: Arc<dyn RecognitionBackend>, config: &ClientConfig) -> Self {
        let gate = RequestGate::new();
        Self {
            workflow: RecognitionWorkflow::new(Arc::clone(&backend), config.default_model_name.clone())
                .with_gate(gate.clone()),
            history: HistoryQueryEngine::with_gate(Arc::clone(&backend), &config.history, gate.clone()),
            catalog: ModelCatalog::new(backend),
            gate,
        }
    }

    /// Load models and point the workflow at the active one
    pub async fn sync_models(&self) -> Result<()> {
        self.catalog.fetch_models().await?;
        self.catalog.apply_to(&self.workflow).await;
        Ok(())
    }

    /// Switch models and record the new name for subsequent saves
    pub async fn switch_model(&self, model_id: &str) -> Result<()> {
        let info = self.catalog.switch_model(model_id).await?;
        self.workflow.set_active_model(Some(info.name));
        Ok(())
    }

    /// Number of gated operations currently running
    pub fn operations_in_flight(&self) -> usize {
        self.gate.in_flight_count()
    }
}
