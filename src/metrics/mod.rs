//! Metrics collection for observability

use prometheus::{
    CounterVec, HistogramVec, Opts, Registry,
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
};
use std::sync::Arc;
use once_cell::sync::Lazy;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Workflow metrics
    pub uploads: CounterVec,
    pub inferences: CounterVec,
    pub history_saves: CounterVec,

    // History view metrics
    pub history_fetches: CounterVec,
    pub history_deletes: CounterVec,

    // Backend call latency
    pub backend_request_duration: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let uploads = register_counter_vec_with_registry!(
            Opts::new("recognition_uploads_total", "Total image uploads"),
            &["status"],
            registry
        )?;

        let inferences = register_counter_vec_with_registry!(
            Opts::new("recognition_inferences_total", "Total inference requests"),
            &["status"],
            registry
        )?;

        let history_saves = register_counter_vec_with_registry!(
            Opts::new("recognition_history_saves_total", "History save attempts by outcome"),
            &["outcome"],
            registry
        )?;

        let history_fetches = register_counter_vec_with_registry!(
            Opts::new("recognition_history_fetches_total", "History list fetches by outcome"),
            &["outcome"],
            registry
        )?;

        let history_deletes = register_counter_vec_with_registry!(
            Opts::new("recognition_history_deletes_total", "Per-record deletes by status"),
            &["status"],
            registry
        )?;

        let backend_request_duration = register_histogram_vec_with_registry!(
            "recognition_backend_request_duration_seconds",
            "Backend call duration in seconds",
            &["call"],
            registry
        )?;

        Ok(Self {
            registry,
            uploads,
            inferences,
            history_saves,
            history_fetches,
            history_deletes,
            backend_request_duration,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_upload(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.uploads.with_label_values(&[status]).inc();
    }

    /// Record an inference; `status` is "success", "model_error" or "transport_error"
    pub fn record_inference(&self, status: &str) {
        self.inferences.with_label_values(&[status]).inc();
    }

    pub fn record_save(&self, outcome: &str) {
        self.history_saves.with_label_values(&[outcome]).inc();
    }

    /// Record a history fetch: "completed", "skipped" (dropped by the gate) or "failed"
    pub fn record_fetch(&self, outcome: &str) {
        self.history_fetches.with_label_values(&[outcome]).inc();
    }

    pub fn record_delete(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.history_deletes.with_label_values(&[status]).inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Time a backend call against the duration histogram
#[macro_export]
macro_rules! time_backend_call {
    ($call:expr, $operation:expr) => {{
        let timer = $crate::metrics::METRICS
            .backend_request_duration
            .with_label_values(&[$call])
            .start_timer();
        let result = $operation;
        timer.observe_duration();
        result
    }};
}
