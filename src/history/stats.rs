//! Aggregate statistics over the full history population

use super::models::HistoryStats;
use crate::backend::{HistoryDto, RecognitionBackend};
use crate::error::{RecognitionError, Result};
use crate::gate::RequestGate;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, warn};

const STATS_KEY: &str = "history:stats";

/// Fetches the record population in one call and folds it into counters
pub struct StatsAggregator {
    backend: Arc<dyn RecognitionBackend>,
    gate: RequestGate,
    population_cap: u32,
}

impl StatsAggregator {
    pub fn new(backend: Arc<dyn RecognitionBackend>, gate: RequestGate, population_cap: u32) -> Self {
        Self {
            backend,
            gate,
            population_cap: population_cap.max(1),
        }
    }

    /// Fetch up to `population_cap` records and compute stats over them
    ///
    /// Returns `Busy` when a refresh is already running.
    pub async fn refresh(&self) -> Result<HistoryStats> {
        let _permit = self
            .gate
            .try_acquire(STATS_KEY)
            .ok_or_else(|| RecognitionError::Busy("stats refresh in flight".to_string()))?;

        let population = self.backend.list_history(self.population_cap, 0).await?;
        if population.len() as u64 >= u64::from(self.population_cap) {
            warn!(cap = self.population_cap, "History population reached the fetch cap, stats may be partial");
        }

        let stats = Self::compute(population.iter().map(|pair| &pair.history));
        debug!(total = stats.total, "Computed history stats");
        Ok(stats)
    }

    /// Fold records into counters
    pub fn compute<'a>(records: impl IntoIterator<Item = &'a HistoryDto>) -> HistoryStats {
        let mut stats = HistoryStats::default();
        let mut confidence_sum = 0.0;
        let mut confidence_count = 0usize;
        let mut distribution: IndexMap<String, usize> = IndexMap::new();

        for record in records {
            stats.total += 1;

            match record.status.trim().to_lowercase().as_str() {
                "success" => stats.success += 1,
                "failed" => stats.failed += 1,
                "processing" => stats.processing += 1,
                "pending" => stats.pending += 1,
                "error" => stats.error += 1,
                other => debug!(status = other, "Unrecognized status excluded from counters"),
            }

            if let Some(confidence) = record.confidence.filter(|c| c.is_finite() && *c > 0.0) {
                confidence_sum += confidence;
                confidence_count += 1;
            }

            *distribution.entry(record.model_name.clone()).or_insert(0) += 1;
        }

        stats.avg_confidence = if confidence_count > 0 {
            confidence_sum / confidence_count as f64
        } else {
            0.0
        };
        stats.model_distribution = distribution;
        stats
    }
}
