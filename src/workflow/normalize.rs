//! Backend result normalization
//!
//! Each raw shape has its own collector; all of them feed [`rank`], which sorts
//! by confidence descending. The sort is stable, so equal scores keep the order
//! the backend sent them in.

use super::models::{LabelConfidence, NormalizedResult};
use crate::backend::{LabelScore, RankedPrediction, RawInferenceResult};
use indexmap::IndexMap;
use tracing::warn;

/// Turn any backend result shape into the canonical form
pub fn normalize(raw: &RawInferenceResult) -> NormalizedResult {
    match raw {
        RawInferenceResult::Failure { error } => NormalizedResult::failed(error.clone()),
        RawInferenceResult::ScoreMap { prediction, confidence, scores, model_type } => rank(
            from_score_map(scores),
            prediction,
            *confidence,
            model_type.clone(),
        ),
        RawInferenceResult::Ranked { prediction, confidence, ranked, model_type } => rank(
            from_ranked(ranked),
            prediction,
            *confidence,
            model_type.clone(),
        ),
        RawInferenceResult::Distribution { prediction, confidence, distribution, model_type } => {
            rank(
                from_distribution(distribution),
                prediction,
                *confidence,
                model_type.clone(),
            )
        }
    }
}

fn from_score_map(scores: &IndexMap<String, f64>) -> Vec<LabelConfidence> {
    scores
        .iter()
        .map(|(label, score)| LabelConfidence::new(label.clone(), *score))
        .collect()
}

fn from_ranked(ranked: &[RankedPrediction]) -> Vec<LabelConfidence> {
    ranked
        .iter()
        .map(|p| LabelConfidence::new(p.class.clone(), p.probability))
        .collect()
}

fn from_distribution(distribution: &[LabelScore]) -> Vec<LabelConfidence> {
    distribution
        .iter()
        .map(|s| LabelConfidence::new(s.label.clone(), s.score))
        .collect()
}

fn rank(
    pairs: Vec<LabelConfidence>,
    prediction: &str,
    confidence: f64,
    model_type: Option<String>,
) -> NormalizedResult {
    let total = pairs.len();
    let mut matches: Vec<LabelConfidence> = pairs
        .into_iter()
        .filter(|m| m.confidence.is_finite())
        .collect();

    if matches.len() != total {
        warn!("Dropped {} non-finite scores from inference result", total - matches.len());
    }

    matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    // Backends that only report the winner still produce one match
    if matches.is_empty() {
        if prediction.is_empty() || !confidence.is_finite() {
            return NormalizedResult::failed("inference returned no usable scores");
        }
        matches.push(LabelConfidence::new(prediction, confidence));
    }

    let top_prediction = matches[0].clone();

    NormalizedResult::Success {
        matches,
        top_prediction,
        model_type,
    }
}
