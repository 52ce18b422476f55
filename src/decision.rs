//! Decision stage: logits to ranked emotion predictions.
//!
//! Emotions are multi-label, so each logit passes through an independent
//! sigmoid — no normalization across labels. A label is predicted when its
//! probability clears both the calibrated threshold and the caller's
//! confidence floor.

use serde::{Deserialize, Serialize};

use crate::artifacts::Calibration;

/// One predicted emotion with its sigmoid probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionPrediction {
    pub label: String,
    pub probability: f32,
}

/// Logistic transform from a raw logit to an independent probability.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Apply thresholds and rank the surviving labels.
///
/// With a calibration bundle, label `i` must clear its per-label threshold
/// (or the bundle's global threshold when no per-label vector shipped) AND
/// `min_confidence`. Without calibration — the degraded, classifier-only
/// mode — `min_confidence` is the sole cutoff.
///
/// Results are sorted by probability descending; exact ties keep label
/// order (stable sort).
pub fn decide(
    probs: &[f32],
    labels: &[String],
    calibration: Option<&Calibration>,
    min_confidence: f32,
) -> Vec<EmotionPrediction> {
    debug_assert_eq!(probs.len(), labels.len());

    let mut predictions: Vec<EmotionPrediction> = probs
        .iter()
        .enumerate()
        .filter_map(|(i, &p)| {
            let calibrated = calibration.map_or(true, |c| p >= c.threshold_for(i));
            if calibrated && p >= min_confidence {
                Some(EmotionPrediction {
                    label: labels[i].clone(),
                    probability: p,
                })
            } else {
                None
            }
        })
        .collect();

    predictions.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    predictions
}

// ============================================================================
// Tests
// ============================================================================
