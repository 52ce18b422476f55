//! Two-stage emotion inference pipeline.
//!
//! Wires the classifier, the optional GCN refiner, and the decision stage
//! behind one load-once entry point. Refinement artifacts load inside a
//! fault-isolating boundary: any failure there logs a warning and leaves
//! the pipeline in classifier-only mode instead of propagating.

use std::path::Path;

use anyhow::Result;
use candle_core::Device;
use tracing::{info, warn};

use crate::artifacts::{
    load_calibration, load_graph, load_labels, load_metadata, Calibration, ClassifierFiles,
    RefinerFiles,
};
use crate::classifier::{select_device, SequenceClassifier};
use crate::decision::{decide, EmotionPrediction};
use crate::graph::EmotionGraph;
use crate::refiner::GcnRefiner;
use crate::EmographError;

/// Default caller confidence floor for [`EmotionPipeline::predict_emotions`].
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.8;

/// Load-once emotion inference pipeline.
///
/// All model state is immutable after [`load`](Self::load); inference calls
/// share it read-only, so no locking is needed for concurrent use.
pub struct EmotionPipeline {
    classifier: SequenceClassifier,
    labels: Vec<String>,
    refiner: Option<GcnRefiner>,
    calibration: Option<Calibration>,
}

impl EmotionPipeline {
    /// Load the pipeline from a model artifact directory.
    ///
    /// The classifier bundle is mandatory — a missing or corrupt classifier,
    /// tokenizer, or label set is an unrecoverable startup failure. The
    /// refinement bundle is best-effort: on any failure the pipeline comes
    /// up refinement-unavailable and still serves predictions.
    pub fn load(dir: &Path) -> Result<Self, EmographError> {
        let device = select_device();
        Self::load_on(dir, device)
    }

    /// Load the pipeline onto a specific device.
    pub fn load_on(dir: &Path, device: Device) -> Result<Self, EmographError> {
        let files = ClassifierFiles::resolve(dir);
        let labels = load_labels(&files)?;
        let metadata = load_metadata(&files)?;

        let classifier = SequenceClassifier::new(&files, device.clone(), labels.len(), metadata.max_len)
            .map_err(|e| EmographError::Artifact(format!("{:#}", e)))?;
        info!(
            "Emotion classifier loaded ({} labels, max_len {})",
            labels.len(),
            metadata.max_len
        );

        let (refiner, calibration) = load_refinement_or_degrade(dir, labels.len(), &device);

        Ok(Self {
            classifier,
            labels,
            refiner,
            calibration,
        })
    }

    /// Whether the refinement stage loaded and can be applied.
    pub fn refinement_available(&self) -> bool {
        self.refiner.is_some()
    }

    /// The ordered emotion label set; index position is canonical identity.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Predict emotions for one already-preprocessed text.
    ///
    /// Classifies, optionally refines (when requested and available),
    /// applies sigmoid plus thresholds, and returns the surviving
    /// `(label, probability)` pairs sorted by probability descending.
    /// An empty result means no label cleared its threshold — a valid
    /// outcome, not an error.
    pub fn predict_emotions(
        &self,
        text: &str,
        min_confidence: f32,
        use_refinement: bool,
    ) -> Result<Vec<EmotionPrediction>, EmographError> {
        let logits = self
            .classifier
            .classify(text)
            .map_err(|e| EmographError::Inference(format!("{:#}", e)))?;

        let logits = match (&self.refiner, use_refinement) {
            (Some(refiner), true) => refiner.refine(&logits)?,
            _ => logits,
        };

        let probs: Vec<f32> = logits.iter().map(|&l| crate::decision::sigmoid(l)).collect();

        // Calibration rides with the refinement bundle: when that bundle
        // failed to load, only the caller's floor filters.
        Ok(decide(
            &probs,
            &self.labels,
            self.calibration.as_ref(),
            min_confidence,
        ))
    }
}

/// Fault boundary for the refinement stage.
///
/// Any failure in the `gnn/` bundle is absorbed here: it logs a warning
/// and leaves refinement (and its calibration) unavailable, so the
/// pipeline always comes up as long as the classifier loaded.
pub fn load_refinement_or_degrade(
    dir: &Path,
    num_labels: usize,
    device: &Device,
) -> (Option<GcnRefiner>, Option<Calibration>) {
    match load_refinement(dir, num_labels, device) {
        Ok((refiner, calibration)) => {
            info!(
                "GCN refiner loaded ({} emotion nodes, calibration {})",
                refiner.num_nodes(),
                calibration.version.as_deref().unwrap_or("unversioned")
            );
            (Some(refiner), Some(calibration))
        }
        Err(e) => {
            warn!(
                "GCN refiner not available: {:#}. Falling back to classifier only.",
                e
            );
            (None, None)
        }
    }
}

/// Load the refinement bundle: graph, GCN weights, and calibration.
///
/// Everything here is recoverable — [`load_refinement_or_degrade`] absorbs
/// the error, marks refinement unavailable, and continues.
pub fn load_refinement(
    dir: &Path,
    num_labels: usize,
    device: &Device,
) -> Result<(GcnRefiner, Calibration)> {
    let files = RefinerFiles::resolve(dir);
    let artifacts = load_graph(&files)?;
    let graph = EmotionGraph::new(num_labels, &artifacts)?;
    let refiner = GcnRefiner::load(&files, &graph, device)?;
    let calibration = load_calibration(&files, num_labels)?;
    Ok((refiner, calibration))
}
