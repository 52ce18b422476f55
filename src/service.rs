//! Async service wrapper around the emotion pipeline.
//!
//! The core pipeline is synchronous compute over immutable state; this
//! module adapts it for async callers (chat pipelines, analytics services)
//! by running inference on the blocking thread pool.

use std::sync::Arc;

use async_trait::async_trait;

use crate::decision::EmotionPrediction;
use crate::pipeline::EmotionPipeline;
use crate::EmographError;

/// Service trait for emotion prediction.
#[async_trait]
pub trait EmotionService: Send + Sync {
    /// Predict emotions for one text with the caller's confidence floor.
    async fn predict(
        &self,
        text: &str,
        min_confidence: f32,
        use_refinement: bool,
    ) -> Result<Vec<EmotionPrediction>, EmographError>;

    /// Whether a model is loaded and predictions are possible.
    fn is_available(&self) -> bool;

    /// Whether the graph refinement stage is active.
    fn refinement_available(&self) -> bool;
}

/// Local emotion service backed by a loaded [`EmotionPipeline`].
pub struct LocalEmotionService {
    pipeline: Arc<EmotionPipeline>,
}

impl LocalEmotionService {
    pub fn new(pipeline: Arc<EmotionPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl EmotionService for LocalEmotionService {
    async fn predict(
        &self,
        text: &str,
        min_confidence: f32,
        use_refinement: bool,
    ) -> Result<Vec<EmotionPrediction>, EmographError> {
        let pipeline = self.pipeline.clone();
        let text_owned = text.to_string();

        tokio::task::spawn_blocking(move || {
            pipeline.predict_emotions(&text_owned, min_confidence, use_refinement)
        })
        .await
        .map_err(|e| EmographError::Inference(format!("Task join error: {}", e)))?
    }

    fn is_available(&self) -> bool {
        true
    }

    fn refinement_available(&self) -> bool {
        self.pipeline.refinement_available()
    }
}

/// No-op emotion service for testing.
///
/// Always reports as unavailable and returns errors for predictions.
pub struct NoopEmotionService;

impl Default for NoopEmotionService {
    fn default() -> Self {
        Self::new()
    }
}

impl NoopEmotionService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmotionService for NoopEmotionService {
    async fn predict(
        &self,
        _text: &str,
        _min_confidence: f32,
        _use_refinement: bool,
    ) -> Result<Vec<EmotionPrediction>, EmographError> {
        Err(EmographError::Unavailable(
            "Emotion service is not available (noop)".to_string(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn refinement_available(&self) -> bool {
        false
    }
}

// ============================================================================
// Tests
// ============================================================================
