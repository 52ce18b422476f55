//! Candle-based inference backend for the emotion classifier.
//!
//! Pure-Rust ML runtime using candle with Metal/CUDA acceleration where
//! available. Provides [`SequenceClassifier`], a multi-label sequence
//! classification head (XLM-RoBERTa family, GoEmotions-style label sets)
//! that maps text to one raw logit per emotion label.

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{LayerNorm, Module, VarBuilder};
use candle_transformers::models::xlm_roberta::{
    Config as XLMRobertaConfig, XLMRobertaForSequenceClassification,
};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use crate::artifacts::ClassifierFiles;

/// Select the best available compute device.
///
/// Tries Metal (macOS) or CUDA (Linux/Windows) if the corresponding feature
/// is enabled. Probes layer-norm support since RoBERTa requires it — falls
/// back to CPU if the GPU backend lacks the kernel. Device choice never
/// changes results, only throughput.
pub fn select_device() -> Device {
    #[cfg(target_os = "macos")]
    {
        if let Ok(device) = Device::new_metal(0) {
            if probe_layer_norm(&device) {
                tracing::info!("Using Metal GPU for inference");
                return device;
            }
            tracing::warn!("Metal GPU available but layer-norm not supported, falling back to CPU");
        }
    }
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            if probe_layer_norm(&device) {
                tracing::info!("Using CUDA GPU for inference");
                return device;
            }
            tracing::warn!("CUDA GPU available but layer-norm not supported, falling back to CPU");
        }
    }
    tracing::info!("Using CPU for inference");
    Device::Cpu
}

/// Probe whether a device supports layer-norm (required by RoBERTa).
fn probe_layer_norm(device: &Device) -> bool {
    (|| -> candle_core::Result<()> {
        let weight = Tensor::ones(4, DType::F32, device)?;
        let bias = Tensor::zeros(4, DType::F32, device)?;
        let ln = LayerNorm::new(weight, bias, 1e-5);
        let input = Tensor::randn(0f32, 1.0, (1, 4), device)?;
        let _ = ln.forward(&input)?;
        Ok(())
    })()
    .is_ok()
}

/// Multi-label emotion classifier using XLM-RoBERTa.
///
/// Produces raw logits aligned to the canonical label order; the decision
/// stage owns the sigmoid and thresholding. Weights are immutable after
/// load and the forward pass has no stochastic layers, so concurrent
/// read-only use is safe and output is deterministic per input.
pub struct SequenceClassifier {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    device: Device,
    num_labels: usize,
}

impl SequenceClassifier {
    /// Load the classifier from an artifact bundle.
    ///
    /// `num_labels` comes from the loaded label set and must match the
    /// classification head's width; `max_len` configures truncation.
    pub fn new(
        files: &ClassifierFiles,
        device: Device,
        num_labels: usize,
        max_len: usize,
    ) -> Result<Self> {
        let config_str = std::fs::read_to_string(&files.config_path)
            .context("Failed to read classifier config")?;
        let config: XLMRobertaConfig =
            serde_json::from_str(&config_str).context("Failed to parse XLM-RoBERTa config")?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load classifier tokenizer: {}", e))?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_len,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;

        // SAFETY: mmap'd safetensors file — safe as long as the file is not
        // modified while the model is in use.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&files.weights_path], DType::F32, &device)
                .context("Failed to load classifier weights")?
        };
        let model = XLMRobertaForSequenceClassification::new(num_labels, &config, vb)
            .context("Failed to construct classifier model")?;

        Ok(Self {
            model,
            tokenizer,
            device,
            num_labels,
        })
    }

    /// Classify a single text into raw per-label logits.
    pub fn classify(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let mut rows = self.classify_batch(&texts)?;
        rows.pop().context("Empty classification result")
    }

    /// Classify a batch of texts into raw per-label logits, one row per
    /// input text in input order.
    pub fn classify_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let str_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        let encodings = self
            .tokenizer
            .encode_batch(str_refs, true)
            .map_err(|e| anyhow::anyhow!("Classifier tokenization failed: {}", e))?;

        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let input_ids: Vec<u32> = encodings
            .iter()
            .flat_map(|e| e.get_ids().to_vec())
            .collect();
        let attention_mask: Vec<u32> = encodings
            .iter()
            .flat_map(|e| e.get_attention_mask().to_vec())
            .collect();

        let input_ids = Tensor::from_vec(input_ids, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(attention_mask, (batch_size, max_len), &self.device)?;
        // XLM-RoBERTa doesn't use token_type_ids — pass zeros
        let token_type_ids = input_ids.zeros_like()?;

        // Forward pass -> [batch, num_labels] logits
        let logits = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids)?;

        let rows = logits.to_vec2::<f32>()?;
        for row in &rows {
            debug_assert_eq!(row.len(), self.num_labels);
        }
        Ok(rows)
    }

    /// Get the number of classification labels.
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }
}
