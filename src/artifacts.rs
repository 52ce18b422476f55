//! Artifact directory contract for the emotion pipeline.
//!
//! A model directory holds two bundles:
//!
//! ```text
//! <dir>/classifier/   config.json, tokenizer.json, model.safetensors,
//!                     labels.json, metadata.json
//! <dir>/gnn/          edge_index.json, edge_weight.json (optional),
//!                     model.safetensors, calibration.json
//! ```
//!
//! The classifier bundle is mandatory; the `gnn/` bundle is loaded
//! best-effort and its absence only disables refinement.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::EmographError;

/// Paths to the classifier bundle inside a model directory.
pub struct ClassifierFiles {
    pub config_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub weights_path: PathBuf,
    pub labels_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl ClassifierFiles {
    /// Resolve the classifier bundle under `dir/classifier/`.
    ///
    /// Only resolves paths; existence is checked when each file is read so
    /// that error messages name the missing artifact.
    pub fn resolve(dir: &Path) -> Self {
        let base = dir.join("classifier");
        Self {
            config_path: base.join("config.json"),
            tokenizer_path: base.join("tokenizer.json"),
            weights_path: base.join("model.safetensors"),
            labels_path: base.join("labels.json"),
            metadata_path: base.join("metadata.json"),
        }
    }
}

/// Paths to the optional refinement bundle inside a model directory.
pub struct RefinerFiles {
    pub edge_index_path: PathBuf,
    pub edge_weight_path: PathBuf,
    pub weights_path: PathBuf,
    pub calibration_path: PathBuf,
}

impl RefinerFiles {
    /// Resolve the refinement bundle under `dir/gnn/`.
    pub fn resolve(dir: &Path) -> Self {
        let base = dir.join("gnn");
        Self {
            edge_index_path: base.join("edge_index.json"),
            edge_weight_path: base.join("edge_weight.json"),
            weights_path: base.join("model.safetensors"),
            calibration_path: base.join("calibration.json"),
        }
    }
}

/// Preprocessing metadata stored alongside the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingMetadata {
    /// Maximum token sequence length; longer inputs are truncated.
    pub max_len: usize,
}

/// Calibration bundle for the decision stage.
///
/// Thresholds are versioned configuration data, not code constants: a new
/// calibration run ships a new `calibration.json`, never a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    /// Calibration run identifier, if the producing pipeline stamps one.
    #[serde(default)]
    pub version: Option<String>,
    /// One threshold per label, aligned to the label-set order.
    #[serde(default)]
    pub per_label_thresholds: Option<Vec<f32>>,
    /// Fallback threshold applied to every label when the per-label
    /// vector is absent.
    pub global_threshold: f32,
}

impl Calibration {
    /// Effective threshold for label index `i`.
    ///
    /// Indices beyond the per-label vector fall back to the global
    /// threshold; `load_calibration` rejects mismatched vectors at load
    /// time, so the fallback only matters for hand-built calibrations.
    pub fn threshold_for(&self, i: usize) -> f32 {
        self.per_label_thresholds
            .as_ref()
            .and_then(|t| t.get(i).copied())
            .unwrap_or(self.global_threshold)
    }
}

/// Serialized correlation-graph edges: node-index pairs plus optional
/// parallel weights.
#[derive(Debug, Clone)]
pub struct GraphArtifacts {
    pub edges: Vec<(usize, usize)>,
    pub weights: Option<Vec<f32>>,
}

/// Load and parse a JSON artifact, naming the file in the error.
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the ordered emotion label set.
///
/// Prefers `labels.json` (a plain JSON array); falls back to the
/// `id2label` map in the transformer `config.json` for bundles fetched
/// straight from the HuggingFace Hub.
pub fn load_labels(files: &ClassifierFiles) -> Result<Vec<String>, EmographError> {
    if files.labels_path.exists() {
        let labels: Vec<String> = read_json(&files.labels_path)
            .map_err(|e| EmographError::Artifact(format!("{:#}", e)))?;
        if labels.is_empty() {
            return Err(EmographError::Artifact(format!(
                "{} is empty",
                files.labels_path.display()
            )));
        }
        return Ok(labels);
    }
    labels_from_config(&files.config_path).map_err(|e| EmographError::Artifact(format!("{:#}", e)))
}

/// Parse the ordered label list out of a transformer config's `id2label`
/// mapping, e.g. `{"0": "admiration", "1": "amusement", ...}`.
pub fn labels_from_config(config_path: &Path) -> Result<Vec<String>> {
    let config_json: serde_json::Value = read_json(config_path)?;
    let id2label = config_json
        .get("id2label")
        .and_then(|v| v.as_object())
        .context("config.json missing id2label mapping")?;

    let mut entries: Vec<(usize, String)> = id2label
        .iter()
        .filter_map(|(k, v)| {
            let idx: usize = k.parse().ok()?;
            Some((idx, v.as_str()?.to_string()))
        })
        .collect();
    entries.sort_by_key(|(idx, _)| *idx);
    let labels: Vec<String> = entries.into_iter().map(|(_, label)| label).collect();

    if labels.is_empty() {
        anyhow::bail!("id2label is empty — cannot determine label set");
    }
    Ok(labels)
}

/// Load the preprocessing metadata (currently just `max_len`).
pub fn load_metadata(files: &ClassifierFiles) -> Result<PreprocessingMetadata, EmographError> {
    read_json(&files.metadata_path).map_err(|e| EmographError::Artifact(format!("{:#}", e)))
}

/// Load the correlation-graph edge list and optional edge weights.
///
/// `edge_weight.json` is itself optional inside the optional bundle: an
/// absent file means unweighted propagation, a present-but-mismatched one
/// is a corrupt artifact.
pub fn load_graph(files: &RefinerFiles) -> Result<GraphArtifacts> {
    let edges: Vec<(usize, usize)> = read_json(&files.edge_index_path)?;

    let weights = if files.edge_weight_path.exists() {
        let w: Vec<f32> = read_json(&files.edge_weight_path)?;
        if w.len() != edges.len() {
            anyhow::bail!(
                "edge_weight.json has {} entries but edge_index.json has {} edges",
                w.len(),
                edges.len()
            );
        }
        Some(w)
    } else {
        None
    };

    Ok(GraphArtifacts { edges, weights })
}

/// Load the calibration bundle and check its shape against the label set.
pub fn load_calibration(files: &RefinerFiles, num_labels: usize) -> Result<Calibration> {
    let calibration: Calibration = read_json(&files.calibration_path)?;
    if let Some(thresholds) = &calibration.per_label_thresholds {
        if thresholds.len() != num_labels {
            anyhow::bail!(
                "calibration has {} per-label thresholds but the label set has {} labels",
                thresholds.len(),
                num_labels
            );
        }
    }
    Ok(calibration)
}

/// Download a classifier bundle from the HuggingFace Hub.
///
/// Uses `hf_hub::api::sync::Api`, which caches at `~/.cache/huggingface/hub/`.
/// Synchronous I/O — call from `spawn_blocking` in async contexts. The
/// returned bundle has no `labels.json` or `metadata.json`; labels come from
/// `config.json` and `max_len` must be supplied by the caller.
pub fn download_classifier(repo_id: &str) -> Result<ClassifierFiles> {
    let api = hf_hub::api::sync::Api::new().context("Failed to initialize HuggingFace Hub API")?;
    let repo = api.model(repo_id.to_string());

    let config_path = repo
        .get("config.json")
        .context("Failed to download config.json")?;
    let tokenizer_path = repo
        .get("tokenizer.json")
        .context("Failed to download tokenizer.json")?;
    let weights_path = repo
        .get("model.safetensors")
        .context("Failed to download model.safetensors")?;

    // Hub repos carry labels inside config.json rather than as a side file.
    let labels_path = config_path.with_file_name("labels.json");
    let metadata_path = config_path.with_file_name("metadata.json");

    Ok(ClassifierFiles {
        config_path,
        tokenizer_path,
        weights_path,
        labels_path,
        metadata_path,
    })
}

// ============================================================================
// Tests
// ============================================================================
