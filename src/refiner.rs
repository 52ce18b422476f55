//! GCN-based logit refinement over the emotion correlation graph.
//!
//! A 2-layer graph convolutional network treats each emotion logit as the
//! scalar feature of one graph node, propagates it along the fixed
//! correlation graph, and emits a per-node delta. The refined logit is a
//! damped residual update, `logit + 0.5 * delta`, never a replacement.
//!
//! The network runs in evaluation mode only: the dropout step that sits
//! between the layers during training is a no-op here, so refinement is
//! deterministic for identical input.

use anyhow::{Context, Result};
use candle_core::{Device, Tensor};

use crate::artifacts::RefinerFiles;
use crate::graph::EmotionGraph;

/// Fixed damping applied to the GCN delta before the residual add.
pub const DAMPING: f64 = 0.5;

/// Learned weights of the two graph-convolution layers.
///
/// Shapes follow the exported checkpoint: `gcn1.lin.weight` is `[H, 1]`,
/// `gcn1.bias` is `[H]`, `gcn2.lin.weight` is `[1, H]`, `gcn2.bias` is
/// `[1]`, with H the hidden width (64 in the shipped model).
pub struct GcnWeights {
    pub w1: Tensor,
    pub b1: Tensor,
    pub w2: Tensor,
    pub b2: Tensor,
}

impl GcnWeights {
    /// Load the layer weights from a safetensors checkpoint.
    pub fn load(files: &RefinerFiles, device: &Device) -> Result<Self> {
        let tensors = candle_core::safetensors::load(&files.weights_path, device)
            .context("Failed to load refiner weights")?;

        let get = |name: &str| -> Result<Tensor> {
            tensors
                .get(name)
                .cloned()
                .with_context(|| format!("Refiner checkpoint missing tensor '{}'", name))
        };

        Ok(Self {
            w1: get("gcn1.lin.weight")?,
            b1: get("gcn1.bias")?,
            w2: get("gcn2.lin.weight")?,
            b2: get("gcn2.bias")?,
        })
    }

    /// Validate layer shapes and return the hidden width.
    fn hidden_dim(&self) -> Result<usize> {
        let (h1, in1) = self.w1.dims2().context("gcn1.lin.weight must be 2-D")?;
        let (out2, h2) = self.w2.dims2().context("gcn2.lin.weight must be 2-D")?;
        if in1 != 1 || out2 != 1 || h1 != h2 {
            anyhow::bail!(
                "refiner weight shapes mismatched: gcn1 {:?}, gcn2 {:?}",
                self.w1.dims(),
                self.w2.dims()
            );
        }
        if self.b1.dims1().context("gcn1.bias must be 1-D")? != h1 {
            anyhow::bail!("gcn1.bias width does not match gcn1.lin.weight");
        }
        if self.b2.dims1().context("gcn2.bias must be 1-D")? != 1 {
            anyhow::bail!("gcn2.bias must have exactly one entry");
        }
        Ok(h1)
    }
}

/// Two-layer GCN refiner over a fixed emotion graph.
///
/// Immutable after construction; safe to share read-only across
/// concurrent inference calls.
pub struct GcnRefiner {
    /// Normalized adjacency, `[N, N]`.
    adj: Tensor,
    weights: GcnWeights,
    num_nodes: usize,
}

impl GcnRefiner {
    /// Build a refiner from a correlation graph and layer weights.
    pub fn new(graph: &EmotionGraph, weights: GcnWeights, device: &Device) -> Result<Self> {
        weights.hidden_dim()?;
        let n = graph.num_nodes();
        let adj = Tensor::from_vec(graph.norm_adj().to_vec(), (n, n), device)?;
        Ok(Self {
            adj,
            weights,
            num_nodes: n,
        })
    }

    /// Load a refiner from an artifact bundle.
    pub fn load(files: &RefinerFiles, graph: &EmotionGraph, device: &Device) -> Result<Self> {
        let weights = GcnWeights::load(files, device)?;
        Self::new(graph, weights, device)
    }

    /// Number of emotion nodes (and expected logit-vector length).
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Refine one logit vector.
    ///
    /// The input length must equal the number of emotion nodes; a mismatch
    /// is a caller contract violation and panics rather than erroring.
    /// Runtime errors here are tensor-op failures only.
    pub fn refine(&self, logits: &[f32]) -> candle_core::Result<Vec<f32>> {
        assert_eq!(
            logits.len(),
            self.num_nodes,
            "logit vector length {} does not match {} emotion nodes",
            logits.len(),
            self.num_nodes
        );

        // x: [N, 1] — one scalar feature per emotion node.
        let x = Tensor::from_vec(logits.to_vec(), (self.num_nodes, 1), self.adj.device())?;

        // Layer 1: aggregate then project to the hidden width, ReLU.
        // (Dropout sits here during training; eval mode makes it a no-op.)
        let h = self
            .adj
            .matmul(&x)?
            .matmul(&self.weights.w1.t()?)?
            .broadcast_add(&self.weights.b1)?
            .relu()?;

        // Layer 2: aggregate then project back to one delta per node.
        let delta = self
            .adj
            .matmul(&h)?
            .matmul(&self.weights.w2.t()?)?
            .broadcast_add(&self.weights.b2)?;

        // Damped residual: the graph signal shifts, never replaces.
        let refined = x.add(&delta.affine(DAMPING, 0.0)?)?;
        refined.flatten_all()?.to_vec1::<f32>()
    }

    /// Refine a batch of logit vectors.
    ///
    /// The graph is over emotions, not samples, so each row propagates
    /// independently; row order is preserved in the output.
    pub fn refine_batch(&self, rows: &[Vec<f32>]) -> candle_core::Result<Vec<Vec<f32>>> {
        rows.iter().map(|row| self.refine(row)).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
