//! Fixed emotion-correlation graph for the GCN refiner.
//!
//! Nodes are emotion labels (index position is canonical identity), edges
//! are precomputed correlations. The graph is small (N ≈ 20–30) and static,
//! so it is materialized once as a dense normalized adjacency matrix rather
//! than going through a sparse-graph library.

use anyhow::Result;

use crate::artifacts::GraphArtifacts;

/// Dense symmetric-normalized adjacency over the emotion nodes.
///
/// Propagation semantics match spectral graph convolution: self-loops with
/// weight 1 are added, then `Â = D^-1/2 (A + I) D^-1/2` with degrees taken
/// from the weighted rows. An edge `(s, d)` carries a message from `s` to
/// `d`, i.e. it populates entry `[d][s]`; undirected graphs list both
/// directions in the edge list.
#[derive(Debug, Clone)]
pub struct EmotionGraph {
    num_nodes: usize,
    /// Row-major `[num_nodes * num_nodes]` normalized adjacency.
    norm_adj: Vec<f32>,
}

impl EmotionGraph {
    /// Build the normalized adjacency from a loaded edge list.
    ///
    /// Absent edge weights mean unweighted propagation (weight 1 per edge).
    /// Edges referencing nodes outside `0..num_nodes`, or a weight list that
    /// does not parallel the edge list, are a corrupt artifact.
    pub fn new(num_nodes: usize, artifacts: &GraphArtifacts) -> Result<Self> {
        if let Some(weights) = &artifacts.weights {
            if weights.len() != artifacts.edges.len() {
                anyhow::bail!(
                    "{} edge weights do not parallel {} edges",
                    weights.len(),
                    artifacts.edges.len()
                );
            }
        }

        let mut adj = vec![0f32; num_nodes * num_nodes];

        for (k, &(src, dst)) in artifacts.edges.iter().enumerate() {
            if src >= num_nodes || dst >= num_nodes {
                anyhow::bail!(
                    "edge ({}, {}) out of range for {} emotion nodes",
                    src,
                    dst,
                    num_nodes
                );
            }
            let weight = artifacts.weights.as_ref().map(|w| w[k]).unwrap_or(1.0);
            adj[dst * num_nodes + src] += weight;
        }

        // Self-loops, then symmetric degree normalization.
        for i in 0..num_nodes {
            adj[i * num_nodes + i] += 1.0;
        }
        let inv_sqrt_deg: Vec<f32> = (0..num_nodes)
            .map(|i| {
                let deg: f32 = adj[i * num_nodes..(i + 1) * num_nodes].iter().sum();
                if deg > 0.0 {
                    deg.sqrt().recip()
                } else {
                    0.0
                }
            })
            .collect();
        for d in 0..num_nodes {
            for s in 0..num_nodes {
                adj[d * num_nodes + s] *= inv_sqrt_deg[d] * inv_sqrt_deg[s];
            }
        }

        Ok(Self {
            num_nodes,
            norm_adj: adj,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Row-major normalized adjacency, `num_nodes * num_nodes` entries.
    pub fn norm_adj(&self) -> &[f32] {
        &self.norm_adj
    }
}

// ============================================================================
// Tests
// ============================================================================
