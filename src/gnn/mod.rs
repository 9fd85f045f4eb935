//! Graph convolution on directed node graphs.
//!
//! # Architecture
//!
//! ```text
//! Node Features    Edge list (source → target)
//!      │                 │
//!      │                 ▼
//!      │     NormalizedAdjacency (Â, built once)
//!      ▼                 │
//! ┌────────────────────────────┐
//! │  GCNConv: Â (X W) + b      │
//! └────────────────────────────┘
//!            │
//!            ▼
//!    Updated Node Features
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use botlift::autograd::Tensor;
//! use botlift::gnn::{GCNConv, NormalizedAdjacency};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let adj = Arc::new(NormalizedAdjacency::new(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]).unwrap());
//! let gcn = GCNConv::new(1, 8, &mut StdRng::seed_from_u64(0));
//!
//! let x = Tensor::ones(&[4, 1]);
//! let out = gcn.forward(&x, &adj);
//! assert_eq!(out.shape(), &[4, 8]);
//! ```
//!
//! # References
//!
//! - Kipf, T. N., & Welling, M. (2017). Semi-Supervised Classification with
//!   Graph Convolutional Networks. ICLR.

use std::sync::Arc;

use rand::rngs::StdRng;

use crate::autograd::{GradFn, Tensor};
use crate::error::{BotliftError, Result};
use crate::nn::{xavier_uniform, zeros, Module};

/// Edge index type: (source_node, target_node)
pub type EdgeIndex = (usize, usize);

/// Symmetrically normalized adjacency with self-loops, `Â = D^-1/2 (A + I) D^-1/2`.
///
/// Edges are directed and messages flow from source to target. Existing
/// self-loops are replaced by exactly one self-loop per node; duplicate
/// edges are kept and each counts towards the degree. `deg[i]` is the
/// in-degree of `i` including its self-loop, so it is never zero.
#[derive(Debug, Clone)]
pub struct NormalizedAdjacency {
    num_nodes: usize,
    /// (source, target, coefficient)
    entries: Vec<(usize, usize, f32)>,
}

impl NormalizedAdjacency {
    /// Build the propagation operator for `num_nodes` nodes.
    ///
    /// # Errors
    ///
    /// [`BotliftError::DataIntegrity`] if an edge endpoint is `>= num_nodes`.
    pub fn new(num_nodes: usize, edges: &[EdgeIndex]) -> Result<Self> {
        if let Some(&(s, t)) = edges
            .iter()
            .find(|&&(s, t)| s >= num_nodes || t >= num_nodes)
        {
            return Err(BotliftError::DataIntegrity(format!(
                "edge ({s}, {t}) references a node outside 0..{num_nodes}"
            )));
        }

        let links: Vec<EdgeIndex> = edges
            .iter()
            .copied()
            .filter(|&(s, t)| s != t)
            .chain((0..num_nodes).map(|i| (i, i)))
            .collect();

        let mut degree = vec![0.0f32; num_nodes];
        for &(_, t) in &links {
            degree[t] += 1.0;
        }
        let inv_sqrt: Vec<f32> = degree.iter().map(|&d| 1.0 / d.sqrt()).collect();

        let entries = links
            .into_iter()
            .map(|(s, t)| (s, t, inv_sqrt[s] * inv_sqrt[t]))
            .collect();

        Ok(Self { num_nodes, entries })
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of stored entries (non-self-loop edges plus one self-loop per node).
    #[must_use]
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Normalization coefficients as (source, target, coefficient).
    #[must_use]
    pub fn entries(&self) -> &[(usize, usize, f32)] {
        &self.entries
    }

    /// `out[t] += coeff · x[s]` for every entry, over a `[N, C]` buffer.
    fn scatter(&self, x: &[f32], channels: usize, transpose: bool) -> Vec<f32> {
        let mut out = vec![0.0f32; self.num_nodes * channels];
        for &(s, t, coeff) in &self.entries {
            let (from, to) = if transpose { (t, s) } else { (s, t) };
            let src = &x[from * channels..(from + 1) * channels];
            let dst = &mut out[to * channels..(to + 1) * channels];
            for (d, &v) in dst.iter_mut().zip(src) {
                *d += coeff * v;
            }
        }
        out
    }

    /// Differentiable propagation `Â X` for `x` of shape `[N, C]`.
    ///
    /// # Panics
    ///
    /// Panics if `x` is not `[num_nodes, C]`.
    #[must_use]
    pub fn propagate(self: &Arc<Self>, x: &Tensor) -> Tensor {
        assert_eq!(x.ndim(), 2, "propagate: expected [nodes, channels]");
        assert_eq!(
            x.shape()[0],
            self.num_nodes,
            "propagate: expected {} rows, got {}",
            self.num_nodes,
            x.shape()[0]
        );
        let channels = x.shape()[1];

        let mut result = Tensor::from_vec(self.scatter(x.data(), channels, false), x.shape());
        result.record_op(
            Arc::new(PropagateBackward {
                adjacency: Arc::clone(self),
                channels,
            }),
            &[x],
        );
        result
    }
}

/// Gradient of `Z = Â X`: `∂L/∂X = Âᵀ G`.
struct PropagateBackward {
    adjacency: Arc<NormalizedAdjacency>,
    channels: usize,
}

impl GradFn for PropagateBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let grad = self
            .adjacency
            .scatter(grad_output.data(), self.channels, true);
        vec![Tensor::from_vec(grad, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "PropagateBackward"
    }
}

/// Graph Convolutional Network layer (Kipf & Welling, 2017).
///
/// ```text
/// H' = Â (H W) + b
/// ```
///
/// `W` is `[in, out]`, Xavier-uniform initialized; `b` starts at zero.
#[derive(Debug)]
pub struct GCNConv {
    weight: Tensor,
    bias: Tensor,
    in_features: usize,
    out_features: usize,
}

impl GCNConv {
    /// New layer with weights drawn from `rng`.
    pub fn new(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        Self {
            weight: xavier_uniform(&[in_features, out_features], in_features, out_features, rng)
                .requires_grad(),
            bias: zeros(&[out_features]).requires_grad(),
            in_features,
            out_features,
        }
    }

    #[must_use]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    #[must_use]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// `x` is `[N, in_features]`; returns `[N, out_features]`.
    ///
    /// # Panics
    ///
    /// Panics on a feature-width or node-count mismatch.
    #[must_use]
    pub fn forward(&self, x: &Tensor, adj: &Arc<NormalizedAdjacency>) -> Tensor {
        assert_eq!(
            x.shape().get(1).copied(),
            Some(self.in_features),
            "Expected {} input features, got shape {:?}",
            self.in_features,
            x.shape()
        );

        let transformed = x.matmul(&self.weight);
        adj.propagate(&transformed).broadcast_add(&self.bias)
    }
}

impl Module for GCNConv {
    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight, &mut self.bias]
    }
}

#[cfg(test)]
mod tests;
