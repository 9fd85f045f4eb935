//! Edge ranking by endpoint-embedding similarity.

use std::cmp::Ordering;
use std::sync::Arc;

use rand::rngs::StdRng;
use serde::Serialize;

use super::GcnBranch;
use crate::autograd::{no_grad, Tensor};
use crate::error::{BotliftError, Result};
use crate::gnn::{EdgeIndex, NormalizedAdjacency};
use crate::nn::Module;

/// Default embedding width.
pub const EDGE_EMBEDDING_DIM: usize = 16;

/// Edges split by relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeSplit {
    /// The `k` highest-scoring edges, best first.
    pub homophilous: Vec<EdgeIndex>,
    /// The `k` lowest-scoring edges, worst first.
    pub heterophilous: Vec<EdgeIndex>,
    /// Score of every input edge, in input order.
    pub scores: Vec<f32>,
}

/// Two-layer GCN encoder whose node embeddings score edges:
/// `score(s→t) = σ(⟨z_s, z_t⟩)`.
///
/// The encoder owns its parameters and is independent of
/// [`super::DualScoreGCN`]; it is inference-only.
#[derive(Debug)]
pub struct EdgeRelevanceEncoder {
    branch: GcnBranch,
    out_dim: usize,
}

impl EdgeRelevanceEncoder {
    /// Encoder `in_dim → hidden → out_dim` with dropout `p`, in training mode.
    pub fn new(
        in_dim: usize,
        hidden: usize,
        out_dim: usize,
        dropout: f32,
        rng: &mut StdRng,
    ) -> Result<Self> {
        for (param, value) in [("in_dim", in_dim), ("hidden", hidden), ("out_dim", out_dim)] {
            if value == 0 {
                return Err(BotliftError::invalid_config(param, value, "positive width"));
            }
        }
        Ok(Self {
            branch: GcnBranch::new(in_dim, hidden, out_dim, dropout, rng)?,
            out_dim,
        })
    }

    /// Encoder with the default 16-wide embeddings.
    pub fn with_defaults(in_dim: usize, hidden: usize, rng: &mut StdRng) -> Result<Self> {
        Self::new(in_dim, hidden, EDGE_EMBEDDING_DIM, 0.5, rng)
    }

    #[must_use]
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Node embeddings `[N, out_dim]`.
    #[must_use]
    pub fn embed(&self, x: &Tensor, adj: &Arc<NormalizedAdjacency>) -> Tensor {
        self.branch.forward(x, adj)
    }

    /// Relevance score of every edge, in input order.
    pub fn edge_scores(&self, x: &Tensor, edges: &[EdgeIndex]) -> Result<Vec<f32>> {
        let num_nodes = x.shape().first().copied().unwrap_or(0);
        let adj = Arc::new(NormalizedAdjacency::new(num_nodes, edges)?);

        let embeddings = no_grad(|| self.embed(x, &adj));
        let z = embeddings.data();
        let d = self.out_dim;

        Ok(edges
            .iter()
            .map(|&(s, t)| {
                let dot: f32 = z[s * d..(s + 1) * d]
                    .iter()
                    .zip(&z[t * d..(t + 1) * d])
                    .map(|(a, b)| a * b)
                    .sum();
                1.0 / (1.0 + (-dot).exp())
            })
            .collect())
    }

    /// Top-`k` and bottom-`k` edges by score with `k = floor(E / 2)`.
    ///
    /// Edges are ranked by descending score, ties by input position; the
    /// homophilous set is the head of that ranking and the heterophilous set
    /// its tail, so the two never share an edge.
    pub fn split(&self, x: &Tensor, edges: &[EdgeIndex]) -> Result<EdgeSplit> {
        let scores = self.edge_scores(x, edges)?;
        let k = edges.len() / 2;

        let mut ranking: Vec<usize> = (0..edges.len()).collect();
        ranking.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(Ordering::Equal)
        });

        let homophilous = ranking[..k].iter().map(|&i| edges[i]).collect();
        let heterophilous = ranking[ranking.len() - k..]
            .iter()
            .rev()
            .map(|&i| edges[i])
            .collect();

        Ok(EdgeSplit {
            homophilous,
            heterophilous,
            scores,
        })
    }
}

impl Module for EdgeRelevanceEncoder {
    fn parameters(&self) -> Vec<&Tensor> {
        self.branch.parameters()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.branch.parameters_mut()
    }

    fn train(&mut self) {
        self.branch.train();
    }

    fn eval(&mut self) {
        self.branch.eval();
    }

    fn training(&self) -> bool {
        self.branch.training()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn encoder(seed: u64) -> EdgeRelevanceEncoder {
        let mut enc =
            EdgeRelevanceEncoder::with_defaults(1, 16, &mut StdRng::seed_from_u64(seed)).unwrap();
        enc.eval();
        enc
    }

    fn degree_features(n: usize, edges: &[EdgeIndex]) -> Tensor {
        Tensor::new(&crate::data::out_degree_features(n, edges), &[n, 1])
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        let edges = vec![(0, 1), (1, 2), (2, 3), (3, 0), (0, 2), (1, 3), (4, 0)];
        let split = encoder(1).split(&degree_features(5, &edges), &edges).unwrap();

        assert_eq!(split.homophilous.len(), 3);
        assert_eq!(split.heterophilous.len(), 3);
        assert_eq!(split.scores.len(), 7);
        for e in &split.homophilous {
            assert!(!split.heterophilous.contains(e));
        }
    }

    #[test]
    fn test_split_disjoint_when_all_scores_tie() {
        // Identical features on a ring give every edge the same score.
        let edges = vec![(0, 1), (1, 2), (2, 3), (3, 0)];
        let x = Tensor::ones(&[4, 1]);
        let split = encoder(2).split(&x, &edges).unwrap();

        assert_eq!(split.homophilous, vec![(0, 1), (1, 2)]);
        assert_eq!(split.heterophilous, vec![(3, 0), (2, 3)]);
    }

    #[test]
    fn test_homophilous_outscore_heterophilous() {
        let edges = vec![(0, 1), (1, 2), (2, 0), (0, 3), (3, 4), (4, 1)];
        let enc = encoder(3);
        let x = degree_features(5, &edges);
        let split = enc.split(&x, &edges).unwrap();
        let score = |e: &EdgeIndex| {
            let i = edges.iter().position(|x| x == e).unwrap();
            split.scores[i]
        };
        let min_homo = split.homophilous.iter().map(score).fold(f32::INFINITY, f32::min);
        let max_hetero = split
            .heterophilous
            .iter()
            .map(score)
            .fold(f32::NEG_INFINITY, f32::max);
        assert!(min_homo >= max_hetero);
    }

    #[test]
    fn test_scores_are_probabilities() {
        let edges = vec![(0, 1), (1, 0)];
        let scores = encoder(4)
            .edge_scores(&degree_features(2, &edges), &edges)
            .unwrap();
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_empty_and_single_edge() {
        let enc = encoder(5);
        let x = Tensor::ones(&[2, 1]);
        let split = enc.split(&x, &[]).unwrap();
        assert!(split.homophilous.is_empty() && split.heterophilous.is_empty());

        let split = enc.split(&x, &[(0, 1)]).unwrap();
        assert!(split.homophilous.is_empty() && split.heterophilous.is_empty());
    }

    #[test]
    fn test_rejects_out_of_range_edge() {
        let err = encoder(6).split(&Tensor::ones(&[2, 1]), &[(0, 9)]).unwrap_err();
        assert!(matches!(err, BotliftError::DataIntegrity(_)));
    }

    #[test]
    fn test_encoder_owns_parameters() {
        let enc = encoder(7);
        assert_eq!(enc.out_dim(), 16);
        assert_eq!(enc.parameters().len(), 4);
        assert_eq!(enc.parameters()[2].shape(), &[16, 16]);
    }
}
