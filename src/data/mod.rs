//! Graph snapshots and the labelled, split sample the trainer consumes.
//!
//! A [`Snapshot`] is the raw input (edge list plus three binary label
//! channels); [`GraphSample`] adds node features, the train/test partition
//! and the precomputed propagation operator, and is immutable afterwards.
//!
//! # Examples
//!
//! ```
//! use botlift::data::{GraphSample, Snapshot};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let snapshot = Snapshot {
//!     edges: vec![[0, 1], [1, 2], [2, 0]],
//!     bot_label: vec![1, 0, 0, 0, 0],
//!     treatment: vec![1, 0, 1, 0, 1],
//!     outcome: vec![0, 0, 1, 0, 0],
//! };
//! let sample = GraphSample::from_snapshot(&snapshot, 0.8, &mut StdRng::seed_from_u64(101)).unwrap();
//!
//! assert_eq!(sample.num_nodes(), 5);
//! assert_eq!(sample.train_indices().len(), 4);
//! assert_eq!(sample.test_indices().len(), 1);
//! ```

mod snapshot;

pub use snapshot::{Snapshot, SyntheticConfig};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::autograd::Tensor;
use crate::error::{BotliftError, Result};
use crate::gnn::{EdgeIndex, NormalizedAdjacency};

/// Binary labels of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeLabels {
    /// 1 = anomalous actor
    pub bot: u8,
    /// 1 = target behaviour (purchase) observed
    pub outcome: u8,
    /// 1 = treated
    pub treatment: u8,
}

impl NodeLabels {
    #[must_use]
    pub fn new(bot: u8, outcome: u8, treatment: u8) -> Self {
        Self {
            bot,
            outcome,
            treatment,
        }
    }

    fn validate(&self, node: usize) -> Result<()> {
        for (name, value) in [
            ("bot", self.bot),
            ("outcome", self.outcome),
            ("treatment", self.treatment),
        ] {
            if value > 1 {
                return Err(BotliftError::DataIntegrity(format!(
                    "{name} label of node {node} is {value}, expected 0 or 1"
                )));
            }
        }
        Ok(())
    }
}

/// Which half of the node partition an evaluation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskKind {
    #[default]
    Train,
    Test,
}

impl fmt::Display for MaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => write!(f, "train"),
            Self::Test => write!(f, "test"),
        }
    }
}

impl FromStr for MaskKind {
    type Err = BotliftError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Self::Train),
            "test" => Ok(Self::Test),
            other => Err(BotliftError::invalid_config(
                "mask",
                other,
                "one of: train, test",
            )),
        }
    }
}

/// Out-degree of every node in a directed edge list, as an `[N]` vector.
///
/// Nodes without outgoing edges get 0, so the result always has `num_nodes`
/// entries. Endpoints must already be validated.
#[must_use]
pub fn out_degree_features(num_nodes: usize, edges: &[EdgeIndex]) -> Vec<f32> {
    let mut degree = vec![0.0f32; num_nodes];
    for &(s, _) in edges {
        degree[s] += 1.0;
    }
    degree
}

/// A labelled graph with a fixed train/test partition.
#[derive(Debug, Clone)]
pub struct GraphSample {
    node_features: Vec<f32>,
    feature_dim: usize,
    edges: Vec<EdgeIndex>,
    labels: Vec<NodeLabels>,
    train_mask: Vec<bool>,
    test_mask: Vec<bool>,
    adjacency: Arc<NormalizedAdjacency>,
}

impl GraphSample {
    /// Build a sample whose test mask is the complement of `train_mask`.
    ///
    /// `node_features` is row-major `[N, feature_dim]`.
    pub fn new(
        node_features: Vec<f32>,
        feature_dim: usize,
        edges: Vec<EdgeIndex>,
        labels: Vec<NodeLabels>,
        train_mask: Vec<bool>,
    ) -> Result<Self> {
        let test_mask = train_mask.iter().map(|&t| !t).collect();
        Self::with_masks(
            node_features,
            feature_dim,
            edges,
            labels,
            train_mask,
            test_mask,
        )
    }

    /// Build a sample from explicit masks.
    ///
    /// # Errors
    ///
    /// - [`BotliftError::ShapeMismatch`] if features, labels or masks disagree on `N`
    /// - [`BotliftError::DataIntegrity`] for out-of-range edges or non-binary labels
    /// - [`BotliftError::InvalidConfig`] if the masks overlap or leave a node uncovered
    pub fn with_masks(
        node_features: Vec<f32>,
        feature_dim: usize,
        edges: Vec<EdgeIndex>,
        labels: Vec<NodeLabels>,
        train_mask: Vec<bool>,
        test_mask: Vec<bool>,
    ) -> Result<Self> {
        let num_nodes = labels.len();
        if feature_dim == 0 {
            return Err(BotliftError::invalid_config(
                "feature_dim",
                0,
                "at least one feature per node",
            ));
        }
        if node_features.len() != num_nodes * feature_dim {
            return Err(BotliftError::shape_mismatch(
                "node features",
                num_nodes * feature_dim,
                node_features.len(),
            ));
        }
        for (name, mask) in [("train mask", &train_mask), ("test mask", &test_mask)] {
            if mask.len() != num_nodes {
                return Err(BotliftError::shape_mismatch(name, num_nodes, mask.len()));
            }
        }
        for (node, label) in labels.iter().enumerate() {
            label.validate(node)?;
        }
        if let Some(node) = (0..num_nodes).find(|&i| train_mask[i] == test_mask[i]) {
            return Err(BotliftError::invalid_config(
                "masks",
                format!("node {node}"),
                "non-disjoint masks: every node in exactly one of train/test",
            ));
        }

        let adjacency = Arc::new(NormalizedAdjacency::new(num_nodes, &edges)?);

        Ok(Self {
            node_features,
            feature_dim,
            edges,
            labels,
            train_mask,
            test_mask,
            adjacency,
        })
    }

    /// Out-degree features plus a seeded random split: the first
    /// `floor(N · train_fraction)` nodes of a shuffled order train, the rest test.
    pub fn from_snapshot(
        snapshot: &Snapshot,
        train_fraction: f64,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&train_fraction) {
            return Err(BotliftError::invalid_config(
                "train_fraction",
                train_fraction,
                "value in [0, 1]",
            ));
        }
        snapshot.validate()?;

        let num_nodes = snapshot.num_nodes();
        let edges = snapshot.edge_list();
        let labels = snapshot.node_labels();

        let mut order: Vec<usize> = (0..num_nodes).collect();
        order.shuffle(rng);
        let num_train = (num_nodes as f64 * train_fraction).floor() as usize;
        let mut train_mask = vec![false; num_nodes];
        for &node in &order[..num_train] {
            train_mask[node] = true;
        }

        let features = out_degree_features(num_nodes, &edges);
        Self::new(features, 1, edges, labels, train_mask)
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    #[must_use]
    pub fn edges(&self) -> &[EdgeIndex] {
        &self.edges
    }

    #[must_use]
    pub fn labels(&self) -> &[NodeLabels] {
        &self.labels
    }

    /// Node features as a `[N, feature_dim]` tensor (no gradient).
    #[must_use]
    pub fn feature_tensor(&self) -> Tensor {
        Tensor::new(&self.node_features, &[self.num_nodes(), self.feature_dim])
    }

    /// Shared GCN propagation operator for this graph.
    #[must_use]
    pub fn adjacency(&self) -> &Arc<NormalizedAdjacency> {
        &self.adjacency
    }

    #[must_use]
    pub fn train_mask(&self) -> &[bool] {
        &self.train_mask
    }

    #[must_use]
    pub fn test_mask(&self) -> &[bool] {
        &self.test_mask
    }

    #[must_use]
    pub fn mask(&self, kind: MaskKind) -> &[bool] {
        match kind {
            MaskKind::Train => &self.train_mask,
            MaskKind::Test => &self.test_mask,
        }
    }

    /// Ascending node indices selected by `kind`.
    #[must_use]
    pub fn indices(&self, kind: MaskKind) -> Vec<usize> {
        self.mask(kind)
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| m.then_some(i))
            .collect()
    }

    #[must_use]
    pub fn train_indices(&self) -> Vec<usize> {
        self.indices(MaskKind::Train)
    }

    #[must_use]
    pub fn test_indices(&self) -> Vec<usize> {
        self.indices(MaskKind::Test)
    }

    #[must_use]
    pub fn bot_labels(&self) -> Vec<u8> {
        self.labels.iter().map(|l| l.bot).collect()
    }

    #[must_use]
    pub fn outcome_labels(&self) -> Vec<u8> {
        self.labels.iter().map(|l| l.outcome).collect()
    }

    #[must_use]
    pub fn treatment_labels(&self) -> Vec<u8> {
        self.labels.iter().map(|l| l.treatment).collect()
    }
}

/// `values[i]` for every `i` in `indices`.
pub(crate) fn select<T: Copy>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn labels(n: usize) -> Vec<NodeLabels> {
        (0..n)
            .map(|i| NodeLabels::new(u8::from(i == 0), 0, (i % 2) as u8))
            .collect()
    }

    #[test]
    fn test_out_degree_covers_all_nodes() {
        // Trailing nodes 3 and 4 have no outgoing edges.
        let deg = out_degree_features(5, &[(0, 1), (0, 2), (2, 0)]);
        assert_eq!(deg, vec![2.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_new_complements_train_mask() {
        let sample = GraphSample::new(
            vec![1.0; 4],
            1,
            vec![(0, 1)],
            labels(4),
            vec![true, false, true, false],
        )
        .unwrap();
        assert_eq!(sample.test_mask(), &[false, true, false, true]);
        assert_eq!(sample.train_indices(), vec![0, 2]);
        assert_eq!(sample.test_indices(), vec![1, 3]);
        assert_eq!(sample.feature_tensor().shape(), &[4, 1]);
    }

    #[test]
    fn test_overlapping_masks_rejected() {
        let err = GraphSample::with_masks(
            vec![1.0; 3],
            1,
            vec![],
            labels(3),
            vec![true, true, false],
            vec![false, true, true],
        )
        .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Configuration);
        assert!(err.to_string().contains("non-disjoint masks"));
    }

    #[test]
    fn test_uncovered_node_rejected() {
        let err = GraphSample::with_masks(
            vec![1.0; 2],
            1,
            vec![],
            labels(2),
            vec![true, false],
            vec![false, false],
        )
        .unwrap_err();
        assert!(err.to_string().contains("non-disjoint masks"));
    }

    #[test]
    fn test_feature_count_mismatch() {
        let err =
            GraphSample::new(vec![1.0; 3], 1, vec![], labels(4), vec![true; 4]).unwrap_err();
        assert!(matches!(
            err,
            BotliftError::ShapeMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let mut l = labels(2);
        l[1].outcome = 2;
        let err = GraphSample::new(vec![0.0; 2], 1, vec![], l, vec![true, false]).unwrap_err();
        assert!(matches!(err, BotliftError::DataIntegrity(_)));
    }

    #[test]
    fn test_edge_out_of_range_rejected() {
        let err = GraphSample::new(vec![0.0; 2], 1, vec![(0, 2)], labels(2), vec![true, false])
            .unwrap_err();
        assert!(matches!(err, BotliftError::DataIntegrity(_)));
    }

    #[test]
    fn test_from_snapshot_split_is_seeded() {
        let snapshot = Snapshot {
            edges: vec![[0, 1], [1, 2]],
            bot_label: vec![0; 10],
            treatment: vec![0; 10],
            outcome: vec![0; 10],
        };
        let a = GraphSample::from_snapshot(&snapshot, 0.8, &mut StdRng::seed_from_u64(101))
            .unwrap();
        let b = GraphSample::from_snapshot(&snapshot, 0.8, &mut StdRng::seed_from_u64(101))
            .unwrap();
        assert_eq!(a.train_mask(), b.train_mask());
        assert_eq!(a.train_indices().len(), 8);
        assert_eq!(a.test_indices().len(), 2);
    }

    #[test]
    fn test_from_snapshot_rejects_bad_fraction() {
        let snapshot = Snapshot::default();
        assert!(
            GraphSample::from_snapshot(&snapshot, 1.5, &mut StdRng::seed_from_u64(1)).is_err()
        );
    }

    #[test]
    fn test_mask_kind_parsing() {
        assert_eq!("train".parse::<MaskKind>().unwrap(), MaskKind::Train);
        assert_eq!("test".parse::<MaskKind>().unwrap(), MaskKind::Test);
        assert!("validation".parse::<MaskKind>().is_err());
        assert_eq!(MaskKind::Test.to_string(), "test");
    }

    #[test]
    fn test_select() {
        assert_eq!(select(&[10, 20, 30], &[2, 0]), vec![30, 10]);
    }
}
