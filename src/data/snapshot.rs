//! Raw graph snapshots: JSON loading and a seeded synthetic generator.

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::NodeLabels;
use crate::error::{BotliftError, Result};
use crate::gnn::EdgeIndex;

/// One graph observation: a directed edge list and three per-node binary
/// label channels. The node count is the length of the label vectors.
///
/// ```json
/// { "edges": [[0, 1], [1, 2]], "bot_label": [1, 0, 0], "treatment": [1, 0, 1], "outcome": [0, 0, 1] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub edges: Vec<[usize; 2]>,
    pub bot_label: Vec<u8>,
    pub treatment: Vec<u8>,
    pub outcome: Vec<u8>,
}

impl Snapshot {
    /// Parse and validate a JSON snapshot.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Read and validate a JSON snapshot file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let snapshot = Self::from_json_str(&content)?;
        debug!(
            path = %path.as_ref().display(),
            nodes = snapshot.num_nodes(),
            edges = snapshot.edges.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    /// Write the snapshot as pretty-printed JSON.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Number of nodes (length of the outcome channel).
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.outcome.len()
    }

    /// Check channel lengths, label values and edge endpoints.
    pub fn validate(&self) -> Result<()> {
        let n = self.num_nodes();
        for (name, channel) in [("bot_label", &self.bot_label), ("treatment", &self.treatment)] {
            if channel.len() != n {
                return Err(BotliftError::shape_mismatch(name, n, channel.len()));
            }
        }
        for (name, channel) in [
            ("bot_label", &self.bot_label),
            ("treatment", &self.treatment),
            ("outcome", &self.outcome),
        ] {
            if let Some((node, value)) = channel.iter().enumerate().find(|(_, &v)| v > 1) {
                return Err(BotliftError::DataIntegrity(format!(
                    "{name}[{node}] = {value}, expected 0 or 1"
                )));
            }
        }
        if let Some([s, t]) = self.edges.iter().find(|[s, t]| *s >= n || *t >= n) {
            return Err(BotliftError::DataIntegrity(format!(
                "edge ({s}, {t}) references a node outside 0..{n}"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn edge_list(&self) -> Vec<EdgeIndex> {
        self.edges.iter().map(|&[s, t]| (s, t)).collect()
    }

    #[must_use]
    pub fn node_labels(&self) -> Vec<NodeLabels> {
        self.bot_label
            .iter()
            .zip(&self.outcome)
            .zip(&self.treatment)
            .map(|((&bot, &outcome), &treatment)| NodeLabels::new(bot, outcome, treatment))
            .collect()
    }

    /// Generate a synthetic snapshot.
    ///
    /// Bots emit `bot_out_degree` edges each, ordinary users
    /// `user_out_degree`; targets are uniform over the other nodes.
    /// Treatment is a fair coin. Bots never convert; for users the
    /// conversion probability is `base_outcome_rate`, plus
    /// `treatment_uplift` when treated.
    pub fn synthetic(config: &SyntheticConfig, rng: &mut StdRng) -> Result<Self> {
        config.validate()?;
        let n = config.num_nodes;

        let bot_label: Vec<u8> = (0..n)
            .map(|_| u8::from(rng.gen_bool(config.bot_fraction)))
            .collect();
        let treatment: Vec<u8> = (0..n).map(|_| u8::from(rng.gen_bool(0.5))).collect();
        let outcome: Vec<u8> = bot_label
            .iter()
            .zip(&treatment)
            .map(|(&bot, &treated)| {
                if bot == 1 {
                    return 0;
                }
                let p = config.base_outcome_rate + f64::from(treated) * config.treatment_uplift;
                u8::from(rng.gen_bool(p.min(1.0)))
            })
            .collect();

        let mut edges = Vec::new();
        for (source, &bot) in bot_label.iter().enumerate() {
            let out_degree = if bot == 1 {
                config.bot_out_degree
            } else {
                config.user_out_degree
            };
            for _ in 0..out_degree {
                // Uniform over the other n - 1 nodes.
                let mut target = rng.gen_range(0..n - 1);
                if target >= source {
                    target += 1;
                }
                edges.push([source, target]);
            }
        }

        Ok(Self {
            edges,
            bot_label,
            treatment,
            outcome,
        })
    }
}

/// Parameters of [`Snapshot::synthetic`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub num_nodes: usize,
    pub bot_fraction: f64,
    pub user_out_degree: usize,
    pub bot_out_degree: usize,
    pub base_outcome_rate: f64,
    pub treatment_uplift: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            num_nodes: 500,
            bot_fraction: 0.05,
            user_out_degree: 2,
            bot_out_degree: 10,
            base_outcome_rate: 0.1,
            treatment_uplift: 0.2,
        }
    }
}

impl SyntheticConfig {
    /// Defaults with `num_nodes` nodes.
    #[must_use]
    pub fn with_nodes(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_nodes < 2 {
            return Err(BotliftError::invalid_config(
                "num_nodes",
                self.num_nodes,
                "at least 2 nodes",
            ));
        }
        for (param, value) in [
            ("bot_fraction", self.bot_fraction),
            ("base_outcome_rate", self.base_outcome_rate),
            ("treatment_uplift", self.treatment_uplift),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BotliftError::invalid_config(param, value, "value in [0, 1]"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_parse_json() {
        let json = r#"{"edges": [[0, 1], [2, 0]], "bot_label": [0, 1, 0], "treatment": [1, 1, 0], "outcome": [0, 0, 1]}"#;
        let snapshot = Snapshot::from_json_str(json).unwrap();
        assert_eq!(snapshot.num_nodes(), 3);
        assert_eq!(snapshot.edge_list(), vec![(0, 1), (2, 0)]);
        assert_eq!(snapshot.node_labels()[1], NodeLabels::new(1, 0, 1));
    }

    #[test]
    fn test_length_mismatch() {
        let json = r#"{"edges": [], "bot_label": [0, 1], "treatment": [1, 1, 0], "outcome": [0, 0, 1]}"#;
        let err = Snapshot::from_json_str(json).unwrap_err();
        assert!(matches!(err, BotliftError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_non_binary_label() {
        let json = r#"{"edges": [], "bot_label": [0, 3], "treatment": [1, 1], "outcome": [0, 0]}"#;
        let err = Snapshot::from_json_str(json).unwrap_err();
        assert!(matches!(err, BotliftError::DataIntegrity(_)));
    }

    #[test]
    fn test_edge_out_of_range() {
        let json = r#"{"edges": [[0, 5]], "bot_label": [0, 0], "treatment": [1, 1], "outcome": [0, 0]}"#;
        let err = Snapshot::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("outside 0..2"));
    }

    #[test]
    fn test_malformed_json() {
        let err = Snapshot::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, BotliftError::Json(_)));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot = Snapshot {
            edges: vec![[0, 1]],
            bot_label: vec![1, 0],
            treatment: vec![0, 1],
            outcome: vec![0, 1],
        };
        snapshot.to_file(&path).unwrap();
        assert_eq!(Snapshot::from_file(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Snapshot::from_file("/nonexistent/snapshot.json").unwrap_err();
        assert!(matches!(err, BotliftError::Io(_)));
    }

    #[test]
    fn test_synthetic_is_valid_and_seeded() {
        let config = SyntheticConfig::with_nodes(200);
        let a = Snapshot::synthetic(&config, &mut StdRng::seed_from_u64(101)).unwrap();
        let b = Snapshot::synthetic(&config, &mut StdRng::seed_from_u64(101)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.num_nodes(), 200);
        a.validate().unwrap();
        assert!(a.edges.iter().all(|[s, t]| s != t));
    }

    #[test]
    fn test_synthetic_bots_have_higher_out_degree_and_no_outcome() {
        let config = SyntheticConfig {
            bot_fraction: 0.2,
            ..SyntheticConfig::with_nodes(100)
        };
        let snapshot = Snapshot::synthetic(&config, &mut StdRng::seed_from_u64(7)).unwrap();
        let mut degree = vec![0usize; 100];
        for [s, _] in &snapshot.edges {
            degree[*s] += 1;
        }
        for (node, &bot) in snapshot.bot_label.iter().enumerate() {
            let expected = if bot == 1 { 10 } else { 2 };
            assert_eq!(degree[node], expected);
            if bot == 1 {
                assert_eq!(snapshot.outcome[node], 0);
            }
        }
    }

    #[test]
    fn test_synthetic_rejects_tiny_graph() {
        let err = Snapshot::synthetic(
            &SyntheticConfig::with_nodes(1),
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap_err();
        assert!(matches!(err, BotliftError::InvalidConfig { .. }));
    }
}
