//! Scoring networks.
//!
//! - [`DualScoreGCN`]: two independent GCN branches producing a bot score
//!   and a purchase-outcome score per node.
//! - [`EdgeRelevanceEncoder`]: a separate GCN encoder that ranks edges by
//!   endpoint-embedding similarity. Not part of training.
//!
//! ```text
//!            ┌─ GCNConv(d→h_B) ─ ReLU ─ Dropout ─ GCNConv(h_B→1) ─▶ bot score [N]
//! X [N,d] ──┤
//!            └─ GCNConv(d→h_Y) ─ ReLU ─ Dropout ─ GCNConv(h_Y→1) ─▶ outcome score [N]
//! ```

mod edge_relevance;

pub use edge_relevance::{EdgeRelevanceEncoder, EdgeSplit};

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::autograd::Tensor;
use crate::causal::CounterfactualModel;
use crate::config::ModelConfig;
use crate::error::{BotliftError, Result};
use crate::gnn::{GCNConv, NormalizedAdjacency};
use crate::nn::{Dropout, Module};

/// Raw, unnormalized per-node scores from one forward pass.
#[derive(Debug, Clone)]
pub struct DualScores {
    /// `[N]`, higher = more bot-like
    pub bot: Tensor,
    /// `[N]`, higher = more likely to convert
    pub outcome: Tensor,
}

/// One GCN → ReLU → Dropout → GCN stack.
#[derive(Debug)]
pub(crate) struct GcnBranch {
    conv1: GCNConv,
    dropout: Dropout,
    conv2: GCNConv,
}

impl GcnBranch {
    pub(crate) fn new(
        in_dim: usize,
        hidden: usize,
        out_dim: usize,
        dropout: f32,
        rng: &mut StdRng,
    ) -> Result<Self> {
        let conv1 = GCNConv::new(in_dim, hidden, rng);
        let conv2 = GCNConv::new(hidden, out_dim, rng);
        let dropout = Dropout::new(dropout, StdRng::seed_from_u64(rng.gen()))?;
        Ok(Self {
            conv1,
            dropout,
            conv2,
        })
    }

    pub(crate) fn forward(&self, x: &Tensor, adj: &Arc<NormalizedAdjacency>) -> Tensor {
        let hidden = self.conv1.forward(x, adj).relu();
        let hidden = self.dropout.forward(&hidden);
        self.conv2.forward(&hidden, adj)
    }
}

impl Module for GcnBranch {
    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.conv1.parameters();
        params.extend(self.conv2.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.conv1.parameters_mut();
        params.extend(self.conv2.parameters_mut());
        params
    }

    fn train(&mut self) {
        self.dropout.train();
    }

    fn eval(&mut self) {
        self.dropout.eval();
    }

    fn training(&self) -> bool {
        self.dropout.training()
    }
}

/// Dual-branch GCN scoring every node for bot-likeness and purchase outcome.
///
/// Both branches read the same node features and graph but share no
/// parameters. Construction draws all weights and dropout seeds from the
/// given RNG, so one seed fixes the whole model.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use botlift::autograd::Tensor;
/// use botlift::gnn::NormalizedAdjacency;
/// use botlift::model::DualScoreGCN;
/// use botlift::nn::Module;
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let mut model = DualScoreGCN::new(1, 16, 16, 0.5, &mut StdRng::seed_from_u64(101)).unwrap();
/// model.eval();
///
/// let adj = Arc::new(NormalizedAdjacency::new(3, &[(0, 1), (1, 2)]).unwrap());
/// let scores = model.forward(&Tensor::ones(&[3, 1]), &adj);
/// assert_eq!(scores.bot.shape(), &[3]);
/// assert_eq!(scores.outcome.shape(), &[3]);
/// ```
#[derive(Debug)]
pub struct DualScoreGCN {
    bot: GcnBranch,
    outcome: GcnBranch,
    in_dim: usize,
}

impl DualScoreGCN {
    /// New model in training mode.
    ///
    /// # Errors
    ///
    /// [`BotliftError::InvalidConfig`] for a zero width or a dropout
    /// probability outside `[0, 1)`.
    pub fn new(
        in_dim: usize,
        hidden_bot: usize,
        hidden_outcome: usize,
        dropout: f32,
        rng: &mut StdRng,
    ) -> Result<Self> {
        for (param, value) in [
            ("in_dim", in_dim),
            ("hidden_bot", hidden_bot),
            ("hidden_outcome", hidden_outcome),
        ] {
            if value == 0 {
                return Err(BotliftError::invalid_config(param, value, "positive width"));
            }
        }

        Ok(Self {
            bot: GcnBranch::new(in_dim, hidden_bot, 1, dropout, rng)?,
            outcome: GcnBranch::new(in_dim, hidden_outcome, 1, dropout, rng)?,
            in_dim,
        })
    }

    /// Build from the `[model]` configuration section.
    pub fn from_config(in_dim: usize, config: &ModelConfig, rng: &mut StdRng) -> Result<Self> {
        Self::new(
            in_dim,
            config.hidden_bot,
            config.hidden_outcome,
            config.dropout,
            rng,
        )
    }

    #[must_use]
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    /// Score every node. `x` is `[N, in_dim]`; both outputs are `[N]`.
    #[must_use]
    pub fn forward(&self, x: &Tensor, adj: &Arc<NormalizedAdjacency>) -> DualScores {
        DualScores {
            bot: self.bot.forward(x, adj).flatten(),
            outcome: self.outcome.forward(x, adj).flatten(),
        }
    }
}

impl Module for DualScoreGCN {
    /// Bot branch first, then outcome branch; weight before bias per layer.
    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.bot.parameters();
        params.extend(self.outcome.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.bot.parameters_mut();
        params.extend(self.outcome.parameters_mut());
        params
    }

    fn train(&mut self) {
        self.bot.train();
        self.outcome.train();
    }

    fn eval(&mut self) {
        self.bot.eval();
        self.outcome.eval();
    }

    fn training(&self) -> bool {
        self.bot.training()
    }
}

impl CounterfactualModel for DualScoreGCN {
    fn supports_counterfactuals(&self) -> bool {
        false
    }

    /// The outcome branch never sees the treatment, so it has no way to
    /// answer a counterfactual query.
    fn predict_under_treatment(&self, node: usize, hypothetical_treatment: u8) -> Result<f32> {
        Err(BotliftError::CounterfactualUnavailable(format!(
            "DualScoreGCN cannot predict node {node} under treatment {hypothetical_treatment}"
        )))
    }
}
