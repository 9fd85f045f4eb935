//! Full-batch training and evaluation of [`DualScoreGCN`].
//!
//! ```text
//! ┌──────────┐ epoch % eval_every == 0 ┌────────────┐
//! │ Training │ ──────────────────────▶ │ Evaluating │
//! │          │ ◀────────────────────── │            │
//! └────┬─────┘                         └────────────┘
//!      │ epoch == epochs
//!      ▼
//! ┌──────────┐
//! │ Finished │
//! └──────────┘
//! ```
//!
//! Each epoch clears the tape, runs a training-mode forward pass over the
//! whole graph, applies [`DeviationLoss`] to both score vectors restricted
//! to the training nodes, and takes one Adam step on the summed loss.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::autograd::{clear_graph, no_grad, Tensor};
use crate::causal::{CausalEffectEvaluator, CausalMetrics, TreatmentSplit};
use crate::config::{DegeneracyPolicy, PipelineConfig};
use crate::data::{select, GraphSample, MaskKind};
use crate::error::{BotliftError, Result};
use crate::loss::DeviationLoss;
use crate::metrics::{classification_report, ClassificationReport};
use crate::model::DualScoreGCN;
use crate::nn::{Adam, Module, Optimizer};
use crate::threshold::{apply_threshold, Thresholder};

/// Where the training loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Training,
    Evaluating,
    Finished,
}

/// Loss values of one epoch. A term skipped under
/// [`DegeneracyPolicy::Neutral`] is recorded as `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub loss_bot: f32,
    pub loss_outcome: f32,
    pub loss: f32,
}

/// Thresholded predictions of one task scored against its labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskEvaluation {
    pub mask: MaskKind,
    pub threshold: f32,
    pub report: ClassificationReport,
}

/// Outcome of the causal-effect attempt during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CausalStatus {
    Evaluated(CausalMetrics),
    Unavailable { reason: String },
}

/// Periodic evaluation on the training nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalSnapshot {
    pub epoch: usize,
    pub bot: TaskEvaluation,
    pub outcome: TaskEvaluation,
    /// Treated minus control outcome rate in the labels; `None` if a
    /// treatment group is empty.
    pub observed_uplift: Option<f64>,
    /// Same for the predicted outcomes.
    pub predicted_uplift: Option<f64>,
    pub causal: CausalStatus,
}

/// Everything [`Trainer::fit`] observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
    pub snapshots: Vec<EvalSnapshot>,
}

impl TrainingHistory {
    /// Loss of the last epoch.
    #[must_use]
    pub fn final_loss(&self) -> Option<f32> {
        self.epochs.last().map(|r| r.loss)
    }
}

/// Final evaluation: bot on the test nodes, outcome on the configured mask.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalEvaluation {
    pub bot: TaskEvaluation,
    pub outcome: TaskEvaluation,
}

/// Owns the model, optimizer and data of one run.
///
/// # Example
///
/// ```
/// use botlift::config::PipelineConfig;
/// use botlift::data::{GraphSample, Snapshot, SyntheticConfig};
/// use botlift::train::Trainer;
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let mut rng = StdRng::seed_from_u64(101);
/// let snapshot = Snapshot::synthetic(&SyntheticConfig::with_nodes(60), &mut rng).unwrap();
/// let sample = GraphSample::from_snapshot(&snapshot, 0.8, &mut rng).unwrap();
///
/// let mut config = PipelineConfig::default();
/// config.training.epochs = 3;
/// config.training.degeneracy = botlift::config::DegeneracyPolicy::Neutral;
///
/// let mut trainer = Trainer::new(sample, config).unwrap();
/// let history = trainer.fit().unwrap();
/// assert_eq!(history.epochs.len(), 3);
/// let final_eval = trainer.evaluate().unwrap();
/// println!("{}", final_eval.bot.report);
/// ```
pub struct Trainer {
    sample: GraphSample,
    config: PipelineConfig,
    model: DualScoreGCN,
    optimizer: Adam,
    loss: DeviationLoss,
    bot_thresholder: Thresholder,
    outcome_thresholder: Thresholder,
    state: LoopState,
}

impl Trainer {
    /// Validate `config` and build a fresh model seeded from `config.data.seed`.
    pub fn new(sample: GraphSample, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.data.seed);
        let model = DualScoreGCN::from_config(sample.feature_dim(), &config.model, &mut rng)?;
        Self::with_model(sample, config, model)
    }

    /// Train an existing model.
    ///
    /// # Errors
    ///
    /// - [`BotliftError::ShapeMismatch`] if the model's input width differs
    ///   from the sample's feature width
    /// - [`BotliftError::InvalidConfig`] if the train mask holds fewer than
    ///   two nodes or the test mask is empty
    pub fn with_model(
        sample: GraphSample,
        config: PipelineConfig,
        model: DualScoreGCN,
    ) -> Result<Self> {
        config.validate()?;
        if model.in_dim() != sample.feature_dim() {
            return Err(BotliftError::shape_mismatch(
                "model input features",
                sample.feature_dim(),
                model.in_dim(),
            ));
        }
        let num_train = sample.train_indices().len();
        if num_train < 2 {
            return Err(BotliftError::invalid_config(
                "train_mask",
                format!("{num_train} nodes"),
                "at least 2 training nodes",
            ));
        }
        if sample.test_indices().is_empty() {
            return Err(BotliftError::invalid_config(
                "test_mask",
                "0 nodes",
                "at least 1 test node",
            ));
        }
        let eval = &config.evaluation;
        let bot_thresholder = Thresholder::new(eval.bot_quantile, eval.threshold_scope)?;
        let outcome_thresholder = Thresholder::new(eval.outcome_quantile, eval.threshold_scope)?;

        Ok(Self {
            optimizer: Adam::new(config.training.learning_rate),
            loss: DeviationLoss::new(config.training.margin),
            sample,
            config,
            model,
            bot_thresholder,
            outcome_thresholder,
            state: LoopState::Training,
        })
    }

    #[must_use]
    pub fn model(&self) -> &DualScoreGCN {
        &self.model
    }

    #[must_use]
    pub fn sample(&self) -> &GraphSample {
        &self.sample
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run all epochs.
    pub fn fit(&mut self) -> Result<TrainingHistory> {
        self.fit_with(|_| {})
    }

    /// Run all epochs, handing every evaluation snapshot to `observer` as
    /// soon as it is produced.
    pub fn fit_with<F>(&mut self, mut observer: F) -> Result<TrainingHistory>
    where
        F: FnMut(&EvalSnapshot),
    {
        let epochs = self.config.training.epochs;
        let eval_every = self.config.training.eval_every;
        info!(
            nodes = self.sample.num_nodes(),
            edges = self.sample.num_edges(),
            train = self.sample.train_indices().len(),
            epochs,
            lr = self.optimizer.lr(),
            "starting training"
        );

        self.model.train();
        self.state = LoopState::Training;
        let mut history = TrainingHistory::default();

        for epoch in 0..epochs {
            let record = self.train_epoch(epoch)?;
            debug!(
                epoch,
                loss = record.loss,
                loss_bot = record.loss_bot,
                loss_outcome = record.loss_outcome,
                "epoch finished"
            );
            history.epochs.push(record);

            if epoch % eval_every == 0 {
                let snapshot = self.evaluate_snapshot(epoch)?;
                observer(&snapshot);
                history.snapshots.push(snapshot);
            }
        }

        self.state = LoopState::Finished;
        info!(
            epochs = history.epochs.len(),
            final_loss = history.final_loss(),
            "training finished"
        );
        Ok(history)
    }

    /// One optimization step.
    pub fn train_epoch(&mut self, epoch: usize) -> Result<EpochRecord> {
        clear_graph();

        let x = self.sample.feature_tensor();
        let scores = self.model.forward(&x, self.sample.adjacency());

        let train = self.sample.train_indices();
        let bot_target = select(&self.sample.bot_labels(), &train);
        let outcome_target = select(&self.sample.outcome_labels(), &train);

        let loss_bot = self.loss_term("bot", &bot_target, &scores.bot.gather(&train))?;
        let loss_outcome =
            self.loss_term("outcome", &outcome_target, &scores.outcome.gather(&train))?;

        let value = |t: &Option<Tensor>| t.as_ref().map_or(0.0, Tensor::item);
        let record = EpochRecord {
            epoch,
            loss_bot: value(&loss_bot),
            loss_outcome: value(&loss_outcome),
            loss: value(&loss_bot) + value(&loss_outcome),
        };

        let total = match (loss_bot, loss_outcome) {
            (Some(a), Some(b)) => Some(a.add(&b)),
            (a, b) => a.or(b),
        };
        if let Some(total) = total {
            total.backward();
            self.optimizer
                .step_with_params(&mut self.model.parameters_mut());
        }
        Ok(record)
    }

    fn loss_term(&self, task: &str, target: &[u8], pred: &Tensor) -> Result<Option<Tensor>> {
        match self.loss.forward(target, pred) {
            Ok(loss) => Ok(Some(loss)),
            Err(err)
                if err.is_degenerate()
                    && self.config.training.degeneracy == DegeneracyPolicy::Neutral =>
            {
                warn!(task, error = %err, "degenerate loss term, contributing zero");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Both score vectors over every node, without gradient tracking.
    fn score_all(&self) -> (Vec<f32>, Vec<f32>) {
        let x = self.sample.feature_tensor();
        let scores = no_grad(|| self.model.forward(&x, self.sample.adjacency()));
        (scores.bot.data().to_vec(), scores.outcome.data().to_vec())
    }

    fn evaluate_snapshot(&mut self, epoch: usize) -> Result<EvalSnapshot> {
        self.state = LoopState::Evaluating;
        self.model.eval();
        let snapshot = self.snapshot(epoch);
        self.model.train();
        self.state = LoopState::Training;
        snapshot
    }

    fn snapshot(&self, epoch: usize) -> Result<EvalSnapshot> {
        let (bot_scores, outcome_scores) = self.score_all();
        let train = self.sample.train_indices();

        let (bot, _) = task_evaluation(
            &self.bot_thresholder,
            &bot_scores,
            &self.sample.bot_labels(),
            &self.sample,
            MaskKind::Train,
        )?;
        let (outcome, outcome_pred) = task_evaluation(
            &self.outcome_thresholder,
            &outcome_scores,
            &self.sample.outcome_labels(),
            &self.sample,
            MaskKind::Train,
        )?;

        let split = TreatmentSplit::new(
            &train,
            &select(&self.sample.treatment_labels(), &train),
            &select(&self.sample.outcome_labels(), &train),
            &outcome_pred,
        )?;

        let evaluator = CausalEffectEvaluator::new(self.config.evaluation.tau_true);
        let causal = match evaluator.evaluate_model(&self.model, &split) {
            Ok(metrics) => CausalStatus::Evaluated(metrics),
            Err(BotliftError::CounterfactualUnavailable(reason)) => {
                debug!(%reason, "causal evaluation skipped");
                CausalStatus::Unavailable { reason }
            }
            Err(err) => return Err(err),
        };

        let snapshot = EvalSnapshot {
            epoch,
            bot,
            outcome,
            observed_uplift: split.observed_uplift().ok(),
            predicted_uplift: split.predicted_uplift().ok(),
            causal,
        };
        info!(
            epoch,
            bot_accuracy = snapshot.bot.report.accuracy,
            bot_f1 = snapshot.bot.report.macro_avg.f1,
            outcome_accuracy = snapshot.outcome.report.accuracy,
            outcome_f1 = snapshot.outcome.report.macro_avg.f1,
            "evaluation"
        );
        Ok(snapshot)
    }

    /// Final test: bot scores on the test nodes, outcome scores on
    /// `evaluation.final_eval_mask`. The model's mode is restored afterwards.
    pub fn evaluate(&mut self) -> Result<FinalEvaluation> {
        let was_training = self.model.training();
        self.model.eval();
        let result = self.final_evaluation();
        if was_training {
            self.model.train();
        }
        result
    }

    fn final_evaluation(&self) -> Result<FinalEvaluation> {
        let (bot_scores, outcome_scores) = self.score_all();
        let (bot, _) = task_evaluation(
            &self.bot_thresholder,
            &bot_scores,
            &self.sample.bot_labels(),
            &self.sample,
            MaskKind::Test,
        )?;
        let (outcome, _) = task_evaluation(
            &self.outcome_thresholder,
            &outcome_scores,
            &self.sample.outcome_labels(),
            &self.sample,
            self.config.evaluation.final_eval_mask,
        )?;
        info!(
            bot_mask = %bot.mask,
            outcome_mask = %outcome.mask,
            bot_accuracy = bot.report.accuracy,
            outcome_accuracy = outcome.report.accuracy,
            "final evaluation"
        );
        Ok(FinalEvaluation { bot, outcome })
    }
}

/// Threshold `scores`, keep the nodes of `mask` and score them against `labels`.
fn task_evaluation(
    thresholder: &Thresholder,
    scores: &[f32],
    labels: &[u8],
    sample: &GraphSample,
    mask: MaskKind,
) -> Result<(TaskEvaluation, Vec<u8>)> {
    let node_mask = sample.mask(mask);
    let threshold = thresholder.fit(scores, node_mask)?;
    let predicted = apply_threshold(scores, node_mask, threshold);
    let truth = select(labels, &sample.indices(mask));
    let report = classification_report(&truth, &predicted)?;
    Ok((
        TaskEvaluation {
            mask,
            threshold,
            report,
        },
        predicted,
    ))
}
