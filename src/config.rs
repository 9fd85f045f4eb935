//! Pipeline configuration.
//!
//! Every section has defaults, so an empty TOML file (or none at all)
//! reproduces the reference run:
//!
//! ```toml
//! [data]
//! seed = 101
//! train_fraction = 0.8
//!
//! [model]
//! hidden_bot = 16
//! hidden_outcome = 16
//! dropout = 0.5
//!
//! [training]
//! epochs = 100
//! learning_rate = 0.01
//! eval_every = 10
//! margin = 1.0
//! degeneracy = "abort"
//!
//! [evaluation]
//! bot_quantile = 0.96
//! outcome_quantile = 0.83
//! threshold_scope = "global"
//! final_eval_mask = "train"
//! tau_true = 1.0
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::MaskKind;
use crate::error::{BotliftError, Result};
use crate::threshold::ThresholdScope;

/// Data split configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Seeds the split, weight init and dropout.
    pub seed: u64,
    pub train_fraction: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            seed: 101,
            train_fraction: 0.8,
        }
    }
}

/// Model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub hidden_bot: usize,
    pub hidden_outcome: usize,
    pub dropout: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hidden_bot: 16,
            hidden_outcome: 16,
            dropout: 0.5,
        }
    }
}

/// What to do when a loss term hits a numeric degeneracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegeneracyPolicy {
    /// Fail the run.
    #[default]
    Abort,
    /// Log a warning and let the term contribute zero.
    Neutral,
}

impl fmt::Display for DegeneracyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    /// Evaluate on every `eval_every`-th epoch, starting with epoch 0.
    pub eval_every: usize,
    pub margin: f32,
    pub degeneracy: DegeneracyPolicy,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: 0.01,
            eval_every: 10,
            margin: 1.0,
            degeneracy: DegeneracyPolicy::Abort,
        }
    }
}

/// Thresholding and evaluation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub bot_quantile: f64,
    pub outcome_quantile: f64,
    pub threshold_scope: ThresholdScope,
    /// Mask the final outcome report is computed on.
    pub final_eval_mask: MaskKind,
    pub tau_true: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            bot_quantile: 0.96,
            outcome_quantile: 0.83,
            threshold_scope: ThresholdScope::Global,
            final_eval_mask: MaskKind::Train,
            tau_true: 1.0,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub evaluation: EvaluationConfig,
}

impl PipelineConfig {
    /// Load and validate a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "loaded configuration");
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`BotliftError::InvalidConfig`] naming the first offending parameter.
    pub fn validate(&self) -> Result<()> {
        let unit = |param: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(BotliftError::invalid_config(param, value, "value in [0, 1]"))
            }
        };
        let fraction = self.data.train_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(BotliftError::invalid_config(
                "data.train_fraction",
                fraction,
                "value in (0, 1): both partitions must be non-empty",
            ));
        }
        unit("evaluation.bot_quantile", self.evaluation.bot_quantile)?;
        unit("evaluation.outcome_quantile", self.evaluation.outcome_quantile)?;

        if self.model.hidden_bot == 0 {
            return Err(BotliftError::invalid_config("model.hidden_bot", 0, "positive width"));
        }
        if self.model.hidden_outcome == 0 {
            return Err(BotliftError::invalid_config(
                "model.hidden_outcome",
                0,
                "positive width",
            ));
        }
        if !(0.0..1.0).contains(&self.model.dropout) {
            return Err(BotliftError::invalid_config(
                "model.dropout",
                self.model.dropout,
                "probability in [0, 1)",
            ));
        }
        if !(self.training.learning_rate > 0.0 && self.training.learning_rate.is_finite()) {
            return Err(BotliftError::invalid_config(
                "training.learning_rate",
                self.training.learning_rate,
                "positive finite value",
            ));
        }
        if self.training.eval_every == 0 {
            return Err(BotliftError::invalid_config(
                "training.eval_every",
                0,
                "at least 1",
            ));
        }
        if !self.training.margin.is_finite() {
            return Err(BotliftError::invalid_config(
                "training.margin",
                self.training.margin,
                "finite value",
            ));
        }
        if !self.evaluation.tau_true.is_finite() {
            return Err(BotliftError::invalid_config(
                "evaluation.tau_true",
                self.evaluation.tau_true,
                "finite value",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_run() {
        let config = PipelineConfig::default();
        assert_eq!(config.data.seed, 101);
        assert_eq!(config.model.hidden_bot, 16);
        assert_eq!(config.training.epochs, 100);
        assert_eq!(config.training.eval_every, 10);
        assert_eq!(config.evaluation.bot_quantile, 0.96);
        assert_eq!(config.evaluation.outcome_quantile, 0.83);
        assert_eq!(config.evaluation.final_eval_mask, MaskKind::Train);
        assert_eq!(config.training.degeneracy, DegeneracyPolicy::Abort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(
            PipelineConfig::from_toml_str("").unwrap(),
            PipelineConfig::default()
        );
    }

    #[test]
    fn test_partial_sections() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [training]
            epochs = 5
            degeneracy = "neutral"

            [evaluation]
            threshold_scope = "masked"
            final_eval_mask = "test"
            "#,
        )
        .unwrap();
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.training.learning_rate, 0.01);
        assert_eq!(config.training.degeneracy, DegeneracyPolicy::Neutral);
        assert_eq!(config.evaluation.threshold_scope, ThresholdScope::Masked);
        assert_eq!(config.evaluation.final_eval_mask, MaskKind::Test);
        assert_eq!(config.data, DataConfig::default());
    }

    #[test]
    fn test_invalid_values() {
        let err = PipelineConfig::from_toml_str("[evaluation]\nbot_quantile = 1.5").unwrap_err();
        assert!(matches!(err, BotliftError::InvalidConfig { ref param, .. } if param == "evaluation.bot_quantile"));

        let err = PipelineConfig::from_toml_str("[training]\neval_every = 0").unwrap_err();
        assert!(matches!(err, BotliftError::InvalidConfig { .. }));

        let err = PipelineConfig::from_toml_str("[model]\ndropout = 1.0").unwrap_err();
        assert!(matches!(err, BotliftError::InvalidConfig { .. }));

        for fraction in ["0.0", "1.0"] {
            let err = PipelineConfig::from_toml_str(&format!("[data]\ntrain_fraction = {fraction}"))
                .unwrap_err();
            assert!(matches!(err, BotliftError::InvalidConfig { ref param, .. } if param == "data.train_fraction"));
        }
    }

    #[test]
    fn test_malformed_toml() {
        let err = PipelineConfig::from_toml_str("[training\nepochs = ").unwrap_err();
        assert!(matches!(err, BotliftError::Toml(_)));

        let err = PipelineConfig::from_toml_str("[evaluation]\nthreshold_scope = \"local\"")
            .unwrap_err();
        assert!(matches!(err, BotliftError::Toml(_)));
    }

    #[test]
    fn test_from_file_round_trip() {
        let mut config = PipelineConfig::default();
        config.data.seed = 7;
        config.training.epochs = 3;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml::to_string(&config).unwrap().as_bytes())
            .unwrap();

        assert_eq!(PipelineConfig::from_file(file.path()).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_file("/nonexistent/botlift.toml").unwrap_err();
        assert!(matches!(err, BotliftError::Io(_)));
    }
}
