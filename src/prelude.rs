//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use botlift::prelude::*;
//! ```

pub use crate::autograd::{no_grad, Tensor};
pub use crate::causal::{CausalEffectEvaluator, CounterfactualModel, TreatmentSplit};
pub use crate::config::PipelineConfig;
pub use crate::data::{GraphSample, MaskKind, Snapshot, SyntheticConfig};
pub use crate::error::{BotliftError, Result};
pub use crate::loss::DeviationLoss;
pub use crate::metrics::{classification_report, ClassificationReport};
pub use crate::model::{DualScoreGCN, EdgeRelevanceEncoder};
pub use crate::nn::Module;
pub use crate::threshold::{Thresholder, ThresholdScope};
pub use crate::train::Trainer;
