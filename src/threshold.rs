//! Quantile thresholding of continuous scores into binary predictions.
//!
//! # Example
//!
//! ```
//! use botlift::threshold::{quantile_higher, Thresholder, ThresholdScope};
//!
//! let scores = [0.1, 0.9, 0.4, 0.7, 0.2];
//! assert_eq!(quantile_higher(&scores, 0.5).unwrap(), 0.4);
//!
//! let thresholder = Thresholder::new(0.5, ThresholdScope::Global).unwrap();
//! let mask = [true; 5];
//! assert_eq!(thresholder.binarize(&scores, &mask).unwrap(), vec![0, 1, 1, 1, 0]);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BotliftError, Result};

/// Which scores the threshold is fitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdScope {
    /// Fit on every node's score, then apply to the masked subset.
    #[default]
    Global,
    /// Fit on the masked subset only.
    Masked,
}

impl fmt::Display for ThresholdScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Masked => write!(f, "masked"),
        }
    }
}

impl FromStr for ThresholdScope {
    type Err = BotliftError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "global" => Ok(Self::Global),
            "masked" => Ok(Self::Masked),
            other => Err(BotliftError::invalid_config(
                "threshold_scope",
                other,
                "one of: global, masked",
            )),
        }
    }
}

fn check_quantile(q: f64) -> Result<()> {
    if (0.0..=1.0).contains(&q) {
        Ok(())
    } else {
        Err(BotliftError::invalid_config("quantile", q, "value in [0, 1]"))
    }
}

/// The `q`-quantile of `scores` with "higher" interpolation: the smallest
/// sorted element at or above fractional rank `q · (n - 1)`, i.e.
/// `sorted[ceil(q · (n - 1))]`.
///
/// The rank is computed in `f64`. An `f32` rank, as float32 tensor
/// libraries compute it, can round to the neighbouring element once `n`
/// reaches the low hundreds of thousands (from about 158k nodes at
/// `q = 0.83`). Below that the two agree.
///
/// # Errors
///
/// - [`BotliftError::InvalidConfig`] if `q` is outside `[0, 1]`
/// - [`BotliftError::DataIntegrity`] if `scores` is empty
/// - [`BotliftError::NumericDegeneracy`] if a score is NaN
pub fn quantile_higher(scores: &[f32], q: f64) -> Result<f32> {
    check_quantile(q)?;
    if scores.is_empty() {
        return Err(BotliftError::DataIntegrity(
            "quantile of an empty score vector".to_string(),
        ));
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Err(BotliftError::NumericDegeneracy(
            "NaN score in quantile input".to_string(),
        ));
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(f32::total_cmp);
    let rank = (q * (sorted.len() - 1) as f64).ceil() as usize;
    Ok(sorted[rank.min(sorted.len() - 1)])
}

/// Binarizes scores at a quantile: `score >= t` is 1, otherwise 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholder {
    quantile: f64,
    scope: ThresholdScope,
}

impl Thresholder {
    pub fn new(quantile: f64, scope: ThresholdScope) -> Result<Self> {
        check_quantile(quantile)?;
        Ok(Self { quantile, scope })
    }

    #[must_use]
    pub fn quantile(&self) -> f64 {
        self.quantile
    }

    #[must_use]
    pub fn scope(&self) -> ThresholdScope {
        self.scope
    }

    /// Threshold for `scores` restricted by `mask` according to the scope.
    pub fn fit(&self, scores: &[f32], mask: &[bool]) -> Result<f32> {
        check_mask(scores, mask)?;
        match self.scope {
            ThresholdScope::Global => quantile_higher(scores, self.quantile),
            ThresholdScope::Masked => {
                let masked: Vec<f32> = scores
                    .iter()
                    .zip(mask)
                    .filter_map(|(&s, &m)| m.then_some(s))
                    .collect();
                quantile_higher(&masked, self.quantile)
            }
        }
    }

    /// Binary predictions for the masked nodes, in ascending node order.
    pub fn binarize(&self, scores: &[f32], mask: &[bool]) -> Result<Vec<u8>> {
        let threshold = self.fit(scores, mask)?;
        Ok(apply_threshold(scores, mask, threshold))
    }
}

/// `1` where `score >= threshold`, over the masked scores only.
#[must_use]
pub fn apply_threshold(scores: &[f32], mask: &[bool], threshold: f32) -> Vec<u8> {
    scores
        .iter()
        .zip(mask)
        .filter(|(_, &m)| m)
        .map(|(&s, _)| u8::from(s >= threshold))
        .collect()
}

fn check_mask(scores: &[f32], mask: &[bool]) -> Result<()> {
    if scores.len() != mask.len() {
        return Err(BotliftError::shape_mismatch(
            "threshold mask",
            scores.len(),
            mask.len(),
        ));
    }
    Ok(())
}
