//! Deviation loss for score-based anomaly detection.
//!
//! Scores are standardized against the batch they belong to; normal
//! examples (target 0) are pushed towards low deviations and anomalous ones
//! (target 1) must clear a margin:
//!
//! ```text
//! dev_i = (s_i - mean(s)) / std(s)          (unbiased std, n - 1)
//! loss  = Σ_{y=0} dev_i + Σ_{y=1} max(0, m - dev_i)
//! ```
//!
//! The same loss drives both the bot score and the outcome score.
//!
//! # Example
//!
//! ```
//! use botlift::autograd::Tensor;
//! use botlift::loss::DeviationLoss;
//!
//! let scores = Tensor::from_slice(&[0.1, 0.2, 3.0, 0.1]).requires_grad();
//! let loss = DeviationLoss::default().forward(&[0, 0, 1, 0], &scores).unwrap();
//! assert!(loss.item().is_finite());
//! ```
//!
//! # References
//!
//! - Pang, G., Shen, C., & van den Hengel, A. (2019). Deep anomaly detection
//!   with deviation networks. KDD.

use crate::autograd::Tensor;
use crate::error::{BotliftError, Result};

/// Deviation loss with margin `m`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationLoss {
    margin: f32,
}

impl Default for DeviationLoss {
    fn default() -> Self {
        Self { margin: 1.0 }
    }
}

impl DeviationLoss {
    #[must_use]
    pub fn new(margin: f32) -> Self {
        Self { margin }
    }

    #[must_use]
    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// Differentiable loss of `pred` (any shape, `n` elements) against
    /// binary `target`.
    ///
    /// # Errors
    ///
    /// - [`BotliftError::ShapeMismatch`] if `target.len() != n`
    /// - [`BotliftError::DataIntegrity`] if a target is not 0 or 1
    /// - [`BotliftError::NumericDegeneracy`] if `n < 2`, a score is not
    ///   finite, or all scores are equal (zero standard deviation)
    pub fn forward(&self, target: &[u8], pred: &Tensor) -> Result<Tensor> {
        let n = pred.numel();
        validate(target, pred.data())?;

        let pred = pred.flatten();
        let mean = pred.mean();
        let centered = pred.sub(&mean.expand(n));
        let std = centered
            .pow(2.0)
            .sum()
            .mul_scalar(1.0 / (n - 1) as f32)
            .sqrt();

        let std_value = std.item();
        if std_value == 0.0 || !std_value.is_finite() {
            return Err(BotliftError::NumericDegeneracy(format!(
                "standard deviation of {n} scores is {std_value}"
            )));
        }

        let dev = centered.div(&std.expand(n));

        let negatives: Vec<f32> = target.iter().map(|&y| f32::from(1 - y)).collect();
        let positives: Vec<f32> = target.iter().map(|&y| f32::from(y)).collect();

        let normal_term = dev.mul(&Tensor::from_vec(negatives, &[n])).sum();
        let anomaly_term = dev
            .neg()
            .add_scalar(self.margin)
            .relu()
            .mul(&Tensor::from_vec(positives, &[n]))
            .sum();

        Ok(normal_term.add(&anomaly_term))
    }
}

fn validate(target: &[u8], pred: &[f32]) -> Result<()> {
    if target.len() != pred.len() {
        return Err(BotliftError::shape_mismatch(
            "deviation loss targets",
            pred.len(),
            target.len(),
        ));
    }
    if let Some(node) = target.iter().position(|&y| y > 1) {
        return Err(BotliftError::DataIntegrity(format!(
            "deviation loss target {node} is {}, expected 0 or 1",
            target[node]
        )));
    }
    if pred.len() < 2 {
        return Err(BotliftError::NumericDegeneracy(format!(
            "deviation loss needs at least 2 scores, got {}",
            pred.len()
        )));
    }
    if let Some(i) = pred.iter().position(|s| !s.is_finite()) {
        return Err(BotliftError::NumericDegeneracy(format!(
            "score {i} is {}",
            pred[i]
        )));
    }
    Ok(())
}

/// Standardized scores `(s - mean) / std` with the unbiased std, computed
/// outside the autograd graph.
pub fn deviation_scores(scores: &[f32]) -> Result<Vec<f32>> {
    if scores.len() < 2 {
        return Err(BotliftError::NumericDegeneracy(format!(
            "need at least 2 scores, got {}",
            scores.len()
        )));
    }
    let n = scores.len() as f64;
    let mean = scores.iter().map(|&s| f64::from(s)).sum::<f64>() / n;
    let var = scores
        .iter()
        .map(|&s| (f64::from(s) - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    let std = var.sqrt();
    if std == 0.0 || !std.is_finite() {
        return Err(BotliftError::NumericDegeneracy(format!(
            "standard deviation is {std}"
        )));
    }
    Ok(scores
        .iter()
        .map(|&s| ((f64::from(s) - mean) / std) as f32)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{clear_graph, get_grad};

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_all_normal_sums_deviations_to_zero() {
        let pred = Tensor::from_slice(&[0.3, -1.2, 2.5, 0.0, 0.7]);
        let loss = DeviationLoss::default().forward(&[0; 5], &pred).unwrap();
        assert!(loss.item().abs() < 1e-4, "loss = {}", loss.item());
    }

    #[test]
    fn test_all_anomalous_is_hinge_sum() {
        let scores = [0.3, -1.2, 2.5, 0.0, 0.7];
        let pred = Tensor::from_slice(&scores);
        let loss = DeviationLoss::new(1.0).forward(&[1; 5], &pred).unwrap();

        let expected: f32 = deviation_scores(&scores)
            .unwrap()
            .iter()
            .map(|d| (1.0 - d).max(0.0))
            .sum();
        assert!(close(loss.item(), expected));
    }

    #[test]
    fn test_mixed_targets() {
        // dev = [-1, 0, 1] for scores [0, 1, 2] (std = 1)
        let pred = Tensor::from_slice(&[0.0, 1.0, 2.0]);
        let loss = DeviationLoss::new(1.0).forward(&[0, 1, 0], &pred).unwrap();
        // normal: -1 + 1 = 0, anomalous: max(0, 1 - 0) = 1
        assert!(close(loss.item(), 1.0));
    }

    #[test]
    fn test_margin_is_respected() {
        let pred = Tensor::from_slice(&[0.0, 1.0, 2.0]);
        let loss = DeviationLoss::new(0.5).forward(&[0, 0, 1], &pred).unwrap();
        // normal: -1 + 0 = -1, anomalous: max(0, 0.5 - 1) = 0
        assert!(close(loss.item(), -1.0));
    }

    #[test]
    fn test_gradient_pushes_anomaly_up() {
        clear_graph();
        let pred = Tensor::from_slice(&[0.0, 0.5, 0.2, 0.1]).requires_grad();
        let loss = DeviationLoss::default()
            .forward(&[0, 0, 1, 0], &pred)
            .unwrap();
        loss.backward();
        let grad = get_grad(pred.id()).unwrap();
        assert!(grad.data()[2] < 0.0, "grad = {:?}", grad.data());
        assert!(grad.data().iter().all(|g| g.is_finite()));
    }

    #[test]
    fn test_length_mismatch() {
        let err = DeviationLoss::default()
            .forward(&[0, 1], &Tensor::from_slice(&[0.0, 1.0, 2.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            BotliftError::ShapeMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_constant_scores_are_degenerate() {
        let err = DeviationLoss::default()
            .forward(&[0, 1, 0], &Tensor::from_slice(&[0.5, 0.5, 0.5]))
            .unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_single_score_is_degenerate() {
        let err = DeviationLoss::default()
            .forward(&[1], &Tensor::from_slice(&[0.5]))
            .unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_non_finite_score_is_degenerate() {
        let err = DeviationLoss::default()
            .forward(&[0, 1], &Tensor::from_slice(&[f32::NAN, 1.0]))
            .unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_non_binary_target() {
        let err = DeviationLoss::default()
            .forward(&[0, 2], &Tensor::from_slice(&[0.0, 1.0]))
            .unwrap_err();
        assert!(matches!(err, BotliftError::DataIntegrity(_)));
    }

    #[test]
    fn test_deviation_scores_affine_invariant() {
        let s = [0.1, 0.4, -0.3, 1.2];
        let t: Vec<f32> = s.iter().map(|x| 3.0 * x - 7.0).collect();
        let a = deviation_scores(&s).unwrap();
        let b = deviation_scores(&t).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!(close(*x, *y));
        }
    }
}
