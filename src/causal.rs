//! Treatment-effect evaluation.
//!
//! The individual treatment effect of a node is the difference between its
//! outcome under treatment and under control. Only one of the two is ever
//! observed, so scoring a model's effect estimates needs the model to
//! predict counterfactual outcomes; that capability is the
//! [`CounterfactualModel`] trait.
//!
//! - eATE: absolute error of the average treatment effect.
//! - ePEHE: root mean squared error of the individual effects (Precision in
//!   Estimation of Heterogeneous Effect).
//!
//! # Example
//!
//! ```
//! use botlift::causal::evaluate_metric;
//!
//! // Treated units: [1] under treatment, [0] under control; same for controls.
//! let m = evaluate_metric(&[0.0], &[1.0], &[0.0], &[1.0], 1.0).unwrap();
//! assert_eq!(m.e_ate, 0.0);
//! assert_eq!(m.e_pehe, 0.0);
//! ```
//!
//! # References
//!
//! - Hill, J. L. (2011). Bayesian nonparametric modeling for causal inference. JCGS.

use serde::Serialize;

use crate::error::{BotliftError, Result};

/// Errors of a model's treatment-effect estimates against the true effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CausalMetrics {
    pub e_ate: f64,
    pub e_pehe: f64,
}

/// eATE and ePEHE from the four potential-outcome prediction vectors.
///
/// - `pred_0`, `pred_1`: treated units predicted under control / treatment
/// - `pred_c0`, `pred_c1`: control units predicted under control / treatment
///
/// `tau_pred = [pred_1, pred_c1] - [pred_0, pred_c0]` is compared with a
/// constant true effect `tau_true`.
///
/// # Errors
///
/// - [`BotliftError::ShapeMismatch`] if a pair has different lengths
/// - [`BotliftError::NumericDegeneracy`] if there are no units at all
pub fn evaluate_metric(
    pred_0: &[f32],
    pred_1: &[f32],
    pred_c0: &[f32],
    pred_c1: &[f32],
    tau_true: f64,
) -> Result<CausalMetrics> {
    if pred_1.len() != pred_0.len() {
        return Err(BotliftError::shape_mismatch(
            "treated potential outcomes",
            pred_1.len(),
            pred_0.len(),
        ));
    }
    if pred_c1.len() != pred_c0.len() {
        return Err(BotliftError::shape_mismatch(
            "control potential outcomes",
            pred_c1.len(),
            pred_c0.len(),
        ));
    }

    let tau_pred: Vec<f64> = pred_1
        .iter()
        .chain(pred_c1)
        .zip(pred_0.iter().chain(pred_c0))
        .map(|(&y1, &y0)| f64::from(y1) - f64::from(y0))
        .collect();
    if tau_pred.is_empty() {
        return Err(BotliftError::NumericDegeneracy(
            "no units to evaluate treatment effects on".to_string(),
        ));
    }

    let n = tau_pred.len() as f64;
    let mean_tau = tau_pred.iter().sum::<f64>() / n;
    let e_ate = (mean_tau - tau_true).abs();
    let e_pehe = (tau_pred.iter().map(|t| (t - tau_true).powi(2)).sum::<f64>() / n).sqrt();

    Ok(CausalMetrics { e_ate, e_pehe })
}

/// A model that can predict a node's outcome under a treatment it did not
/// necessarily receive.
pub trait CounterfactualModel {
    /// Whether [`CounterfactualModel::predict_under_treatment`] can succeed.
    fn supports_counterfactuals(&self) -> bool;

    /// Outcome score of `node` had its treatment been `hypothetical_treatment`.
    fn predict_under_treatment(&self, node: usize, hypothetical_treatment: u8) -> Result<f32>;
}

/// Observed outcome labels and predicted outcomes partitioned by treatment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentSplit {
    /// Node ids of treated units.
    pub treated: Vec<usize>,
    /// Node ids of control units.
    pub control: Vec<usize>,
    pub true_treated: Vec<u8>,
    pub true_control: Vec<u8>,
    pub pred_treated: Vec<u8>,
    pub pred_control: Vec<u8>,
}

impl TreatmentSplit {
    /// Partition aligned `nodes`, `treatment`, `outcome` and `predicted` vectors.
    pub fn new(nodes: &[usize], treatment: &[u8], outcome: &[u8], predicted: &[u8]) -> Result<Self> {
        for (name, len) in [
            ("treatment", treatment.len()),
            ("outcome", outcome.len()),
            ("predicted outcome", predicted.len()),
        ] {
            if len != nodes.len() {
                return Err(BotliftError::shape_mismatch(name, nodes.len(), len));
            }
        }

        let mut split = Self {
            treated: Vec::new(),
            control: Vec::new(),
            true_treated: Vec::new(),
            true_control: Vec::new(),
            pred_treated: Vec::new(),
            pred_control: Vec::new(),
        };
        for (i, &node) in nodes.iter().enumerate() {
            if treatment[i] == 1 {
                split.treated.push(node);
                split.true_treated.push(outcome[i]);
                split.pred_treated.push(predicted[i]);
            } else {
                split.control.push(node);
                split.true_control.push(outcome[i]);
                split.pred_control.push(predicted[i]);
            }
        }
        Ok(split)
    }

    /// Observed outcome rate of treated minus control units.
    ///
    /// # Errors
    ///
    /// [`BotliftError::NumericDegeneracy`] if either group is empty.
    pub fn observed_uplift(&self) -> Result<f64> {
        rate_difference(&self.true_treated, &self.true_control)
    }

    /// Predicted outcome rate of treated minus control units.
    pub fn predicted_uplift(&self) -> Result<f64> {
        rate_difference(&self.pred_treated, &self.pred_control)
    }
}

fn rate_difference(treated: &[u8], control: &[u8]) -> Result<f64> {
    if treated.is_empty() || control.is_empty() {
        return Err(BotliftError::NumericDegeneracy(format!(
            "empty treatment group (treated: {}, control: {})",
            treated.len(),
            control.len()
        )));
    }
    let rate = |v: &[u8]| v.iter().map(|&x| f64::from(x)).sum::<f64>() / v.len() as f64;
    Ok(rate(treated) - rate(control))
}

/// Scores a [`CounterfactualModel`] on a [`TreatmentSplit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CausalEffectEvaluator {
    pub tau_true: f64,
}

impl Default for CausalEffectEvaluator {
    fn default() -> Self {
        Self { tau_true: 1.0 }
    }
}

impl CausalEffectEvaluator {
    #[must_use]
    pub fn new(tau_true: f64) -> Self {
        Self { tau_true }
    }

    /// Query both potential outcomes of every unit and compute the metrics.
    ///
    /// # Errors
    ///
    /// [`BotliftError::CounterfactualUnavailable`] if the model does not
    /// support counterfactual prediction; otherwise whatever the model or
    /// [`evaluate_metric`] report.
    pub fn evaluate_model<M: CounterfactualModel + ?Sized>(
        &self,
        model: &M,
        split: &TreatmentSplit,
    ) -> Result<CausalMetrics> {
        if !model.supports_counterfactuals() {
            return Err(BotliftError::CounterfactualUnavailable(
                "model cannot predict outcomes under a hypothetical treatment".to_string(),
            ));
        }

        let potential = |nodes: &[usize], t: u8| -> Result<Vec<f32>> {
            nodes
                .iter()
                .map(|&node| model.predict_under_treatment(node, t))
                .collect()
        };

        let pred_0 = potential(&split.treated, 0)?;
        let pred_1 = potential(&split.treated, 1)?;
        let pred_c0 = potential(&split.control, 0)?;
        let pred_c1 = potential(&split.control, 1)?;

        evaluate_metric(&pred_0, &pred_1, &pred_c0, &pred_c1, self.tau_true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Outcome = base[node] + effect · treatment.
    struct Oracle {
        base: Vec<f32>,
        effect: f32,
    }

    impl CounterfactualModel for Oracle {
        fn supports_counterfactuals(&self) -> bool {
            true
        }

        fn predict_under_treatment(&self, node: usize, t: u8) -> Result<f32> {
            Ok(self.base[node] + self.effect * f32::from(t))
        }
    }

    struct Factual;

    impl CounterfactualModel for Factual {
        fn supports_counterfactuals(&self) -> bool {
            false
        }

        fn predict_under_treatment(&self, _: usize, _: u8) -> Result<f32> {
            Err(BotliftError::CounterfactualUnavailable("factual".into()))
        }
    }

    fn split() -> TreatmentSplit {
        TreatmentSplit::new(&[0, 1, 2, 3], &[1, 0, 1, 0], &[1, 0, 0, 0], &[1, 1, 0, 0]).unwrap()
    }

    #[test]
    fn test_perfect_prediction_has_zero_error() {
        let m = evaluate_metric(&[0.0], &[1.0], &[0.0], &[1.0], 1.0).unwrap();
        assert_eq!(m, CausalMetrics { e_ate: 0.0, e_pehe: 0.0 });
    }

    #[test]
    fn test_metric_values() {
        // tau_pred = [2, 0]: mean 1 (eATE 0), squared errors [1, 1] (ePEHE 1)
        let m = evaluate_metric(&[0.0], &[2.0], &[1.0], &[1.0], 1.0).unwrap();
        assert!(m.e_ate.abs() < 1e-12);
        assert!((m.e_pehe - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_metric_length_mismatch() {
        let err = evaluate_metric(&[0.0, 1.0], &[1.0], &[], &[], 1.0).unwrap_err();
        assert!(matches!(err, BotliftError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_metric_empty_is_degenerate() {
        let err = evaluate_metric(&[], &[], &[], &[], 1.0).unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_treatment_split_partitions() {
        let s = split();
        assert_eq!(s.treated, vec![0, 2]);
        assert_eq!(s.control, vec![1, 3]);
        assert_eq!(s.true_treated, vec![1, 0]);
        assert_eq!(s.pred_control, vec![1, 0]);
        assert!((s.observed_uplift().unwrap() - 0.5).abs() < 1e-12);
        assert!((s.predicted_uplift().unwrap() - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_uplift_empty_group_is_degenerate() {
        let s = TreatmentSplit::new(&[0, 1], &[1, 1], &[0, 1], &[0, 0]).unwrap();
        assert!(s.observed_uplift().unwrap_err().is_degenerate());
    }

    #[test]
    fn test_evaluator_with_oracle() {
        let oracle = Oracle {
            base: vec![0.1, 0.2, 0.3, 0.4],
            effect: 1.0,
        };
        let m = CausalEffectEvaluator::default()
            .evaluate_model(&oracle, &split())
            .unwrap();
        assert!(m.e_ate < 1e-6);
        assert!(m.e_pehe < 1e-6);
    }

    #[test]
    fn test_evaluator_refuses_factual_model() {
        let err = CausalEffectEvaluator::new(1.0)
            .evaluate_model(&Factual, &split())
            .unwrap_err();
        assert!(matches!(err, BotliftError::CounterfactualUnavailable(_)));
    }
}
