//! Classification reports for binary predictions.
//!
//! [`classification_report`] computes per-class precision, recall, F1 and
//! support over the classes present in either the labels or the
//! predictions, plus accuracy, macro and support-weighted averages and the
//! confusion counts of the positive class. A class with no predicted (or
//! no true) members gets precision (or recall) 0.
//!
//! # Examples
//!
//! ```
//! use botlift::metrics::classification_report;
//!
//! let y_true = [0, 0, 1, 1];
//! let y_pred = [0, 1, 1, 1];
//! let report = classification_report(&y_true, &y_pred).unwrap();
//!
//! assert_eq!(report.accuracy, 0.75);
//! assert_eq!(report.confusion.true_positives, 2);
//! println!("{report}");
//! ```

use std::fmt;

use serde::Serialize;

use crate::error::{BotliftError, Result};

/// Metrics of a single class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Unweighted or support-weighted mean over classes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Confusion counts with label 1 as the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConfusionCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

/// Per-class and aggregate metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    /// Sorted by label.
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    pub support: usize,
    pub confusion: ConfusionCounts,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Build a report from aligned binary labels and predictions.
///
/// # Errors
///
/// - [`BotliftError::ShapeMismatch`] if the slices differ in length
/// - [`BotliftError::DataIntegrity`] if they are empty
pub fn classification_report(y_true: &[u8], y_pred: &[u8]) -> Result<ClassificationReport> {
    if y_true.len() != y_pred.len() {
        return Err(BotliftError::shape_mismatch(
            "classification report predictions",
            y_true.len(),
            y_pred.len(),
        ));
    }
    if y_true.is_empty() {
        return Err(BotliftError::DataIntegrity(
            "classification report over zero samples".to_string(),
        ));
    }

    let mut labels: Vec<u8> = y_true.iter().chain(y_pred).copied().collect();
    labels.sort_unstable();
    labels.dedup();

    let classes: Vec<ClassMetrics> = labels
        .iter()
        .map(|&label| {
            let mut tp = 0;
            let mut predicted = 0;
            let mut support = 0;
            for (&t, &p) in y_true.iter().zip(y_pred) {
                if p == label {
                    predicted += 1;
                }
                if t == label {
                    support += 1;
                    if p == label {
                        tp += 1;
                    }
                }
            }
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            ClassMetrics {
                label,
                precision,
                recall,
                f1: f1(precision, recall),
                support,
            }
        })
        .collect();

    let n = y_true.len();
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();

    let k = classes.len() as f64;
    let macro_avg = AverageMetrics {
        precision: classes.iter().map(|c| c.precision).sum::<f64>() / k,
        recall: classes.iter().map(|c| c.recall).sum::<f64>() / k,
        f1: classes.iter().map(|c| c.f1).sum::<f64>() / k,
    };
    let weight = |c: &ClassMetrics| c.support as f64 / n as f64;
    let weighted_avg = AverageMetrics {
        precision: classes.iter().map(|c| c.precision * weight(c)).sum(),
        recall: classes.iter().map(|c| c.recall * weight(c)).sum(),
        f1: classes.iter().map(|c| c.f1 * weight(c)).sum(),
    };

    let mut confusion = ConfusionCounts::default();
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t == 1, p == 1) {
            (true, true) => confusion.true_positives += 1,
            (false, true) => confusion.false_positives += 1,
            (false, false) => confusion.true_negatives += 1,
            (true, false) => confusion.false_negatives += 1,
        }
    }

    Ok(ClassificationReport {
        classes,
        accuracy: ratio(correct, n),
        macro_avg,
        weighted_avg,
        support: n,
        confusion,
    })
}

impl ClassificationReport {
    /// Metrics of `label`, if it occurred.
    #[must_use]
    pub fn class(&self, label: u8) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }
}

impl fmt::Display for ClassificationReport {
    /// Plain-text table in the familiar scikit-learn layout.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const W: usize = 12;
        writeln!(
            f,
            "{:>W$}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>W$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>W$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.support
        )?;
        for (name, avg) in [
            ("macro avg", &self.macro_avg),
            ("weighted avg", &self.weighted_avg),
        ] {
            writeln!(
                f,
                "{:>W$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1, self.support
            )?;
        }
        Ok(())
    }
}
