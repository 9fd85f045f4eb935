//! Error types for botlift operations.
//!
//! Every failure in the pipeline is fatal for the run. Errors are grouped
//! into a small number of categories so callers (and the CLI exit code) can
//! tell bad input apart from numeric degeneracy or misconfiguration.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BotliftError>;

/// Main error type for botlift operations.
///
/// # Examples
///
/// ```
/// use botlift::error::{BotliftError, ErrorCategory};
///
/// let err = BotliftError::ShapeMismatch {
///     context: "deviation loss".to_string(),
///     expected: 10,
///     actual: 8,
/// };
/// assert_eq!(err.category(), ErrorCategory::DataIntegrity);
/// assert!(err.to_string().contains("shape mismatch"));
/// ```
#[derive(Error, Debug)]
pub enum BotliftError {
    /// Two sequences that must be aligned have different lengths.
    #[error("{context}: shape mismatch, expected length {expected}, got {actual}")]
    ShapeMismatch {
        /// Where the mismatch was detected
        context: String,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Malformed input arrays (out-of-range node index, non-binary label, ...).
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    /// A computation hit a degenerate numeric case (zero variance, empty partition).
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {param} = {value}, expected {constraint}")]
    InvalidConfig {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// The model cannot produce outcomes under a hypothetical treatment.
    #[error("counterfactual predictions unavailable: {0}")]
    CounterfactualUnavailable(String),

    /// I/O error while reading snapshots or configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON snapshot.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed TOML configuration.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Coarse classification of [`BotliftError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or mismatched input arrays.
    DataIntegrity,
    /// Zero variance, empty partitions, NaN scores.
    NumericDegeneracy,
    /// Invalid quantile, non-disjoint masks, bad hyperparameters.
    Configuration,
    /// Capability not provided by the model.
    Unsupported,
    /// File system failures.
    Io,
}

impl ErrorCategory {
    /// Process exit code of the category.
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Self::DataIntegrity => 3,
            Self::NumericDegeneracy => 4,
            Self::Configuration => 5,
            Self::Unsupported => 6,
            Self::Io => 7,
        }
    }
}

impl BotliftError {
    /// Shorthand for [`BotliftError::InvalidConfig`].
    pub fn invalid_config(
        param: impl Into<String>,
        value: impl ToString,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            param: param.into(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    /// Shorthand for [`BotliftError::ShapeMismatch`].
    pub fn shape_mismatch(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ShapeMismatch { .. } | Self::DataIntegrity(_) | Self::Json(_) => {
                ErrorCategory::DataIntegrity
            }
            Self::NumericDegeneracy(_) => ErrorCategory::NumericDegeneracy,
            Self::InvalidConfig { .. } | Self::Toml(_) => ErrorCategory::Configuration,
            Self::CounterfactualUnavailable(_) => ErrorCategory::Unsupported,
            Self::Io(_) => ErrorCategory::Io,
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.category().exit_code()
    }

    /// Whether this error reports a numeric degeneracy.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.category() == ErrorCategory::NumericDegeneracy
    }
}
