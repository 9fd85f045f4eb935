//! Dropout regularization.
//!
//! # Reference
//!
//! - Srivastava, N., et al. (2014). Dropout: A simple way to prevent neural
//!   networks from overfitting. JMLR.

use super::module::Module;
use crate::autograd::Tensor;
use crate::error::{BotliftError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Inverted dropout.
///
/// During training each element is zeroed with probability `p` and the
/// survivors are scaled by `1/(1-p)`. The mask is applied as a constant
/// multiplication, so gradients flow through the kept elements. In
/// evaluation mode the input is returned unchanged, which makes eval
/// forwards deterministic.
///
/// # Example
///
/// ```
/// use botlift::autograd::Tensor;
/// use botlift::nn::{Dropout, Module};
///
/// let mut dropout = Dropout::with_seed(0.5, 101).unwrap();
/// let x = Tensor::ones(&[4, 4]);
///
/// dropout.eval();
/// assert_eq!(dropout.forward(&x).data(), x.data());
/// ```
pub struct Dropout {
    p: f32,
    training: bool,
    rng: Mutex<StdRng>,
}

impl Dropout {
    /// Dropout with probability `p` in `[0, 1)`, drawing masks from `rng`.
    pub fn new(p: f32, rng: StdRng) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(BotliftError::invalid_config(
                "dropout",
                p,
                "probability in [0, 1)",
            ));
        }

        Ok(Self {
            p,
            training: true,
            rng: Mutex::new(rng),
        })
    }

    /// Dropout with a mask RNG seeded from `seed`.
    pub fn with_seed(p: f32, seed: u64) -> Result<Self> {
        Self::new(p, StdRng::seed_from_u64(seed))
    }

    /// The dropout probability.
    #[must_use]
    pub fn probability(&self) -> f32 {
        self.p
    }

    /// Apply dropout (training mode) or pass through (eval mode).
    #[must_use]
    pub fn forward(&self, input: &Tensor) -> Tensor {
        if !self.training || self.p == 0.0 {
            return input.clone();
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let scale = 1.0 / (1.0 - self.p);
        let mask: Vec<f32> = (0..input.numel())
            .map(|_| if rng.gen::<f32>() < self.p { 0.0 } else { scale })
            .collect();

        input.mul(&Tensor::from_vec(mask, input.shape()))
    }
}

impl Module for Dropout {
    fn train(&mut self) {
        self.training = true;
    }

    fn eval(&mut self) {
        self.training = false;
    }

    fn training(&self) -> bool {
        self.training
    }
}

impl std::fmt::Debug for Dropout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dropout")
            .field("p", &self.p)
            .field("training", &self.training)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{clear_graph, get_grad};

    #[test]
    fn test_dropout_eval_is_identity() {
        let mut dropout = Dropout::with_seed(0.5, 1).unwrap();
        dropout.eval();
        assert!(!dropout.training());
        let x = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
        assert_eq!(dropout.forward(&x).data(), x.data());
        assert_eq!(dropout.forward(&x).data(), dropout.forward(&x).data());
    }

    #[test]
    fn test_dropout_train_zeroes_and_scales() {
        let dropout = Dropout::with_seed(0.5, 42).unwrap();
        let x = Tensor::ones(&[1000]);
        let y = dropout.forward(&x);

        let zeros = y.data().iter().filter(|&&v| v == 0.0).count();
        assert!(zeros > 350 && zeros < 650, "zeroed {zeros} of 1000");
        assert!(y
            .data()
            .iter()
            .all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_dropout_gradient_flows_through_kept_elements() {
        clear_graph();
        let dropout = Dropout::with_seed(0.5, 3).unwrap();
        let x = Tensor::ones(&[64]).requires_grad();
        let y = dropout.forward(&x);
        y.sum().backward();

        let grad = get_grad(x.id()).unwrap();
        for (g, v) in grad.data().iter().zip(y.data()) {
            assert!((g - v).abs() < 1e-6);
        }
    }

    #[test]
    fn test_dropout_zero_probability() {
        let dropout = Dropout::with_seed(0.0, 1).unwrap();
        let x = Tensor::from_slice(&[1.0, 2.0]);
        assert_eq!(dropout.forward(&x).data(), x.data());
    }

    #[test]
    fn test_dropout_rejects_bad_probability() {
        assert!(Dropout::with_seed(1.0, 1).is_err());
        assert!(Dropout::with_seed(-0.1, 1).is_err());
    }

    #[test]
    fn test_dropout_same_seed_same_mask() {
        let a = Dropout::with_seed(0.5, 9).unwrap();
        let b = Dropout::with_seed(0.5, 9).unwrap();
        let x = Tensor::ones(&[32]);
        assert_eq!(a.forward(&x).data(), b.forward(&x).data());
    }
}
