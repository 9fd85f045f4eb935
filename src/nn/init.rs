//! Weight initialization functions.
//!
//! All randomness is drawn from a caller-supplied [`StdRng`], so a model
//! built from one seed is reproducible without touching any global state.
//!
//! # References
//!
//! - Glorot, X., & Bengio, Y. (2010). Understanding the difficulty of training
//!   deep feedforward neural networks. AISTATS.

use crate::autograd::Tensor;
use rand::rngs::StdRng;
use rand::Rng;

/// Xavier uniform initialization (Glorot & Bengio, 2010).
///
/// Samples from U(-a, a) where a = sqrt(6 / (`fan_in` + `fan_out`)).
///
/// # Example
///
/// ```
/// use botlift::nn::xavier_uniform;
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let mut rng = StdRng::seed_from_u64(101);
/// let weight = xavier_uniform(&[1, 16], 1, 16, &mut rng);
/// let a = (6.0_f32 / 17.0).sqrt();
/// assert!(weight.data().iter().all(|w| w.abs() <= a));
/// ```
#[must_use]
pub fn xavier_uniform(shape: &[usize], fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Tensor {
    let a = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
    uniform(shape, -a, a, rng)
}

/// Samples from U(low, high).
pub(crate) fn uniform(shape: &[usize], low: f32, high: f32, rng: &mut StdRng) -> Tensor {
    let numel: usize = shape.iter().product();
    let data: Vec<f32> = (0..numel).map(|_| rng.gen_range(low..=high)).collect();
    Tensor::from_vec(data, shape)
}

/// Zeros initialization (biases).
#[must_use]
pub fn zeros(shape: &[usize]) -> Tensor {
    Tensor::zeros(shape)
}
