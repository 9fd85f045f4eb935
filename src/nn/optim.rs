//! Gradient-based optimizers.
//!
//! Optimizers read the gradients the last backward pass left on the
//! computation graph ([`crate::autograd::get_grad`]) and update parameter
//! data in place, so parameter identities survive across steps.
//!
//! # Example
//!
//! ```
//! use botlift::autograd::{clear_graph, Tensor};
//! use botlift::nn::{Adam, Optimizer};
//!
//! let mut w = Tensor::from_slice(&[1.0, -1.0]).requires_grad();
//! let mut adam = Adam::new(0.1);
//!
//! clear_graph();
//! w.mul(&w).sum().backward();
//! adam.step_with_params(&mut [&mut w]);
//!
//! assert!(w.data()[0] < 1.0);
//! assert!(w.data()[1] > -1.0);
//! ```
//!
//! # References
//!
//! - Kingma, D. P., & Ba, J. (2015). Adam: A method for stochastic optimization. ICLR.

use crate::autograd::{clear_grad, get_grad, Tensor};

/// Common trait for optimizers.
pub trait Optimizer {
    /// One update of `params` from their current gradients. Parameters
    /// without a gradient are left untouched.
    fn step_with_params(&mut self, params: &mut [&mut Tensor]);

    /// Drop the stored gradients of `params`.
    fn zero_grad(&mut self, params: &[&Tensor]) {
        for param in params {
            clear_grad(param.id());
        }
    }

    /// Current learning rate.
    fn lr(&self) -> f32;
}

/// Adam optimizer (Kingma & Ba, 2015).
///
/// ```text
/// m_t = β₁ m_{t-1} + (1 - β₁) g
/// v_t = β₂ v_{t-1} + (1 - β₂) g²
/// θ  -= lr · m̂_t / (√v̂_t + ε)
/// ```
///
/// Moment state is kept per parameter position, so callers must pass the
/// parameters in the same order on every step.
#[derive(Debug)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    /// First moment estimates
    m: Vec<Vec<f32>>,
    /// Second moment estimates
    v: Vec<Vec<f32>>,
    /// Current timestep for bias correction
    t: usize,
}

impl Adam {
    /// Adam with β₁=0.9, β₂=0.999, ε=1e-8.
    #[must_use]
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    /// Number of steps taken.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.t
    }

    fn update_param(&mut self, param: &mut Tensor, idx: usize) {
        let Some(grad) = get_grad(param.id()) else {
            return;
        };

        let grad_data = grad.data();
        let param_data = param.data_mut();

        if idx >= self.m.len() {
            self.m.resize(idx + 1, Vec::new());
            self.v.resize(idx + 1, Vec::new());
        }
        if self.m[idx].len() != param_data.len() {
            self.m[idx] = vec![0.0; param_data.len()];
            self.v[idx] = vec![0.0; param_data.len()];
        }

        let m = &mut self.m[idx];
        let v = &mut self.v[idx];

        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        for (i, p) in param_data.iter_mut().enumerate() {
            let g = grad_data[i];
            m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
            v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;

            let m_hat = m[i] / bias_correction1;
            let v_hat = v[i] / bias_correction2;
            *p -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
        }
    }
}

impl Optimizer for Adam {
    fn step_with_params(&mut self, params: &mut [&mut Tensor]) {
        self.t += 1;
        for (idx, param) in params.iter_mut().enumerate() {
            self.update_param(param, idx);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::clear_graph;

    #[test]
    fn test_adam_first_step_moves_by_lr() {
        // With bias correction the first Adam step is ±lr per element.
        clear_graph();
        let mut w = Tensor::from_slice(&[2.0, -3.0]).requires_grad();
        let mut adam = Adam::new(0.01);
        w.mul(&w).sum().backward();
        adam.step_with_params(&mut [&mut w]);

        assert!((w.data()[0] - 1.99).abs() < 1e-5);
        assert!((w.data()[1] + 2.99).abs() < 1e-5);
        assert_eq!(adam.steps(), 1);
    }

    #[test]
    fn test_adam_skips_params_without_grad() {
        clear_graph();
        let mut w = Tensor::from_slice(&[1.0]).requires_grad();
        let mut adam = Adam::new(0.1);
        adam.step_with_params(&mut [&mut w]);
        assert_eq!(w.data(), &[1.0]);
    }

    #[test]
    fn test_adam_minimizes_quadratic() {
        let mut w = Tensor::from_slice(&[5.0]).requires_grad();
        let mut adam = Adam::new(0.1);
        for _ in 0..300 {
            clear_graph();
            w.mul(&w).sum().backward();
            adam.step_with_params(&mut [&mut w]);
        }
        assert!(w.data()[0].abs() < 0.5, "w = {}", w.data()[0]);
    }

    #[test]
    fn test_zero_grad_clears() {
        clear_graph();
        let mut w = Tensor::from_slice(&[1.0]).requires_grad();
        w.mul_scalar(2.0).sum().backward();
        let mut adam = Adam::new(0.1);
        adam.zero_grad(&[&w]);
        adam.step_with_params(&mut [&mut w]);
        assert_eq!(w.data(), &[1.0]);
    }

    #[test]
    fn test_lr_and_step_count() {
        clear_graph();
        let mut w = Tensor::from_slice(&[1.0]).requires_grad();
        w.mul_scalar(2.0).sum().backward();
        let mut adam = Adam::new(0.01);
        assert!((adam.lr() - 0.01).abs() < f32::EPSILON);
        adam.step_with_params(&mut [&mut w]);
        assert_eq!(adam.steps(), 1);
    }
}
