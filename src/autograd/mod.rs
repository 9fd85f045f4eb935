//! Reverse-mode automatic differentiation for the scoring networks.
//!
//! A define-by-run tape: every differentiable op on a [`Tensor`] that
//! requires gradients records a [`GradFn`] on the thread-local
//! [`ComputationGraph`]; [`Tensor::backward`] replays the tape in reverse
//! and stores gradients on the registered leaf tensors, where the optimizer
//! picks them up through [`get_grad`].
//!
//! The op set is exactly what the dual-score GCN and the deviation loss
//! need: element-wise arithmetic, reductions, ReLU/sigmoid, dense matmul,
//! bias broadcast, index gathering and sparse graph propagation.
//!
//! # Example
//!
//! ```
//! use botlift::autograd::{clear_graph, get_grad, Tensor};
//!
//! clear_graph();
//! let w = Tensor::from_slice(&[1.0, 2.0, 3.0]).requires_grad();
//! let loss = w.mul(&w).sum();
//! loss.backward();
//!
//! let grad = get_grad(w.id()).unwrap();
//! assert_eq!(grad.data(), &[2.0, 4.0, 6.0]);
//! ```
//!
//! # References
//!
//! - Baydin, A. G., et al. (2018). Automatic differentiation in machine learning: a survey. JMLR.
//! - Griewank, A., & Walther, A. (2008). Evaluating derivatives. SIAM.

pub(crate) mod grad_fn;
mod graph;
mod ops;
mod tensor;

pub use grad_fn::GradFn;
pub use graph::ComputationGraph;
pub use tensor::{Tensor, TensorId};

use std::cell::{Cell, RefCell};

thread_local! {
    /// Computation graph for the current thread.
    static GRAPH: RefCell<ComputationGraph> = RefCell::new(ComputationGraph::new());

    /// Gradient tracking switch (off inside [`no_grad`]).
    static GRAD_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Restores the previous gradient-tracking flag on drop, so an unwinding
/// closure cannot leave tracking disabled.
struct GradModeGuard {
    prev: bool,
}

impl Drop for GradModeGuard {
    fn drop(&mut self) {
        GRAD_ENABLED.with(|enabled| enabled.set(self.prev));
    }
}

/// Execute a closure without gradient tracking.
///
/// Used for evaluation passes: nothing is recorded on the tape and results
/// never require gradients.
pub fn no_grad<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = GRAD_ENABLED.with(|enabled| {
        let prev = enabled.get();
        enabled.set(false);
        GradModeGuard { prev }
    });
    f()
}

/// Check if gradient tracking is currently enabled.
#[must_use]
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(Cell::get)
}

pub(crate) fn with_graph<F, R>(f: F) -> R
where
    F: FnOnce(&mut ComputationGraph) -> R,
{
    GRAPH.with(|graph| f(&mut graph.borrow_mut()))
}

/// Drop every recorded op and stored gradient on this thread.
pub fn clear_graph() {
    GRAPH.with(|graph| graph.borrow_mut().clear());
}

/// Gradient of a registered tensor after a backward pass.
#[must_use]
pub fn get_grad(id: TensorId) -> Option<Tensor> {
    with_graph(|graph| graph.get_grad(id))
}

/// Clear the stored gradient of a single tensor.
pub fn clear_grad(id: TensorId) {
    with_graph(|graph| graph.clear_grad(id));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_grad_context() {
        assert!(is_grad_enabled());
        no_grad(|| assert!(!is_grad_enabled()));
        assert!(is_grad_enabled());
    }

    #[test]
    fn test_nested_no_grad() {
        no_grad(|| {
            no_grad(|| assert!(!is_grad_enabled()));
            assert!(!is_grad_enabled());
        });
        assert!(is_grad_enabled());
    }

    #[test]
    fn test_no_grad_restores_after_panic() {
        let result = std::panic::catch_unwind(|| {
            no_grad(|| panic!("boom"));
        });
        assert!(result.is_err());
        assert!(is_grad_enabled());
    }

    #[test]
    fn test_no_grad_records_nothing() {
        clear_graph();
        let w = Tensor::from_slice(&[1.0, 2.0]).requires_grad();
        let y = no_grad(|| w.mul_scalar(3.0).sum());
        assert!(!y.requires_grad_enabled());
        assert!(with_graph(|g| g.is_empty()));
    }
}
