//! Differentiable operations for tensors.
//!
//! Each operation:
//! 1. Computes the forward result
//! 2. Records a `GradFn` to the computation graph (if gradient tracking is enabled)
//!
//! Shape preconditions are asserted: callers validate user data before it
//! reaches the tensor layer, so a mismatch here is a programming error.

use std::sync::Arc;

use super::grad_fn::{
    as_matrix, AddBackward, BroadcastAddBackward, DivBackward, ExpandBackward, GatherBackward,
    GradFn, MatmulBackward, MeanBackward, MulBackward, NegBackward, PowBackward, ReluBackward,
    ScaleBackward, ShiftBackward, SigmoidBackward, SqrtBackward, SubBackward, SumBackward,
    ViewBackward,
};
use super::tensor::Tensor;
use super::{is_grad_enabled, with_graph};

impl Tensor {
    /// Attach `grad_fn` to `self` and record it on the tape with `inputs`,
    /// provided tracking is on and at least one input requires gradients.
    ///
    /// Ops defined outside this module (graph propagation) use this to join
    /// the tape.
    pub(crate) fn record_op(&mut self, grad_fn: Arc<dyn GradFn>, inputs: &[&Tensor]) {
        if !is_grad_enabled() || !inputs.iter().any(|t| t.requires_grad_enabled()) {
            return;
        }

        self.requires_grad_(true);
        self.set_grad_fn(grad_fn.clone());
        let output_id = self.id();
        with_graph(|graph| {
            for input in inputs {
                graph.register_tensor((*input).clone());
            }
            graph.record(output_id, grad_fn, inputs.iter().map(|t| t.id()).collect());
        });
    }

    fn assert_same_shape(&self, other: &Tensor, op: &str) {
        assert_eq!(
            self.shape(),
            other.shape(),
            "{op}: shape mismatch {:?} vs {:?}",
            self.shape(),
            other.shape()
        );
    }

    fn zip_with(&self, other: &Tensor, f: impl Fn(f32, f32) -> f32) -> Tensor {
        let data: Vec<f32> = self
            .data()
            .iter()
            .zip(other.data())
            .map(|(&a, &b)| f(a, b))
            .collect();
        Tensor::from_vec(data, self.shape())
    }

    fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        let data: Vec<f32> = self.data().iter().map(|&a| f(a)).collect();
        Tensor::from_vec(data, self.shape())
    }
}

// ============================================================================
// Element-wise Operations
// ============================================================================

impl Tensor {
    /// Element-wise addition: z = self + other
    #[must_use]
    pub fn add(&self, other: &Tensor) -> Tensor {
        self.assert_same_shape(other, "add");
        let mut result = self.zip_with(other, |a, b| a + b);
        result.record_op(Arc::new(AddBackward), &[self, other]);
        result
    }

    /// Element-wise subtraction: z = self - other
    #[must_use]
    pub fn sub(&self, other: &Tensor) -> Tensor {
        self.assert_same_shape(other, "sub");
        let mut result = self.zip_with(other, |a, b| a - b);
        result.record_op(Arc::new(SubBackward), &[self, other]);
        result
    }

    /// Element-wise multiplication: z = self * other
    #[must_use]
    pub fn mul(&self, other: &Tensor) -> Tensor {
        self.assert_same_shape(other, "mul");
        let mut result = self.zip_with(other, |a, b| a * b);
        result.record_op(
            Arc::new(MulBackward {
                x: self.detach(),
                y: other.detach(),
            }),
            &[self, other],
        );
        result
    }

    /// Element-wise division: z = self / other
    #[must_use]
    pub fn div(&self, other: &Tensor) -> Tensor {
        self.assert_same_shape(other, "div");
        let mut result = self.zip_with(other, |a, b| a / b);
        result.record_op(
            Arc::new(DivBackward {
                x: self.detach(),
                y: other.detach(),
            }),
            &[self, other],
        );
        result
    }

    /// Element-wise negation: z = -self
    #[must_use]
    pub fn neg(&self) -> Tensor {
        let mut result = self.map(|a| -a);
        result.record_op(Arc::new(NegBackward), &[self]);
        result
    }

    /// Scalar multiplication: z = self * scalar
    #[must_use]
    pub fn mul_scalar(&self, scalar: f32) -> Tensor {
        let mut result = self.map(|a| a * scalar);
        result.record_op(Arc::new(ScaleBackward { scale: scalar }), &[self]);
        result
    }

    /// Scalar addition: z = self + scalar
    #[must_use]
    pub fn add_scalar(&self, scalar: f32) -> Tensor {
        let mut result = self.map(|a| a + scalar);
        result.record_op(Arc::new(ShiftBackward), &[self]);
        result
    }
}

// ============================================================================
// Transcendental Operations
// ============================================================================

impl Tensor {
    /// Element-wise power: z = self^n
    #[must_use]
    pub fn pow(&self, n: f32) -> Tensor {
        let mut result = self.map(|a| a.powf(n));
        result.record_op(Arc::new(PowBackward { x: self.detach(), n }), &[self]);
        result
    }

    /// Element-wise square root: z = sqrt(self)
    #[must_use]
    pub fn sqrt(&self) -> Tensor {
        let mut result = self.map(f32::sqrt);
        let grad_fn = Arc::new(SqrtBackward {
            output: result.detach(),
        });
        result.record_op(grad_fn, &[self]);
        result
    }
}

// ============================================================================
// Reduction Operations
// ============================================================================

impl Tensor {
    /// Sum all elements: z = sum(self), shape `[1]`
    #[must_use]
    pub fn sum(&self) -> Tensor {
        let sum: f32 = self.data().iter().sum();
        let mut result = Tensor::from_vec(vec![sum], &[1]);
        result.record_op(
            Arc::new(SumBackward {
                input_shape: self.shape().to_vec(),
            }),
            &[self],
        );
        result
    }

    /// Mean of all elements: z = mean(self), shape `[1]`
    ///
    /// The mean of an empty tensor is NaN.
    #[must_use]
    pub fn mean(&self) -> Tensor {
        let sum: f32 = self.data().iter().sum();
        let mut result = Tensor::from_vec(vec![sum / self.numel() as f32], &[1]);
        result.record_op(
            Arc::new(MeanBackward {
                input_shape: self.shape().to_vec(),
            }),
            &[self],
        );
        result
    }
}

// ============================================================================
// Activation Functions
// ============================================================================

impl Tensor {
    /// `ReLU` activation: z = max(0, self)
    #[must_use]
    pub fn relu(&self) -> Tensor {
        let mut result = self.map(|a| a.max(0.0));
        result.record_op(Arc::new(ReluBackward { x: self.detach() }), &[self]);
        result
    }

    /// Sigmoid activation: z = 1 / (1 + exp(-self))
    #[must_use]
    pub fn sigmoid(&self) -> Tensor {
        let mut result = self.map(|a| 1.0 / (1.0 + (-a).exp()));
        let grad_fn = Arc::new(SigmoidBackward {
            output: result.detach(),
        });
        result.record_op(grad_fn, &[self]);
        result
    }
}

// ============================================================================
// Matrix and Shape Operations
// ============================================================================

impl Tensor {
    /// Matrix multiplication: `[m, k] @ [k, n] -> [m, n]`
    ///
    /// # Panics
    ///
    /// Panics if either operand is not 2-D or the inner dimensions differ.
    #[must_use]
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.ndim(), 2, "matmul: left operand must be 2-D");
        assert_eq!(other.ndim(), 2, "matmul: right operand must be 2-D");
        let (m, k) = (self.shape()[0], self.shape()[1]);
        let (k2, n) = (other.shape()[0], other.shape()[1]);
        assert_eq!(k, k2, "matmul: inner dimensions {k} and {k2} differ");

        let product = as_matrix(self, m, k).dot(&as_matrix(other, k, n));
        let mut result = Tensor::from_vec(product.iter().copied().collect(), &[m, n]);
        result.record_op(
            Arc::new(MatmulBackward {
                x: self.detach(),
                w: other.detach(),
            }),
            &[self, other],
        );
        result
    }

    /// Add a `[cols]` vector to every row of a `[rows, cols]` tensor.
    #[must_use]
    pub fn broadcast_add(&self, row: &Tensor) -> Tensor {
        assert_eq!(self.ndim(), 2, "broadcast_add: expected a 2-D tensor");
        let (rows, cols) = (self.shape()[0], self.shape()[1]);
        assert_eq!(row.shape(), &[cols], "broadcast_add: bias length mismatch");

        let mut data = self.data().to_vec();
        for chunk in data.chunks_mut(cols.max(1)) {
            for (v, &b) in chunk.iter_mut().zip(row.data()) {
                *v += b;
            }
        }
        let mut result = Tensor::from_vec(data, &[rows, cols]);
        result.record_op(Arc::new(BroadcastAddBackward { rows, cols }), &[self, row]);
        result
    }

    /// Reshape without copying semantics.
    ///
    /// # Panics
    ///
    /// Panics if the element count changes.
    #[must_use]
    pub fn view(&self, shape: &[usize]) -> Tensor {
        let mut result = Tensor::new(self.data(), shape);
        result.record_op(
            Arc::new(ViewBackward {
                input_shape: self.shape().to_vec(),
            }),
            &[self],
        );
        result
    }

    /// Collapse to 1-D.
    #[must_use]
    pub fn flatten(&self) -> Tensor {
        self.view(&[self.numel()])
    }

    /// Repeat a one-element tensor into a `[n]` tensor.
    #[must_use]
    pub fn expand(&self, n: usize) -> Tensor {
        let value = self.item();
        let mut result = Tensor::from_vec(vec![value; n], &[n]);
        result.record_op(Arc::new(ExpandBackward), &[self]);
        result
    }

    /// Select elements of a 1-D tensor by index: z_i = self[indices_i].
    ///
    /// # Panics
    ///
    /// Panics if an index is out of bounds.
    #[must_use]
    pub fn gather(&self, indices: &[usize]) -> Tensor {
        assert_eq!(self.ndim(), 1, "gather: expected a 1-D tensor");
        let src = self.data();
        let data: Vec<f32> = indices.iter().map(|&i| src[i]).collect();
        let mut result = Tensor::from_vec(data, &[indices.len()]);
        result.record_op(
            Arc::new(GatherBackward {
                indices: indices.to_vec(),
                input_len: self.numel(),
            }),
            &[self],
        );
        result
    }
}
