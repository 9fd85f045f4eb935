//! Gradient function trait and implementations.
//!
//! Each differentiable operation implements `GradFn` to define
//! how gradients flow backward through the operation.

use ndarray::ArrayView2;

use super::tensor::Tensor;

/// Trait for functions that compute gradients during backward pass.
///
/// Each differentiable operation creates a `GradFn` implementation
/// that captures the necessary context for gradient computation.
///
/// # Example Implementation
///
/// For element-wise addition z = x + y:
/// - ∂z/∂x = 1
/// - ∂z/∂y = 1
///
/// So `backward(grad_output)` returns [`grad_output`, `grad_output`].
pub trait GradFn: Send + Sync {
    /// Compute gradients with respect to inputs, in forward input order.
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor>;

    /// Human-readable name for debugging.
    fn name(&self) -> &'static str;
}

fn map_grad(grad_output: &Tensor, f: impl Fn(f32) -> f32) -> Tensor {
    let data: Vec<f32> = grad_output.data().iter().map(|&g| f(g)).collect();
    Tensor::from_vec(data, grad_output.shape())
}

fn zip_grad(grad_output: &Tensor, saved: &Tensor, f: impl Fn(f32, f32) -> f32) -> Tensor {
    let data: Vec<f32> = grad_output
        .data()
        .iter()
        .zip(saved.data())
        .map(|(&g, &s)| f(g, s))
        .collect();
    Tensor::from_vec(data, grad_output.shape())
}

// ============================================================================
// Element-wise Operations
// ============================================================================

/// Gradient function for addition: z = x + y
pub(crate) struct AddBackward;

impl GradFn for AddBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![grad_output.detach(), grad_output.detach()]
    }

    fn name(&self) -> &'static str {
        "AddBackward"
    }
}

/// Gradient function for subtraction: z = x - y
pub(crate) struct SubBackward;

impl GradFn for SubBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![grad_output.detach(), map_grad(grad_output, |g| -g)]
    }

    fn name(&self) -> &'static str {
        "SubBackward"
    }
}

/// Gradient function for multiplication: z = x * y
pub(crate) struct MulBackward {
    pub(crate) x: Tensor,
    pub(crate) y: Tensor,
}

impl GradFn for MulBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x*y)/∂x = y, ∂(x*y)/∂y = x
        vec![
            zip_grad(grad_output, &self.y, |g, y| g * y),
            zip_grad(grad_output, &self.x, |g, x| g * x),
        ]
    }

    fn name(&self) -> &'static str {
        "MulBackward"
    }
}

/// Gradient function for division: z = x / y
pub(crate) struct DivBackward {
    pub(crate) x: Tensor,
    pub(crate) y: Tensor,
}

impl GradFn for DivBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // ∂(x/y)/∂x = 1/y, ∂(x/y)/∂y = -x/y²
        let grad_x = zip_grad(grad_output, &self.y, |g, y| g / y);
        let grad_y_data: Vec<f32> = grad_output
            .data()
            .iter()
            .zip(self.x.data())
            .zip(self.y.data())
            .map(|((&g, &x), &y)| -g * x / (y * y))
            .collect();
        vec![grad_x, Tensor::from_vec(grad_y_data, grad_output.shape())]
    }

    fn name(&self) -> &'static str {
        "DivBackward"
    }
}

/// Gradient function for negation: z = -x
pub(crate) struct NegBackward;

impl GradFn for NegBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![map_grad(grad_output, |g| -g)]
    }

    fn name(&self) -> &'static str {
        "NegBackward"
    }
}

/// Gradient function for scaling by a constant: z = c * x
pub(crate) struct ScaleBackward {
    pub(crate) scale: f32,
}

impl GradFn for ScaleBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let scale = self.scale;
        vec![map_grad(grad_output, |g| g * scale)]
    }

    fn name(&self) -> &'static str {
        "ScaleBackward"
    }
}

/// Gradient function for shifting by a constant: z = x + c
pub(crate) struct ShiftBackward;

impl GradFn for ShiftBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![grad_output.detach()]
    }

    fn name(&self) -> &'static str {
        "ShiftBackward"
    }
}

// ============================================================================
// Transcendental Operations
// ============================================================================

/// Gradient function for pow: z = x^n
pub(crate) struct PowBackward {
    pub(crate) x: Tensor,
    pub(crate) n: f32,
}

impl GradFn for PowBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let n = self.n;
        vec![zip_grad(grad_output, &self.x, |g, x| g * n * x.powf(n - 1.0))]
    }

    fn name(&self) -> &'static str {
        "PowBackward"
    }
}

/// Gradient function for sqrt: z = sqrt(x)
pub(crate) struct SqrtBackward {
    pub(crate) output: Tensor,
}

impl GradFn for SqrtBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![zip_grad(grad_output, &self.output, |g, s| g * 0.5 / s)]
    }

    fn name(&self) -> &'static str {
        "SqrtBackward"
    }
}

// ============================================================================
// Reduction Operations
// ============================================================================

/// Gradient function for sum: z = sum(x)
pub(crate) struct SumBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for SumBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let g = grad_output.item();
        let numel: usize = self.input_shape.iter().product();
        vec![Tensor::from_vec(vec![g; numel], &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "SumBackward"
    }
}

/// Gradient function for mean: z = mean(x)
pub(crate) struct MeanBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for MeanBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let numel: usize = self.input_shape.iter().product();
        let g = grad_output.item() / numel as f32;
        vec![Tensor::from_vec(vec![g; numel], &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "MeanBackward"
    }
}

// ============================================================================
// Activation Functions
// ============================================================================

/// Gradient function for `ReLU`: z = max(0, x)
pub(crate) struct ReluBackward {
    pub(crate) x: Tensor,
}

impl GradFn for ReluBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![zip_grad(grad_output, &self.x, |g, x| if x > 0.0 { g } else { 0.0 })]
    }

    fn name(&self) -> &'static str {
        "ReluBackward"
    }
}

/// Gradient function for sigmoid: z = σ(x), ∂z/∂x = z(1 - z)
pub(crate) struct SigmoidBackward {
    pub(crate) output: Tensor,
}

impl GradFn for SigmoidBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![zip_grad(grad_output, &self.output, |g, s| g * s * (1.0 - s))]
    }

    fn name(&self) -> &'static str {
        "SigmoidBackward"
    }
}

// ============================================================================
// Matrix and Shape Operations
// ============================================================================

/// Gradient function for matmul: Z = X @ W with X `[m, k]`, W `[k, n]`.
///
/// ∂L/∂X = G @ Wᵀ, ∂L/∂W = Xᵀ @ G.
pub(crate) struct MatmulBackward {
    pub(crate) x: Tensor,
    pub(crate) w: Tensor,
}

impl GradFn for MatmulBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let (m, k) = (self.x.shape()[0], self.x.shape()[1]);
        let n = self.w.shape()[1];

        let g = as_matrix(grad_output, m, n);
        let x = as_matrix(&self.x, m, k);
        let w = as_matrix(&self.w, k, n);

        let grad_x = g.dot(&w.t());
        let grad_w = x.t().dot(&g);

        vec![
            Tensor::from_vec(grad_x.iter().copied().collect(), &[m, k]),
            Tensor::from_vec(grad_w.iter().copied().collect(), &[k, n]),
        ]
    }

    fn name(&self) -> &'static str {
        "MatmulBackward"
    }
}

/// Row-major view of a tensor's data as a matrix.
pub(crate) fn as_matrix(t: &Tensor, rows: usize, cols: usize) -> ArrayView2<'_, f32> {
    // Tensor::from_vec guarantees rows * cols == data.len() for every 2-D tensor
    // built by this module.
    ArrayView2::from_shape((rows, cols), t.data())
        .unwrap_or_else(|e| panic!("tensor of shape {:?} is not {rows}x{cols}: {e}", t.shape()))
}

/// Gradient function for adding a row vector to every row: Z = X + b.
pub(crate) struct BroadcastAddBackward {
    pub(crate) rows: usize,
    pub(crate) cols: usize,
}

impl GradFn for BroadcastAddBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let mut grad_b = vec![0.0; self.cols];
        for row in grad_output.data().chunks(self.cols) {
            for (acc, &g) in grad_b.iter_mut().zip(row) {
                *acc += g;
            }
        }
        debug_assert_eq!(grad_output.numel(), self.rows * self.cols);
        vec![grad_output.detach(), Tensor::from_vec(grad_b, &[self.cols])]
    }

    fn name(&self) -> &'static str {
        "BroadcastAddBackward"
    }
}

/// Gradient function for reshape: the data layout is unchanged.
pub(crate) struct ViewBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for ViewBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        vec![Tensor::new(grad_output.data(), &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "ViewBackward"
    }
}

/// Gradient function for repeating a one-element tensor `n` times.
pub(crate) struct ExpandBackward;

impl GradFn for ExpandBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let total: f32 = grad_output.data().iter().sum();
        vec![Tensor::from_slice(&[total])]
    }

    fn name(&self) -> &'static str {
        "ExpandBackward"
    }
}

/// Gradient function for index selection on a 1-D tensor: z_i = x[idx_i].
///
/// Repeated indices accumulate.
pub(crate) struct GatherBackward {
    pub(crate) indices: Vec<usize>,
    pub(crate) input_len: usize,
}

impl GradFn for GatherBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let mut grad = vec![0.0; self.input_len];
        for (&idx, &g) in self.indices.iter().zip(grad_output.data()) {
            grad[idx] += g;
        }
        vec![Tensor::from_vec(grad, &[self.input_len])]
    }

    fn name(&self) -> &'static str {
        "GatherBackward"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matmul_backward_shapes() {
        let x = Tensor::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let w = Tensor::new(&[1.0, 0.0, 0.0, 1.0, 1.0, 1.0], &[3, 2]);
        let grads = MatmulBackward { x, w }.backward(&Tensor::ones(&[2, 2]));
        assert_eq!(grads[0].shape(), &[2, 3]);
        assert_eq!(grads[1].shape(), &[3, 2]);
        // G @ Wᵀ with G = ones: row sums of W
        assert_eq!(grads[0].data(), &[1.0, 1.0, 2.0, 1.0, 1.0, 2.0]);
        // Xᵀ @ G: column sums of X repeated
        assert_eq!(grads[1].data(), &[5.0, 5.0, 7.0, 7.0, 9.0, 9.0]);
    }

    #[test]
    fn test_broadcast_add_backward_sums_rows() {
        let f = BroadcastAddBackward { rows: 3, cols: 2 };
        let g = Tensor::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2]);
        let grads = f.backward(&g);
        assert_eq!(grads[1].data(), &[9.0, 12.0]);
    }

    #[test]
    fn test_gather_backward_accumulates_duplicates() {
        let f = GatherBackward {
            indices: vec![2, 0, 2],
            input_len: 4,
        };
        let grads = f.backward(&Tensor::from_slice(&[1.0, 2.0, 3.0]));
        assert_eq!(grads[0].data(), &[2.0, 0.0, 4.0, 0.0]);
    }

    #[test]
    fn test_expand_backward_sums() {
        let grads = ExpandBackward.backward(&Tensor::from_slice(&[0.5, 1.5, 2.0]));
        assert_eq!(grads[0].data(), &[4.0]);
    }

    #[test]
    fn test_sigmoid_backward_at_zero() {
        let out = Tensor::from_slice(&[0.5]);
        let grads = SigmoidBackward { output: out }.backward(&Tensor::from_slice(&[1.0]));
        assert!((grads[0].item() - 0.25).abs() < 1e-6);
    }
}
