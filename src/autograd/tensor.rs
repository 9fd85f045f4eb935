//! Tensor with gradient tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::grad_fn::GradFn;
use super::with_graph;

/// Unique identifier for tensors in the computation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorId(u64);

impl TensorId {
    /// Generate a new unique tensor ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        TensorId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TensorId {
    fn default() -> Self {
        Self::new()
    }
}

/// Dense row-major `f32` tensor with optional gradient tracking.
///
/// Parameters are leaf tensors created with [`Tensor::requires_grad`]; the
/// optimizer mutates their data in place through [`Tensor::data_mut`], which
/// keeps the [`TensorId`] stable across training steps.
#[derive(Clone)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Vec<usize>,
    grad: Option<Box<Tensor>>,
    requires_grad: bool,
    is_leaf: bool,
    grad_fn: Option<Arc<dyn GradFn>>,
    id: TensorId,
}

impl Tensor {
    /// Create a tensor from a slice with the given shape.
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the product of shape dimensions.
    #[must_use]
    pub fn new(data: &[f32], shape: &[usize]) -> Self {
        Self::from_vec(data.to_vec(), shape)
    }

    /// Create a tensor taking ownership of `data`.
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the product of shape dimensions.
    #[must_use]
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Self {
        let expected_len: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_len,
            "Data length {} doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_len
        );

        Self {
            data,
            shape: shape.to_vec(),
            grad: None,
            requires_grad: false,
            is_leaf: true,
            grad_fn: None,
            id: TensorId::new(),
        }
    }

    /// 1-D tensor from a slice.
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self::new(data, &[data.len()])
    }

    /// Tensor filled with zeros.
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        let len: usize = shape.iter().product();
        Self::from_vec(vec![0.0; len], shape)
    }

    /// Tensor filled with ones.
    #[must_use]
    pub fn ones(shape: &[usize]) -> Self {
        let len: usize = shape.iter().product();
        Self::from_vec(vec![1.0; len], shape)
    }

    /// Enable gradient tracking (builder style).
    #[must_use]
    pub fn requires_grad(mut self) -> Self {
        self.requires_grad = true;
        self
    }

    /// Enable or disable gradient tracking in place.
    pub fn requires_grad_(&mut self, requires: bool) -> &mut Self {
        self.requires_grad = requires;
        self
    }

    /// Whether this tensor participates in gradient computation.
    #[must_use]
    pub fn requires_grad_enabled(&self) -> bool {
        self.requires_grad
    }

    /// Whether this tensor was created by the user rather than an op.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    #[must_use]
    pub fn id(&self) -> TensorId {
        self.id
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable access to the values. Only the optimizer should use this on
    /// parameters; mutating an op output invalidates its recorded gradient.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Gradient stored directly on this tensor (graph copies hold the
    /// gradients of parameters; see [`super::get_grad`]).
    #[must_use]
    pub fn grad(&self) -> Option<&Tensor> {
        self.grad.as_deref()
    }

    /// Drop the stored gradient.
    pub fn clear_grad(&mut self) {
        self.grad = None;
    }

    pub(crate) fn accumulate_grad(&mut self, grad: Tensor) {
        match &mut self.grad {
            Some(existing) => {
                for (a, b) in existing.data.iter_mut().zip(grad.data()) {
                    *a += b;
                }
            }
            None => {
                self.grad = Some(Box::new(grad));
            }
        }
    }

    pub(crate) fn set_grad_fn(&mut self, grad_fn: Arc<dyn GradFn>) {
        self.grad_fn = Some(grad_fn);
        self.is_leaf = false;
    }

    fn grad_fn_name(&self) -> Option<&'static str> {
        self.grad_fn.as_ref().map(|f| f.name())
    }

    /// Copy of this tensor cut off from the computation graph.
    #[must_use]
    pub fn detach(&self) -> Tensor {
        Tensor::new(&self.data, &self.shape)
    }

    /// Scalar value of a one-element tensor.
    ///
    /// # Panics
    ///
    /// Panics if the tensor has more than one element.
    #[must_use]
    pub fn item(&self) -> f32 {
        assert_eq!(
            self.numel(),
            1,
            "item() only works on tensors with exactly 1 element, got {}",
            self.numel()
        );
        self.data[0]
    }

    /// Backpropagate from a scalar output.
    ///
    /// # Panics
    ///
    /// Panics if called on a tensor with more than one element.
    pub fn backward(&self) {
        assert_eq!(
            self.numel(),
            1,
            "backward() requires scalar output, got shape {:?}",
            self.shape
        );
        with_graph(|graph| graph.backward(self.id, Tensor::ones(&self.shape)));
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("is_leaf", &self.is_leaf)
            .field("grad_fn", &self.grad_fn_name())
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
