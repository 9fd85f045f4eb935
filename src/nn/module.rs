//! Base trait for trainable components.

use crate::autograd::Tensor;

/// A component with trainable parameters and a train/eval mode.
///
/// Layers here need more than a single input tensor (graph convolutions take
/// the propagation operator too), so the forward pass is an inherent method
/// on each implementor rather than part of the trait.
pub trait Module {
    /// Trainable parameters, in a stable order.
    fn parameters(&self) -> Vec<&Tensor> {
        Vec::new()
    }

    /// Mutable access to the trainable parameters, same order as
    /// [`Module::parameters`].
    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        Vec::new()
    }

    /// Switch to training mode (dropout active).
    fn train(&mut self) {}

    /// Switch to evaluation mode (dropout is the identity).
    fn eval(&mut self) {}

    /// Whether the module is in training mode.
    fn training(&self) -> bool {
        true
    }

    /// Total number of trainable scalars.
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.numel()).sum()
    }
}
