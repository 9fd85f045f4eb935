//! Tape recording and the backward pass.

use std::collections::HashMap;
use std::sync::Arc;

use super::grad_fn::GradFn;
use super::tensor::{Tensor, TensorId};

#[derive(Clone)]
pub(crate) struct TapeEntry {
    pub output_id: TensorId,
    pub grad_fn: Arc<dyn GradFn>,
    pub input_ids: Vec<TensorId>,
}

/// Ordered record of differentiable ops for one forward pass.
///
/// Inputs of every recorded op are registered by value; after
/// [`ComputationGraph::backward`] the registered copies of leaf tensors that
/// require gradients carry their accumulated gradient.
#[allow(missing_debug_implementations)]
pub struct ComputationGraph {
    tape: Vec<TapeEntry>,
    tensors: HashMap<TensorId, Tensor>,
}

impl ComputationGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tape: Vec::new(),
            tensors: HashMap::new(),
        }
    }

    /// Clear all recorded operations and stored gradients.
    pub fn clear(&mut self) {
        self.tape.clear();
        self.tensors.clear();
    }

    /// Register an op input. A tensor that is already registered keeps its
    /// first copy (and whatever gradient it has accumulated).
    pub fn register_tensor(&mut self, tensor: Tensor) {
        self.tensors.entry(tensor.id()).or_insert(tensor);
    }

    /// Append an op to the tape.
    pub fn record(
        &mut self,
        output_id: TensorId,
        grad_fn: Arc<dyn GradFn>,
        input_ids: Vec<TensorId>,
    ) {
        self.tape.push(TapeEntry {
            output_id,
            grad_fn,
            input_ids,
        });
    }

    /// Reverse-mode sweep from `output_id`.
    ///
    /// Gradients of tensors used by several ops are summed before being
    /// propagated further; only leaves that require gradients keep theirs.
    pub fn backward(&mut self, output_id: TensorId, grad_output: Tensor) {
        let mut grads: HashMap<TensorId, Tensor> = HashMap::new();
        grads.insert(output_id, grad_output);

        for entry in self.tape.iter().rev() {
            let Some(grad_out) = grads.get(&entry.output_id).cloned() else {
                continue;
            };

            let input_grads = entry.grad_fn.backward(&grad_out);
            for (input_id, input_grad) in entry.input_ids.iter().zip(input_grads) {
                grads
                    .entry(*input_id)
                    .and_modify(|existing| {
                        for (a, b) in existing.data_mut().iter_mut().zip(input_grad.data()) {
                            *a += b;
                        }
                    })
                    .or_insert(input_grad);
            }
        }

        for (id, grad) in grads {
            if let Some(tensor) = self.tensors.get_mut(&id) {
                if tensor.requires_grad_enabled() && tensor.is_leaf() {
                    tensor.accumulate_grad(grad);
                }
            }
        }
    }

    /// Number of recorded ops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tape.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tape.is_empty()
    }

    /// Gradient of a registered tensor (after backward).
    #[must_use]
    pub fn get_grad(&self, id: TensorId) -> Option<Tensor> {
        self.tensors.get(&id).and_then(|t| t.grad().cloned())
    }

    pub fn clear_grad(&mut self, id: TensorId) {
        if let Some(tensor) = self.tensors.get_mut(&id) {
            tensor.clear_grad();
        }
    }
}

impl Default for ComputationGraph {
    fn default() -> Self {
        Self::new()
    }
}
