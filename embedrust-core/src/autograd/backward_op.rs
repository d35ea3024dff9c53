use crate::error::EmbedRustError;
use crate::tensor::Tensor;
use std::fmt::Debug;

/// Defines the interface for the backward pass of a differentiable tensor operation.
///
/// An implementation is stored in the output tensor's `grad_fn` field. It keeps
/// whatever context from the forward pass the adjoint needs (index tensors, input
/// shapes, modes) and hands back one gradient per forward input.
///
/// The trait requires `Debug + Send + Sync` because the `Arc<dyn BackwardOp>`
/// lives inside a `Tensor` that may be shared across threads.
pub trait BackwardOp: Debug + Send + Sync {
    /// Computes `dL/dInput_i` for every forward input given `dL/dOutput`.
    ///
    /// # Returns
    /// * `Ok(Vec<Tensor>)`: one gradient per input, in the order of [`BackwardOp::inputs`].
    ///   Each gradient has the shape and dtype of the corresponding input.
    /// * `Err(EmbedRustError)`: shape or dtype mismatch of `grad_output`, or a compute failure.
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, EmbedRustError>;

    /// Returns the forward inputs, in the order used by [`BackwardOp::backward`].
    fn inputs(&self) -> Vec<Tensor>;
}
