use crate::error::EmbedRustError;
use crate::nn::Parameter;
use crate::tensor::Tensor;

/// The base trait for neural network modules.
pub trait Module: std::fmt::Debug + Send + Sync {
    /// Performs a forward pass of the module.
    fn forward(&self, input: &Tensor) -> Result<Tensor, EmbedRustError>;

    /// Returns all learnable parameters of the module.
    fn parameters(&self) -> Vec<&Parameter>;

    /// Returns all learnable parameters along with their names.
    ///
    /// Names are unique within the module (e.g. "weight").
    fn named_parameters(&self) -> Vec<(String, &Parameter)>;

    /// Clears the accumulated gradient of every parameter.
    ///
    /// Gradients otherwise keep accumulating across backward passes.
    fn zero_grad(&self) {
        for param in self.parameters() {
            param.clear_grad();
        }
    }
}
