use crate::error::EmbedRustError;
use crate::tensor::Tensor;
use std::fmt;
use std::ops::Deref;

/// A wrapper around a Tensor indicating it is a learnable parameter of a Module.
/// Parameters always have `requires_grad` set to `true`.
pub struct Parameter {
    tensor: Tensor,
    name: Option<String>,
}

impl Parameter {
    /// Creates a new Parameter from a floating-point Tensor.
    pub fn new(tensor: Tensor) -> Result<Self, EmbedRustError> {
        tensor.set_requires_grad(true)?;
        Ok(Parameter { tensor, name: None })
    }

    /// Creates a new named Parameter.
    pub fn new_with_name(tensor: Tensor, name: impl Into<String>) -> Result<Self, EmbedRustError> {
        let mut param = Self::new(tensor)?;
        param.name = Some(name.into());
        Ok(param)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Consumes the Parameter and returns the underlying Tensor.
    pub fn into_inner(self) -> Tensor {
        self.tensor
    }
}

impl Deref for Parameter {
    type Target = Tensor;

    fn deref(&self) -> &Self::Target {
        &self.tensor
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Parameter({}: {:?})", name, self.tensor),
            None => write!(f, "Parameter({:?})", self.tensor),
        }
    }
}

impl Clone for Parameter {
    /// Cloning a Parameter shares the underlying tensor.
    fn clone(&self) -> Self {
        Parameter {
            tensor: self.tensor.clone(),
            name: self.name.clone(),
        }
    }
}

#[cfg(test)]
#[path = "parameter_test.rs"]
mod tests;
