// src/tensor_data.rs
use std::fmt::Debug;
use std::sync::Arc;

use crate::autograd::BackwardOp;
use crate::buffer::{Buffer, Element};
use crate::error::EmbedRustError;
use crate::tensor::Tensor;
use crate::types::DType;

/// Internal storage and metadata for a Tensor.
///
/// Holds the typed data buffer, the shape, and autograd-related information.
/// Always laid out contiguously in row-major order. It is wrapped in
/// `Arc<RwLock<TensorData>>` by the `Tensor` struct so that compute entry points
/// can write into caller-allocated outputs through a shared handle.
#[derive(Debug)]
pub struct TensorData {
    /// The underlying typed data buffer.
    pub(crate) buffer: Buffer,
    /// The data type of the elements in the buffer.
    pub(crate) dtype: DType,
    /// The shape (dimensions) of the tensor.
    pub(crate) shape: Vec<usize>,

    // --- Autograd Metadata ---
    /// Flag indicating if the tensor requires gradient computation.
    pub(crate) requires_grad: bool,
    /// Accumulated gradient, same shape and dtype as this tensor.
    pub(crate) grad: Option<Tensor>,
    /// Adjoint of the operation that produced this tensor. Leaf tensors have `None`.
    pub(crate) grad_fn: Option<Arc<dyn BackwardOp>>,
}

impl TensorData {
    /// Creates a new `TensorData` from a flat row-major `Vec<T>` and a shape.
    ///
    /// # Errors
    /// Returns `EmbedRustError::TensorCreationError` if the length of `data_vec` does not
    /// match the number of elements described by `shape`.
    pub fn from_vec<T: Element>(
        data_vec: Vec<T>,
        shape: Vec<usize>,
    ) -> Result<Self, EmbedRustError> {
        let numel: usize = shape.iter().product();
        let data_len = data_vec.len();
        if data_len != numel {
            return Err(EmbedRustError::TensorCreationError { data_len, shape });
        }

        Ok(TensorData {
            buffer: T::into_buffer(data_vec),
            dtype: T::DTYPE,
            shape,
            requires_grad: false,
            grad: None,
            grad_fn: None,
        })
    }

    /// Provides immutable access to the underlying data buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Borrows the data as a `&[T]`, checking the element type.
    pub fn data<T: Element>(&self) -> Result<&[T], EmbedRustError> {
        self.buffer.as_slice::<T>()
    }

    /// Mutable access to the data; copies the buffer first if it is shared.
    pub fn data_mut<T: Element>(&mut self) -> Result<&mut [T], EmbedRustError> {
        self.buffer.as_mut_vec::<T>().map(|vec| vec.as_mut_slice())
    }
}
