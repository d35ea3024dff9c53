// src/tensor/mod.rs

use crate::buffer::Element;
use crate::error::EmbedRustError;
use crate::tensor_data::TensorData;
use crate::types::DType;
use std::fmt;
use std::sync::{Arc, RwLock};

mod autograd_methods;
pub mod create;

pub use create::{full, ones, ones_like, zeros, zeros_f64, zeros_like, zeros_with_dtype};

/// Represents a multi-dimensional array (tensor).
///
/// `Tensor` uses `Arc<RwLock<TensorData>>` internally to allow for:
/// 1.  **Shared Ownership:** cloning a `Tensor` is cheap and shares the data.
/// 2.  **Interior Mutability:** compute entry points write into caller-allocated
///     outputs, and gradients accumulate, through an immutable `Tensor` handle.
pub struct Tensor {
    /// Arc for shared ownership, RwLock for interior mutability of TensorData.
    pub(crate) data: Arc<RwLock<TensorData>>,
}

impl Tensor {
    /// Creates a new Tensor with the given f32 data and shape.
    pub fn new(data_vec: Vec<f32>, shape: Vec<usize>) -> Result<Self, EmbedRustError> {
        Self::from_vec(data_vec, shape)
    }

    /// Creates a new F64 Tensor.
    pub fn new_f64(data_vec: Vec<f64>, shape: Vec<usize>) -> Result<Self, EmbedRustError> {
        Self::from_vec(data_vec, shape)
    }

    /// Creates a new I32 Tensor (typically an index tensor).
    pub fn new_i32(data_vec: Vec<i32>, shape: Vec<usize>) -> Result<Self, EmbedRustError> {
        Self::from_vec(data_vec, shape)
    }

    /// Creates a new I64 Tensor (typically an index tensor).
    pub fn new_i64(data_vec: Vec<i64>, shape: Vec<usize>) -> Result<Self, EmbedRustError> {
        Self::from_vec(data_vec, shape)
    }

    /// Creates a Tensor of any supported element type from row-major data.
    pub fn from_vec<T: Element>(
        data_vec: Vec<T>,
        shape: Vec<usize>,
    ) -> Result<Self, EmbedRustError> {
        let tensor_data = TensorData::from_vec(data_vec, shape)?;
        Ok(Tensor {
            data: Arc::new(RwLock::new(tensor_data)),
        })
    }

    /// Returns the data type (`DType`) of the tensor elements.
    pub fn dtype(&self) -> DType {
        self.read_data().dtype
    }

    /// Returns a clone of the tensor's shape.
    pub fn shape(&self) -> Vec<usize> {
        self.read_data().shape.clone()
    }

    /// Returns the rank (number of dimensions) of the tensor.
    pub fn rank(&self) -> usize {
        self.read_data().shape.len()
    }

    /// Returns the number of elements in the tensor.
    pub fn numel(&self) -> usize {
        self.read_data().numel()
    }

    /// Acquires a read lock on the tensor's data.
    ///
    /// Panics if the RwLock is poisoned.
    pub fn read_data(&self) -> std::sync::RwLockReadGuard<'_, TensorData> {
        self.data.read().expect("RwLock poisoned")
    }

    /// Acquires a write lock on the tensor's data.
    ///
    /// Panics if the RwLock is poisoned.
    pub fn write_data(&self) -> std::sync::RwLockWriteGuard<'_, TensorData> {
        self.data.write().expect("RwLock poisoned")
    }

    /// True if both handles point at the same underlying storage.
    pub fn ptr_eq(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Copies the data out as a `Vec<T>`, checking the element type.
    pub fn get_data<T: Element>(&self) -> Result<Vec<T>, EmbedRustError> {
        Ok(self.read_data().data::<T>()?.to_vec())
    }

    pub fn get_f32_data(&self) -> Result<Vec<f32>, EmbedRustError> {
        self.get_data::<f32>()
    }

    pub fn get_f64_data(&self) -> Result<Vec<f64>, EmbedRustError> {
        self.get_data::<f64>()
    }

    pub fn get_i32_data(&self) -> Result<Vec<i32>, EmbedRustError> {
        self.get_data::<i32>()
    }

    pub fn get_i64_data(&self) -> Result<Vec<i64>, EmbedRustError> {
        self.get_data::<i64>()
    }

    /// Returns a new leaf tensor sharing this tensor's buffer copy-on-write.
    ///
    /// Writes through either handle afterwards do not affect the other.
    pub fn detached_copy(&self) -> Tensor {
        let guard = self.read_data();
        let tensor_data = TensorData {
            buffer: guard.buffer.clone(),
            dtype: guard.dtype,
            shape: guard.shape.clone(),
            requires_grad: false,
            grad: None,
            grad_fn: None,
        };
        Tensor {
            data: Arc::new(RwLock::new(tensor_data)),
        }
    }
}

impl Clone for Tensor {
    /// Shallow clone: shares the underlying `TensorData`.
    fn clone(&self) -> Self {
        Tensor {
            data: Arc::clone(&self.data),
        }
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data.read() {
            Ok(guard) => write!(
                f,
                "Tensor(shape={:?}, dtype={:?}, requires_grad={}, has_grad={}, has_grad_fn={})",
                guard.shape,
                guard.dtype,
                guard.requires_grad,
                guard.grad.is_some(),
                guard.grad_fn.is_some()
            ),
            Err(_) => write!(f, "Tensor(Error: RwLock poisoned)"),
        }
    }
}
