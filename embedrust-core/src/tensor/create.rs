// src/tensor/create.rs

use crate::error::EmbedRustError;
use crate::tensor::Tensor;
use crate::types::DType;

/// Creates a new F32 tensor filled with zeros with the specified shape.
pub fn zeros(shape: &[usize]) -> Result<Tensor, EmbedRustError> {
    full(shape, 0.0)
}

/// Creates a new F64 tensor filled with zeros with the specified shape.
pub fn zeros_f64(shape: &[usize]) -> Result<Tensor, EmbedRustError> {
    let numel = shape.iter().product();
    Tensor::new_f64(vec![0.0; numel], shape.to_vec())
}

/// Creates a new F32 tensor filled with ones with the specified shape.
pub fn ones(shape: &[usize]) -> Result<Tensor, EmbedRustError> {
    full(shape, 1.0)
}

/// Creates a new F32 tensor filled with `value`.
pub fn full(shape: &[usize], value: f32) -> Result<Tensor, EmbedRustError> {
    let numel = shape.iter().product();
    Tensor::new(vec![value; numel], shape.to_vec())
}

/// Creates a zero-filled tensor of any supported dtype.
///
/// Used to allocate outputs and gradients once inference has fixed their
/// shape and dtype.
pub fn zeros_with_dtype(shape: &[usize], dtype: DType) -> Result<Tensor, EmbedRustError> {
    let numel: usize = shape.iter().product();
    let shape = shape.to_vec();
    match dtype {
        DType::F32 => Tensor::new(vec![0.0; numel], shape),
        DType::F64 => Tensor::new_f64(vec![0.0; numel], shape),
        DType::I32 => Tensor::new_i32(vec![0; numel], shape),
        DType::I64 => Tensor::new_i64(vec![0; numel], shape),
    }
}

/// Creates a new tensor filled with zeros, with the same shape and dtype as `tensor`.
pub fn zeros_like(tensor: &Tensor) -> Result<Tensor, EmbedRustError> {
    zeros_with_dtype(&tensor.shape(), tensor.dtype())
}

/// Creates a new tensor filled with ones, with the same shape and dtype as `tensor`.
pub fn ones_like(tensor: &Tensor) -> Result<Tensor, EmbedRustError> {
    let shape = tensor.shape();
    let numel: usize = shape.iter().product();
    match tensor.dtype() {
        DType::F32 => Tensor::new(vec![1.0; numel], shape),
        DType::F64 => Tensor::new_f64(vec![1.0; numel], shape),
        DType::I32 => Tensor::new_i32(vec![1; numel], shape),
        DType::I64 => Tensor::new_i64(vec![1; numel], shape),
    }
}

#[cfg(test)]
#[path = "create_test.rs"]
mod tests;
