//! Tensor-level entry points: dtype dispatch, validation and the local adjoint.

use std::sync::Arc;

use crate::autograd::BackwardOp;
use crate::config::{KernelConfig, OpReq};
use crate::error::EmbedRustError;
use crate::ops::indexing::gather::gather_rows;
use crate::ops::indexing::infer::{
    embedding_infer_shape, embedding_infer_type, take_backward_infer_shape, take_infer_shape,
    take_infer_type, BACKWARD_TAKE, EMBEDDING, TAKE,
};
use crate::ops::indexing::params::{EmbeddingParam, IndexMode};
use crate::ops::indexing::scatter::scatter_add_rows;
use crate::ops::registry::OpContext;
use crate::ops::traits::{EmbedFloat, EmbedIndex};
use crate::shape::TensorShape;
use crate::tensor::{zeros_with_dtype, Tensor};
use crate::tensor_data::TensorData;
use crate::types::DType;

/// Calls `$f::<T, I>($args)` for the runtime (value, index) dtype pair.
macro_rules! dispatch_typed {
    ($operation:expr, $value:expr, $index:expr, $f:ident($($arg:expr),* $(,)?)) => {
        match ($value, $index) {
            (DType::F32, DType::I32) => $f::<f32, i32>($($arg),*),
            (DType::F32, DType::I64) => $f::<f32, i64>($($arg),*),
            (DType::F64, DType::I32) => $f::<f64, i32>($($arg),*),
            (DType::F64, DType::I64) => $f::<f64, i64>($($arg),*),
            (value, index) => Err(EmbedRustError::UnsupportedOperation(format!(
                "{} is not implemented for values {:?} with indices {:?}",
                $operation, value, index
            ))),
        }
    };
}

fn expect_index(operation: &str, idx: &Tensor) -> Result<DType, EmbedRustError> {
    let dtype = idx.dtype();
    if !dtype.is_integral() {
        return Err(EmbedRustError::UnsupportedDataType {
            dtype,
            expected: "an integral index type",
            operation: operation.to_string(),
        });
    }
    Ok(dtype)
}

fn expect_float(operation: &str, tensor: &Tensor) -> Result<DType, EmbedRustError> {
    let dtype = tensor.dtype();
    if !dtype.is_floating_point() {
        return Err(EmbedRustError::UnsupportedDataType {
            dtype,
            expected: "a floating-point type",
            operation: operation.to_string(),
        });
    }
    Ok(dtype)
}

fn expect_same_dtype(
    operation: &str,
    expected: DType,
    actual: DType,
) -> Result<(), EmbedRustError> {
    if expected != actual {
        return Err(EmbedRustError::DataTypeMismatch {
            expected,
            actual,
            operation: operation.to_string(),
        });
    }
    Ok(())
}

fn expect_matrix(operation: &str, tensor: &Tensor) -> Result<[usize; 2], EmbedRustError> {
    match tensor.shape().as_slice() {
        &[rows, width] => Ok([rows, width]),
        other => Err(EmbedRustError::RankMismatch {
            expected: 2,
            actual: other.len(),
            operation: operation.to_string(),
        }),
    }
}

fn expect_rows_shape(
    operation: &str,
    idx: &Tensor,
    row_width: usize,
    rows: &Tensor,
) -> Result<(), EmbedRustError> {
    let mut expected = idx.shape();
    expected.push(row_width);
    let actual = rows.shape();
    if actual != expected {
        return Err(EmbedRustError::shape_mismatch(operation, expected, actual));
    }
    Ok(())
}

fn expect_distinct(
    operation: &str,
    output: &Tensor,
    inputs: &[&Tensor],
) -> Result<(), EmbedRustError> {
    if inputs.iter().any(|input| output.ptr_eq(input)) {
        return Err(EmbedRustError::UnsupportedOperation(format!(
            "{}: the output tensor must not alias an input",
            operation
        )));
    }
    Ok(())
}

fn gather_typed<T: EmbedFloat, I: EmbedIndex>(
    idx: &TensorData,
    data: &TensorData,
    out: &mut TensorData,
    shape: [usize; 2],
    req: OpReq,
    mode: IndexMode,
    ctx: &mut OpContext,
) -> Result<(), EmbedRustError> {
    gather_rows::<T, I>(
        idx.data()?,
        data.data()?,
        shape,
        out.data_mut()?,
        req,
        mode,
        &ctx.config,
        &mut ctx.workspace,
    )
}

fn scatter_typed<T: EmbedFloat, I: EmbedIndex>(
    ograd: &TensorData,
    idx: &TensorData,
    grad_data: &mut TensorData,
    shape: [usize; 2],
    req: OpReq,
    mode: IndexMode,
    ctx: &mut OpContext,
) -> Result<(), EmbedRustError> {
    scatter_add_rows::<T, I>(
        idx.data()?,
        ograd.data()?,
        grad_data.data_mut()?,
        shape,
        req,
        mode,
        &ctx.config,
        &mut ctx.workspace,
    )
}

/// Shared forward path; `operation` names the operator in errors.
fn gather_into(
    operation: &'static str,
    idx: &Tensor,
    data: &Tensor,
    out: &Tensor,
    req: OpReq,
    mode: IndexMode,
    ctx: &mut OpContext,
) -> Result<(), EmbedRustError> {
    let index_dtype = expect_index(operation, idx)?;
    let value_dtype = expect_float(operation, data)?;
    expect_same_dtype(operation, value_dtype, out.dtype())?;
    let shape = expect_matrix(operation, data)?;
    expect_rows_shape(operation, idx, shape[1], out)?;
    expect_distinct(operation, out, &[idx, data])?;

    let idx_guard = idx.read_data();
    let data_guard = data.read_data();
    let mut out_guard = out.write_data();
    dispatch_typed!(
        operation,
        value_dtype,
        index_dtype,
        gather_typed(&idx_guard, &data_guard, &mut out_guard, shape, req, mode, ctx)
    )
}

/// Gathers rows of `data` selected by `idx` into the caller-allocated `out`.
///
/// `out` must already have shape `idx.shape ++ [data.shape[1]]` and the dtype
/// of `data`.
pub fn take_forward_into(
    idx: &Tensor,
    data: &Tensor,
    out: &Tensor,
    req: OpReq,
    mode: IndexMode,
    ctx: &mut OpContext,
) -> Result<(), EmbedRustError> {
    gather_into(TAKE, idx, data, out, req, mode, ctx)
}

/// Embedding lookup into the caller-allocated `out`.
///
/// `weight` must have shape `param.weight_shape()`; errors name `Embedding`.
pub fn embedding_forward_into(
    data: &Tensor,
    weight: &Tensor,
    out: &Tensor,
    req: OpReq,
    param: &EmbeddingParam,
    ctx: &mut OpContext,
) -> Result<(), EmbedRustError> {
    let weight_shape = weight.shape();
    if weight_shape != param.weight_shape() {
        return Err(EmbedRustError::shape_mismatch(
            EMBEDDING,
            param.weight_shape(),
            weight_shape,
        ));
    }
    gather_into(EMBEDDING, data, weight, out, req, param.mode(), ctx)
}

/// Accumulates `ograd` into the caller-allocated source gradient `grad_data`.
///
/// With `OpReq::WriteTo` the gradient is zeroed first. Fails with a shape error
/// if `ograd.shape != idx.shape ++ [grad_data.shape[1]]`.
pub fn take_backward_into(
    ograd: &Tensor,
    idx: &Tensor,
    grad_data: &Tensor,
    req: OpReq,
    mode: IndexMode,
    ctx: &mut OpContext,
) -> Result<(), EmbedRustError> {
    let index_dtype = expect_index(BACKWARD_TAKE, idx)?;
    let value_dtype = expect_float(BACKWARD_TAKE, ograd)?;
    expect_same_dtype(BACKWARD_TAKE, value_dtype, grad_data.dtype())?;
    let shape = expect_matrix(BACKWARD_TAKE, grad_data)?;
    expect_rows_shape(BACKWARD_TAKE, idx, shape[1], ograd)?;
    expect_distinct(BACKWARD_TAKE, grad_data, &[ograd, idx])?;

    let ograd_guard = ograd.read_data();
    let idx_guard = idx.read_data();
    let mut grad_guard = grad_data.write_data();
    dispatch_typed!(
        BACKWARD_TAKE,
        value_dtype,
        index_dtype,
        scatter_typed(&ograd_guard, &idx_guard, &mut grad_guard, shape, req, mode, ctx)
    )
}

/// Allocates the output from inferred descriptors, runs the gather and records
/// the adjoint when the source requires a gradient.
fn gather_op(
    operation: &'static str,
    idx: &Tensor,
    data: &Tensor,
    out_shape: &TensorShape,
    out_dtype: Option<DType>,
    mode: IndexMode,
    ctx: &mut OpContext,
) -> Result<Tensor, EmbedRustError> {
    let (shape, dtype) = match (out_shape.to_vec(), out_dtype) {
        (Some(shape), Some(dtype)) => (shape, dtype),
        _ => {
            return Err(EmbedRustError::InternalError(format!(
                "output descriptor not fully inferred: {} / {:?}",
                out_shape, out_dtype
            )))
        }
    };
    let out = zeros_with_dtype(&shape, dtype)?;
    gather_into(operation, idx, data, &out, OpReq::WriteTo, mode, ctx)?;

    if data.requires_grad() {
        out.set_grad_fn(Arc::new(TakeBackward {
            idx: idx.clone(),
            source: data.clone(),
            mode,
            config: ctx.config.clone(),
        }));
    }
    Ok(out)
}

/// `take(idx, data)` with a default context.
pub fn take_op(idx: &Tensor, data: &Tensor, mode: IndexMode) -> Result<Tensor, EmbedRustError> {
    take_op_with(idx, data, mode, &mut OpContext::default())
}

/// `take(idx, data)`: output shape `idx.shape ++ [data.shape[1]]`.
pub fn take_op_with(
    idx: &Tensor,
    data: &Tensor,
    mode: IndexMode,
    ctx: &mut OpContext,
) -> Result<Tensor, EmbedRustError> {
    let shapes = take_infer_shape(&[idx.shape().into(), data.shape().into()], &[])?;
    let types = take_infer_type(&[Some(idx.dtype()), Some(data.dtype())], &[])?;
    gather_op(TAKE, idx, data, &shapes.outputs[0], types.outputs[0], mode, ctx)
}

/// `Embedding(data, weight)` with a default context.
pub fn embedding_op(
    data: &Tensor,
    weight: &Tensor,
    param: &EmbeddingParam,
) -> Result<Tensor, EmbedRustError> {
    embedding_op_with(data, weight, param, &mut OpContext::default())
}

/// Embedding lookup. `weight` must match `param.weight_shape()`.
pub fn embedding_op_with(
    data: &Tensor,
    weight: &Tensor,
    param: &EmbeddingParam,
    ctx: &mut OpContext,
) -> Result<Tensor, EmbedRustError> {
    let shapes = embedding_infer_shape(param, &[data.shape().into(), weight.shape().into()], &[])?;
    let types = embedding_infer_type(param, &[Some(data.dtype()), Some(weight.dtype())], &[])?;
    let shape = shapes.outputs[0].clone();
    log::trace!("{}: {:?} -> {}", EMBEDDING, data.shape(), shape);
    gather_op(EMBEDDING, data, weight, &shape, types.outputs[0], param.mode(), ctx)
}

/// `_backward_take` with a default context.
pub fn take_backward_op(
    ograd: &Tensor,
    idx: &Tensor,
    data_shape: &[usize],
    mode: IndexMode,
) -> Result<Vec<Tensor>, EmbedRustError> {
    take_backward_op_with(ograd, idx, data_shape, mode, &mut OpContext::default())
}

/// Returns `[index_grad, source_grad]`.
///
/// The index gradient is all zeros with the index dtype; the source gradient has
/// `data_shape` and the dtype of `ograd`.
pub fn take_backward_op_with(
    ograd: &Tensor,
    idx: &Tensor,
    data_shape: &[usize],
    mode: IndexMode,
    ctx: &mut OpContext,
) -> Result<Vec<Tensor>, EmbedRustError> {
    let shapes = take_backward_infer_shape(
        &[ograd.shape().into(), idx.shape().into()],
        &[TensorShape::unknown(), TensorShape::known(data_shape)],
    )?;
    let idx_grad = zeros_with_dtype(&idx.shape(), expect_index(BACKWARD_TAKE, idx)?)?;
    let grad_shape = shapes.outputs[1].to_vec().ok_or_else(|| {
        EmbedRustError::InternalError(format!(
            "source gradient shape {} not inferred",
            shapes.outputs[1]
        ))
    })?;
    let grad_data = zeros_with_dtype(&grad_shape, expect_float(BACKWARD_TAKE, ograd)?)?;
    take_backward_into(ograd, idx, &grad_data, OpReq::WriteTo, mode, ctx)?;
    Ok(vec![idx_grad, grad_data])
}

/// Adjoint of a gather, recorded on outputs whose source requires a gradient.
///
/// Inputs are `[idx, source]`, matching the order of the returned gradients.
#[derive(Debug)]
pub struct TakeBackward {
    idx: Tensor,
    source: Tensor,
    mode: IndexMode,
    config: KernelConfig,
}

impl BackwardOp for TakeBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, EmbedRustError> {
        let mut ctx = OpContext::new(self.config.clone());
        take_backward_op_with(grad_output, &self.idx, &self.source.shape(), self.mode, &mut ctx)
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.idx.clone(), self.source.clone()]
    }
}

#[cfg(test)]
#[path = "take_test.rs"]
mod tests;
