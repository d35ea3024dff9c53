//! Shape and dtype inference for `Embedding`, `take` and `_backward_take`.
//!
//! All functions here are pure: they take the current (possibly partial)
//! descriptors and return refined copies. Running them again on their own
//! result returns the same result.

use crate::error::EmbedRustError;
use crate::ops::indexing::params::EmbeddingParam;
use crate::shape::TensorShape;
use crate::types::DType;

pub(crate) const EMBEDDING: &str = "Embedding";
pub(crate) const TAKE: &str = "take";
pub(crate) const BACKWARD_TAKE: &str = "_backward_take";

/// Refined shapes of every input and output of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeInference {
    pub inputs: Vec<TensorShape>,
    pub outputs: Vec<TensorShape>,
}

/// Refined dtypes of every input and output of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInference {
    pub inputs: Vec<Option<DType>>,
    pub outputs: Vec<Option<DType>>,
}

pub(crate) fn check_arity(
    operation: &str,
    what: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), EmbedRustError> {
    if expected != actual {
        return Err(EmbedRustError::ArityMismatch {
            operation: operation.to_string(),
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Output descriptors may be omitted entirely (all unknown) or given in full.
fn outputs_or_unknown<T: Clone + Default>(
    operation: &str,
    outputs: &[T],
    expected: usize,
) -> Result<Vec<T>, EmbedRustError> {
    if outputs.is_empty() {
        return Ok(vec![T::default(); expected]);
    }
    check_arity(operation, "outputs", expected, outputs.len())?;
    Ok(outputs.to_vec())
}

/// Core rule shared by all three operators:
/// `output == index ++ [table.shape[1]]`, unified in both directions.
///
/// `table` must already be rank 2 (or unknown).
fn infer_gather_shapes(
    operation: &str,
    index: &TensorShape,
    table: &TensorShape,
    output: &TensorShape,
) -> Result<(TensorShape, TensorShape, TensorShape), EmbedRustError> {
    let mut index = index.clone();
    let mut table = table.clone();

    if let Some(rank) = output.rank() {
        let leading = output.leading().ok_or_else(|| EmbedRustError::RankMismatch {
            expected: index.rank().map_or(1, |r| r + 1),
            actual: rank,
            operation: operation.to_string(),
        })?;
        let width = output.dim(rank - 1);
        table = table.merge(&TensorShape::partial(vec![None, width]), operation)?;
        index = index.merge(&leading, operation)?;
    }

    let output = output.merge(&index.append(table.dim(1)), operation)?;
    Ok((index, table, output))
}

fn as_matrix(operation: &str, shape: &TensorShape) -> Result<TensorShape, EmbedRustError> {
    match shape.rank() {
        Some(rank) if rank != 2 => Err(EmbedRustError::RankMismatch {
            expected: 2,
            actual: rank,
            operation: operation.to_string(),
        }),
        _ => TensorShape::with_rank(2).merge(shape, operation),
    }
}

/// Shape inference for `Embedding(data, weight)`.
///
/// The weight shape is fixed by the parameters; a declared weight shape that
/// disagrees with `(input_dim, output_dim)` is a shape error.
pub fn embedding_infer_shape(
    param: &EmbeddingParam,
    in_shapes: &[TensorShape],
    out_shapes: &[TensorShape],
) -> Result<ShapeInference, EmbedRustError> {
    check_arity(EMBEDDING, "inputs", 2, in_shapes.len())?;
    let outputs = outputs_or_unknown(EMBEDDING, out_shapes, 1)?;

    let declared = TensorShape::known(&param.weight_shape());
    let weight = declared.merge(&in_shapes[1], EMBEDDING)?;
    let (data, weight, output) =
        infer_gather_shapes(EMBEDDING, &in_shapes[0], &weight, &outputs[0])?;

    Ok(ShapeInference {
        inputs: vec![data, weight],
        outputs: vec![output],
    })
}

/// Shape inference for `take(idx, data)`. `data` must be a matrix.
pub fn take_infer_shape(
    in_shapes: &[TensorShape],
    out_shapes: &[TensorShape],
) -> Result<ShapeInference, EmbedRustError> {
    check_arity(TAKE, "inputs", 2, in_shapes.len())?;
    let outputs = outputs_or_unknown(TAKE, out_shapes, 1)?;

    let data = as_matrix(TAKE, &in_shapes[1])?;
    let (idx, data, output) = infer_gather_shapes(TAKE, &in_shapes[0], &data, &outputs[0])?;

    Ok(ShapeInference {
        inputs: vec![idx, data],
        outputs: vec![output],
    })
}

/// Shape inference for `_backward_take(ograd, idx) -> (idx_grad, data_grad)`.
///
/// The row count of `data_grad` cannot be derived from the inputs; it comes from
/// the output descriptor the host allocated from the forward source.
pub fn take_backward_infer_shape(
    in_shapes: &[TensorShape],
    out_shapes: &[TensorShape],
) -> Result<ShapeInference, EmbedRustError> {
    check_arity(BACKWARD_TAKE, "inputs", 2, in_shapes.len())?;
    let outputs = outputs_or_unknown(BACKWARD_TAKE, out_shapes, 2)?;

    let idx = in_shapes[1].merge(&outputs[0], BACKWARD_TAKE)?;
    let grad_data = as_matrix(BACKWARD_TAKE, &outputs[1])?;
    let (idx, grad_data, ograd) =
        infer_gather_shapes(BACKWARD_TAKE, &idx, &grad_data, &in_shapes[0])?;

    Ok(ShapeInference {
        inputs: vec![ograd, idx.clone()],
        outputs: vec![idx, grad_data],
    })
}

fn check_index_type(operation: &str, index: Option<DType>) -> Result<(), EmbedRustError> {
    match index {
        Some(dtype) if !dtype.is_integral() => Err(EmbedRustError::UnsupportedDataType {
            dtype,
            expected: "an integral index type",
            operation: operation.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Resolves the shared floating dtype of the source matrix and the output.
fn resolve_value_type(
    operation: &str,
    source: Option<DType>,
    output: Option<DType>,
    declared: Option<DType>,
) -> Result<DType, EmbedRustError> {
    let observed = match (source, output) {
        (Some(s), Some(o)) if s != o => {
            return Err(EmbedRustError::DataTypeMismatch {
                expected: s,
                actual: o,
                operation: operation.to_string(),
            })
        }
        (Some(s), _) => Some(s),
        (None, o) => o,
    };

    let resolved = match (observed, declared) {
        (Some(o), Some(d)) if o != d => {
            return Err(EmbedRustError::DataTypeMismatch {
                expected: d,
                actual: o,
                operation: operation.to_string(),
            })
        }
        (Some(o), _) => o,
        (None, Some(d)) => d,
        (None, None) => {
            return Err(EmbedRustError::UnresolvedDataType {
                operation: operation.to_string(),
                reason: "source dtype is unset and cannot be inferred".to_string(),
            })
        }
    };

    if !resolved.is_floating_point() {
        return Err(EmbedRustError::UnsupportedDataType {
            dtype: resolved,
            expected: "a floating-point type",
            operation: operation.to_string(),
        });
    }
    Ok(resolved)
}

/// Type inference for `Embedding(data, weight)`.
pub fn embedding_infer_type(
    param: &EmbeddingParam,
    in_types: &[Option<DType>],
    out_types: &[Option<DType>],
) -> Result<TypeInference, EmbedRustError> {
    check_arity(EMBEDDING, "inputs", 2, in_types.len())?;
    let outputs = outputs_or_unknown(EMBEDDING, out_types, 1)?;
    check_index_type(EMBEDDING, in_types[0])?;
    let value = resolve_value_type(EMBEDDING, in_types[1], outputs[0], param.dtype())?;
    Ok(TypeInference {
        inputs: vec![in_types[0], Some(value)],
        outputs: vec![Some(value)],
    })
}

/// Type inference for `take(idx, data)`.
pub fn take_infer_type(
    in_types: &[Option<DType>],
    out_types: &[Option<DType>],
) -> Result<TypeInference, EmbedRustError> {
    check_arity(TAKE, "inputs", 2, in_types.len())?;
    let outputs = outputs_or_unknown(TAKE, out_types, 1)?;
    check_index_type(TAKE, in_types[0])?;
    let value = resolve_value_type(TAKE, in_types[1], outputs[0], None)?;
    Ok(TypeInference {
        inputs: vec![in_types[0], Some(value)],
        outputs: vec![Some(value)],
    })
}

/// Type inference for `_backward_take(ograd, idx) -> (idx_grad, data_grad)`.
///
/// The index gradient carries the index dtype.
pub fn take_backward_infer_type(
    in_types: &[Option<DType>],
    out_types: &[Option<DType>],
) -> Result<TypeInference, EmbedRustError> {
    check_arity(BACKWARD_TAKE, "inputs", 2, in_types.len())?;
    let outputs = outputs_or_unknown(BACKWARD_TAKE, out_types, 2)?;

    let index = match (in_types[1], outputs[0]) {
        (Some(a), Some(b)) if a != b => {
            return Err(EmbedRustError::DataTypeMismatch {
                expected: a,
                actual: b,
                operation: BACKWARD_TAKE.to_string(),
            })
        }
        (Some(a), _) => Some(a),
        (None, b) => b,
    };
    check_index_type(BACKWARD_TAKE, index)?;
    let value = resolve_value_type(BACKWARD_TAKE, outputs[1], in_types[0], None)?;
    Ok(TypeInference {
        inputs: vec![Some(value), index],
        outputs: vec![index, Some(value)],
    })
}

#[cfg(test)]
#[path = "infer_test.rs"]
mod tests;
