use crate::types::DType;
use thiserror::Error;

/// Broad failure classes reported by the gather/scatter core.
///
/// Every [`EmbedRustError`] variant maps onto exactly one of these through
/// [`EmbedRustError::kind`], which lets a host decide whether a failure happened
/// during inference (shape/type) or during compute (index range/resource).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Shape,
    Type,
    IndexRange,
    Resource,
    Other,
}

/// Custom error type for the EmbedRust core.
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq for easier testing
pub enum EmbedRustError {
    #[error("Shape mismatch: expected {expected}, got {actual} during operation {operation}")]
    ShapeMismatch {
        expected: String,
        actual: String,
        operation: String,
    },

    #[error("Rank mismatch during operation {operation}: expected rank {expected}, got {actual}")]
    RankMismatch {
        expected: usize,
        actual: usize,
        operation: String,
    },

    #[error("Data type mismatch in {operation}: expected {expected:?}, got {actual:?}")]
    DataTypeMismatch {
        expected: DType,
        actual: DType,
        operation: String,
    },

    #[error("Unsupported data type {dtype:?} for operation {operation}: expected {expected}")]
    UnsupportedDataType {
        dtype: DType,
        expected: &'static str,
        operation: String,
    },

    #[error("Cannot infer data type for operation {operation}: {reason}")]
    UnresolvedDataType { operation: String, reason: String },

    #[error("Index {index} at position {position} is out of range for a table of {row_count} rows")]
    IndexOutOfRange {
        index: i64,
        position: usize,
        row_count: usize,
    },

    #[error("Scratch workspace request of {requested} bytes failed: {reason}")]
    ResourceError { requested: usize, reason: String },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Operator {operation} expects {expected} {what}, got {actual}")]
    ArityMismatch {
        operation: String,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid parameter for {operation}: {message}")]
    InvalidParameter { operation: String, message: String },

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl EmbedRustError {
    /// Classifies the error into the shape / type / index-range / resource taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmbedRustError::ShapeMismatch { .. }
            | EmbedRustError::RankMismatch { .. }
            | EmbedRustError::TensorCreationError { .. } => ErrorKind::Shape,
            EmbedRustError::DataTypeMismatch { .. }
            | EmbedRustError::UnsupportedDataType { .. }
            | EmbedRustError::UnresolvedDataType { .. } => ErrorKind::Type,
            EmbedRustError::IndexOutOfRange { .. } => ErrorKind::IndexRange,
            EmbedRustError::ResourceError { .. } => ErrorKind::Resource,
            EmbedRustError::ArityMismatch { .. }
            | EmbedRustError::InvalidParameter { .. }
            | EmbedRustError::UnknownOperator(_)
            | EmbedRustError::UnsupportedOperation(_)
            | EmbedRustError::InternalError(_) => ErrorKind::Other,
        }
    }

    pub(crate) fn shape_mismatch(
        operation: &str,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        EmbedRustError::ShapeMismatch {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
            operation: operation.to_string(),
        }
    }
}
