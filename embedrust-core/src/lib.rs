//! # EmbedRust core
//!
//! Row gather (`Embedding`, `take`) and its scatter-accumulate adjoint
//! (`_backward_take`) over dense CPU tensors, with partial-shape inference, a
//! typed operator table for host graph executors, and a small autograd and nn
//! layer on top.

pub mod autograd;
pub mod buffer;
pub mod config;
pub mod error;
pub mod nn;
pub mod ops;
pub mod shape;
pub mod tensor;
pub mod tensor_data;
pub mod types;
pub mod utils;
pub mod workspace;

pub use config::{KernelConfig, OpReq};
pub use error::{EmbedRustError, ErrorKind};
pub use ops::indexing::{
    embedding_forward_into, embedding_op, take_backward_into, take_backward_op, take_forward_into,
    take_op, EmbeddingParam, IndexMode, OpParams, TakeParam,
};
pub use ops::registry::{make_backward_node, OpContext, Operator, OperatorTable};
pub use shape::TensorShape;
pub use tensor::Tensor;
pub use types::DType;
pub use workspace::{ResourceRequest, Workspace};
// Re-export traits required by public functions/structs
pub use num_traits;
