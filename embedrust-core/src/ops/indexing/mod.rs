//! Row indexing: `Embedding`, `take` and their shared adjoint `_backward_take`.
//!
//! * [`infer`]: pure shape and dtype inference over partial descriptors.
//! * [`gather`] / [`scatter`]: slice kernels, generic over the element and index types.
//! * [`take`]: tensor-level entry points with dtype dispatch and autograd recording.
//!
//! Out-of-range indices follow [`IndexMode`]; the default raises
//! `IndexOutOfRange` before any output is written.

pub mod gather;
pub mod infer;
pub mod params;
pub mod resolve;
pub mod scatter;
pub mod take;

pub use gather::{gather_rows, gather_scratch};
pub use infer::{
    embedding_infer_shape, embedding_infer_type, take_backward_infer_shape,
    take_backward_infer_type, take_infer_shape, take_infer_type, ShapeInference, TypeInference,
};
pub use params::{EmbeddingParam, IndexMode, OpParams, TakeParam};
pub use resolve::{resolve_row, resolve_rows};
pub use scatter::{scatter_add_rows, ScatterStrategy};
pub use take::{
    embedding_forward_into, embedding_op, embedding_op_with, take_backward_into, take_backward_op,
    take_backward_op_with, take_forward_into, take_op, take_op_with, TakeBackward,
};
