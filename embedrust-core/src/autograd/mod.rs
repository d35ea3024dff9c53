//! Local adjoint support.
//!
//! Operations that produce a tensor from a source requiring gradients record a
//! [`BackwardOp`] on the output. [`Tensor::backward_with`](crate::Tensor::backward_with)
//! applies the recorded adjoints and accumulates into leaf gradients. Graph
//! construction and scheduling belong to the host framework.

pub mod backward_op;
pub mod grad_check;

pub use backward_op::BackwardOp;
