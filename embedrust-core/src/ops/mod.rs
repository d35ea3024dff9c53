//! # Operators (`ops`)
//!
//! - [`indexing`]: the gather / scatter-accumulate core behind `Embedding` and `take`.
//! - [`registry`]: descriptors, the [`Operator`](registry::Operator) trait and the
//!   host-owned operator table.
//! - [`traits`]: numeric bounds shared by the kernels.

pub mod indexing;
pub mod registry;
pub mod traits;
