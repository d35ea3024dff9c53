use num_traits::{Float, NumAssignOps, PrimInt};
use std::fmt::Debug;

use crate::buffer::Element;
use crate::workspace::ScratchFloat;

/// Floating-point element types usable as table rows and gradients (`f32`, `f64`).
///
/// Kernels are generic over this trait; `Float` supplies `zero()` and friends,
/// `NumAssignOps` supplies the `+=` used by scatter-accumulate.
pub trait EmbedFloat:
    Element + Float + NumAssignOps + ScratchFloat + PartialOrd + Debug + Send + Sync + 'static
{
}

impl EmbedFloat for f32 {}
impl EmbedFloat for f64 {}

/// Integral element types usable as row indices (`i32`, `i64`).
pub trait EmbedIndex: Element + PrimInt + Into<i64> + Debug + Send + Sync + 'static {}

impl EmbedIndex for i32 {}
impl EmbedIndex for i64 {}
