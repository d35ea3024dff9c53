/// Defines the possible data types for Tensor elements.
///
/// Floating types hold table rows and gradients; integral types hold indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit floating-point type.
    F32,
    /// 64-bit floating-point type.
    F64,
    /// 32-bit integer type.
    I32,
    /// 64-bit integer type.
    I64,
}

impl DType {
    pub fn is_floating_point(&self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, DType::I32 | DType::I64)
    }

    /// Size in bytes of one element.
    pub fn size_of(&self) -> usize {
        match self {
            DType::F32 => std::mem::size_of::<f32>(),
            DType::F64 => std::mem::size_of::<f64>(),
            DType::I32 => std::mem::size_of::<i32>(),
            DType::I64 => std::mem::size_of::<i64>(),
        }
    }
}
