use std::fmt::Debug;
use std::sync::Arc;

use crate::error::EmbedRustError;
use crate::types::DType;

/// Typed CPU storage for a tensor.
///
/// Each variant shares its `Vec` through an `Arc`, so cloning a buffer is cheap.
/// Mutable access goes through [`Buffer::as_mut_vec`], which copies the data
/// first if another tensor still shares it.
#[derive(Debug, Clone)]
pub enum Buffer {
    F32(Arc<Vec<f32>>),
    F64(Arc<Vec<f64>>),
    I32(Arc<Vec<i32>>),
    I64(Arc<Vec<i64>>),
}

/// Element types that can live in a [`Buffer`].
pub trait Element: Copy + Debug + Send + Sync + 'static {
    const DTYPE: DType;

    fn into_buffer(data: Vec<Self>) -> Buffer;
    fn view(buffer: &Buffer) -> Option<&[Self]>;
    fn view_mut(buffer: &mut Buffer) -> Option<&mut Vec<Self>>;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            fn into_buffer(data: Vec<Self>) -> Buffer {
                Buffer::$variant(Arc::new(data))
            }

            fn view(buffer: &Buffer) -> Option<&[Self]> {
                match buffer {
                    Buffer::$variant(data) => Some(data.as_slice()),
                    _ => None,
                }
            }

            fn view_mut(buffer: &mut Buffer) -> Option<&mut Vec<Self>> {
                match buffer {
                    Buffer::$variant(data) => Some(Arc::make_mut(data)),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(f32, F32);
impl_element!(f64, F64);
impl_element!(i32, I32);
impl_element!(i64, I64);

impl Buffer {
    pub fn dtype(&self) -> DType {
        match self {
            Buffer::F32(_) => DType::F32,
            Buffer::F64(_) => DType::F64,
            Buffer::I32(_) => DType::I32,
            Buffer::I64(_) => DType::I64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Buffer::F32(data) => data.len(),
            Buffer::F64(data) => data.len(),
            Buffer::I32(data) => data.len(),
            Buffer::I64(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the buffer as a slice of `T`.
    ///
    /// Returns `DataTypeMismatch` if the buffer holds another element type.
    pub fn as_slice<T: Element>(&self) -> Result<&[T], EmbedRustError> {
        let actual = self.dtype();
        T::view(self).ok_or_else(|| EmbedRustError::DataTypeMismatch {
            expected: T::DTYPE,
            actual,
            operation: "Buffer::as_slice".to_string(),
        })
    }

    /// Mutable access to the underlying `Vec<T>` (clone-on-write if shared).
    pub fn as_mut_vec<T: Element>(&mut self) -> Result<&mut Vec<T>, EmbedRustError> {
        let actual = self.dtype();
        T::view_mut(self).ok_or_else(|| EmbedRustError::DataTypeMismatch {
            expected: T::DTYPE,
            actual,
            operation: "Buffer::as_mut_vec".to_string(),
        })
    }
}
