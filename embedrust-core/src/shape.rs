//! Partially known tensor shapes used by shape inference.

use crate::error::EmbedRustError;
use std::fmt;

/// A single dimension: `Some(size)` when known, `None` when not yet inferred.
pub type Dim = Option<usize>;

/// Shape descriptor that may be partially unknown.
///
/// `dims == None` means even the rank is unknown. A known rank may still carry
/// unknown dimensions. Zero-sized dimensions are ordinary known sizes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TensorShape {
    dims: Option<Vec<Dim>>,
}

impl TensorShape {
    /// Shape with unknown rank.
    pub fn unknown() -> Self {
        TensorShape { dims: None }
    }

    /// Fully known shape.
    pub fn known(dims: &[usize]) -> Self {
        TensorShape {
            dims: Some(dims.iter().map(|&d| Some(d)).collect()),
        }
    }

    /// Known rank with possibly unknown dimensions.
    pub fn partial(dims: Vec<Dim>) -> Self {
        TensorShape { dims: Some(dims) }
    }

    /// Known rank, every dimension unknown.
    pub fn with_rank(rank: usize) -> Self {
        TensorShape {
            dims: Some(vec![None; rank]),
        }
    }

    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(|d| d.len())
    }

    pub fn dims(&self) -> Option<&[Dim]> {
        self.dims.as_deref()
    }

    /// Size of dimension `axis`, `None` if the rank or the dimension is unknown.
    pub fn dim(&self, axis: usize) -> Dim {
        self.dims.as_ref().and_then(|d| d.get(axis).copied().flatten())
    }

    /// True once every dimension is known.
    pub fn is_complete(&self) -> bool {
        matches!(&self.dims, Some(d) if d.iter().all(|x| x.is_some()))
    }

    /// Concrete shape, if complete.
    pub fn to_vec(&self) -> Option<Vec<usize>> {
        self.dims.as_ref()?.iter().copied().collect()
    }

    /// Appends one trailing dimension. An unknown rank stays unknown.
    pub fn append(&self, dim: Dim) -> TensorShape {
        match &self.dims {
            Some(d) => {
                let mut dims = d.clone();
                dims.push(dim);
                TensorShape { dims: Some(dims) }
            }
            None => TensorShape::unknown(),
        }
    }

    /// All but the trailing dimension. Unknown or rank-0 shapes yield `None`.
    pub fn leading(&self) -> Option<TensorShape> {
        let dims = self.dims.as_ref()?;
        let (_, leading) = dims.split_last()?;
        Some(TensorShape::partial(leading.to_vec()))
    }

    /// Unifies two descriptions of the same tensor.
    ///
    /// Unknown information is filled from the other side; conflicting ranks yield
    /// `RankMismatch`, conflicting dimensions `ShapeMismatch`.
    pub fn merge(
        &self,
        other: &TensorShape,
        operation: &str,
    ) -> Result<TensorShape, EmbedRustError> {
        let (lhs, rhs) = match (&self.dims, &other.dims) {
            (None, _) => return Ok(other.clone()),
            (_, None) => return Ok(self.clone()),
            (Some(lhs), Some(rhs)) => (lhs, rhs),
        };
        if lhs.len() != rhs.len() {
            return Err(EmbedRustError::RankMismatch {
                expected: lhs.len(),
                actual: rhs.len(),
                operation: operation.to_string(),
            });
        }
        let mut merged = Vec::with_capacity(lhs.len());
        for (&a, &b) in lhs.iter().zip(rhs.iter()) {
            merged.push(match (a, b) {
                (Some(x), Some(y)) if x != y => {
                    return Err(EmbedRustError::ShapeMismatch {
                        expected: self.to_string(),
                        actual: other.to_string(),
                        operation: operation.to_string(),
                    })
                }
                (Some(x), _) => Some(x),
                (None, y) => y,
            });
        }
        Ok(TensorShape::partial(merged))
    }
}

impl From<&[usize]> for TensorShape {
    fn from(dims: &[usize]) -> Self {
        TensorShape::known(dims)
    }
}

impl From<Vec<usize>> for TensorShape {
    fn from(dims: Vec<usize>) -> Self {
        TensorShape::known(&dims)
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dims {
            None => write!(f, "?"),
            Some(dims) => {
                write!(f, "[")?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match d {
                        Some(size) => write!(f, "{}", size)?,
                        None => write!(f, "?")?,
                    }
                }
                write!(f, "]")
            }
        }
    }
}
