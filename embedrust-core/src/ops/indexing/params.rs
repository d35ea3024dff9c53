use crate::error::EmbedRustError;
use crate::types::DType;

/// What to do with an index outside `[0, row_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexMode {
    /// Fail the call with `IndexOutOfRange` before any output is written.
    #[default]
    Raise,
    /// Clamp into `[0, row_count - 1]`.
    Clip,
    /// Wrap around with a Euclidean modulo, so `-1` selects the last row.
    Wrap,
}

/// Parameters of the `Embedding` operator.
///
/// Fields are private so that every instance has passed [`EmbeddingParam::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmbeddingParam {
    input_dim: usize,
    output_dim: usize,
    dtype: Option<DType>,
    mode: IndexMode,
}

impl EmbeddingParam {
    /// Vocabulary of `input_dim` rows, each an `output_dim`-wide vector.
    pub fn new(input_dim: usize, output_dim: usize) -> Result<Self, EmbedRustError> {
        if input_dim == 0 || output_dim == 0 {
            return Err(EmbedRustError::InvalidParameter {
                operation: "Embedding".to_string(),
                message: format!(
                    "input_dim and output_dim must be positive, got ({}, {})",
                    input_dim, output_dim
                ),
            });
        }
        Ok(EmbeddingParam {
            input_dim,
            output_dim,
            dtype: None,
            mode: IndexMode::Raise,
        })
    }

    /// Declares the weight dtype, used when inference cannot see it on the inputs.
    pub fn with_dtype(mut self, dtype: DType) -> Result<Self, EmbedRustError> {
        if !dtype.is_floating_point() {
            return Err(EmbedRustError::UnsupportedDataType {
                dtype,
                expected: "a floating-point type",
                operation: "Embedding".to_string(),
            });
        }
        self.dtype = Some(dtype);
        Ok(self)
    }

    pub fn with_mode(mut self, mode: IndexMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn dtype(&self) -> Option<DType> {
        self.dtype
    }

    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// `[input_dim, output_dim]`.
    pub fn weight_shape(&self) -> [usize; 2] {
        [self.input_dim, self.output_dim]
    }
}

/// Parameters of the `take` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TakeParam {
    pub mode: IndexMode,
}

impl TakeParam {
    pub fn new(mode: IndexMode) -> Self {
        TakeParam { mode }
    }
}

/// Typed parameters attached to a node of one of the indexing operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpParams {
    Embedding(EmbeddingParam),
    Take(TakeParam),
    /// `_backward_take`; carries the forward's index mode.
    TakeBackward(TakeParam),
}

impl OpParams {
    /// Index mode shared by all three operators.
    pub fn mode(&self) -> IndexMode {
        match self {
            OpParams::Embedding(p) => p.mode(),
            OpParams::Take(p) | OpParams::TakeBackward(p) => p.mode,
        }
    }

    pub(crate) fn as_embedding(&self, operation: &str) -> Result<&EmbeddingParam, EmbedRustError> {
        match self {
            OpParams::Embedding(p) => Ok(p),
            other => Err(wrong_params(operation, other)),
        }
    }

    pub(crate) fn as_take(&self, operation: &str) -> Result<&TakeParam, EmbedRustError> {
        match self {
            OpParams::Take(p) | OpParams::TakeBackward(p) => Ok(p),
            other => Err(wrong_params(operation, other)),
        }
    }
}

fn wrong_params(operation: &str, params: &OpParams) -> EmbedRustError {
    EmbedRustError::InvalidParameter {
        operation: operation.to_string(),
        message: format!("unexpected parameters {:?}", params),
    }
}
