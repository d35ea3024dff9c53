//! Per-call scratch space for the indexing kernels.
//!
//! Every operator declares [`ResourceRequest::TempSpace`]. The host hands each
//! compute call its own [`Workspace`]; the kernel makes exactly one request, sized
//! from the input shapes, through [`Workspace::with_scratch`], which frees the
//! memory again before the call returns.

use crate::config::KernelConfig;
use crate::error::EmbedRustError;
use crate::ops::traits::EmbedFloat;

/// Auxiliary resources an operator asks the host for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceRequest {
    /// Transient scratch memory, owned by a single compute call.
    TempSpace,
}

/// Size of one scratch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScratchSize {
    /// `usize` words (resolved rows, row offsets, permutations).
    pub words: usize,
    /// Floating-point elements of the kernel's element type (private partial sums).
    pub floats: usize,
}

impl ScratchSize {
    /// Total bytes for a float element of `float_size` bytes.
    pub fn bytes(&self, float_size: usize) -> Result<usize, EmbedRustError> {
        self.words
            .checked_mul(std::mem::size_of::<usize>())
            .and_then(|w| self.floats.checked_mul(float_size).and_then(|f| w.checked_add(f)))
            .ok_or_else(|| EmbedRustError::ResourceError {
                requested: usize::MAX,
                reason: format!("scratch size overflows: {:?}", self),
            })
    }
}

/// Float types that have a scratch pool in [`Workspace`].
pub trait ScratchFloat: Copy + Default + Send + Sync + 'static {
    #[doc(hidden)]
    fn pools(workspace: &mut Workspace) -> (&mut Vec<usize>, &mut Vec<Self>);
}

impl ScratchFloat for f32 {
    fn pools(workspace: &mut Workspace) -> (&mut Vec<usize>, &mut Vec<f32>) {
        (&mut workspace.words, &mut workspace.floats_f32)
    }
}

impl ScratchFloat for f64 {
    fn pools(workspace: &mut Workspace) -> (&mut Vec<usize>, &mut Vec<f64>) {
        (&mut workspace.words, &mut workspace.floats_f64)
    }
}

/// Scratch-resource handle passed to compute entry points.
///
/// Not shared between concurrent calls: a call borrows it mutably for its
/// whole duration.
#[derive(Debug, Default)]
pub struct Workspace {
    limit_bytes: Option<usize>,
    words: Vec<usize>,
    floats_f32: Vec<f32>,
    floats_f64: Vec<f64>,
    requests: usize,
    last_request_bytes: usize,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Workspace that refuses requests above `limit_bytes`.
    pub fn with_limit(limit_bytes: Option<usize>) -> Self {
        Workspace {
            limit_bytes,
            ..Self::default()
        }
    }

    /// Workspace bounded by the config's `scratch_limit_bytes`.
    pub fn for_config(config: &KernelConfig) -> Self {
        Self::with_limit(config.scratch_limit_bytes)
    }

    pub fn limit_bytes(&self) -> Option<usize> {
        self.limit_bytes
    }

    /// Number of requests served so far.
    pub fn request_count(&self) -> usize {
        self.requests
    }

    /// Size in bytes of the most recent request.
    pub fn last_request_bytes(&self) -> usize {
        self.last_request_bytes
    }

    /// Hands out zeroed scratch slices for one compute call.
    ///
    /// # Errors
    /// `ResourceError` if the request exceeds the limit or memory cannot be reserved.
    pub(crate) fn request<T: EmbedFloat>(
        &mut self,
        size: ScratchSize,
    ) -> Result<(&mut [usize], &mut [T]), EmbedRustError> {
        let bytes = size.bytes(std::mem::size_of::<T>())?;
        if let Some(limit) = self.limit_bytes {
            if bytes > limit {
                return Err(EmbedRustError::ResourceError {
                    requested: bytes,
                    reason: format!("exceeds the scratch limit of {} bytes", limit),
                });
            }
        }
        self.requests += 1;
        self.last_request_bytes = bytes;
        log::trace!("scratch request #{}: {:?} ({} bytes)", self.requests, size, bytes);

        let (words, floats) = T::pools(self);
        reserve_zeroed(words, size.words, bytes)?;
        reserve_zeroed(floats, size.floats, bytes)?;
        Ok((&mut words[..size.words], &mut floats[..size.floats]))
    }

    /// Serves one request, runs `f` on the scratch and frees it afterwards.
    ///
    /// The memory is released whether `f` succeeds or fails, so a workspace
    /// reused across compute calls holds nothing between them.
    pub(crate) fn with_scratch<T, R, F>(
        &mut self,
        size: ScratchSize,
        f: F,
    ) -> Result<R, EmbedRustError>
    where
        T: EmbedFloat,
        F: FnOnce(&mut [usize], &mut [T]) -> Result<R, EmbedRustError>,
    {
        let result = match self.request::<T>(size) {
            Ok((words, floats)) => f(words, floats),
            Err(e) => Err(e),
        };
        self.release();
        result
    }

    /// Frees all scratch memory. The workspace stays usable.
    pub fn release(&mut self) {
        self.words = Vec::new();
        self.floats_f32 = Vec::new();
        self.floats_f64 = Vec::new();
    }

    /// Bytes currently held by the pools.
    pub fn capacity_bytes(&self) -> usize {
        self.words.capacity() * std::mem::size_of::<usize>()
            + self.floats_f32.capacity() * std::mem::size_of::<f32>()
            + self.floats_f64.capacity() * std::mem::size_of::<f64>()
    }
}

fn reserve_zeroed<E: Copy + Default>(
    buffer: &mut Vec<E>,
    len: usize,
    requested: usize,
) -> Result<(), EmbedRustError> {
    buffer.clear();
    buffer
        .try_reserve(len)
        .map_err(|e| EmbedRustError::ResourceError {
            requested,
            reason: e.to_string(),
        })?;
    buffer.resize(len, E::default());
    Ok(())
}
