//! Execution settings for the gather and scatter-accumulate kernels.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::EmbedRustError;

/// Default amount of work (`positions * row_width` elements) below which kernels
/// stay on the calling thread.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 1 << 15;

/// Per-output write request, mirroring how a graph executor hands buffers to a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OpReq {
    /// The output is not needed; the kernel leaves it untouched.
    Null,
    /// Overwrite the output. Backward zero-initialises the gradient before accumulating.
    #[default]
    WriteTo,
    /// Accumulate into the existing contents of the output.
    AddTo,
}

/// Dedicated rayon pool, built on first use and shared by clones of a config.
#[derive(Clone, Default)]
struct PoolCache(Arc<Mutex<Option<Arc<rayon::ThreadPool>>>>);

impl fmt::Debug for PoolCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let built = self.0.lock().map(|slot| slot.is_some()).unwrap_or(false);
        f.debug_struct("PoolCache").field("built", &built).finish()
    }
}

// The cache is not part of a config's identity.
impl PartialEq for PoolCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for PoolCache {}

/// Kernel execution configuration.
///
/// Built once per host session and validated with [`KernelConfig::validate`];
/// every compute call reads it but never mutates it. With `num_threads` set, the
/// worker pool is built by the first parallel call and reused afterwards,
/// including by clones of the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Backward accumulates each row in index traversal order, giving bit-identical
    /// results for any thread count. When false, workers sum private partial
    /// buffers that are reduced afterwards; results are stable for a fixed worker
    /// count but may differ in the last bits from the sequential order.
    pub deterministic: bool,
    /// Worker threads. `None` uses rayon's global pool.
    pub num_threads: Option<usize>,
    /// Work below this many elements runs sequentially.
    pub parallel_threshold: usize,
    /// Upper bound on the scratch workspace requested by a single call.
    pub scratch_limit_bytes: Option<usize>,
    pool: PoolCache,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            deterministic: true,
            num_threads: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            scratch_limit_bytes: None,
            pool: PoolCache::default(),
        }
    }
}

impl KernelConfig {
    pub fn with_deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self.pool = PoolCache::default();
        self
    }

    pub fn with_parallel_threshold(mut self, parallel_threshold: usize) -> Self {
        self.parallel_threshold = parallel_threshold;
        self
    }

    pub fn with_scratch_limit(mut self, bytes: usize) -> Self {
        self.scratch_limit_bytes = Some(bytes);
        self
    }

    /// Checks the settings once, before any kernel runs.
    pub fn validate(&self) -> Result<(), EmbedRustError> {
        if self.num_threads == Some(0) {
            return Err(EmbedRustError::InvalidParameter {
                operation: "KernelConfig".to_string(),
                message: "num_threads must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// True when `work` elements are enough to go parallel.
    pub(crate) fn is_parallel(&self, work: usize) -> bool {
        work >= self.parallel_threshold && self.num_threads != Some(1)
    }

    /// Runs `f` inside the configured thread pool.
    ///
    /// Without `num_threads` the closure runs directly and rayon's global pool
    /// serves any parallel iterators inside it.
    pub(crate) fn install<R, F>(&self, f: F) -> Result<R, EmbedRustError>
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.validate()?;
        match self.num_threads {
            None => Ok(f()),
            Some(num_threads) => Ok(self.thread_pool(num_threads)?.install(f)),
        }
    }

    /// The cached pool of `num_threads` workers, built if missing or sized differently.
    fn thread_pool(&self, num_threads: usize) -> Result<Arc<rayon::ThreadPool>, EmbedRustError> {
        let mut slot = self
            .pool
            .0
            .lock()
            .map_err(|_| EmbedRustError::InternalError("thread pool cache poisoned".to_string()))?;
        if let Some(pool) = slot.as_ref() {
            if pool.current_num_threads() == num_threads {
                return Ok(Arc::clone(pool));
            }
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| EmbedRustError::ResourceError {
                requested: 0,
                reason: format!("failed to build a pool of {} threads: {}", num_threads, e),
            })?;
        log::debug!("built a kernel thread pool of {} workers", num_threads);
        let pool = Arc::new(pool);
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert!(config.deterministic);
        assert_eq!(config.num_threads, None);
        assert_eq!(config.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
        assert!(config.validate().is_ok());
        assert_eq!(OpReq::default(), OpReq::WriteTo);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let config = KernelConfig::default().with_num_threads(0);
        assert!(matches!(config.validate(), Err(EmbedRustError::InvalidParameter { .. })));
        assert!(config.install(|| 1).is_err());
    }

    #[test]
    fn test_install_with_dedicated_pool() {
        let config = KernelConfig::default().with_num_threads(3);
        let threads = config.install(rayon::current_num_threads).unwrap();
        assert_eq!(threads, 3);
    }

    #[test]
    fn test_repeated_installs_reuse_workers() {
        let config = KernelConfig::default().with_num_threads(2);
        let shared = config.clone();
        let mut workers = HashSet::new();
        for _ in 0..8 {
            workers.insert(config.install(|| thread::current().id()).unwrap());
            workers.insert(shared.install(|| thread::current().id()).unwrap());
        }
        assert!(workers.len() <= 2, "saw {} distinct workers", workers.len());
        assert!(!workers.contains(&thread::current().id()));
    }

    #[test]
    fn test_resized_config_gets_its_own_pool() {
        let config = KernelConfig::default().with_num_threads(2);
        assert_eq!(config.install(rayon::current_num_threads).unwrap(), 2);
        let wider = config.clone().with_num_threads(3);
        assert_eq!(wider.install(rayon::current_num_threads).unwrap(), 3);
        assert_eq!(config.install(rayon::current_num_threads).unwrap(), 2);
        assert_eq!(wider, KernelConfig::default().with_num_threads(3));
    }

    #[test]
    fn test_single_thread_never_parallel() {
        let config = KernelConfig::default().with_num_threads(1).with_parallel_threshold(0);
        assert!(!config.is_parallel(1_000_000));
        let config = KernelConfig::default().with_parallel_threshold(10);
        assert!(!config.is_parallel(9));
        assert!(config.is_parallel(10));
    }
}
