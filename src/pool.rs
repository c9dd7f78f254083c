//! Size-classed byte buffer pool.
//!
//! Every token buffer in the crate grows through a [`BufferPool`] so that
//! repeated encodes and decodes recycle their allocations. A buffer of `n`
//! bytes lives in class `n / scale`; see [`PoolConfig`] for the layout.
//!
//! ```rust
//! use kat::{BufferPool, PoolConfig};
//!
//! let pool = BufferPool::new(PoolConfig::default()).unwrap();
//! let buf = pool.acquire(100).unwrap();
//! assert!(buf.capacity() >= 100);
//! assert!(pool.release(buf));
//! ```

use crate::{Error, PoolConfig, Result};
use parking_lot::Mutex;
use std::sync::OnceLock;

static GLOBAL: OnceLock<BufferPool> = OnceLock::new();

/// A process-shareable pool of `Vec<u8>` buffers grouped by size class.
#[derive(Debug)]
pub struct BufferPool {
    config: PoolConfig,
    classes: Mutex<Vec<Vec<Vec<u8>>>>,
}

impl BufferPool {
    /// Creates a pool with the given layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the layout does not validate.
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let classes = (0..config.size).map(|_| Vec::new()).collect();
        Ok(BufferPool {
            config,
            classes: Mutex::new(classes),
        })
    }

    /// The process-wide pool, configured from the environment on first use
    /// unless [`install`] ran before.
    pub fn global() -> &'static BufferPool {
        GLOBAL.get_or_init(|| {
            let config = PoolConfig::from_env().unwrap_or_else(|err| {
                tracing::warn!(%err, "ignoring pool environment, using defaults");
                PoolConfig::default()
            });
            BufferPool {
                classes: Mutex::new((0..config.size).map(|_| Vec::new()).collect()),
                config,
            }
        })
    }

    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Size class of a byte length.
    #[must_use]
    pub fn class_of(&self, len: usize) -> usize {
        len / self.config.scale
    }

    /// Capacity handed out for a class: the top of its byte range.
    fn class_capacity(&self, class: usize) -> usize {
        (class + 1) * self.config.scale - 1
    }

    /// Checks out an empty buffer able to hold `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceLimit`] when `size` falls at or beyond the hard limit.
    pub fn acquire(&self, size: usize) -> Result<Vec<u8>> {
        self.resize(Vec::new(), size)
    }

    /// Returns a buffer holding `buf`'s contents with capacity for at least `size` bytes.
    ///
    /// `buf` comes back untouched when it already fits. Otherwise the contents
    /// move into a pooled or freshly allocated buffer of the matching class and
    /// the old allocation is released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceLimit`] when the class of `size` reaches the
    /// configured limit. The request is refused rather than truncated.
    pub fn resize(&self, buf: Vec<u8>, size: usize) -> Result<Vec<u8>> {
        if buf.capacity() >= size {
            return Ok(buf);
        }
        let class = self.class_of(size);
        if class >= self.config.limit {
            tracing::error!(
                requested = size,
                limit = self.config.max_bytes(),
                "buffer request exceeds the pool limit"
            );
            return Err(Error::resource_limit(size, self.config.max_bytes()));
        }

        let capacity = self.class_capacity(class);
        let mut grown = if class < self.config.size {
            self.classes.lock()[class].pop().unwrap_or_default()
        } else {
            Vec::new()
        };
        if grown.capacity() < size {
            grown.reserve_exact(capacity);
        }
        grown.extend_from_slice(&buf);
        self.release(buf);
        Ok(grown)
    }

    /// Hands a buffer back. Returns `true` if the pool kept it.
    pub fn release(&self, mut buf: Vec<u8>) -> bool {
        let capacity = buf.capacity();
        if capacity == 0 {
            return false;
        }
        let class = self.class_of(capacity);
        if class >= self.config.size {
            return false;
        }
        let mut classes = self.classes.lock();
        let free = &mut classes[class];
        if free.len() >= self.config.depth {
            return false;
        }
        buf.clear();
        free.push(buf);
        true
    }

    /// Number of buffers currently parked in the pool.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.classes.lock().iter().map(Vec::len).sum()
    }
}

/// Installs the process-wide pool before its first use.
///
/// # Errors
///
/// Returns [`Error::Config`] if the layout is invalid or the global pool was
/// already initialised.
pub fn install(config: PoolConfig) -> Result<()> {
    let pool = BufferPool::new(config)?;
    GLOBAL
        .set(pool)
        .map_err(|_| Error::config("the global buffer pool is already initialised"))
}
