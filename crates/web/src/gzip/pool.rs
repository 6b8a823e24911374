use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::BytesMut;
use flate2::Compression;
use tracing::trace;

use crate::gzip::deflater::Deflater;

/// A bounded pool of [`Deflater`]s.
///
/// At most `capacity` engines are checked out at once; idle engines are
/// kept for reuse.
#[derive(Debug, Clone)]
pub struct DeflaterPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    idle: Mutex<Vec<Deflater>>,
    capacity: usize,
    checked_out: AtomicUsize,
    level: Compression,
}

impl DeflaterPool {
    pub fn new(capacity: usize, level: Compression) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(Vec::new()),
                capacity,
                checked_out: AtomicUsize::new(0),
                level,
            }),
        }
    }

    /// Checks out an engine, or returns `None` when the pool is exhausted.
    pub fn acquire(&self) -> Option<DeflaterEntry> {
        let capacity = self.inner.capacity;
        self.inner
            .checked_out
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| (current < capacity).then_some(current + 1))
            .ok()?;

        let deflater = self.inner.idle().pop();
        Some(DeflaterEntry { deflater, pool: Arc::clone(&self.inner) })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn checked_out(&self) -> usize {
        self.inner.checked_out.load(Ordering::Acquire)
    }

    pub fn idle(&self) -> usize {
        self.inner.idle().len()
    }
}

impl PoolInner {
    fn idle(&self) -> MutexGuard<'_, Vec<Deflater>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A checked out [`Deflater`]; it goes back to its pool when released or dropped.
#[derive(Debug)]
pub struct DeflaterEntry {
    deflater: Option<Deflater>,
    pool: Arc<PoolInner>,
}

impl DeflaterEntry {
    /// The engine, created lazily on first use.
    pub fn deflater(&mut self) -> &mut Deflater {
        let level = self.pool.level;
        self.deflater.get_or_insert_with(|| Deflater::new(level))
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for DeflaterEntry {
    fn drop(&mut self) {
        if let Some(mut deflater) = self.deflater.take() {
            deflater.reset();
            let mut idle = self.pool.idle();
            if idle.len() < self.pool.capacity {
                idle.push(deflater);
            }
        }
        self.pool.checked_out.fetch_sub(1, Ordering::AcqRel);
        trace!(checked_out = self.pool.checked_out.load(Ordering::Relaxed), "deflater returned to pool");
    }
}

/// A pool of reusable output buffers.
#[derive(Debug)]
pub struct ByteBufferPool {
    buffers: Mutex<Vec<BytesMut>>,
    max_idle: usize,
}

impl ByteBufferPool {
    pub fn new(max_idle: usize) -> Self {
        Self { buffers: Mutex::new(Vec::new()), max_idle }
    }

    /// Returns an empty buffer with at least `size` bytes of capacity.
    pub fn acquire(&self, size: usize) -> BytesMut {
        let mut buffers = self.buffers();
        match buffers.iter().rposition(|buffer| buffer.capacity() >= size) {
            Some(index) => {
                let mut buffer = buffers.swap_remove(index);
                buffer.clear();
                buffer
            }
            None => BytesMut::with_capacity(size),
        }
    }

    pub fn release(&self, mut buffer: BytesMut) {
        buffer.clear();
        let mut buffers = self.buffers();
        if buffers.len() < self.max_idle {
            buffers.push(buffer);
        }
    }

    pub fn idle(&self) -> usize {
        self.buffers().len()
    }

    fn buffers(&self) -> MutexGuard<'_, Vec<BytesMut>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ByteBufferPool {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_checkout() {
        let pool = DeflaterPool::new(2, Compression::default());
        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert!(pool.acquire().is_none());
        assert_eq!(pool.checked_out(), 2);

        first.release();
        assert_eq!(pool.checked_out(), 1);
        assert!(pool.acquire().is_some());
        drop(second);
        assert_eq!(pool.checked_out(), 0);
    }

    #[test]
    fn used_engine_is_reused() {
        let pool = DeflaterPool::new(4, Compression::fast());
        let mut entry = pool.acquire().unwrap();
        entry.deflater().finish();
        drop(entry);
        assert_eq!(pool.idle(), 1);

        let mut entry = pool.acquire().unwrap();
        assert_eq!(pool.idle(), 0);
        assert!(!entry.deflater().finished());
    }

    #[test]
    fn unused_entry_keeps_pool_empty() {
        let pool = DeflaterPool::new(1, Compression::fast());
        drop(pool.acquire().unwrap());
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.checked_out(), 0);
    }

    #[test]
    fn buffers_are_recycled() {
        let pool = ByteBufferPool::new(1);
        let mut buffer = pool.acquire(128);
        buffer.extend_from_slice(b"payload");
        pool.release(buffer);
        pool.release(BytesMut::with_capacity(8));
        assert_eq!(pool.idle(), 1);

        let buffer = pool.acquire(64);
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= 128);
        assert_eq!(pool.idle(), 0);
    }
}
