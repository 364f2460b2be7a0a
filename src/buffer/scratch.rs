//! Scratch buffers - temporary page images for size-changing transforms.
//!
//! Compression and decompression need a second buffer of a different size
//! than the caller's. A [`ScratchPool`] hands these out as
//! [`ScratchBuffer`] guards; dropping the guard returns the storage to the
//! pool, so every exit path (success, `?`, panic unwind) releases exactly
//! once.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use log::trace;
use parking_lot::Mutex;

use crate::storage::page::PageImage;

/// A pool of reusable buffer storage.
///
/// # Thread Safety
/// - `free`: `Mutex` guarding idle storage, pushed and popped on every acquire
/// - counters: atomics, updated without the lock
pub struct ScratchPool {
    /// Idle storage, most recently released last.
    free: Mutex<Vec<Vec<u8>>>,

    /// Maximum number of idle buffers retained.
    limit: usize,

    /// Guards currently alive.
    outstanding: AtomicUsize,

    /// Total acquisitions since creation.
    acquisitions: AtomicU64,
}

impl ScratchPool {
    pub fn new(limit: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            limit,
            outstanding: AtomicUsize::new(0),
            acquisitions: AtomicU64::new(0),
        }
    }

    /// Acquire a scratch image of exactly `size` populated bytes.
    ///
    /// The contents are unspecified; callers overwrite what they use.
    pub fn acquire(&self, size: usize) -> ScratchBuffer<'_> {
        let reused = {
            let mut free = self.free.lock();
            free.iter()
                .position(|buf| buf.len() >= size)
                .map(|idx| free.swap_remove(idx))
        };

        let storage = match reused {
            Some(storage) => {
                trace!("scratch: reusing {}-byte buffer for {} bytes", storage.len(), size);
                storage
            }
            None => {
                trace!("scratch: allocating {} bytes", size);
                vec![0u8; size]
            }
        };

        self.outstanding.fetch_add(1, Ordering::Relaxed);
        self.acquisitions.fetch_add(1, Ordering::Relaxed);

        ScratchBuffer {
            pool: self,
            image: PageImage::from_storage(storage, size),
        }
    }

    fn release(&self, storage: Vec<u8>) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);

        let mut free = self.free.lock();
        if free.len() < self.limit && !storage.is_empty() {
            free.push(storage);
        }
    }

    /// Number of guards not yet dropped.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Number of idle buffers held for reuse.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl Default for ScratchPool {
    fn default() -> Self {
        Self::new(crate::common::config::DEFAULT_SCRATCH_POOL_LIMIT)
    }
}

/// RAII guard over a scratch image.
///
/// The image goes back to its pool when the guard drops. [`swap_with`]
/// exchanges contents with a caller's image, which is how a decompressed
/// block replaces the caller's buffer while the caller's old storage is
/// released through the pool.
///
/// [`swap_with`]: ScratchBuffer::swap_with
pub struct ScratchBuffer<'a> {
    pool: &'a ScratchPool,
    image: PageImage,
}

impl ScratchBuffer<'_> {
    #[inline]
    pub fn image(&self) -> &PageImage {
        &self.image
    }

    #[inline]
    pub fn image_mut(&mut self) -> &mut PageImage {
        &mut self.image
    }

    /// Exchange contents with `other`.
    pub fn swap_with(&mut self, other: &mut PageImage) {
        std::mem::swap(&mut self.image, other);
    }
}

impl Drop for ScratchBuffer<'_> {
    fn drop(&mut self) {
        let image = std::mem::replace(&mut self.image, PageImage::detached());
        self.pool.release(image.into_storage());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_sets_length() {
        let pool = ScratchPool::new(4);
        let scratch = pool.acquire(600);

        assert_eq!(scratch.image().len(), 600);
        assert!(scratch.image().capacity() >= 600);
        assert_eq!(pool.outstanding(), 1);
    }

    #[test]
    fn test_drop_releases_to_pool() {
        let pool = ScratchPool::new(4);
        {
            let _scratch = pool.acquire(128);
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_reuses_large_enough_buffer() {
        let pool = ScratchPool::new(4);
        drop(pool.acquire(1024));

        let scratch = pool.acquire(512);
        assert_eq!(scratch.image().len(), 512);
        assert_eq!(scratch.image().capacity(), 1024);
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.acquisitions(), 2);
    }

    #[test]
    fn test_small_buffer_not_reused_for_large_request() {
        let pool = ScratchPool::new(4);
        drop(pool.acquire(64));

        let scratch = pool.acquire(512);
        assert_eq!(scratch.image().capacity(), 512);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_limit_caps_idle_buffers() {
        let pool = ScratchPool::new(1);
        let a = pool.acquire(64);
        let b = pool.acquire(64);
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_swap_hands_old_storage_to_pool() {
        let pool = ScratchPool::new(4);
        let mut caller = PageImage::with_capacity(256);
        caller.set_len(256).unwrap();
        caller.as_mut_slice().fill(0x11);

        {
            let mut scratch = pool.acquire(900);
            scratch.image_mut().as_mut_slice().fill(0x22);
            scratch.swap_with(&mut caller);
        }

        assert_eq!(caller.len(), 900);
        assert!(caller.as_slice().iter().all(|&b| b == 0x22));
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 1);

        // The pooled storage is the caller's old 256-byte buffer.
        let reused = pool.acquire(200);
        assert_eq!(reused.image().capacity(), 256);
    }

    #[test]
    fn test_release_on_early_return() {
        fn fails(pool: &ScratchPool) -> Result<(), ()> {
            let _scratch = pool.acquire(64);
            Err(())
        }

        let pool = ScratchPool::new(4);
        assert!(fails(&pool).is_err());
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        use std::sync::Arc;
        use std::thread;

        let pool = Arc::new(ScratchPool::new(8));
        let mut handles = vec![];

        for t in 0..8 {
            let pool = Arc::clone(&pool);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    let mut scratch = pool.acquire(64 + (t * 100 + i) % 512);
                    scratch.image_mut().as_mut_slice()[0] = t as u8;
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.acquisitions(), 800);
        assert!(pool.idle() <= 8);
    }
}
