//! # Recycler
//!
//! Thread-safe parking lot for reusable storage.

use parking_lot::Mutex;

/// Counters describing how well a [`Recycler`] is doing its job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecyclerStats {
    /// Acquisitions served from parked storage.
    pub reused: u64,
    /// Acquisitions that found nothing parked.
    pub missed: u64,
    /// Releases dropped because the recycler was full.
    pub dropped: u64,
}

/// A bounded free list of values that are expensive to build.
///
/// Despawn paths [`release`](Self::release) storage here and spawn paths
/// [`acquire`](Self::acquire) it back, so steady-state churn does not hit
/// the allocator. The lock is held only to push or pop one value.
pub struct Recycler<T> {
    inner: Mutex<RecyclerInner<T>>,
    max_parked: usize,
}

struct RecyclerInner<T> {
    parked: Vec<T>,
    stats: RecyclerStats,
}

impl<T> Recycler<T> {
    /// Creates a recycler that parks at most `max_parked` values.
    #[must_use]
    pub fn new(max_parked: usize) -> Self {
        Self {
            inner: Mutex::new(RecyclerInner {
                parked: Vec::with_capacity(max_parked),
                stats: RecyclerStats::default(),
            }),
            max_parked,
        }
    }

    /// Takes a parked value, if any.
    pub fn acquire(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let value = inner.parked.pop();
        if value.is_some() {
            inner.stats.reused += 1;
        } else {
            inner.stats.missed += 1;
        }
        value
    }

    /// Takes the first parked value accepted by `pred`.
    pub fn acquire_matching(&self, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
        let mut inner = self.inner.lock();
        let found = inner.parked.iter().rposition(|v| pred(v));
        match found {
            Some(pos) => {
                inner.stats.reused += 1;
                Some(inner.parked.swap_remove(pos))
            }
            None => {
                inner.stats.missed += 1;
                None
            }
        }
    }

    /// Parks a value for later reuse.
    ///
    /// Returns false (and drops the value) when the recycler is full.
    pub fn release(&self, value: T) -> bool {
        let mut inner = self.inner.lock();
        if inner.parked.len() >= self.max_parked {
            inner.stats.dropped += 1;
            return false;
        }
        inner.parked.push(value);
        true
    }

    /// Number of parked values.
    #[must_use]
    pub fn parked(&self) -> usize {
        self.inner.lock().parked.len()
    }

    /// Snapshot of the reuse counters.
    #[must_use]
    pub fn stats(&self) -> RecyclerStats {
        self.inner.lock().stats
    }
}

impl<T> Default for Recycler<T> {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_recycler_reuses_released_storage() {
        let recycler: Recycler<Vec<u8>> = Recycler::new(4);
        assert!(recycler.acquire().is_none());

        let mut buf = Vec::with_capacity(128);
        buf.push(1);
        buf.clear();
        assert!(recycler.release(buf));

        let reused = recycler.acquire().unwrap();
        assert!(reused.capacity() >= 128);

        let stats = recycler.stats();
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.missed, 1);
    }

    #[test]
    fn test_recycler_bounded() {
        let recycler: Recycler<u32> = Recycler::new(1);
        assert!(recycler.release(1));
        assert!(!recycler.release(2));
        assert_eq!(recycler.parked(), 1);
        assert_eq!(recycler.stats().dropped, 1);
    }

    #[test]
    fn test_recycler_acquire_matching() {
        let recycler: Recycler<Vec<u8>> = Recycler::new(4);
        recycler.release(Vec::with_capacity(8));
        recycler.release(Vec::with_capacity(64));

        let big = recycler.acquire_matching(|v| v.capacity() >= 64).unwrap();
        assert!(big.capacity() >= 64);
        assert!(recycler.acquire_matching(|v| v.capacity() >= 64).is_none());
        assert_eq!(recycler.parked(), 1);
    }

    #[test]
    fn test_recycler_shared_across_threads() {
        let recycler = Arc::new(Recycler::<u64>::new(1024));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let r = Arc::clone(&recycler);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        r.release(t * 1000 + i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(recycler.parked(), 400);
    }
}
