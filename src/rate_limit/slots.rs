//! Platform-wide concurrency slots.
//!
//! A [`SlotToken`] is a scoped guard: it returns its slot to the pool exactly
//! once, either through [`SlotToken::release`] or when it is dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Bounded counter of in-flight summaries. Never queues.
#[derive(Debug)]
pub struct SlotPool {
    in_use: AtomicUsize,
    max_concurrent: usize,
}

impl SlotPool {
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            in_use: AtomicUsize::new(0),
            max_concurrent,
        })
    }

    /// Take a slot, or `None` immediately if all slots are in use.
    pub fn try_acquire(self: &Arc<Self>) -> Option<SlotToken> {
        let max = self.max_concurrent;
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|previous| {
                debug!("Acquired concurrency slot ({}/{})", previous + 1, max);
                SlotToken {
                    pool: Arc::clone(self),
                    released: false,
                }
            })
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    fn give_back(&self) {
        // Never below zero.
        let _ = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

/// Proof of one held concurrency slot.
#[derive(Debug)]
#[must_use = "dropping a SlotToken releases its slot immediately"]
pub struct SlotToken {
    pool: Arc<SlotPool>,
    released: bool,
}

impl SlotToken {
    /// Return the slot now.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.pool.give_back();
            debug!("Released concurrency slot ({} in use)", self.pool.in_use());
        }
    }
}

impl Drop for SlotToken {
    fn drop(&mut self) {
        self.release_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_exceeds_max() {
        let pool = SlotPool::new(2);
        let a = pool.try_acquire();
        let b = pool.try_acquire();
        let c = pool.try_acquire();

        assert!(a.is_some());
        assert!(b.is_some());
        assert!(c.is_none());
        assert_eq!(pool.in_use(), 2);
    }

    #[test]
    fn test_release_and_drop_each_free_once() {
        let pool = SlotPool::new(2);
        let a = pool.try_acquire().unwrap();
        let b = pool.try_acquire().unwrap();

        a.release();
        assert_eq!(pool.in_use(), 1);

        drop(b);
        assert_eq!(pool.in_use(), 0);

        // Freed slots are reusable.
        assert!(pool.try_acquire().is_some());
    }

    #[test]
    fn test_concurrent_acquire_respects_bound() {
        let pool = SlotPool::new(8);
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || pool.try_acquire())
            })
            .collect();

        let tokens: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(tokens.len(), 8);
        assert_eq!(pool.in_use(), 8);
        drop(tokens);
        assert_eq!(pool.in_use(), 0);
    }
}
