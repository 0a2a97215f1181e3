//! Per-display mutation locks.
//!
//! Every mutation holds the lock of each display it touches. Locks are
//! reentrant so a mutation can call another one on the same thread, and
//! multi-display mutations take them in ascending display id.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::lock_api::ArcReentrantMutexGuard;
use parking_lot::{RawMutex, RawThreadId, ReentrantMutex};

use crate::modules::wm::state::DisplayId;

type DisplayLock = Arc<ReentrantMutex<()>>;
type DisplayGuard = ArcReentrantMutexGuard<RawMutex, RawThreadId, ()>;

/// Lazily created reentrant lock per display.
#[derive(Debug, Default)]
pub struct DisplayLocks {
    locks: DashMap<DisplayId, DisplayLock>,
}

/// Guards held for the duration of one mutation, released on drop.
pub struct DisplayGuards {
    held: Vec<(DisplayId, DisplayGuard)>,
}

impl DisplayLocks {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn lock_for(&self, id: DisplayId) -> DisplayLock {
        Arc::clone(&self.locks.entry(id).or_default())
    }

    /// Lock the given displays in ascending id order, skipping duplicates.
    #[must_use]
    pub fn acquire(&self, ids: &[DisplayId]) -> DisplayGuards {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let held = ids.into_iter().map(|id| (id, self.lock_for(id).lock_arc())).collect();
        DisplayGuards { held }
    }

    /// Forget the lock of a removed display.
    pub fn remove(&self, id: DisplayId) { self.locks.remove(&id); }

    #[must_use]
    pub fn len(&self) -> usize { self.locks.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.locks.is_empty() }
}

impl DisplayGuards {
    /// Displays held, ascending.
    #[must_use]
    pub fn displays(&self) -> Vec<DisplayId> { self.held.iter().map(|(id, _)| *id).collect() }
}

impl std::fmt::Debug for DisplayGuards {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayGuards").field("displays", &self.displays()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_acquire_sorts_and_dedups() {
        let locks = DisplayLocks::new();
        let guards = locks.acquire(&[3, 1, 3, 2]);
        assert_eq!(guards.displays(), vec![1, 2, 3]);
        assert_eq!(locks.len(), 3);
    }

    #[test]
    fn test_same_thread_reentry() {
        let locks = DisplayLocks::new();
        let _outer = locks.acquire(&[0]);
        let inner = locks.acquire(&[0, 1]);
        assert_eq!(inner.displays(), vec![0, 1]);
    }

    #[test]
    fn test_other_thread_waits() {
        let locks = Arc::new(DisplayLocks::new());
        let entered = Arc::new(AtomicUsize::new(0));

        let guards = locks.acquire(&[5]);
        let worker = {
            let locks = Arc::clone(&locks);
            let entered = Arc::clone(&entered);
            thread::spawn(move || {
                let _guards = locks.acquire(&[5]);
                entered.fetch_add(1, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(entered.load(Ordering::SeqCst), 0);
        drop(guards);
        worker.join().unwrap();
        assert_eq!(entered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_forgets_lock() {
        let locks = DisplayLocks::new();
        drop(locks.acquire(&[9]));
        locks.remove(9);
        assert!(locks.is_empty());
    }
}
