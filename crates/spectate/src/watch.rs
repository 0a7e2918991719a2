#![forbid(unsafe_code)]

//! Per-key cleanup bookkeeping shared by every observer adapter.
//!
//! A [`WatchSet<K>`] holds at most one pending [`Cleanup`] per key and a
//! latched stopped flag. Adapters translate their events into
//! [`activate`](WatchSet::activate) (key qualifies: run the superseded
//! cleanup, invoke the callback, store what it returns) and
//! [`deactivate`](WatchSet::deactivate) (key disqualifies: run and discard).
//! [`stop`](WatchSet::stop) drains everything exactly once and makes both
//! operations permanent no-ops.
//!
//! Callbacks may re-enter the watch-set for their own key, either directly or
//! by mutating the world. Each qualification event stamps the key with a
//! fresh version; when the stamp observed at entry is gone by the time the
//! callback returns, the returned cleanup belongs to a superseded
//! qualification and runs immediately instead of being stored.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use tracing::trace;

/// Teardown closure returned by an observer callback. Runs at most once, when
/// the observed key disqualifies or the observer stops.
pub type Cleanup = Box<dyn FnOnce()>;

struct WatchState<K> {
    cleanups: HashMap<K, Cleanup>,
    versions: HashMap<K, u64>,
    next_version: u64,
    stopped: bool,
}

/// Shared handle to one observer's cleanup bookkeeping.
pub(crate) struct WatchSet<K> {
    inner: Rc<RefCell<WatchState<K>>>,
}

impl<K: Eq + Hash + Clone + fmt::Debug> WatchSet<K> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(WatchState {
                cleanups: HashMap::new(),
                versions: HashMap::new(),
                next_version: 0,
                stopped: false,
            })),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_stopped(&self) -> bool {
        self.inner.borrow().stopped
    }

    /// Number of pending cleanups.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.inner.borrow().cleanups.len()
    }

    /// Number of keys holding a qualification stamp.
    #[cfg(test)]
    pub(crate) fn stamped(&self) -> usize {
        self.inner.borrow().versions.len()
    }

    /// Key qualified: runs any superseded cleanup for `key`, invokes
    /// `callback`, and stores the cleanup it returns.
    ///
    /// No-op once stopped. If the observer stops or the key's qualification
    /// changes while `callback` runs, the returned cleanup is already stale
    /// and runs before this call returns.
    pub(crate) fn activate(&self, key: K, callback: impl FnOnce() -> Option<Cleanup>) {
        let (stamp, superseded) = {
            let mut state = self.inner.borrow_mut();
            if state.stopped {
                return;
            }
            let stamp = state.next_version;
            state.next_version += 1;
            state.versions.insert(key.clone(), stamp);
            (stamp, state.cleanups.remove(&key))
        };
        if let Some(cleanup) = superseded {
            trace!(key = ?key, "running superseded cleanup");
            cleanup();
        }

        let Some(cleanup) = callback() else {
            return;
        };
        let stale = {
            let mut state = self.inner.borrow_mut();
            if state.stopped || state.versions.get(&key) != Some(&stamp) {
                Some(cleanup)
            } else {
                state.cleanups.insert(key, cleanup);
                None
            }
        };
        if let Some(cleanup) = stale {
            trace!("running cleanup immediately, qualification moved on during callback");
            cleanup();
        }
    }

    /// Key disqualified: runs and discards the pending cleanup, if any.
    /// No-op once stopped.
    ///
    /// Drops the key's version stamp, so the bookkeeping stays bounded by the
    /// currently-qualified key set. An in-flight `activate` for the key sees
    /// its stamp gone and retires its cleanup.
    pub(crate) fn deactivate(&self, key: &K) {
        let pending = {
            let mut state = self.inner.borrow_mut();
            if state.stopped {
                return;
            }
            state.versions.remove(key);
            state.cleanups.remove(key)
        };
        if let Some(cleanup) = pending {
            trace!(key = ?key, "running cleanup");
            cleanup();
        }
    }

    /// Latches the stopped flag and runs every pending cleanup exactly once.
    /// Subsequent calls (and all later activity) are no-ops.
    pub(crate) fn stop(&self) {
        let drained: Vec<Cleanup> = {
            let mut state = self.inner.borrow_mut();
            if state.stopped {
                return;
            }
            state.stopped = true;
            state.versions.clear();
            state.cleanups.drain().map(|(_, cleanup)| cleanup).collect()
        };
        trace!(pending = drained.len(), "watch set stopped");
        for cleanup in drained {
            cleanup();
        }
    }
}

impl<K> Clone for WatchSet<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K> fmt::Debug for WatchSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("WatchSet")
            .field("pending", &state.cleanups.len())
            .field("stopped", &state.stopped)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
