#![forbid(unsafe_code)]

//! Stop tokens for running observers.

use std::cell::RefCell;
use std::fmt;

use spectate_signal::Connections;
use tracing::debug;

struct Active {
    connections: Connections,
    teardown: Box<dyn FnOnce()>,
}

/// Stop token returned by every `observe_*` adapter.
///
/// [`stop`](ObserverHandle::stop) first disconnects the observer's signal
/// connections, so no further events can re-enter it, then runs the pending
/// cleanups through the teardown closure. Stopping is idempotent, runs
/// entirely on the calling stack, and also happens when the handle drops, so
/// an observer cannot outlive the handle by accident.
#[must_use = "dropping the handle stops the observer"]
pub struct ObserverHandle {
    kind: &'static str,
    active: RefCell<Option<Active>>,
}

impl ObserverHandle {
    pub(crate) fn new(
        kind: &'static str,
        connections: Connections,
        teardown: impl FnOnce() + 'static,
    ) -> Self {
        Self {
            kind,
            active: RefCell::new(Some(Active {
                connections,
                teardown: Box::new(teardown),
            })),
        }
    }

    /// Stops the observer: disconnects its signal connections, then runs
    /// every pending cleanup exactly once. Later calls are no-ops.
    pub fn stop(&self) {
        let Some(active) = self.active.borrow_mut().take() else {
            return;
        };
        // Connections first: a cleanup that mutates the world must not feed
        // events back into the observer it is tearing down.
        drop(active.connections);
        (active.teardown)();
        debug!(kind = self.kind, "observer stopped");
    }

    /// True once [`stop`](ObserverHandle::stop) has run (or the handle began
    /// dropping).
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.active.borrow().is_none()
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverHandle")
            .field("kind", &self.kind)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
