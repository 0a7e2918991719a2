#![forbid(unsafe_code)]

//! Bulk teardown scopes for signal connections.
//!
//! Observer-style code tends to accumulate a handful of [`Connection`]s that
//! all share one lifetime. [`Connections`] owns such a set and detaches every
//! listener either on [`clear`](Connections::clear) or when the scope drops,
//! so teardown is a single move instead of a field per connection.

use std::fmt;

use crate::signal::Connection;

/// An owning bag of [`Connection`]s with all-at-once teardown.
///
/// ```
/// use spectate_signal::{Connections, Signal};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let signal: Signal<i32> = Signal::new();
/// let hits = Rc::new(Cell::new(0));
///
/// let mut scope = Connections::new();
/// scope.hold(signal.connect({
///     let hits = Rc::clone(&hits);
///     move |_| hits.set(hits.get() + 1)
/// }));
///
/// signal.emit(&1);
/// scope.clear();
/// signal.emit(&2);
/// assert_eq!(hits.get(), 1);
/// ```
#[derive(Default)]
pub struct Connections {
    held: Vec<Connection>,
}

impl Connections {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self { held: Vec::new() }
    }

    /// Takes ownership of `connection`; it stays attached until the scope is
    /// cleared or dropped.
    pub fn hold(&mut self, connection: Connection) {
        self.held.push(connection);
    }

    /// Disconnects and discards every held connection. The scope is reusable
    /// afterwards.
    pub fn clear(&mut self) {
        // Dropping each Connection detaches its listener.
        self.held.clear();
    }

    /// Number of connections currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// True when no connections are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

impl fmt::Debug for Connections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connections")
            .field("held", &self.held.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
