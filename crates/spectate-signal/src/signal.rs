#![forbid(unsafe_code)]

//! Multicast signals with synchronous dispatch.
//!
//! A [`Signal<T>`] is a list of listeners behind a shared handle. Cloning a
//! signal clones the handle, not the listener list, so any clone can emit or
//! connect. [`emit`](Signal::emit) invokes every listener on the calling
//! stack before it returns; there is no queue and no deferral.
//!
//! # Dispatch semantics
//!
//! Emission snapshots the listener list first and then runs the snapshot, so
//! listeners may connect and disconnect freely while a dispatch is in flight:
//!
//! | Action during `emit`      | Effect on the current round                |
//! |---------------------------|--------------------------------------------|
//! | `connect`                 | not called until the next `emit`           |
//! | `disconnect` (any target) | still called if already in the snapshot    |
//! | nested `emit`             | runs to completion inside the listener     |
//!
//! # Invariants
//!
//! - Listeners run in connection order.
//! - A [`Connection`] detaches its listener at most once, whether dropped or
//!   explicitly [`disconnect`](Connection::disconnect)ed.
//! - Dropping the last `Signal` handle frees the listener list; surviving
//!   `Connection`s become inert rather than dangling.
//!
//! # Example
//!
//! ```
//! use spectate_signal::Signal;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let health: Signal<i64> = Signal::new();
//! let seen = Rc::new(Cell::new(0));
//!
//! let conn = health.connect({
//!     let seen = Rc::clone(&seen);
//!     move |hp| seen.set(*hp)
//! });
//!
//! health.emit(&75);
//! assert_eq!(seen.get(), 75);
//!
//! conn.disconnect();
//! health.emit(&20);
//! assert_eq!(seen.get(), 75);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Identifier of a single listener registration, unique per signal.
pub type ListenerId = u64;

type ListenerFn<T> = Rc<dyn Fn(&T)>;

// ---------------------------------------------------------------------------
// Signal<T>
// ---------------------------------------------------------------------------

struct SignalInner<T> {
    listeners: Vec<(ListenerId, ListenerFn<T>)>,
    next_id: ListenerId,
}

impl<T> SignalInner<T> {
    fn detach(&mut self, id: ListenerId) {
        if let Some(pos) = self.listeners.iter().position(|(lid, _)| *lid == id) {
            // Vec::remove keeps the remaining listeners in connection order.
            self.listeners.remove(pos);
        }
    }
}

/// Type-erased detach entry point so [`Connection`] does not carry `T`.
trait DetachListener {
    fn detach_listener(&self, id: ListenerId);
}

impl<T> DetachListener for RefCell<SignalInner<T>> {
    fn detach_listener(&self, id: ListenerId) {
        // emit() never holds this borrow while listeners run, so detaching
        // from inside a listener cannot double-borrow.
        self.borrow_mut().detach(id);
    }
}

/// A multicast event source with synchronous, re-entrancy-safe dispatch.
///
/// See the [module docs](self) for dispatch semantics.
pub struct Signal<T> {
    inner: Rc<RefCell<SignalInner<T>>>,
}

impl<T> Signal<T> {
    /// Creates a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Number of currently connected listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Invokes every connected listener with `value`, in connection order.
    ///
    /// The listener list is snapshotted before the first call, so listeners
    /// may connect or disconnect (including themselves) during dispatch.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<ListenerFn<T>> = {
            let inner = self.inner.borrow();
            inner.listeners.iter().map(|(_, f)| Rc::clone(f)).collect()
        };
        for listener in snapshot {
            listener(value);
        }
    }
}

impl<T: 'static> Signal<T> {
    /// Connects `listener` and returns the handle that detaches it.
    ///
    /// The listener runs on every subsequent [`emit`](Signal::emit) until the
    /// returned [`Connection`] is disconnected or dropped.
    #[must_use = "dropping the connection immediately detaches the listener"]
    pub fn connect(&self, listener: impl Fn(&T) + 'static) -> Connection {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Rc::new(listener)));
            id
        };
        let host: Rc<dyn DetachListener> = Rc::clone(&self.inner) as Rc<dyn DetachListener>;
        Connection {
            host: Rc::downgrade(&host),
            id,
            live: Cell::new(true),
        }
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Detach handle for one listener on one [`Signal`].
///
/// Disconnecting is idempotent: the first call (or the drop) removes the
/// listener, later calls are no-ops. A connection whose signal has already
/// been dropped is inert.
#[must_use = "connections detach their listener when dropped"]
pub struct Connection {
    host: Weak<dyn DetachListener>,
    id: ListenerId,
    live: Cell<bool>,
}

impl Connection {
    /// Removes the listener from its signal, if still attached.
    pub fn disconnect(&self) {
        if !self.live.replace(false) {
            return;
        }
        if let Some(host) = self.host.upgrade() {
            host.detach_listener(self.id);
        }
    }

    /// True while the listener is attached and its signal is alive.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.live.get() && self.host.strong_count() > 0
    }

    /// The registration id this connection controls.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_connected_listener() {
        let signal: Signal<i32> = Signal::new();
        let seen = Rc::new(Cell::new(0));

        let _conn = signal.connect({
            let seen = Rc::clone(&seen);
            move |v| seen.set(*v)
        });

        signal.emit(&42);
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn listeners_run_in_connection_order() {
        let signal: Signal<()> = Signal::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let _a = signal.connect({
            let order = Rc::clone(&order);
            move |_| order.borrow_mut().push("a")
        });
        let _b = signal.connect({
            let order = Rc::clone(&order);
            move |_| order.borrow_mut().push("b")
        });
        let _c = signal.connect({
            let order = Rc::clone(&order);
            move |_| order.borrow_mut().push("c")
        });

        signal.emit(&());
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn disconnect_stops_delivery() {
        let signal: Signal<i32> = Signal::new();
        let count = Rc::new(Cell::new(0));

        let conn = signal.connect({
            let count = Rc::clone(&count);
            move |_| count.set(count.get() + 1)
        });

        signal.emit(&1);
        conn.disconnect();
        signal.emit(&2);

        assert_eq!(count.get(), 1);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn drop_disconnects() {
        let signal: Signal<i32> = Signal::new();
        let count = Rc::new(Cell::new(0));

        {
            let _conn = signal.connect({
                let count = Rc::clone(&count);
                move |_| count.set(count.get() + 1)
            });
            signal.emit(&1);
        }

        signal.emit(&2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let signal: Signal<()> = Signal::new();
        let conn = signal.connect(|_| {});

        conn.disconnect();
        conn.disconnect();
        assert!(!conn.is_connected());
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn connection_outlives_signal() {
        let conn = {
            let signal: Signal<u8> = Signal::new();
            signal.connect(|_| {})
        };
        assert!(!conn.is_connected());
        conn.disconnect();
    }

    #[test]
    fn emit_with_no_listeners_is_noop() {
        let signal: Signal<String> = Signal::new();
        signal.emit(&"nobody home".to_string());
    }

    #[test]
    fn listener_count_tracks_lifecycle() {
        let signal: Signal<()> = Signal::new();
        assert_eq!(signal.listener_count(), 0);

        let a = signal.connect(|_| {});
        let b = signal.connect(|_| {});
        assert_eq!(signal.listener_count(), 2);

        a.disconnect();
        assert_eq!(signal.listener_count(), 1);
        drop(b);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn clone_shares_listener_list() {
        let signal: Signal<i32> = Signal::new();
        let clone = signal.clone();
        let seen = Rc::new(Cell::new(0));

        let _conn = clone.connect({
            let seen = Rc::clone(&seen);
            move |v| seen.set(*v)
        });

        signal.emit(&7);
        assert_eq!(seen.get(), 7);
        assert_eq!(signal.listener_count(), 1);
    }

    #[test]
    fn disconnect_during_emit_still_delivers_current_round() {
        let signal: Signal<()> = Signal::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        // First listener disconnects the second mid-round; the snapshot has
        // already been taken, so the second still runs this round.
        let second_slot: Rc<RefCell<Option<Connection>>> = Rc::new(RefCell::new(None));

        let _first = signal.connect({
            let order = Rc::clone(&order);
            let second_slot = Rc::clone(&second_slot);
            move |_| {
                order.borrow_mut().push("first");
                if let Some(conn) = second_slot.borrow_mut().take() {
                    conn.disconnect();
                }
            }
        });
        let second = signal.connect({
            let order = Rc::clone(&order);
            move |_| order.borrow_mut().push("second")
        });
        *second_slot.borrow_mut() = Some(second);

        signal.emit(&());
        assert_eq!(*order.borrow(), vec!["first", "second"]);

        signal.emit(&());
        assert_eq!(*order.borrow(), vec!["first", "second", "first"]);
    }

    #[test]
    fn listener_can_disconnect_itself() {
        let signal: Signal<()> = Signal::new();
        let count = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Connection>>> = Rc::new(RefCell::new(None));

        let conn = signal.connect({
            let count = Rc::clone(&count);
            let slot = Rc::clone(&slot);
            move |_| {
                count.set(count.get() + 1);
                if let Some(conn) = slot.borrow_mut().take() {
                    conn.disconnect();
                }
            }
        });
        *slot.borrow_mut() = Some(conn);

        signal.emit(&());
        signal.emit(&());
        assert_eq!(count.get(), 1, "listener should only fire once");
    }

    #[test]
    fn connect_during_emit_waits_for_next_round() {
        let signal: Signal<()> = Signal::new();
        let late_calls = Rc::new(Cell::new(0));
        let held: Rc<RefCell<Vec<Connection>>> = Rc::new(RefCell::new(Vec::new()));

        let _outer = signal.connect({
            let signal = signal.clone();
            let late_calls = Rc::clone(&late_calls);
            let held = Rc::clone(&held);
            move |_| {
                if held.borrow().is_empty() {
                    let late_calls = Rc::clone(&late_calls);
                    let conn = signal.connect(move |_| late_calls.set(late_calls.get() + 1));
                    held.borrow_mut().push(conn);
                }
            }
        });

        signal.emit(&());
        assert_eq!(late_calls.get(), 0, "not part of the first snapshot");

        signal.emit(&());
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn nested_emit_runs_to_completion() {
        let signal: Signal<u32> = Signal::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let _conn = signal.connect({
            let signal = signal.clone();
            let log = Rc::clone(&log);
            move |depth| {
                log.borrow_mut().push(*depth);
                if *depth == 0 {
                    signal.emit(&1);
                }
            }
        });

        signal.emit(&0);
        assert_eq!(*log.borrow(), vec![0, 1]);
    }

    #[test]
    fn unit_payload_signal() {
        let signal: Signal<()> = Signal::new();
        let hits = Rc::new(Cell::new(0));
        let _conn = signal.connect({
            let hits = Rc::clone(&hits);
            move |_| hits.set(hits.get() + 1)
        });
        signal.emit(&());
        signal.emit(&());
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn debug_formats_without_panicking() {
        let signal: Signal<i32> = Signal::new();
        let conn = signal.connect(|_| {});
        assert!(format!("{signal:?}").contains("Signal"));
        assert!(format!("{conn:?}").contains("Connection"));
    }
}
