#![forbid(unsafe_code)]

//! Synchronous signal and connection primitives.
//!
//! This crate provides the event plumbing the `spectate` observer adapters
//! are built on: [`Signal<T>`] is a multicast event source whose listeners
//! run synchronously on the emitting call stack, [`Connection`] is the
//! detach handle for a single listener, and [`Connections`] is a scope that
//! tears a whole set of them down at once.
//!
//! Everything here is single-threaded by design. Handles are cheap `Rc`
//! clones, listeners are `Fn(&T)`, and there is no locking anywhere; state
//! shared between a listener and the outside world goes through `Cell` or
//! `RefCell` owned by the caller.

pub mod scope;
pub mod signal;

pub use scope::Connections;
pub use signal::{Connection, ListenerId, Signal};
