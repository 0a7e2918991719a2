#![forbid(unsafe_code)]

//! Observer adapters over the `spectate-world` model.
//!
//! Every adapter here follows one contract: subscribe to a slice of the
//! world, invoke the callback for each key that currently qualifies and for
//! each one that starts qualifying later, and hold on to the [`Cleanup`] the
//! callback may return. The cleanup runs when its key stops qualifying, and
//! again never: per key there is at most one pending cleanup, it runs before
//! any fresh callback for the same key, and [`ObserverHandle::stop`] drains
//! whatever is still pending exactly once.
//!
//! Adapters by observed slice:
//! - [`observe_attribute`] / [`observe_attribute_guarded`]: one instance's
//!   attribute value, optionally filtered by a predicate
//! - [`observe_property`]: one instance's property value
//! - [`observe_children`]: direct children of a parent instance
//! - [`observe_tag`] / [`observe_tag_within`]: tagged instances, optionally
//!   restricted to descendants of allowed roots
//! - [`observe_player`]: the player roster
//! - [`observe_character`] / [`observe_character_of`] /
//!   [`observe_local_character`]: player characters
//!
//! Dispatch is synchronous and single-threaded; callbacks run on the call
//! stack of whatever world mutation triggered them.
//!
//! # Example
//!
//! ```
//! use spectate::{Cleanup, observe_tag};
//! use spectate::world::{Instance, TagIndex};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let tags = TagIndex::new();
//! let door = Instance::new("Model", "Door");
//!
//! let open = Rc::new(Cell::new(0));
//! let handle = observe_tag(&tags, "Openable", {
//!     let open = Rc::clone(&open);
//!     move |_instance: &Instance| {
//!         open.set(open.get() + 1);
//!         let open = Rc::clone(&open);
//!         Some(Box::new(move || open.set(open.get() - 1)) as Cleanup)
//!     }
//! });
//!
//! tags.add_tag(&door, "Openable");
//! assert_eq!(open.get(), 1);
//!
//! tags.remove_tag(&door, "Openable");
//! assert_eq!(open.get(), 0);
//!
//! handle.stop();
//! ```

pub use spectate_signal as signal;
pub use spectate_world as world;

pub mod attribute;
pub mod character;
pub mod children;
pub mod error;
pub mod handle;
pub mod player;
pub mod property;
pub mod tag;
mod watch;

pub use attribute::{observe_attribute, observe_attribute_guarded};
pub use character::{observe_character, observe_character_of, observe_local_character};
pub use children::observe_children;
pub use error::ObserveError;
pub use handle::ObserverHandle;
pub use player::observe_player;
pub use property::observe_property;
pub use tag::{observe_tag, observe_tag_within};
pub use watch::Cleanup;
