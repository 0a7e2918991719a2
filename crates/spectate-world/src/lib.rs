#![forbid(unsafe_code)]

//! Host-world model for the `spectate` observer adapters.
//!
//! This crate is the world the adapters observe: an [`Instance`] tree with
//! attributes, properties, and lifecycle signals; a [`TagIndex`] tracking tag
//! membership; and a [`PlayerDirectory`] tracking sessions and their
//! character instances.
//!
//! Every mutation emits its change signals synchronously on the mutating
//! call, in a documented order, so adapter code layered on top can reason
//! about exactly when it runs. All types are cheap shared handles (`Rc`
//! inside); clones refer to the same underlying object, and equality is
//! identity, not structure.

pub mod instance;
pub mod players;
pub mod tags;
pub mod value;

pub use instance::{Instance, InstanceId};
pub use players::{ExitReason, Player, PlayerDirectory, PlayerLeave};
pub use tags::TagIndex;
pub use value::Value;
