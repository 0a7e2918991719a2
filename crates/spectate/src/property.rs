#![forbid(unsafe_code)]

//! Property observers.
//!
//! Same lifecycle contract as [`observe_attribute`](crate::observe_attribute),
//! applied to the property store: callback per qualifying value (including
//! the one present at registration), cleanup before the next callback, on
//! removal, and on stop.

use std::rc::Rc;

use spectate_signal::Connections;
use spectate_world::{Instance, Value};
use tracing::debug;

use crate::handle::ObserverHandle;
use crate::watch::{Cleanup, WatchSet};

/// Observes one property of `instance`.
///
/// ```
/// use spectate::observe_property;
/// use spectate::world::{Instance, Value};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let door = Instance::new("Part", "VaultDoor");
/// door.set_property("Material", "steel");
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let _handle = observe_property(&door, "Material", {
///     let seen = Rc::clone(&seen);
///     move |material: &Value| {
///         seen.borrow_mut().push(material.to_string());
///         None
///     }
/// });
///
/// door.set_property("Material", "wood");
/// assert_eq!(*seen.borrow(), vec!["steel", "wood"]);
/// ```
pub fn observe_property(
    instance: &Instance,
    name: &str,
    callback: impl Fn(&Value) -> Option<Cleanup> + 'static,
) -> ObserverHandle {
    let watch: WatchSet<()> = WatchSet::new();
    let callback: Rc<dyn Fn(&Value) -> Option<Cleanup>> = Rc::new(callback);

    let apply = {
        let watch = watch.clone();
        Rc::new(move |value: Option<&Value>| match value {
            Some(value) => watch.activate((), || callback(value)),
            None => watch.deactivate(&()),
        })
    };

    let mut connections = Connections::new();
    connections.hold(instance.property_changed(name).connect({
        let apply = Rc::clone(&apply);
        move |value: &Option<Value>| apply(value.as_ref())
    }));

    debug!(
        kind = "observe_property",
        instance = %instance.name(),
        property = name,
        "observer registered"
    );
    apply(instance.property(name).as_ref());

    ObserverHandle::new("observe_property", connections, move || watch.stop())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
