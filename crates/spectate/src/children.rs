#![forbid(unsafe_code)]

//! Child observers.
//!
//! [`observe_children`] runs its callback once per direct child of a parent
//! instance: the children present at registration, then every later
//! addition. The per-child cleanup runs when that child leaves the parent,
//! whether by reparenting or destruction, and on stop. Grandchildren are out
//! of scope; only direct children count.

use std::rc::Rc;

use spectate_signal::Connections;
use spectate_world::{Instance, InstanceId};
use tracing::debug;

use crate::handle::ObserverHandle;
use crate::watch::{Cleanup, WatchSet};

/// Observes the direct children of `parent`.
///
/// ```
/// use spectate::observe_children;
/// use spectate::world::Instance;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let squad = Instance::new("Folder", "Squad");
/// let scout = Instance::new("Model", "Scout");
/// scout.set_parent(Some(&squad));
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let _handle = observe_children(&squad, {
///     let seen = Rc::clone(&seen);
///     move |child: &Instance| {
///         seen.borrow_mut().push(child.name().to_string());
///         None
///     }
/// });
///
/// let medic = Instance::new("Model", "Medic");
/// medic.set_parent(Some(&squad));
/// assert_eq!(*seen.borrow(), vec!["Scout", "Medic"]);
/// ```
pub fn observe_children(
    parent: &Instance,
    callback: impl Fn(&Instance) -> Option<Cleanup> + 'static,
) -> ObserverHandle {
    let watch: WatchSet<InstanceId> = WatchSet::new();
    let callback: Rc<dyn Fn(&Instance) -> Option<Cleanup>> = Rc::new(callback);

    let mut connections = Connections::new();
    connections.hold(parent.child_added().connect({
        let watch = watch.clone();
        let callback = Rc::clone(&callback);
        move |child: &Instance| watch.activate(child.id(), || callback(child))
    }));
    connections.hold(parent.child_removed().connect({
        let watch = watch.clone();
        move |child: &Instance| watch.deactivate(&child.id())
    }));

    debug!(
        kind = "observe_children",
        parent = %parent.name(),
        existing = parent.children().len(),
        "observer registered"
    );
    for child in parent.children() {
        watch.activate(child.id(), || callback(&child));
    }

    ObserverHandle::new("observe_children", connections, move || watch.stop())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
