#![forbid(unsafe_code)]

//! Tag observers.
//!
//! [`observe_tag`] runs its callback once per instance carrying a tag,
//! starting with the members present at registration. The per-instance
//! cleanup runs when the tag is removed, the instance is destroyed (the
//! index turns that into a removal), or the observer stops.
//!
//! [`observe_tag_within`] adds an ancestor allow-list: a member only
//! qualifies while it sits under at least one allowed ancestor, and every
//! member's `ancestry_changed` signal is tracked so moves in and out of the
//! allowed subtrees activate and deactivate it on the spot. Without an
//! allow-list no ancestry subscription is made at all, since placement can
//! never change qualification.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use spectate_signal::{Connection, Connections};
use spectate_world::{Instance, InstanceId, TagIndex};
use tracing::debug;

use crate::handle::ObserverHandle;
use crate::watch::{Cleanup, WatchSet};

type TagCallback = Rc<dyn Fn(&Instance) -> Option<Cleanup>>;

struct Tracked {
    // Present only when an ancestor allow-list is in force.
    _ancestry_hook: Option<Connection>,
    active: bool,
}

/// Observes every instance carrying `tag` in `index`.
///
/// ```
/// use spectate::observe_tag;
/// use spectate::world::{Instance, TagIndex};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let tags = TagIndex::new();
/// let door = Instance::new("Part", "VaultDoor");
/// tags.add_tag(&door, "Interactive");
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let _handle = observe_tag(&tags, "Interactive", {
///     let seen = Rc::clone(&seen);
///     move |inst: &Instance| {
///         seen.borrow_mut().push(inst.name().to_string());
///         None
///     }
/// });
///
/// let lever = Instance::new("Part", "Lever");
/// tags.add_tag(&lever, "Interactive");
/// assert_eq!(*seen.borrow(), vec!["VaultDoor", "Lever"]);
/// ```
pub fn observe_tag(
    index: &TagIndex,
    tag: &str,
    callback: impl Fn(&Instance) -> Option<Cleanup> + 'static,
) -> ObserverHandle {
    observe_tag_inner("observe_tag", index, tag, None, Rc::new(callback))
}

/// Observes instances carrying `tag` while they are descendants of at least
/// one instance in `ancestors`.
///
/// An instance is not its own descendant, so a tagged allow-list root does
/// not qualify. An empty `ancestors` slice matches nothing.
pub fn observe_tag_within(
    index: &TagIndex,
    tag: &str,
    ancestors: &[Instance],
    callback: impl Fn(&Instance) -> Option<Cleanup> + 'static,
) -> ObserverHandle {
    observe_tag_inner(
        "observe_tag_within",
        index,
        tag,
        Some(ancestors.to_vec()),
        Rc::new(callback),
    )
}

fn observe_tag_inner(
    kind: &'static str,
    index: &TagIndex,
    tag: &str,
    ancestors: Option<Vec<Instance>>,
    callback: TagCallback,
) -> ObserverHandle {
    let watch: WatchSet<InstanceId> = WatchSet::new();
    let tracked: Rc<RefCell<HashMap<InstanceId, Tracked>>> = Rc::new(RefCell::new(HashMap::new()));
    let ancestors = ancestors.map(Rc::new);

    let qualifies: Rc<dyn Fn(&Instance) -> bool> = {
        let ancestors = ancestors.clone();
        Rc::new(move |instance: &Instance| match &ancestors {
            None => true,
            Some(allowed) => allowed.iter().any(|a| instance.is_descendant_of(a)),
        })
    };

    let on_added: Rc<dyn Fn(&Instance)> = {
        let watch = watch.clone();
        let tracked = Rc::clone(&tracked);
        let qualifies = Rc::clone(&qualifies);
        let callback = Rc::clone(&callback);
        let watch_ancestry = ancestors.is_some();
        Rc::new(move |instance: &Instance| {
            if tracked.borrow().contains_key(&instance.id()) {
                return;
            }
            let ancestry_hook = if watch_ancestry {
                Some(instance.ancestry_changed().connect({
                    let watch = watch.clone();
                    let tracked = Rc::clone(&tracked);
                    let qualifies = Rc::clone(&qualifies);
                    let callback = Rc::clone(&callback);
                    let instance = instance.clone();
                    move |_: &()| {
                        let pass = qualifies(&instance);
                        let flip = {
                            let mut map = tracked.borrow_mut();
                            match map.get_mut(&instance.id()) {
                                Some(entry) if entry.active != pass => {
                                    entry.active = pass;
                                    Some(pass)
                                }
                                _ => None,
                            }
                        };
                        match flip {
                            Some(true) => watch.activate(instance.id(), || callback(&instance)),
                            Some(false) => watch.deactivate(&instance.id()),
                            None => {}
                        }
                    }
                }))
            } else {
                None
            };

            let pass = qualifies(instance);
            tracked.borrow_mut().insert(
                instance.id(),
                Tracked {
                    _ancestry_hook: ancestry_hook,
                    active: pass,
                },
            );
            if pass {
                watch.activate(instance.id(), || callback(instance));
            }
        })
    };

    let on_removed = {
        let watch = watch.clone();
        let tracked = Rc::clone(&tracked);
        move |instance: &Instance| {
            let was_active = {
                let mut map = tracked.borrow_mut();
                match map.remove(&instance.id()) {
                    Some(entry) => entry.active,
                    None => return,
                }
            };
            if was_active {
                watch.deactivate(&instance.id());
            }
        }
    };

    let mut connections = Connections::new();
    connections.hold(index.tag_added(tag).connect({
        let on_added = Rc::clone(&on_added);
        move |instance: &Instance| on_added(instance)
    }));
    connections.hold(index.tag_removed(tag).connect(on_removed));

    debug!(kind, tag, existing = index.tagged(tag).len(), "observer registered");
    for instance in index.tagged(tag) {
        on_added(&instance);
    }

    ObserverHandle::new(kind, connections, move || {
        // Ancestry hooks detach before any cleanup runs.
        tracked.borrow_mut().clear();
        watch.stop();
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
