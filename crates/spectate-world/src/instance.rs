#![forbid(unsafe_code)]

//! Instance tree with synchronous lifecycle signals.
//!
//! An [`Instance`] is a shared handle to one node of a scene tree: a class
//! name and display name fixed at creation, a parent link, children, and two
//! loosely typed key/value stores (attributes and properties), each with a
//! per-name change signal created on first request.
//!
//! # Signal order
//!
//! Every mutation emits synchronously, after the state change is committed,
//! in this order:
//!
//! | Mutation                | Signals emitted                                            |
//! |-------------------------|------------------------------------------------------------|
//! | `set_attribute`/`remove_attribute` | `attribute_changed(name)` with the new value    |
//! | `set_property`/`remove_property`   | `property_changed(name)` with the new value     |
//! | `set_parent`            | old parent `child_removed`, new parent `child_added`, then `ancestry_changed` on the moved node and every descendant |
//! | `destroy`               | `destroying`, then the `set_parent(None)` sequence, then each child destroys recursively |
//!
//! # Invariants
//!
//! - A node never becomes its own ancestor; reparenting that would create a
//!   cycle is rejected (and logged) rather than applied.
//! - `destroy` is idempotent and marks the node before any signal fires, so
//!   re-entrant destroys and mutations from `destroying` listeners are
//!   no-ops.
//! - After `destroy`, reads still work; mutations are silently ignored.
//! - Writing a value equal to the current one emits nothing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use spectate_signal::Signal;
use tracing::{trace, warn};

use crate::value::Value;

// ---------------------------------------------------------------------------
// InstanceId
// ---------------------------------------------------------------------------

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an [`Instance`].
///
/// Ids are never reused, so they are safe keys for maps that outlive the
/// instance itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id, mainly for logging.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Instance
// ---------------------------------------------------------------------------

#[derive(Default)]
struct InstanceState {
    parent: Option<Weak<InstanceShared>>,
    children: Vec<Instance>,
    attributes: HashMap<String, Value>,
    properties: HashMap<String, Value>,
    destroyed: bool,
}

struct InstanceShared {
    id: InstanceId,
    class: String,
    name: String,
    state: RefCell<InstanceState>,
    attribute_signals: RefCell<HashMap<String, Signal<Option<Value>>>>,
    property_signals: RefCell<HashMap<String, Signal<Option<Value>>>>,
    child_added: Signal<Instance>,
    child_removed: Signal<Instance>,
    ancestry_changed: Signal<()>,
    destroying: Signal<()>,
}

/// Shared handle to one tree node. Clones alias the same node; equality and
/// hashing follow [`InstanceId`], not structure.
pub struct Instance {
    shared: Rc<InstanceShared>,
}

impl Instance {
    /// Creates a parentless node with the given class and display name.
    #[must_use]
    pub fn new(class_name: impl Into<String>, name: impl Into<String>) -> Self {
        let shared = Rc::new(InstanceShared {
            id: InstanceId::next(),
            class: class_name.into(),
            name: name.into(),
            state: RefCell::new(InstanceState::default()),
            attribute_signals: RefCell::new(HashMap::new()),
            property_signals: RefCell::new(HashMap::new()),
            child_added: Signal::new(),
            child_removed: Signal::new(),
            ancestry_changed: Signal::new(),
            destroying: Signal::new(),
        });
        trace!(
            id = shared.id.raw(),
            class = %shared.class,
            name = %shared.name,
            "instance created"
        );
        Self { shared }
    }

    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.shared.id
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.shared.class
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// True once [`destroy`](Instance::destroy) has begun on this node.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.shared.state.borrow().destroyed
    }

    // -- lifecycle signals --------------------------------------------------

    /// Fires with the child after it is attached to this node.
    #[must_use]
    pub fn child_added(&self) -> Signal<Instance> {
        self.shared.child_added.clone()
    }

    /// Fires with the child after it is detached from this node.
    #[must_use]
    pub fn child_removed(&self) -> Signal<Instance> {
        self.shared.child_removed.clone()
    }

    /// Fires after this node or any ancestor changes parent.
    #[must_use]
    pub fn ancestry_changed(&self) -> Signal<()> {
        self.shared.ancestry_changed.clone()
    }

    /// Fires once, first thing, when [`destroy`](Instance::destroy) runs.
    #[must_use]
    pub fn destroying(&self) -> Signal<()> {
        self.shared.destroying.clone()
    }

    /// Change signal for one attribute name. Payload is the new value, or
    /// `None` when the attribute was removed.
    #[must_use]
    pub fn attribute_changed(&self, name: &str) -> Signal<Option<Value>> {
        self.shared
            .attribute_signals
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Change signal for one property name; payload as for
    /// [`attribute_changed`](Instance::attribute_changed).
    #[must_use]
    pub fn property_changed(&self, name: &str) -> Signal<Option<Value>> {
        self.shared
            .property_signals
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    // -- attributes ---------------------------------------------------------

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.shared.state.borrow().attributes.get(name).cloned()
    }

    /// Attribute names in sorted order.
    #[must_use]
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .shared
            .state
            .borrow()
            .attributes
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        {
            let mut state = self.shared.state.borrow_mut();
            if state.destroyed {
                return;
            }
            if state.attributes.get(name) == Some(&value) {
                return;
            }
            state.attributes.insert(name.to_string(), value.clone());
        }
        self.emit_keyed(&self.shared.attribute_signals, name, Some(value));
    }

    pub fn remove_attribute(&self, name: &str) {
        let removed = {
            let mut state = self.shared.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.attributes.remove(name)
        };
        if removed.is_some() {
            self.emit_keyed(&self.shared.attribute_signals, name, None);
        }
    }

    // -- properties ---------------------------------------------------------

    #[must_use]
    pub fn property(&self, name: &str) -> Option<Value> {
        self.shared.state.borrow().properties.get(name).cloned()
    }

    /// Property names in sorted order.
    #[must_use]
    pub fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .shared
            .state
            .borrow()
            .properties
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn set_property(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        {
            let mut state = self.shared.state.borrow_mut();
            if state.destroyed {
                return;
            }
            if state.properties.get(name) == Some(&value) {
                return;
            }
            state.properties.insert(name.to_string(), value.clone());
        }
        self.emit_keyed(&self.shared.property_signals, name, Some(value));
    }

    pub fn remove_property(&self, name: &str) {
        let removed = {
            let mut state = self.shared.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.properties.remove(name)
        };
        if removed.is_some() {
            self.emit_keyed(&self.shared.property_signals, name, None);
        }
    }

    /// Emits on the per-name signal if anyone ever asked for it.
    fn emit_keyed(
        &self,
        signals: &RefCell<HashMap<String, Signal<Option<Value>>>>,
        name: &str,
        value: Option<Value>,
    ) {
        let signal = signals.borrow().get(name).cloned();
        if let Some(signal) = signal {
            signal.emit(&value);
        }
    }

    // -- hierarchy ----------------------------------------------------------

    #[must_use]
    pub fn parent(&self) -> Option<Instance> {
        self.shared
            .state
            .borrow()
            .parent
            .as_ref()?
            .upgrade()
            .map(|shared| Instance { shared })
    }

    /// Direct children, in attachment order.
    #[must_use]
    pub fn children(&self) -> Vec<Instance> {
        self.shared.state.borrow().children.clone()
    }

    /// True when `ancestor` appears on this node's parent chain. A node is
    /// not a descendant of itself.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &Instance) -> bool {
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            if node.id() == ancestor.id() {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// Moves this node under `parent` (or detaches it entirely).
    ///
    /// No-ops: the node is destroyed, the target parent is destroyed, the
    /// parent is unchanged, or the move would create a cycle. Rejected moves
    /// log a warning; no signals fire.
    pub fn set_parent(&self, parent: Option<&Instance>) {
        if self.is_destroyed() {
            warn!(id = self.id().raw(), "set_parent on destroyed instance ignored");
            return;
        }
        if let Some(target) = parent {
            if target.is_destroyed() {
                warn!(
                    id = self.id().raw(),
                    parent = target.id().raw(),
                    "set_parent under destroyed instance ignored"
                );
                return;
            }
            if target.id() == self.id() || target.is_descendant_of(self) {
                warn!(
                    id = self.id().raw(),
                    parent = target.id().raw(),
                    "set_parent rejected, would create a cycle"
                );
                return;
            }
        }
        let current = self.parent().map(|p| p.id());
        if current == parent.map(|p| p.id()) {
            return;
        }
        self.reparent(parent);
    }

    /// Unchecked reparent shared by `set_parent` and `destroy`.
    fn reparent(&self, parent: Option<&Instance>) {
        let old_parent = self.parent();

        if let Some(old) = &old_parent {
            let mut state = old.shared.state.borrow_mut();
            state.children.retain(|c| c.id() != self.id());
        }
        {
            let mut state = self.shared.state.borrow_mut();
            state.parent = parent.map(|p| Rc::downgrade(&p.shared));
        }
        if let Some(new) = parent {
            let mut state = new.shared.state.borrow_mut();
            state.children.push(self.clone());
        }

        if let Some(old) = &old_parent {
            old.shared.child_removed.emit(self);
        }
        if let Some(new) = parent {
            new.shared.child_added.emit(self);
        }
        for node in self.subtree() {
            node.shared.ancestry_changed.emit(&());
        }
    }

    /// This node plus every descendant, breadth-first.
    fn subtree(&self) -> Vec<Instance> {
        let mut nodes = vec![self.clone()];
        let mut i = 0;
        while i < nodes.len() {
            let kids = nodes[i].children();
            nodes.extend(kids);
            i += 1;
        }
        nodes
    }

    /// Tears the node down: marks it destroyed, fires `destroying`, detaches
    /// it from its parent, then destroys every child. Idempotent.
    pub fn destroy(&self) {
        {
            let mut state = self.shared.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
        }
        trace!(id = self.id().raw(), name = %self.name(), "destroying instance");
        self.shared.destroying.emit(&());
        if self.parent().is_some() {
            self.reparent(None);
        }
        for child in self.children() {
            child.destroy();
        }
    }
}

impl Clone for Instance {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Instance {}

impl std::hash::Hash for Instance {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only identity fields; no RefCell borrows, so this is safe to call
        // from inside any listener.
        f.debug_struct("Instance")
            .field("id", &self.id().raw())
            .field("class", &self.class_name())
            .field("name", &self.name())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
