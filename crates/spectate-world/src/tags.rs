#![forbid(unsafe_code)]

//! Tag membership index with per-tag change signals.
//!
//! A [`TagIndex`] maps tag names to the instances carrying them and emits
//! [`tag_added`](TagIndex::tag_added) / [`tag_removed`](TagIndex::tag_removed)
//! on every membership change. The index hooks each member's `destroying`
//! signal, so destroying an instance removes it from every tag it carries,
//! with the same removal signals an explicit [`remove_tag`](TagIndex::remove_tag)
//! would emit.
//!
//! Tag names are plain strings with no structure imposed; the empty string is
//! a legal (if unusual) tag.

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use spectate_signal::{Connection, Signal};
use tracing::trace;

use crate::instance::{Instance, InstanceId};

#[derive(Clone, Copy)]
enum Membership {
    Added,
    Removed,
}

struct TagEntry {
    instance: Instance,
    tags: HashSet<String>,
    // Purges the instance from the index when it is destroyed. Dropping the
    // entry detaches the hook.
    _destroy_hook: Connection,
}

#[derive(Default)]
struct TagIndexInner {
    entries: HashMap<InstanceId, TagEntry>,
    members: HashMap<String, Vec<InstanceId>>,
    added: HashMap<String, Signal<Instance>>,
    removed: HashMap<String, Signal<Instance>>,
}

/// Shared handle to a tag membership index. Clones alias the same index.
pub struct TagIndex {
    inner: Rc<RefCell<TagIndexInner>>,
}

impl TagIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(TagIndexInner::default())),
        }
    }

    /// Adds `tag` to `instance`. Duplicate adds and adds on destroyed
    /// instances are no-ops; a first-time add emits `tag_added`.
    pub fn add_tag(&self, instance: &Instance, tag: &str) {
        if instance.is_destroyed() {
            return;
        }
        let id = instance.id();
        let newly_added = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            let entry = match inner.entries.entry(id) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(v) => {
                    let weak = Rc::downgrade(&self.inner);
                    let hook = instance.destroying().connect(move |_| {
                        if let Some(inner) = weak.upgrade() {
                            TagIndex { inner }.purge(id);
                        }
                    });
                    v.insert(TagEntry {
                        instance: instance.clone(),
                        tags: HashSet::new(),
                        _destroy_hook: hook,
                    })
                }
            };
            if entry.tags.insert(tag.to_string()) {
                inner.members.entry(tag.to_string()).or_default().push(id);
                true
            } else {
                false
            }
        };
        if newly_added {
            trace!(id = id.raw(), tag, "tag added");
            self.emit_membership(Membership::Added, tag, instance);
        }
    }

    /// Removes `tag` from `instance`, emitting `tag_removed` if it was
    /// present.
    pub fn remove_tag(&self, instance: &Instance, tag: &str) {
        let id = instance.id();
        {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            let Some(entry) = inner.entries.get_mut(&id) else {
                return;
            };
            if !entry.tags.remove(tag) {
                return;
            }
            Self::forget_member(&mut inner.members, tag, id);
            if entry.tags.is_empty() {
                // Last tag gone; drop the entry and with it the destroy hook.
                inner.entries.remove(&id);
            }
        }
        trace!(id = id.raw(), tag, "tag removed");
        self.emit_membership(Membership::Removed, tag, instance);
    }

    /// Drops every tag of a destroyed instance, emitting `tag_removed` per
    /// tag. Called from the destroy hook.
    fn purge(&self, id: InstanceId) {
        let (instance, tags) = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            let Some(entry) = inner.entries.remove(&id) else {
                return;
            };
            for tag in &entry.tags {
                Self::forget_member(&mut inner.members, tag, id);
            }
            (entry.instance, entry.tags)
        };
        for tag in &tags {
            trace!(id = id.raw(), tag, "tag removed by destroy");
            self.emit_membership(Membership::Removed, tag, &instance);
        }
    }

    fn forget_member(members: &mut HashMap<String, Vec<InstanceId>>, tag: &str, id: InstanceId) {
        if let Some(list) = members.get_mut(tag) {
            list.retain(|m| *m != id);
            if list.is_empty() {
                members.remove(tag);
            }
        }
    }

    /// Emits on a per-tag membership signal if anyone ever asked for it.
    fn emit_membership(&self, which: Membership, tag: &str, instance: &Instance) {
        let signal = {
            let inner = self.inner.borrow();
            let table = match which {
                Membership::Added => &inner.added,
                Membership::Removed => &inner.removed,
            };
            table.get(tag).cloned()
        };
        if let Some(signal) = signal {
            signal.emit(instance);
        }
    }

    #[must_use]
    pub fn has_tag(&self, instance: &Instance, tag: &str) -> bool {
        self.inner
            .borrow()
            .entries
            .get(&instance.id())
            .is_some_and(|e| e.tags.contains(tag))
    }

    /// Tags carried by `instance`, sorted.
    #[must_use]
    pub fn tags_of(&self, instance: &Instance) -> Vec<String> {
        let mut tags: Vec<String> = self
            .inner
            .borrow()
            .entries
            .get(&instance.id())
            .map(|e| e.tags.iter().cloned().collect())
            .unwrap_or_default();
        tags.sort();
        tags
    }

    /// Instances currently carrying `tag`, in the order the tag was added.
    #[must_use]
    pub fn tagged(&self, tag: &str) -> Vec<Instance> {
        let inner = self.inner.borrow();
        inner
            .members
            .get(tag)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.entries.get(id).map(|e| e.instance.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fires with the instance after `tag` is added to it.
    #[must_use]
    pub fn tag_added(&self, tag: &str) -> Signal<Instance> {
        self.inner
            .borrow_mut()
            .added
            .entry(tag.to_string())
            .or_default()
            .clone()
    }

    /// Fires with the instance after `tag` is removed from it, including
    /// removal through destroy.
    #[must_use]
    pub fn tag_removed(&self, tag: &str) -> Signal<Instance> {
        self.inner
            .borrow_mut()
            .removed
            .entry(tag.to_string())
            .or_default()
            .clone()
    }
}

impl Clone for TagIndex {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Default for TagIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TagIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TagIndex")
            .field("instances", &inner.entries.len())
            .field("tags", &inner.members.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn node(name: &str) -> Instance {
        Instance::new("Part", name)
    }

    #[test]
    fn add_and_query() {
        let index = TagIndex::new();
        let door = node("door");

        index.add_tag(&door, "Interactive");
        index.add_tag(&door, "Wooden");

        assert!(index.has_tag(&door, "Interactive"));
        assert!(!index.has_tag(&door, "Metal"));
        assert_eq!(
            index.tags_of(&door),
            vec!["Interactive".to_string(), "Wooden".into()]
        );
        assert_eq!(index.tagged("Interactive"), vec![door.clone()]);
    }

    #[test]
    fn duplicate_add_emits_once() {
        let index = TagIndex::new();
        let door = node("door");
        let hits = Rc::new(Cell::new(0));

        let _conn = index.tag_added("Interactive").connect({
            let hits = Rc::clone(&hits);
            move |_| hits.set(hits.get() + 1)
        });

        index.add_tag(&door, "Interactive");
        index.add_tag(&door, "Interactive");
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn tagged_preserves_add_order() {
        let index = TagIndex::new();
        let a = node("a");
        let b = node("b");
        let c = node("c");

        index.add_tag(&b, "Enemy");
        index.add_tag(&a, "Enemy");
        index.add_tag(&c, "Enemy");

        let names: Vec<String> = index
            .tagged("Enemy")
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, vec!["b".to_string(), "a".into(), "c".into()]);
    }

    #[test]
    fn remove_tag_emits_removed() {
        let index = TagIndex::new();
        let door = node("door");
        let removed = Rc::new(Cell::new(0));

        let _conn = index.tag_removed("Interactive").connect({
            let removed = Rc::clone(&removed);
            move |_| removed.set(removed.get() + 1)
        });

        index.add_tag(&door, "Interactive");
        index.remove_tag(&door, "Interactive");
        assert_eq!(removed.get(), 1);
        assert!(!index.has_tag(&door, "Interactive"));
        assert!(index.tagged("Interactive").is_empty());

        index.remove_tag(&door, "Interactive");
        assert_eq!(removed.get(), 1, "second removal is a no-op");
    }

    #[test]
    fn destroy_purges_every_tag() {
        let index = TagIndex::new();
        let door = node("door");
        let removed = Rc::new(RefCell::new(Vec::new()));

        let _a = index.tag_removed("Interactive").connect({
            let removed = Rc::clone(&removed);
            move |_| removed.borrow_mut().push("Interactive")
        });
        let _b = index.tag_removed("Wooden").connect({
            let removed = Rc::clone(&removed);
            move |_| removed.borrow_mut().push("Wooden")
        });

        index.add_tag(&door, "Interactive");
        index.add_tag(&door, "Wooden");
        door.destroy();

        let mut seen = removed.borrow().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec!["Interactive", "Wooden"]);
        assert!(index.tagged("Interactive").is_empty());
        assert!(index.tagged("Wooden").is_empty());
        assert!(index.tags_of(&door).is_empty());
    }

    #[test]
    fn add_tag_on_destroyed_instance_is_ignored() {
        let index = TagIndex::new();
        let ghost = node("ghost");
        ghost.destroy();

        index.add_tag(&ghost, "Spooky");
        assert!(!index.has_tag(&ghost, "Spooky"));
        assert!(index.tagged("Spooky").is_empty());
    }

    #[test]
    fn removing_last_tag_detaches_destroy_hook() {
        let index = TagIndex::new();
        let door = node("door");
        let removed = Rc::new(Cell::new(0));

        let _conn = index.tag_removed("Interactive").connect({
            let removed = Rc::clone(&removed);
            move |_| removed.set(removed.get() + 1)
        });

        index.add_tag(&door, "Interactive");
        index.remove_tag(&door, "Interactive");
        assert_eq!(removed.get(), 1);

        // The hook is gone with the entry, so destroy emits nothing more.
        door.destroy();
        assert_eq!(removed.get(), 1);
    }

    #[test]
    fn clones_share_the_index() {
        let index = TagIndex::new();
        let clone = index.clone();
        let door = node("door");

        clone.add_tag(&door, "Interactive");
        assert!(index.has_tag(&door, "Interactive"));
    }

    #[test]
    fn empty_string_is_a_legal_tag() {
        let index = TagIndex::new();
        let door = node("door");

        index.add_tag(&door, "");
        assert!(index.has_tag(&door, ""));
        assert_eq!(index.tagged(""), vec![door]);
    }
}
