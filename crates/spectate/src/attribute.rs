#![forbid(unsafe_code)]

//! Attribute observers.
//!
//! [`observe_attribute`] tracks one named attribute on one instance. The
//! callback runs whenever the attribute holds a (qualifying) value, starting
//! with the value already present at registration; the cleanup it returns
//! runs before the next callback, when the attribute is removed, and on
//! [`stop`](crate::ObserverHandle::stop).
//!
//! [`observe_attribute_guarded`] adds a predicate: values failing the guard
//! are treated exactly like a removed attribute, so a pending cleanup runs
//! and the callback is skipped until a qualifying value arrives.

use std::rc::Rc;

use spectate_signal::Connections;
use spectate_world::{Instance, Value};
use tracing::debug;

use crate::handle::ObserverHandle;
use crate::watch::{Cleanup, WatchSet};

type AttributeCallback = Rc<dyn Fn(&Value) -> Option<Cleanup>>;
type AttributeGuard = Rc<dyn Fn(&Value) -> bool>;

/// Observes one attribute of `instance`.
///
/// The callback receives each new value, including one synchronous call at
/// registration if the attribute is already set. Returning a cleanup arms it
/// for the next change, removal, or stop; returning `None` arms nothing.
///
/// ```
/// use spectate::observe_attribute;
/// use spectate::world::{Instance, Value};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let crystal = Instance::new("Part", "HealthCrystal");
/// crystal.set_attribute("Health", 100i64);
///
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let handle = observe_attribute(&crystal, "Health", {
///     let log = Rc::clone(&log);
///     move |hp: &Value| {
///         log.borrow_mut().push(format!("now {hp}"));
///         let log = Rc::clone(&log);
///         Some(Box::new(move || log.borrow_mut().push("gone".into())) as _)
///     }
/// });
///
/// crystal.set_attribute("Health", 55i64);
/// handle.stop();
///
/// assert_eq!(*log.borrow(), vec!["now 100", "gone", "now 55", "gone"]);
/// ```
pub fn observe_attribute(
    instance: &Instance,
    name: &str,
    callback: impl Fn(&Value) -> Option<Cleanup> + 'static,
) -> ObserverHandle {
    observe_attribute_inner("observe_attribute", instance, name, None, Rc::new(callback))
}

/// Observes one attribute, but only while its value passes `guard`.
///
/// A failing value disqualifies the attribute just like removal would: the
/// pending cleanup runs and the callback is skipped until a passing value
/// arrives.
///
/// ```
/// use spectate::observe_attribute_guarded;
/// use spectate::world::{Instance, Value};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let crystal = Instance::new("Part", "HealthCrystal");
/// crystal.set_attribute("Health", 0i64);
///
/// let alive_calls = Rc::new(Cell::new(0));
/// let _handle = observe_attribute_guarded(
///     &crystal,
///     "Health",
///     |hp: &Value| hp.as_int().is_some_and(|hp| hp > 0),
///     {
///         let alive_calls = Rc::clone(&alive_calls);
///         move |_hp: &Value| {
///             alive_calls.set(alive_calls.get() + 1);
///             None
///         }
///     },
/// );
///
/// assert_eq!(alive_calls.get(), 0, "zero health never qualifies");
/// crystal.set_attribute("Health", 25i64);
/// assert_eq!(alive_calls.get(), 1);
/// ```
pub fn observe_attribute_guarded(
    instance: &Instance,
    name: &str,
    guard: impl Fn(&Value) -> bool + 'static,
    callback: impl Fn(&Value) -> Option<Cleanup> + 'static,
) -> ObserverHandle {
    observe_attribute_inner(
        "observe_attribute_guarded",
        instance,
        name,
        Some(Rc::new(guard)),
        Rc::new(callback),
    )
}

fn observe_attribute_inner(
    kind: &'static str,
    instance: &Instance,
    name: &str,
    guard: Option<AttributeGuard>,
    callback: AttributeCallback,
) -> ObserverHandle {
    let watch: WatchSet<()> = WatchSet::new();

    // One code path for live changes and the registration-time value.
    let apply = {
        let watch = watch.clone();
        Rc::new(move |value: Option<&Value>| match value {
            Some(value) if guard.as_ref().is_none_or(|g| g(value)) => {
                watch.activate((), || callback(value));
            }
            _ => watch.deactivate(&()),
        })
    };

    let mut connections = Connections::new();
    connections.hold(instance.attribute_changed(name).connect({
        let apply = Rc::clone(&apply);
        move |value: &Option<Value>| apply(value.as_ref())
    }));

    debug!(kind, instance = %instance.name(), attribute = name, "observer registered");
    apply(instance.attribute(name).as_ref());

    ObserverHandle::new(kind, connections, move || watch.stop())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn logging_callback(log: Rc<RefCell<Vec<String>>>) -> impl Fn(&Value) -> Option<Cleanup> + 'static {
        move |value: &Value| {
            log.borrow_mut().push(format!("call {value}"));
            let log = Rc::clone(&log);
            let value = value.clone();
            Some(Box::new(move || log.borrow_mut().push(format!("clean {value}"))) as Cleanup)
        }
    }

    #[test]
    fn initial_value_is_observed() {
        let inst = Instance::new("Part", "crystal");
        inst.set_attribute("Health", 100i64);
        let log = Rc::new(RefCell::new(Vec::new()));

        let _handle = observe_attribute(&inst, "Health", logging_callback(Rc::clone(&log)));
        assert_eq!(*log.borrow(), vec!["call 100".to_string()]);
    }

    #[test]
    fn missing_attribute_waits_silently() {
        let inst = Instance::new("Part", "crystal");
        let log = Rc::new(RefCell::new(Vec::new()));

        let _handle = observe_attribute(&inst, "Health", logging_callback(Rc::clone(&log)));
        assert!(log.borrow().is_empty());

        inst.set_attribute("Health", 10i64);
        assert_eq!(*log.borrow(), vec!["call 10".to_string()]);
    }

    #[test]
    fn cleanup_runs_before_next_callback() {
        let inst = Instance::new("Part", "crystal");
        inst.set_attribute("Health", 1i64);
        let log = Rc::new(RefCell::new(Vec::new()));

        let _handle = observe_attribute(&inst, "Health", logging_callback(Rc::clone(&log)));
        inst.set_attribute("Health", 2i64);
        inst.set_attribute("Health", 3i64);

        assert_eq!(
            *log.borrow(),
            vec![
                "call 1".to_string(),
                "clean 1".into(),
                "call 2".into(),
                "clean 2".into(),
                "call 3".into(),
            ]
        );
    }

    #[test]
    fn removal_runs_cleanup_without_callback() {
        let inst = Instance::new("Part", "crystal");
        inst.set_attribute("Health", 5i64);
        let log = Rc::new(RefCell::new(Vec::new()));

        let _handle = observe_attribute(&inst, "Health", logging_callback(Rc::clone(&log)));
        inst.remove_attribute("Health");
        assert_eq!(
            *log.borrow(),
            vec!["call 5".to_string(), "clean 5".into()]
        );

        // Setting it again re-qualifies.
        inst.set_attribute("Health", 6i64);
        assert_eq!(
            *log.borrow(),
            vec!["call 5".to_string(), "clean 5".into(), "call 6".into()]
        );
    }

    #[test]
    fn stop_runs_pending_cleanup_and_silences() {
        let inst = Instance::new("Part", "crystal");
        inst.set_attribute("Health", 5i64);
        let log = Rc::new(RefCell::new(Vec::new()));

        let handle = observe_attribute(&inst, "Health", logging_callback(Rc::clone(&log)));
        handle.stop();
        assert_eq!(
            *log.borrow(),
            vec!["call 5".to_string(), "clean 5".into()]
        );

        handle.stop();
        inst.set_attribute("Health", 9i64);
        assert_eq!(log.borrow().len(), 2, "stopped observer sees nothing");
    }

    #[test]
    fn dropping_the_handle_stops() {
        let inst = Instance::new("Part", "crystal");
        inst.set_attribute("Health", 5i64);
        let log = Rc::new(RefCell::new(Vec::new()));

        {
            let _handle = observe_attribute(&inst, "Health", logging_callback(Rc::clone(&log)));
        }
        assert_eq!(
            *log.borrow(),
            vec!["call 5".to_string(), "clean 5".into()]
        );
    }

    #[test]
    fn callback_may_return_no_cleanup() {
        let inst = Instance::new("Part", "crystal");
        inst.set_attribute("Mode", "idle");
        let calls = Rc::new(Cell::new(0));

        let handle = observe_attribute(&inst, "Mode", {
            let calls = Rc::clone(&calls);
            move |_| {
                calls.set(calls.get() + 1);
                None
            }
        });

        inst.set_attribute("Mode", "active");
        inst.remove_attribute("Mode");
        handle.stop();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn equal_value_write_does_not_retrigger() {
        let inst = Instance::new("Part", "crystal");
        inst.set_attribute("Health", 5i64);
        let calls = Rc::new(Cell::new(0));

        let _handle = observe_attribute(&inst, "Health", {
            let calls = Rc::clone(&calls);
            move |_| {
                calls.set(calls.get() + 1);
                None
            }
        });

        inst.set_attribute("Health", 5i64);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn guard_gates_initial_value() {
        let inst = Instance::new("Part", "crystal");
        inst.set_attribute("Health", 0i64);
        let calls = Rc::new(Cell::new(0));

        let _handle = observe_attribute_guarded(
            &inst,
            "Health",
            |v: &Value| v.as_int().is_some_and(|hp| hp > 0),
            {
                let calls = Rc::clone(&calls);
                move |_| {
                    calls.set(calls.get() + 1);
                    None
                }
            },
        );
        assert_eq!(calls.get(), 0);

        inst.set_attribute("Health", 10i64);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn guard_rejection_disqualifies_like_removal() {
        let inst = Instance::new("Part", "crystal");
        inst.set_attribute("Health", 50i64);
        let log = Rc::new(RefCell::new(Vec::new()));

        let _handle = observe_attribute_guarded(
            &inst,
            "Health",
            |v: &Value| v.as_int().is_some_and(|hp| hp > 0),
            logging_callback(Rc::clone(&log)),
        );
        assert_eq!(*log.borrow(), vec!["call 50".to_string()]);

        inst.set_attribute("Health", 0i64);
        assert_eq!(
            *log.borrow(),
            vec!["call 50".to_string(), "clean 50".into()],
            "failing the guard runs the cleanup, skips the callback"
        );

        inst.set_attribute("Health", 25i64);
        assert_eq!(
            *log.borrow(),
            vec!["call 50".to_string(), "clean 50".into(), "call 25".into()]
        );
    }

    #[test]
    fn callback_may_mutate_other_attributes() {
        let inst = Instance::new("Part", "crystal");
        let echoed = Rc::new(RefCell::new(Vec::new()));

        let _shield = observe_attribute(&inst, "Shield", {
            let echoed = Rc::clone(&echoed);
            move |v: &Value| {
                echoed.borrow_mut().push(v.clone());
                None
            }
        });
        let _health = observe_attribute(&inst, "Health", {
            let inst = inst.clone();
            move |v: &Value| {
                // Mirror health into a second attribute from inside the
                // callback; dispatch is re-entrant.
                inst.set_attribute("Shield", v.clone());
                None
            }
        });

        inst.set_attribute("Health", 40i64);
        assert_eq!(*echoed.borrow(), vec![Value::Int(40)]);
        assert_eq!(inst.attribute("Shield"), Some(Value::Int(40)));
    }

    #[test]
    fn two_observers_do_not_interfere() {
        let inst = Instance::new("Part", "crystal");
        inst.set_attribute("Health", 1i64);
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));

        let handle_a = observe_attribute(&inst, "Health", {
            let a = Rc::clone(&a);
            move |_| {
                a.set(a.get() + 1);
                None
            }
        });
        let _handle_b = observe_attribute(&inst, "Health", {
            let b = Rc::clone(&b);
            move |_| {
                b.set(b.get() + 1);
                None
            }
        });

        handle_a.stop();
        inst.set_attribute("Health", 2i64);
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
    }
}
