#![forbid(unsafe_code)]

//! Character observers.
//!
//! [`observe_character`] composes the roster and character lifecycles: for
//! every player it tracks the character slot, running the callback per
//! spawned character (current one included at registration) and the cleanup
//! when that character is removed, replaced, or the player leaves. Because
//! the directory clears a leaving player's character before the leave event,
//! character cleanups always run before the player-level teardown.
//!
//! [`observe_character_of`] restricts the same machinery to an allow-list of
//! players; [`observe_local_character`] is the client-side variant for the
//! directory's designated local player and is the one adapter that can fail
//! at registration.

use std::collections::HashSet;
use std::rc::Rc;

use spectate_signal::Connections;
use spectate_world::{Instance, Player, PlayerDirectory};
use tracing::debug;

use crate::error::ObserveError;
use crate::handle::ObserverHandle;
use crate::player::observe_roster;
use crate::watch::{Cleanup, WatchSet};

type CharacterCallback = Rc<dyn Fn(&Player, &Instance) -> Option<Cleanup>>;

/// Observes every player's character in `directory`.
///
/// ```
/// use spectate::observe_character;
/// use spectate::world::{Instance, Player, PlayerDirectory};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let players = PlayerDirectory::new();
/// let ana = players.add_player(1, "ana");
///
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let _handle = observe_character(&players, {
///     let log = Rc::clone(&log);
///     move |player: &Player, character: &Instance| {
///         log.borrow_mut()
///             .push(format!("{} as {}", player.name(), character.name()));
///         None
///     }
/// });
///
/// let hero = Instance::new("Model", "Hero");
/// ana.spawn_character(&hero);
/// assert_eq!(*log.borrow(), vec!["ana as Hero"]);
/// ```
pub fn observe_character(
    directory: &PlayerDirectory,
    callback: impl Fn(&Player, &Instance) -> Option<Cleanup> + 'static,
) -> ObserverHandle {
    observe_character_inner("observe_character", directory, None, Rc::new(callback))
}

/// Observes characters of the listed players only. Players outside the list
/// are ignored entirely, joins and leaves included.
pub fn observe_character_of(
    directory: &PlayerDirectory,
    players: &[Player],
    callback: impl Fn(&Player, &Instance) -> Option<Cleanup> + 'static,
) -> ObserverHandle {
    let allowed: HashSet<u64> = players.iter().map(Player::user_id).collect();
    observe_character_inner(
        "observe_character_of",
        directory,
        Some(allowed),
        Rc::new(callback),
    )
}

/// Observes the local player's character.
///
/// Fails with [`ObserveError::NoLocalPlayer`] when the directory has no
/// designated local player; watching nothing silently would mask a
/// misconfigured client session. The handle stays valid if the local player
/// later leaves, it just sees no further characters.
pub fn observe_local_character(
    directory: &PlayerDirectory,
    callback: impl Fn(&Instance) -> Option<Cleanup> + 'static,
) -> Result<ObserverHandle, ObserveError> {
    let local = directory.local_player().ok_or(ObserveError::NoLocalPlayer)?;
    let callback: Rc<dyn Fn(&Instance) -> Option<Cleanup>> = Rc::new(callback);
    let adapted: CharacterCallback =
        Rc::new(move |_: &Player, character: &Instance| callback(character));

    debug!(
        kind = "observe_local_character",
        user_id = local.user_id(),
        "observer registered"
    );
    let teardown = watch_character(&local, adapted);
    Ok(ObserverHandle::new(
        "observe_local_character",
        Connections::new(),
        move || teardown(),
    ))
}

fn observe_character_inner(
    kind: &'static str,
    directory: &PlayerDirectory,
    allowed: Option<HashSet<u64>>,
    callback: CharacterCallback,
) -> ObserverHandle {
    observe_roster(
        directory,
        kind,
        Rc::new(move |player: &Player| {
            if let Some(allowed) = &allowed {
                if !allowed.contains(&player.user_id()) {
                    return None;
                }
            }
            Some(watch_character(player, Rc::clone(&callback)))
        }),
    )
}

/// Wires one player's character slot into a single-key watch and returns the
/// player-level teardown: detach the slot connections, then run whatever
/// character cleanup is pending.
fn watch_character(player: &Player, callback: CharacterCallback) -> Cleanup {
    let watch: WatchSet<()> = WatchSet::new();

    let apply = {
        let watch = watch.clone();
        let player = player.clone();
        Rc::new(move |character: &Instance| {
            watch.activate((), || callback(&player, character));
        })
    };

    let mut connections = Connections::new();
    connections.hold(player.character_added().connect({
        let apply = Rc::clone(&apply);
        move |character: &Instance| apply(character)
    }));
    connections.hold(player.character_removing().connect({
        let watch = watch.clone();
        move |_: &Instance| watch.deactivate(&())
    }));

    if let Some(character) = player.character() {
        apply(&character);
    }

    Box::new(move || {
        drop(connections);
        watch.stop();
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
