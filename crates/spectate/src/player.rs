#![forbid(unsafe_code)]

//! Player observers.
//!
//! [`observe_player`] runs its callback once per player in the directory:
//! everyone already present at registration, then each later join. The
//! per-player cleanup runs when that player leaves (whatever the
//! [`ExitReason`](spectate_world::ExitReason)) and on stop.

use std::rc::Rc;

use spectate_signal::Connections;
use spectate_world::{Player, PlayerDirectory, PlayerLeave};
use tracing::debug;

use crate::handle::ObserverHandle;
use crate::watch::{Cleanup, WatchSet};

pub(crate) type PlayerCallback = Rc<dyn Fn(&Player) -> Option<Cleanup>>;

/// Observes every player in `directory`.
///
/// ```
/// use spectate::observe_player;
/// use spectate::world::{ExitReason, PlayerDirectory, Player};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let players = PlayerDirectory::new();
/// let ana = players.add_player(1, "ana");
///
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let _handle = observe_player(&players, {
///     let log = Rc::clone(&log);
///     move |player: &Player| {
///         log.borrow_mut().push(format!("hello {}", player.name()));
///         let log = Rc::clone(&log);
///         let name = player.name().to_string();
///         Some(Box::new(move || log.borrow_mut().push(format!("bye {name}"))) as _)
///     }
/// });
///
/// players.add_player(2, "brook");
/// players.remove_player(&ana, ExitReason::Disconnected);
///
/// assert_eq!(
///     *log.borrow(),
///     vec!["hello ana", "hello brook", "bye ana"]
/// );
/// ```
pub fn observe_player(
    directory: &PlayerDirectory,
    callback: impl Fn(&Player) -> Option<Cleanup> + 'static,
) -> ObserverHandle {
    observe_roster(directory, "observe_player", Rc::new(callback))
}

/// Roster plumbing shared with the character observers.
pub(crate) fn observe_roster(
    directory: &PlayerDirectory,
    kind: &'static str,
    per_player: PlayerCallback,
) -> ObserverHandle {
    let watch: WatchSet<u64> = WatchSet::new();

    let mut connections = Connections::new();
    connections.hold(directory.player_added().connect({
        let watch = watch.clone();
        let per_player = Rc::clone(&per_player);
        move |player: &Player| watch.activate(player.user_id(), || per_player(player))
    }));
    connections.hold(directory.player_removing().connect({
        let watch = watch.clone();
        move |leave: &PlayerLeave| {
            debug!(
                kind,
                user_id = leave.player.user_id(),
                reason = %leave.reason,
                "player left, deactivating"
            );
            watch.deactivate(&leave.player.user_id());
        }
    }));

    debug!(kind, existing = directory.players().len(), "observer registered");
    for player in directory.players() {
        watch.activate(player.user_id(), || per_player(&player));
    }

    ObserverHandle::new(kind, connections, move || watch.stop())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
