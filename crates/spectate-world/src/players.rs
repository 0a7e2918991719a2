#![forbid(unsafe_code)]

//! Player roster and character lifecycle.
//!
//! A [`PlayerDirectory`] tracks the players of one session, keyed by
//! `user_id`, and an optional local player for client-side code. Each
//! [`Player`] owns at most one character [`Instance`] at a time, with
//! `character_added` / `character_removing` signals around every swap.
//!
//! Departure order is fixed: [`remove_player`](PlayerDirectory::remove_player)
//! clears the character (emitting `character_removing`) before it drops the
//! player from the roster and emits `player_removing`, so character-scoped
//! teardown always runs while the player is still fully resolvable. The leave
//! event carries the [`ExitReason`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use spectate_signal::Signal;
use tracing::debug;

use crate::instance::Instance;

// ---------------------------------------------------------------------------
// ExitReason / PlayerLeave
// ---------------------------------------------------------------------------

/// Why a player left the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExitReason {
    /// The connection dropped or the player quit.
    Disconnected,
    /// The server removed the player.
    Kicked,
    /// The whole session is going down.
    Shutdown,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitReason::Disconnected => "disconnected",
            ExitReason::Kicked => "kicked",
            ExitReason::Shutdown => "shutdown",
        })
    }
}

/// Payload of [`PlayerDirectory::player_removing`].
#[derive(Debug, Clone)]
pub struct PlayerLeave {
    pub player: Player,
    pub reason: ExitReason,
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

struct PlayerShared {
    user_id: u64,
    name: String,
    character: RefCell<Option<Instance>>,
    character_added: Signal<Instance>,
    character_removing: Signal<Instance>,
}

/// Shared handle to one player session. Equality and hashing follow
/// `user_id`.
pub struct Player {
    shared: Rc<PlayerShared>,
}

impl Player {
    pub(crate) fn new(user_id: u64, name: String) -> Self {
        Self {
            shared: Rc::new(PlayerShared {
                user_id,
                name,
                character: RefCell::new(None),
                character_added: Signal::new(),
                character_removing: Signal::new(),
            }),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> u64 {
        self.shared.user_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The current character, if one is spawned.
    #[must_use]
    pub fn character(&self) -> Option<Instance> {
        self.shared.character.borrow().clone()
    }

    /// Fires with the character after it is assigned.
    #[must_use]
    pub fn character_added(&self) -> Signal<Instance> {
        self.shared.character_added.clone()
    }

    /// Fires with the outgoing character before the slot is reassigned (or
    /// just after it is cleared).
    #[must_use]
    pub fn character_removing(&self) -> Signal<Instance> {
        self.shared.character_removing.clone()
    }

    /// Assigns `character` as the player's avatar. A previous character is
    /// removed first (`character_removing`, then `character_added`), which is
    /// also the respawn path.
    pub fn spawn_character(&self, character: &Instance) {
        let old = self.shared.character.borrow_mut().take();
        if let Some(old) = old {
            self.shared.character_removing.emit(&old);
        }
        *self.shared.character.borrow_mut() = Some(character.clone());
        debug!(user_id = self.user_id(), character = %character.name(), "character spawned");
        self.shared.character_added.emit(character);
    }

    /// Removes the current character, if any, emitting `character_removing`.
    pub fn clear_character(&self) {
        let old = self.shared.character.borrow_mut().take();
        if let Some(old) = old {
            debug!(user_id = self.user_id(), character = %old.name(), "character cleared");
            self.shared.character_removing.emit(&old);
        }
    }
}

impl Clone for Player {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.user_id() == other.user_id()
    }
}

impl Eq for Player {}

impl std::hash::Hash for Player {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.user_id().hash(state);
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("user_id", &self.user_id())
            .field("name", &self.name())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PlayerDirectory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DirectoryInner {
    players: Vec<Player>,
    local: Option<Player>,
}

struct DirectoryShared {
    inner: RefCell<DirectoryInner>,
    player_added: Signal<Player>,
    player_removing: Signal<PlayerLeave>,
}

/// Shared handle to the session roster. Clones alias the same directory.
pub struct PlayerDirectory {
    shared: Rc<DirectoryShared>,
}

impl PlayerDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Rc::new(DirectoryShared {
                inner: RefCell::new(DirectoryInner::default()),
                player_added: Signal::new(),
                player_removing: Signal::new(),
            }),
        }
    }

    /// Adds a player and emits `player_added`. If the `user_id` is already
    /// present the existing player is returned and nothing is emitted.
    pub fn add_player(&self, user_id: u64, name: impl Into<String>) -> Player {
        let existing = self.find_player(user_id);
        if let Some(player) = existing {
            debug!(user_id, "duplicate join ignored");
            return player;
        }
        let player = Player::new(user_id, name.into());
        self.shared.inner.borrow_mut().players.push(player.clone());
        debug!(user_id, name = %player.name(), "player joined");
        self.shared.player_added.emit(&player);
        player
    }

    /// Removes `player`, clearing its character first, then emits
    /// `player_removing` with `reason`. Unknown players are ignored.
    pub fn remove_player(&self, player: &Player, reason: ExitReason) {
        let present = self
            .shared
            .inner
            .borrow()
            .players
            .iter()
            .any(|p| p.user_id() == player.user_id());
        if !present {
            return;
        }

        player.clear_character();
        {
            let mut inner = self.shared.inner.borrow_mut();
            inner.players.retain(|p| p.user_id() != player.user_id());
            if inner
                .local
                .as_ref()
                .is_some_and(|l| l.user_id() == player.user_id())
            {
                inner.local = None;
            }
        }
        debug!(user_id = player.user_id(), reason = %reason, "player left");
        self.shared.player_removing.emit(&PlayerLeave {
            player: player.clone(),
            reason,
        });
    }

    /// Removes every player with [`ExitReason::Shutdown`], in join order.
    pub fn shutdown(&self) {
        for player in self.players() {
            self.remove_player(&player, ExitReason::Shutdown);
        }
    }

    /// Players in join order.
    #[must_use]
    pub fn players(&self) -> Vec<Player> {
        self.shared.inner.borrow().players.clone()
    }

    #[must_use]
    pub fn find_player(&self, user_id: u64) -> Option<Player> {
        self.shared
            .inner
            .borrow()
            .players
            .iter()
            .find(|p| p.user_id() == user_id)
            .cloned()
    }

    /// The local player on a client session, if one has been designated.
    #[must_use]
    pub fn local_player(&self) -> Option<Player> {
        self.shared.inner.borrow().local.clone()
    }

    /// Designates (or clears) the local player. Removal through
    /// [`remove_player`](PlayerDirectory::remove_player) clears it too.
    pub fn set_local_player(&self, player: Option<&Player>) {
        self.shared.inner.borrow_mut().local = player.cloned();
    }

    /// Fires with the player after it joins the roster.
    #[must_use]
    pub fn player_added(&self) -> Signal<Player> {
        self.shared.player_added.clone()
    }

    /// Fires with a [`PlayerLeave`] after the player has left the roster.
    #[must_use]
    pub fn player_removing(&self) -> Signal<PlayerLeave> {
        self.shared.player_removing.clone()
    }
}

impl Clone for PlayerDirectory {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl Default for PlayerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PlayerDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.borrow();
        f.debug_struct("PlayerDirectory")
            .field("players", &inner.players.len())
            .field("has_local", &inner.local.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
