// Use-case level inputs/outputs for the room actor.

use super::registry::RoomError;
use crate::domain::{AttackOutcome, GameState, MatchEvent, Player, PlayerIndex, TileIndex};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Lobby,
    Active,
    Ended { winner: Option<PlayerIndex> },
}

impl RoomPhase {
    pub fn of(state: &GameState) -> Self {
        if state.ended {
            RoomPhase::Ended {
                winner: state.winner,
            }
        } else if state.started {
            RoomPhase::Active
        } else {
            RoomPhase::Lobby
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub index: PlayerIndex,
    pub user_id: String,
    pub name: String,
    pub is_bot: bool,
    pub eliminated: bool,
}

impl RosterEntry {
    pub fn from_player(index: PlayerIndex, player: &Player) -> Self {
        Self {
            index,
            user_id: player.user_id.clone(),
            name: player.name.clone(),
            is_bot: player.is_bot,
            eliminated: player.eliminated,
        }
    }
}

/// Lifecycle summary published on every room change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStatus {
    pub phase: RoomPhase,
    pub host: Option<String>,
    pub turn: u64,
    pub players: Vec<RosterEntry>,
}

impl Default for RoomStatus {
    fn default() -> Self {
        Self {
            phase: RoomPhase::Lobby,
            host: None,
            turn: 0,
            players: Vec::new(),
        }
    }
}

/// Everything that can change a room, applied by its actor in arrival order.
#[derive(Debug)]
pub enum RoomCommand {
    AddPlayer {
        user_id: String,
        name: String,
        is_bot: bool,
        reply: oneshot::Sender<Result<PlayerIndex, RoomError>>,
    },
    RemovePlayer {
        user_id: String,
        reply: oneshot::Sender<bool>,
    },
    Start {
        requested_by: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Attack {
        player: PlayerIndex,
        from: TileIndex,
        to: TileIndex,
        reply: oneshot::Sender<AttackOutcome>,
    },
    /// Lobby: leave. Active: eliminated. Ended: ignored.
    Forfeit {
        user_id: String,
        reply: oneshot::Sender<Vec<MatchEvent>>,
    },
    End {
        winner: Option<PlayerIndex>,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Reset {
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Sent by the turn clock.
    Tick,
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
