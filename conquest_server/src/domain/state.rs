// Domain-level match state: players, elimination stats and the game-state aggregate.

use super::board::{Board, PlayerIndex};

/// Totals captured at the moment a player was eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EliminationStats {
    pub territory: usize,
    pub army: u64,
    pub turn: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub user_id: String,
    pub name: String,
    pub is_bot: bool,

    // Soft elimination keeps the slot so indices stay stable after start.
    pub eliminated: bool,
    pub stats: Option<EliminationStats>,
}

impl Player {
    pub fn new(user_id: String, name: String, is_bot: bool) -> Self {
        Self {
            user_id,
            name,
            is_bot,
            eliminated: false,
            stats: None,
        }
    }
}

/// Aggregate root of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    /// Only ever reset by a full engine reset.
    pub turn: u64,
    pub started: bool,
    pub ended: bool,
    pub winner: Option<PlayerIndex>,
    pub board: Board,
}

impl GameState {
    pub fn new(board: Board) -> Self {
        Self {
            turn: 0,
            started: false,
            ended: false,
            winner: None,
            board,
        }
    }

    pub fn is_active(&self) -> bool {
        self.started && !self.ended
    }
}
