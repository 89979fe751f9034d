// Domain-level errors for engine lifecycle and map decoding.

use thiserror::Error;

/// Errors returned by engine lifecycle operations.
///
/// Attack failures are not errors; they are reported through `AttackOutcome`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid board dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    #[error("game already started")]
    GameStarted,
    #[error("game already ended")]
    GameEnded,
    #[error("game is not active")]
    GameNotActive,
    #[error("at least {required} players are required, found {found}")]
    NotEnoughPlayers { required: usize, found: usize },
    #[error("player {0} already joined")]
    DuplicatePlayer(String),
    #[error("unknown player index {0}")]
    UnknownPlayer(usize),
    #[error("player {0} is not in the running")]
    InvalidWinner(usize),
    /// Placement ran out of empty tiles with no fallback left.
    #[error("no empty tile left for placement")]
    NoEmptyTile,
}

/// Errors returned when rebuilding a board from its flat wire form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardDecodeError {
    #[error("flat map is truncated")]
    Truncated,
    #[error("invalid terrain code {0}")]
    InvalidTerrain(i32),
    #[error("negative value {0} where a count was expected")]
    Negative(i32),
    #[error("structure tile {0} is outside the board")]
    StructureOutOfRange(i32),
}
