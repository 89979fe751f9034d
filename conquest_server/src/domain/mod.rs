// Domain layer: board, simulation rules, fog of war and the diff codec.

pub mod board;
pub mod diff;
pub mod engine;
pub mod errors;
pub mod placement;
pub mod replay;
pub mod snapshot;
pub mod state;
pub mod strategy;
pub mod systems;
pub mod tuning;
pub mod visibility;

pub use board::{Board, PlayerIndex, Structure, Terrain, TileIndex};
pub use engine::{AttackOutcome, EngineConfig, MatchEvent, SimulationEngine};
pub use errors::{BoardDecodeError, EngineError};
pub use snapshot::{FilteredView, GameSnapshot, PlayerSnapshot, ViewPatch};
pub use state::{EliminationStats, GameState, Player};
pub use strategy::{BotStrategy, MoveIntent};
pub use systems::combat::{AttackInfo, AttackRejection, TargetKind};
pub use visibility::Viewer;
