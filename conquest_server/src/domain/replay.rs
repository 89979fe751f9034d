// Action log and deterministic replay.

use super::board::{PlayerIndex, TileIndex};
use super::engine::{EngineConfig, SimulationEngine};
use super::errors::EngineError;

/// One engine call, recorded before it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRecord {
    AddPlayer {
        user_id: String,
        name: String,
        is_bot: bool,
    },
    RemovePlayer {
        user_id: String,
    },
    StartGame,
    ProcessTurn,
    Attack {
        player: PlayerIndex,
        from: TileIndex,
        to: TileIndex,
    },
    Eliminate {
        player: PlayerIndex,
    },
    Forfeit {
        player: PlayerIndex,
    },
    EndGame {
        winner: Option<PlayerIndex>,
    },
    Reset,
}

/// Rebuilds an engine by re-running a log against the same seed.
///
/// Calls that failed originally fail again the same way, so their results are ignored here.
/// Only a board that cannot be allocated at all aborts the replay.
pub fn replay(config: EngineConfig, log: &[ActionRecord]) -> Result<SimulationEngine, EngineError> {
    let mut engine = SimulationEngine::new(config)?;
    for action in log {
        match action {
            ActionRecord::AddPlayer {
                user_id,
                name,
                is_bot,
            } => {
                let _ = engine.add_player(user_id, name, *is_bot);
            }
            ActionRecord::RemovePlayer { user_id } => {
                engine.remove_player(user_id);
            }
            ActionRecord::StartGame => {
                let _ = engine.start_game();
            }
            ActionRecord::ProcessTurn => engine.process_turn(),
            ActionRecord::Attack { player, from, to } => {
                engine.attack(*player, *from, *to);
            }
            ActionRecord::Eliminate { player } => {
                let _ = engine.eliminate_player(*player);
            }
            ActionRecord::Forfeit { player } => {
                let _ = engine.forfeit(*player);
            }
            ActionRecord::EndGame { winner } => {
                let _ = engine.end_game(*winner);
            }
            ActionRecord::Reset => engine.reset()?,
        }
    }
    Ok(engine)
}
