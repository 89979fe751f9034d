use crate::domain::board::{Board, Structure, TileIndex};
use crate::domain::tuning::ArmyTuning;

/// Adds the per-turn army growth to every owned tile.
pub fn grow(board: &mut Board, generals: &[Option<TileIndex>], turn: u64, tuning: &ArmyTuning) {
    let territory_turn = tuning.growth_period != 0 && turn % tuning.growth_period == 0;

    for tile in 0..board.len() {
        if board.terrain[tile].owner().is_none() {
            continue;
        }

        let gain = match board.structures[tile] {
            // Towers extend sight, never armies.
            Structure::LookoutTower => 0,
            Structure::City => tuning.structure_growth,
            Structure::None if generals.contains(&Some(tile)) => tuning.structure_growth,
            Structure::None if territory_turn => tuning.territory_growth,
            Structure::None => 0,
        };
        board.armies[tile] = board.armies[tile].saturating_add(gain);
    }
}
