// Immutable published state and the per-viewer views derived from it.

use super::board::{Board, EMPTY_CODE, PlayerIndex, TileIndex, to_wire};
use super::diff::{self, PatchError};
use super::state::{EliminationStats, GameState, Player};
use super::visibility::{self, Viewer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub index: PlayerIndex,
    pub user_id: String,
    pub name: String,
    pub is_bot: bool,
    pub eliminated: bool,
    pub stats: Option<EliminationStats>,
    pub territory: usize,
    pub army: u64,
}

/// Versioned, read-only copy of a match; never aliased with the engine's mutable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub version: u64,
    pub turn: u64,
    pub started: bool,
    pub ended: bool,
    pub winner: Option<PlayerIndex>,
    pub board: Board,
    pub players: Vec<PlayerSnapshot>,
    pub generals: Vec<Option<TileIndex>>,
    pub sight_radius: usize,
}

impl GameSnapshot {
    pub(crate) fn capture(
        version: u64,
        state: &GameState,
        players: &[Player],
        generals: &[Option<TileIndex>],
        sight_radius: usize,
    ) -> Self {
        let players = players
            .iter()
            .enumerate()
            .map(|(index, player)| {
                let (territory, army) = state.board.territory(index);
                PlayerSnapshot {
                    index,
                    user_id: player.user_id.clone(),
                    name: player.name.clone(),
                    is_bot: player.is_bot,
                    eliminated: player.eliminated,
                    stats: player.stats,
                    territory,
                    army,
                }
            })
            .collect();

        Self {
            version,
            turn: state.turn,
            started: state.started,
            ended: state.ended,
            winner: state.winner,
            board: state.board.clone(),
            players,
            generals: generals.to_vec(),
            sight_radius,
        }
    }

    pub fn player_index(&self, user_id: &str) -> Option<PlayerIndex> {
        self.players.iter().position(|p| p.user_id == user_id)
    }

    /// Unknown or stale slots degrade to an unrestricted observer.
    pub fn viewer_for(&self, index: Option<PlayerIndex>) -> Viewer {
        index
            .and_then(|index| self.players.get(index))
            .map_or(Viewer::Unrestricted, |p| {
                Viewer::for_player(p.index, p.eliminated)
            })
    }

    pub fn filtered(&self, viewer: Viewer) -> FilteredView {
        FilteredView::build(
            self.version,
            self.turn,
            &self.board,
            &self.generals,
            viewer,
            self.sight_radius,
        )
    }
}

/// Board as one viewer may see it, in wire arrays. Hidden tiles are zeroed and flagged
/// in `visible` so clients can draw their own fog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredView {
    pub version: u64,
    pub turn: u64,
    pub width: usize,
    pub height: usize,
    pub armies: Vec<i32>,
    pub terrain: Vec<i32>,
    pub tower_defense: Vec<i32>,
    pub ghost_terrain: Vec<i32>,
    pub visible: Vec<i32>,
    pub generals: Vec<i32>,
    pub cities: Vec<i32>,
    pub towers: Vec<i32>,
}

impl FilteredView {
    pub fn build(
        version: u64,
        turn: u64,
        board: &Board,
        generals: &[Option<TileIndex>],
        viewer: Viewer,
        sight_radius: usize,
    ) -> Self {
        let vis = visibility::compute(board, generals, viewer, sight_radius);
        let masked = |values: Vec<i32>, hidden: i32| -> Vec<i32> {
            values
                .into_iter()
                .zip(&vis.tiles)
                .map(|(value, seen)| if *seen { value } else { hidden })
                .collect()
        };
        let visible_tiles = |tiles: Vec<TileIndex>| -> Vec<i32> {
            tiles
                .into_iter()
                .filter(|tile| vis.is_visible(*tile))
                .map(to_wire)
                .collect()
        };

        Self {
            version,
            turn,
            width: board.width,
            height: board.height,
            armies: masked(board.armies_wire(), 0),
            terrain: masked(board.terrain_wire(), EMPTY_CODE),
            tower_defense: masked(board.tower_defense_wire(), 0),
            ghost_terrain: masked(board.ghost_wire(), EMPTY_CODE),
            visible: vis.tiles.iter().map(|seen| i32::from(*seen)).collect(),
            generals: vis
                .generals
                .iter()
                .map(|general| general.map_or(-1, to_wire))
                .collect(),
            cities: visible_tiles(board.cities()),
            towers: visible_tiles(board.towers()),
        }
    }

    pub fn is_visible(&self, tile: TileIndex) -> bool {
        self.visible.get(tile).is_some_and(|v| *v != 0)
    }
}

/// Per-array diffs between two views of the same viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPatch {
    pub version: u64,
    pub turn: u64,
    pub width: usize,
    pub height: usize,
    pub armies: Vec<i32>,
    pub terrain: Vec<i32>,
    pub tower_defense: Vec<i32>,
    pub ghost_terrain: Vec<i32>,
    pub visible: Vec<i32>,
    pub generals: Vec<i32>,
    pub cities: Vec<i32>,
    pub towers: Vec<i32>,
}

impl ViewPatch {
    /// Diffing from `FilteredView::default()` yields a full resync.
    pub fn between(prev: &FilteredView, next: &FilteredView) -> Self {
        Self {
            version: next.version,
            turn: next.turn,
            width: next.width,
            height: next.height,
            armies: diff::diff(&prev.armies, &next.armies),
            terrain: diff::diff(&prev.terrain, &next.terrain),
            tower_defense: diff::diff(&prev.tower_defense, &next.tower_defense),
            ghost_terrain: diff::diff(&prev.ghost_terrain, &next.ghost_terrain),
            visible: diff::diff(&prev.visible, &next.visible),
            generals: diff::diff(&prev.generals, &next.generals),
            cities: diff::diff(&prev.cities, &next.cities),
            towers: diff::diff(&prev.towers, &next.towers),
        }
    }

    pub fn apply(&self, prev: &FilteredView) -> Result<FilteredView, PatchError> {
        Ok(FilteredView {
            version: self.version,
            turn: self.turn,
            width: self.width,
            height: self.height,
            armies: diff::patch(&prev.armies, &self.armies)?,
            terrain: diff::patch(&prev.terrain, &self.terrain)?,
            tower_defense: diff::patch(&prev.tower_defense, &self.tower_defense)?,
            ghost_terrain: diff::patch(&prev.ghost_terrain, &self.ghost_terrain)?,
            visible: diff::patch(&prev.visible, &self.visible)?,
            generals: diff::patch(&prev.generals, &self.generals)?,
            cities: diff::patch(&prev.cities, &self.cities)?,
            towers: diff::patch(&prev.towers, &self.towers)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::board::{Structure, Terrain};

    fn sample_board() -> Board {
        let mut board = Board::new(9, 1).unwrap();
        board.terrain[0] = Terrain::Owned(0);
        board.armies[0] = 5;
        board.terrain[7] = Terrain::City;
        board.structures[7] = Structure::City;
        board.armies[7] = 44;
        board.terrain[8] = Terrain::Owned(1);
        board.armies[8] = 3;
        board
    }

    #[test]
    fn hidden_tiles_leak_nothing() {
        let board = sample_board();
        let view = FilteredView::build(1, 0, &board, &[Some(0), Some(8)], Viewer::Player(0), 5);

        assert_eq!(view.visible, vec![1, 1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(view.armies[7], 0);
        assert_eq!(view.terrain[7], EMPTY_CODE);
        assert_eq!(view.terrain[8], EMPTY_CODE);
        assert!(view.cities.is_empty());
        assert_eq!(view.generals, vec![0, -1]);
    }

    #[test]
    fn patches_rebuild_successive_views() {
        let mut board = sample_board();
        let first = FilteredView::build(1, 0, &board, &[Some(0)], Viewer::Unrestricted, 5);
        board.armies[0] = 1;
        board.terrain[1] = Terrain::Owned(0);
        board.armies[1] = 4;
        let second = FilteredView::build(2, 1, &board, &[Some(0)], Viewer::Unrestricted, 5);

        let full = ViewPatch::between(&FilteredView::default(), &first);
        let rebuilt = full.apply(&FilteredView::default()).unwrap();
        assert_eq!(rebuilt, first);

        let delta = ViewPatch::between(&first, &second);
        assert_eq!(delta.armies, vec![0, 2, 1, 4, 7]);
        assert_eq!(delta.apply(&rebuilt).unwrap(), second);
    }
}
