// Per-viewer fog of war. Recomputed from scratch for every view; nothing is remembered.

use super::board::{Board, PlayerIndex, Structure, Terrain, TileIndex};

/// Who is looking at the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Player(PlayerIndex),
    /// Observers and eliminated players see everything.
    Unrestricted,
}

impl Viewer {
    /// Eliminated players lose their fog along with their territory.
    pub fn for_player(index: PlayerIndex, eliminated: bool) -> Self {
        if eliminated {
            Viewer::Unrestricted
        } else {
            Viewer::Player(index)
        }
    }
}

/// Tiles and generals a viewer may observe this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    pub tiles: Vec<bool>,
    pub generals: Vec<Option<TileIndex>>,
}

impl Visibility {
    pub fn is_visible(&self, tile: TileIndex) -> bool {
        self.tiles.get(tile).copied().unwrap_or(false)
    }
}

pub fn compute(
    board: &Board,
    generals: &[Option<TileIndex>],
    viewer: Viewer,
    sight_radius: usize,
) -> Visibility {
    let player = match viewer {
        Viewer::Unrestricted => {
            return Visibility {
                tiles: vec![true; board.len()],
                generals: generals.to_vec(),
            };
        }
        Viewer::Player(player) => player,
    };

    let mut tiles = vec![false; board.len()];
    for tile in board.owned_tiles(player) {
        for seen in board.neighborhood(tile) {
            tiles[seen] = true;
        }
        if board.structures[tile] == Structure::LookoutTower {
            reveal_circle(board, tile, sight_radius, &mut tiles);
        }
    }

    let generals = generals
        .iter()
        .enumerate()
        .map(|(owner, general)| {
            let general = (*general)?;
            if owner == player || borders_territory(board, general, player) {
                Some(general)
            } else {
                None
            }
        })
        .collect();

    Visibility { tiles, generals }
}

// Euclidean disc, not the bounding square.
fn reveal_circle(board: &Board, center: TileIndex, radius: usize, tiles: &mut [bool]) {
    let (cx, cy) = board.coords(center);
    let radius_sq = radius * radius;
    for tile in board.within(center, radius) {
        let (x, y) = board.coords(tile);
        let (dx, dy) = (x.abs_diff(cx), y.abs_diff(cy));
        if dx * dx + dy * dy <= radius_sq {
            tiles[tile] = true;
        }
    }
}

fn borders_territory(board: &Board, tile: TileIndex, player: PlayerIndex) -> bool {
    board
        .neighborhood(tile)
        .any(|t| board.terrain[t] == Terrain::Owned(player))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with_owner(width: usize, height: usize, tiles: &[(TileIndex, PlayerIndex)]) -> Board {
        let mut board = Board::new(width, height).unwrap();
        for (tile, owner) in tiles {
            board.terrain[*tile] = Terrain::Owned(*owner);
            board.armies[*tile] = 1;
        }
        board
    }

    #[test]
    fn unrestricted_sees_all() {
        let board = board_with_owner(4, 4, &[(0, 0), (15, 1)]);
        let vis = compute(&board, &[Some(0), Some(15)], Viewer::Unrestricted, 5);
        assert!(vis.tiles.iter().all(|v| *v));
        assert_eq!(vis.generals, vec![Some(0), Some(15)]);
    }

    #[test]
    fn owned_tiles_reveal_their_ring() {
        let board = board_with_owner(7, 7, &[(24, 0)]);
        let vis = compute(&board, &[Some(24)], Viewer::Player(0), 5);
        let seen: Vec<_> = (0..board.len()).filter(|t| vis.is_visible(*t)).collect();
        assert_eq!(seen, vec![16, 17, 18, 23, 24, 25, 30, 31, 32]);
    }

    #[test]
    fn tower_sight_is_circular() {
        let mut board = board_with_owner(15, 15, &[(board_index(15, 7, 7), 0)]);
        let center = board_index(15, 7, 7);
        board.structures[center] = Structure::LookoutTower;
        let vis = compute(&board, &[None], Viewer::Player(0), 5);

        assert!(vis.is_visible(board_index(15, 12, 7)));
        assert!(vis.is_visible(board_index(15, 10, 11)));
        // (5,5) offset lies in the bounding box but outside the circle.
        assert!(!vis.is_visible(board_index(15, 12, 12)));
        assert!(!vis.is_visible(board_index(15, 13, 7)));
    }

    #[test]
    fn enemy_general_needs_adjacent_territory() {
        let board = board_with_owner(8, 1, &[(0, 0), (2, 0), (4, 1)]);
        let generals = [Some(0), Some(4)];

        let vis = compute(&board, &generals, Viewer::Player(0), 5);
        // The general at 4 sits two tiles away from the nearest owned tile.
        assert_eq!(vis.generals, vec![Some(0), None]);

        let closer = board_with_owner(8, 1, &[(0, 0), (3, 0), (4, 1)]);
        let vis = compute(&closer, &generals, Viewer::Player(0), 5);
        assert_eq!(vis.generals, vec![Some(0), Some(4)]);
    }

    #[test]
    fn visibility_contracts_after_losing_ground() {
        let mut board = board_with_owner(6, 1, &[(0, 0), (3, 0)]);
        assert!(compute(&board, &[Some(0)], Viewer::Player(0), 5).is_visible(4));
        board.terrain[3] = Terrain::Owned(1);
        assert!(!compute(&board, &[Some(0)], Viewer::Player(0), 5).is_visible(4));
    }

    fn board_index(width: usize, x: usize, y: usize) -> TileIndex {
        y * width + x
    }
}
