// Randomised map placement: mountains, generals and structures.
//
// Every search is bounded. Running out of attempts skips the item; only a general with no empty
// tile left to fall back on is an error.

use super::board::{Board, Structure, Terrain, TileIndex};
use super::errors::EngineError;
use super::tuning::MapTuning;
use rand::Rng;
use rand::rngs::StdRng;

/// Scatters mountains over the interior at the tuned density.
pub fn place_mountains(board: &mut Board, rng: &mut StdRng, tuning: &MapTuning) -> usize {
    // The outer ring stays open.
    if board.width < 3 || board.height < 3 {
        return 0;
    }

    let target = board.len() / tuning.tiles_per_mountain.max(1);
    let mut placed = 0;
    for _ in 0..target {
        for _ in 0..tuning.placement_attempts {
            let x = rng.gen_range(1..board.width - 1);
            let y = rng.gen_range(1..board.height - 1);
            let tile = board.index(x, y);
            if board.terrain[tile] == Terrain::Empty {
                board.terrain[tile] = Terrain::Mountain;
                placed += 1;
                break;
            }
        }
    }
    placed
}

/// Picks a general tile away from the border and from the other generals.
pub fn place_general(
    board: &Board,
    rng: &mut StdRng,
    existing: &[TileIndex],
    total_players: usize,
    tuning: &MapTuning,
) -> Result<TileIndex, EngineError> {
    let spacing = tuning.general_spacing(total_players);
    let good_enough = spacing + 2 * tuning.min_edge_distance;
    let far = board.width.max(board.height);

    let mut best: Option<(usize, TileIndex)> = None;
    for _ in 0..tuning.general_samples {
        let tile = rng.gen_range(0..board.len());
        if board.terrain[tile] != Terrain::Empty {
            continue;
        }
        let edge = board.edge_distance(tile);
        if edge < tuning.min_edge_distance {
            continue;
        }
        let nearest = existing
            .iter()
            .map(|general| board.chebyshev(tile, *general))
            .min()
            .unwrap_or(far);
        if nearest < spacing {
            continue;
        }

        let score = edge + nearest;
        if best.is_none_or(|(best_score, _)| score > best_score) {
            best = Some((score, tile));
        }
        if score >= good_enough {
            break;
        }
    }

    match best {
        Some((_, tile)) => Ok(tile),
        None => random_empty(board, rng).ok_or(EngineError::NoEmptyTile),
    }
}

/// Spawns neutral cities with a spread-out layout; returns how many fit.
pub fn spawn_cities(
    board: &mut Board,
    rng: &mut StdRng,
    count: usize,
    tuning: &MapTuning,
) -> usize {
    let mut placed = Vec::new();
    for _ in 0..count {
        let Some(tile) = find_spread(board, rng, &placed, tuning.city_separation, tuning) else {
            continue;
        };
        let (low, high) = tuning.city_garrison;
        board.terrain[tile] = Terrain::City;
        board.structures[tile] = Structure::City;
        board.armies[tile] = rng.gen_range(low..=high.max(low));
        placed.push(tile);
    }
    placed.len()
}

/// Spawns lookout towers until the next one no longer fits.
pub fn spawn_towers(board: &mut Board, rng: &mut StdRng, tuning: &MapTuning) -> usize {
    let mut placed = Vec::new();
    while let Some(tile) = find_spread(board, rng, &placed, tuning.tower_separation(), tuning) {
        board.terrain[tile] = Terrain::LookoutTower;
        board.structures[tile] = Structure::LookoutTower;
        board.armies[tile] = 0;
        board.tower_defense[tile] = tuning.tower_defense;
        placed.push(tile);
    }
    placed.len()
}

fn find_spread(
    board: &Board,
    rng: &mut StdRng,
    placed: &[TileIndex],
    separation: usize,
    tuning: &MapTuning,
) -> Option<TileIndex> {
    (0..tuning.placement_attempts).find_map(|_| {
        let tile = rng.gen_range(0..board.len());
        let free = board.terrain[tile] == Terrain::Empty && board.armies[tile] == 0;
        let spread = placed
            .iter()
            .all(|other| board.chebyshev(tile, *other) >= separation);
        (free && spread).then_some(tile)
    })
}

fn random_empty(board: &Board, rng: &mut StdRng) -> Option<TileIndex> {
    let empty: Vec<TileIndex> = (0..board.len())
        .filter(|tile| board.terrain[*tile] == Terrain::Empty)
        .collect();
    if empty.is_empty() {
        return None;
    }
    Some(empty[rng.gen_range(0..empty.len())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn mountains_avoid_the_outer_ring() {
        let mut board = Board::new(20, 20).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let placed = place_mountains(&mut board, &mut rng, &MapTuning::default());
        assert!(placed > 0 && placed <= 40);
        for tile in 0..board.len() {
            if board.terrain[tile] == Terrain::Mountain {
                assert!(board.edge_distance(tile) >= 1);
            }
        }
    }

    #[test]
    fn tiny_boards_get_no_mountains() {
        let mut board = Board::new(2, 30).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(place_mountains(&mut board, &mut rng, &MapTuning::default()), 0);
    }

    #[test]
    fn generals_respect_spacing_when_room_allows() {
        let board = Board::new(30, 30).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let tuning = MapTuning::default();
        let first = place_general(&board, &mut rng, &[], 1, &tuning).unwrap();
        let second = place_general(&board, &mut rng, &[first], 2, &tuning).unwrap();
        assert!(board.edge_distance(first) >= 3);
        assert!(board.edge_distance(second) >= 3);
        assert!(board.chebyshev(first, second) >= 8);
    }

    #[test]
    fn general_falls_back_to_any_empty_tile() {
        let mut board = Board::new(3, 3).unwrap();
        board.terrain.fill(Terrain::Mountain);
        board.terrain[4] = Terrain::Empty;
        let mut rng = StdRng::seed_from_u64(9);
        let tile = place_general(&board, &mut rng, &[], 1, &MapTuning::default()).unwrap();
        assert_eq!(tile, 4);

        board.terrain[4] = Terrain::Mountain;
        assert_eq!(
            place_general(&board, &mut rng, &[], 1, &MapTuning::default()),
            Err(EngineError::NoEmptyTile)
        );
    }

    #[test]
    fn towers_keep_their_distance() {
        let mut board = Board::new(40, 40).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let tuning = MapTuning::default();
        let placed = spawn_towers(&mut board, &mut rng, &tuning);
        assert!(placed >= 1);

        let towers = board.towers();
        for (i, a) in towers.iter().enumerate() {
            assert_eq!(board.tower_defense[*a], tuning.tower_defense);
            for b in &towers[i + 1..] {
                assert!(board.chebyshev(*a, *b) >= 11);
            }
        }
    }

    #[test]
    fn cities_land_on_empty_tiles_with_garrison() {
        let mut board = Board::new(25, 25).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let placed = spawn_cities(&mut board, &mut rng, 12, &MapTuning::default());
        assert!(placed > 0);
        for city in board.cities() {
            assert_eq!(board.terrain[city], Terrain::City);
            assert!((40..=50).contains(&board.armies[city]));
        }
    }
}
