// Attack validation and resolution on the board.

use crate::domain::board::{Board, PlayerIndex, Terrain, TileIndex};

/// Category of the attacked tile, as seen before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Own,
    Empty,
    City,
    LookoutTower,
    Enemy,
}

/// Why an attack was refused before any army moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackRejection {
    GameNotActive,
    OutOfBounds,
    NotOwner,
    InsufficientArmy,
    NotAdjacent,
    Mountain,
}

/// Describes an attempted attack for upstream milestone logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackInfo {
    pub force: u32,
    pub loss_inflicted: u32,
    pub player_vs_player: bool,
    pub target: TargetKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub captured: bool,
    /// Enemy that owned the target before the attack.
    pub defender: Option<PlayerIndex>,
    pub info: AttackInfo,
}

pub fn validate(
    board: &Board,
    player: PlayerIndex,
    from: TileIndex,
    to: TileIndex,
) -> Result<(), AttackRejection> {
    if !board.contains(from) || !board.contains(to) {
        return Err(AttackRejection::OutOfBounds);
    }
    if board.terrain[from] != Terrain::Owned(player) {
        return Err(AttackRejection::NotOwner);
    }
    if board.armies[from] <= 1 {
        return Err(AttackRejection::InsufficientArmy);
    }
    if !board.is_adjacent(from, to) {
        return Err(AttackRejection::NotAdjacent);
    }
    if board.terrain[to] == Terrain::Mountain {
        return Err(AttackRejection::Mountain);
    }
    Ok(())
}

/// Moves `armies[from] - 1` onto `to`. Callers must `validate` first.
pub fn resolve(board: &mut Board, player: PlayerIndex, from: TileIndex, to: TileIndex) -> Resolution {
    let force = board.armies[from] - 1;
    board.armies[from] = 1;

    let defending = board.armies[to];
    match board.terrain[to] {
        Terrain::Owned(owner) if owner == player => {
            board.armies[to] = defending.saturating_add(force);
            Resolution {
                captured: false,
                defender: None,
                info: info(force, 0, false, TargetKind::Own),
            }
        }
        Terrain::Owned(owner) => {
            let captured = force >= defending;
            board.armies[to] = defending.abs_diff(force);
            if captured {
                board.terrain[to] = Terrain::Owned(player);
            }
            Resolution {
                captured,
                defender: Some(owner),
                info: info(force, force.min(defending), true, TargetKind::Enemy),
            }
        }
        Terrain::LookoutTower => {
            let defense = board.tower_defense[to];
            let captured = force >= defense;
            if captured {
                board.terrain[to] = Terrain::Owned(player);
                board.armies[to] = force - defense;
                board.tower_defense[to] = 0;
            } else {
                board.tower_defense[to] = defense - force;
            }
            Resolution {
                captured,
                defender: None,
                info: info(force, force.min(defense), false, TargetKind::LookoutTower),
            }
        }
        Terrain::City => {
            let captured = force > defending;
            if captured {
                board.terrain[to] = Terrain::Owned(player);
                board.armies[to] = force - defending;
            } else {
                board.armies[to] = defending.saturating_sub(force);
            }
            Resolution {
                captured,
                defender: None,
                info: info(force, force.min(defending), false, TargetKind::City),
            }
        }
        // Validation rules out mountains; treat anything else as open ground.
        Terrain::Empty | Terrain::Mountain => {
            let captured = force > defending;
            if captured {
                board.terrain[to] = Terrain::Owned(player);
                board.armies[to] = force - defending;
            }
            Resolution {
                captured,
                defender: None,
                info: info(force, force.min(defending), false, TargetKind::Empty),
            }
        }
    }
}

fn info(force: u32, loss_inflicted: u32, player_vs_player: bool, target: TargetKind) -> AttackInfo {
    AttackInfo {
        force,
        loss_inflicted,
        player_vs_player,
        target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(terrain: [Terrain; 2], armies: [u32; 2]) -> Board {
        let mut board = Board::new(2, 1).unwrap();
        board.terrain = terrain.to_vec();
        board.armies = armies.to_vec();
        board
    }

    #[test]
    fn reinforcing_own_tile_always_succeeds() {
        let mut board = strip([Terrain::Owned(0), Terrain::Owned(0)], [6, 2]);
        let res = resolve(&mut board, 0, 0, 1);
        assert_eq!(board.armies, vec![1, 7]);
        assert_eq!(res.info.target, TargetKind::Own);
        assert_eq!(res.info.loss_inflicted, 0);
    }

    #[test]
    fn empty_tile_needs_strictly_more_force() {
        let mut board = strip([Terrain::Owned(0), Terrain::Empty], [3, 2]);
        let res = resolve(&mut board, 0, 0, 1);
        assert!(!res.captured);
        assert_eq!(board.terrain[1], Terrain::Empty);
        assert_eq!(board.armies, vec![1, 2]);
    }

    #[test]
    fn city_is_damaged_when_attack_falls_short() {
        let mut board = strip([Terrain::Owned(0), Terrain::City], [11, 40]);
        let res = resolve(&mut board, 0, 0, 1);
        assert!(!res.captured);
        assert_eq!(board.armies[1], 30);
        assert_eq!(board.terrain[1], Terrain::City);
    }

    #[test]
    fn tower_uses_its_own_defense_counter() {
        let mut board = strip([Terrain::Owned(0), Terrain::LookoutTower], [21, 0]);
        board.tower_defense[1] = 30;
        assert!(!resolve(&mut board, 0, 0, 1).captured);
        assert_eq!(board.tower_defense[1], 10);
        assert_eq!(board.armies[1], 0);

        board.armies[0] = 11;
        let res = resolve(&mut board, 0, 0, 1);
        assert!(res.captured);
        assert_eq!(board.terrain[1], Terrain::Owned(0));
        assert_eq!(board.armies[1], 0);
        assert_eq!(board.tower_defense[1], 0);
    }

    #[test]
    fn enemy_tile_falls_on_equal_force() {
        let mut board = strip([Terrain::Owned(0), Terrain::Owned(1)], [4, 3]);
        let res = resolve(&mut board, 0, 0, 1);
        assert!(res.captured);
        assert_eq!(res.defender, Some(1));
        assert_eq!(board.terrain[1], Terrain::Owned(0));
        assert_eq!(board.armies[1], 0);
        assert!(res.info.player_vs_player);
    }

    #[test]
    fn validation_order() {
        let mut board = strip([Terrain::Owned(0), Terrain::Mountain], [5, 0]);
        assert_eq!(validate(&board, 1, 0, 1), Err(AttackRejection::NotOwner));
        assert_eq!(validate(&board, 0, 0, 1), Err(AttackRejection::Mountain));
        assert_eq!(validate(&board, 0, 0, 2), Err(AttackRejection::OutOfBounds));
        board.armies[0] = 1;
        assert_eq!(validate(&board, 0, 0, 1), Err(AttackRejection::InsufficientArmy));
    }
}
