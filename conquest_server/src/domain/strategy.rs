// Bot move selection as pure functions over the bot's own filtered view.

use super::board::{CITY_CODE, MOUNTAIN_CODE, PlayerIndex, TOWER_CODE, TileIndex, to_wire};
use super::snapshot::FilteredView;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveIntent {
    pub from: TileIndex,
    pub to: TileIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BotStrategy {
    /// Grabs whatever neutral ground it can take, cities first.
    #[default]
    Expander,
    /// Prefers enemy tiles and goes straight for visible generals.
    Aggressor,
}

impl FromStr for BotStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "expander" => Ok(BotStrategy::Expander),
            "aggressor" => Ok(BotStrategy::Aggressor),
            other => Err(format!("unknown bot strategy `{other}`")),
        }
    }
}

impl BotStrategy {
    pub fn choose_move(self, view: &FilteredView, me: PlayerIndex) -> Option<MoveIntent> {
        let me_code = to_wire(me);
        let mut best: Option<((i64, i64), MoveIntent)> = None;

        for from in 0..view.terrain.len() {
            if view.terrain[from] != me_code || view.armies[from] <= 1 {
                continue;
            }
            let force = i64::from(view.armies[from]) - 1;
            for to in neighbors(view, from) {
                let Some(score) = self.score(view, me_code, force, to) else {
                    continue;
                };
                if best.is_none_or(|(best_score, _)| score > best_score) {
                    best = Some((score, MoveIntent { from, to }));
                }
            }
        }

        best.map(|(_, intent)| intent)
            .or_else(|| advance_largest_stack(view, me_code))
    }

    // (priority, surplus) of a capture that would succeed; `None` when the move cannot capture.
    fn score(
        self,
        view: &FilteredView,
        me_code: i32,
        force: i64,
        to: TileIndex,
    ) -> Option<(i64, i64)> {
        let terrain = view.terrain[to];
        let defending = i64::from(view.armies[to]);
        let (captures, bonus) = match terrain {
            MOUNTAIN_CODE => return None,
            code if code == me_code => return None,
            CITY_CODE => (force > defending, 50),
            TOWER_CODE => (force >= i64::from(view.tower_defense[to]), 40),
            code if code >= 0 => {
                let general = view.generals.contains(&to_wire(to));
                let bonus = match (self, general) {
                    (BotStrategy::Aggressor, true) => 1000,
                    (BotStrategy::Aggressor, false) => 200,
                    (BotStrategy::Expander, true) => 500,
                    (BotStrategy::Expander, false) => 20,
                };
                (force >= defending, bonus)
            }
            _ => (force > defending, 10),
        };
        captures.then_some((bonus, force - defending))
    }
}

// With nothing to capture, push the biggest army one step toward the nearest non-owned tile.
fn advance_largest_stack(view: &FilteredView, me_code: i32) -> Option<MoveIntent> {
    let from = (0..view.terrain.len())
        .filter(|t| view.terrain[*t] == me_code && view.armies[*t] > 1)
        .max_by_key(|t| (view.armies[*t], std::cmp::Reverse(*t)))?;

    let frontier: Vec<TileIndex> = (0..view.terrain.len())
        .filter(|t| view.is_visible(*t))
        .filter(|t| view.terrain[*t] != me_code && view.terrain[*t] != MOUNTAIN_CODE)
        .collect();

    let distance = |a: TileIndex, b: TileIndex| {
        let (ax, ay) = (a % view.width, a / view.width);
        let (bx, by) = (b % view.width, b / view.width);
        ax.abs_diff(bx) + ay.abs_diff(by)
    };

    neighbors(view, from)
        .filter(|to| view.terrain[*to] == me_code)
        .min_by_key(|to| {
            frontier
                .iter()
                .map(|f| distance(*to, *f))
                .min()
                .unwrap_or(usize::MAX)
        })
        .map(|to| MoveIntent { from, to })
}

fn neighbors(view: &FilteredView, tile: TileIndex) -> impl Iterator<Item = TileIndex> + '_ {
    let (x, y) = (tile % view.width, tile / view.width);
    let candidates = [
        (y > 0).then(|| tile - view.width),
        (y + 1 < view.height).then(|| tile + view.width),
        (x > 0).then(|| tile - 1),
        (x + 1 < view.width).then(|| tile + 1),
    ];
    candidates.into_iter().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::board::{Board, Structure, Terrain};
    use crate::domain::visibility::Viewer;

    fn view_of(board: &Board, generals: &[Option<TileIndex>], me: PlayerIndex) -> FilteredView {
        FilteredView::build(0, 0, board, generals, Viewer::Player(me), 5)
    }

    #[test]
    fn expander_prefers_a_city_it_can_take() {
        let mut board = Board::new(3, 3).unwrap();
        board.terrain[4] = Terrain::Owned(0);
        board.armies[4] = 60;
        board.terrain[1] = Terrain::City;
        board.structures[1] = Structure::City;
        board.armies[1] = 45;

        let intent = BotStrategy::Expander.choose_move(&view_of(&board, &[Some(4)], 0), 0);
        assert_eq!(intent, Some(MoveIntent { from: 4, to: 1 }));
    }

    #[test]
    fn aggressor_goes_for_the_general() {
        let mut board = Board::new(3, 1).unwrap();
        board.terrain = vec![Terrain::Empty, Terrain::Owned(0), Terrain::Owned(1)];
        board.armies = vec![0, 10, 3];
        let generals = [Some(1), Some(2)];

        let intent = BotStrategy::Aggressor.choose_move(&view_of(&board, &generals, 0), 0);
        assert_eq!(intent, Some(MoveIntent { from: 1, to: 2 }));
    }

    #[test]
    fn stacks_advance_through_own_territory() {
        let mut board = Board::new(4, 1).unwrap();
        board.terrain = vec![Terrain::Owned(0), Terrain::Owned(0), Terrain::Owned(0), Terrain::City];
        board.structures[3] = Structure::City;
        board.armies = vec![9, 1, 1, 40];

        let intent = BotStrategy::Expander.choose_move(&view_of(&board, &[Some(0)], 0), 0);
        assert_eq!(intent, Some(MoveIntent { from: 0, to: 1 }));
    }

    #[test]
    fn no_army_no_move() {
        let mut board = Board::new(2, 1).unwrap();
        board.terrain[0] = Terrain::Owned(0);
        board.armies[0] = 1;
        assert_eq!(BotStrategy::Expander.choose_move(&view_of(&board, &[Some(0)], 0), 0), None);
    }

    #[test]
    fn parses_from_config() {
        assert_eq!("Aggressor".parse::<BotStrategy>(), Ok(BotStrategy::Aggressor));
        assert!("turtle".parse::<BotStrategy>().is_err());
    }
}
