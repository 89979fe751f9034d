// Board storage: parallel per-tile arrays plus the flat wire encoding.

use super::errors::{BoardDecodeError, EngineError};

pub type TileIndex = usize;
pub type PlayerIndex = usize;

pub const EMPTY_CODE: i32 = -1;
pub const MOUNTAIN_CODE: i32 = -2;
pub const CITY_CODE: i32 = -3;
pub const TOWER_CODE: i32 = -4;

/// What a tile shows on the terrain layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terrain {
    Empty,
    Mountain,
    City,
    LookoutTower,
    Owned(PlayerIndex),
}

impl Terrain {
    /// Wire code: negative sentinels for neutral terrain, the player index otherwise.
    pub fn code(self) -> i32 {
        match self {
            Terrain::Empty => EMPTY_CODE,
            Terrain::Mountain => MOUNTAIN_CODE,
            Terrain::City => CITY_CODE,
            Terrain::LookoutTower => TOWER_CODE,
            Terrain::Owned(player) => to_wire(player),
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            EMPTY_CODE => Some(Terrain::Empty),
            MOUNTAIN_CODE => Some(Terrain::Mountain),
            CITY_CODE => Some(Terrain::City),
            TOWER_CODE => Some(Terrain::LookoutTower),
            player if player >= 0 => usize::try_from(player).ok().map(Terrain::Owned),
            _ => None,
        }
    }

    pub fn owner(self) -> Option<PlayerIndex> {
        match self {
            Terrain::Owned(player) => Some(player),
            _ => None,
        }
    }
}

/// Structure layer; survives capture so owned cities and towers keep their rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Structure {
    #[default]
    None,
    City,
    LookoutTower,
}

/// Fixed rectangular grid stored row-major as parallel arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub width: usize,
    pub height: usize,
    pub terrain: Vec<Terrain>,
    pub armies: Vec<u32>,
    pub tower_defense: Vec<u32>,
    pub ghost_terrain: Vec<Option<PlayerIndex>>,
    pub structures: Vec<Structure>,
}

impl Board {
    /// Allocates an all-empty board.
    pub fn new(width: usize, height: usize) -> Result<Self, EngineError> {
        let len = width
            .checked_mul(height)
            .filter(|len| *len > 0 && i32::try_from(*len).is_ok())
            .ok_or(EngineError::InvalidDimensions { width, height })?;

        Ok(Self {
            width,
            height,
            terrain: vec![Terrain::Empty; len],
            armies: vec![0; len],
            tower_defense: vec![0; len],
            ghost_terrain: vec![None; len],
            structures: vec![Structure::None; len],
        })
    }

    pub fn len(&self) -> usize {
        self.terrain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terrain.is_empty()
    }

    pub fn contains(&self, tile: TileIndex) -> bool {
        tile < self.len()
    }

    pub fn index(&self, x: usize, y: usize) -> TileIndex {
        y * self.width + x
    }

    pub fn coords(&self, tile: TileIndex) -> (usize, usize) {
        (tile % self.width, tile / self.width)
    }

    /// True when the tiles share an edge (no wrap-around between rows).
    pub fn is_adjacent(&self, a: TileIndex, b: TileIndex) -> bool {
        let (ax, ay) = self.coords(a);
        let (bx, by) = self.coords(b);
        ax.abs_diff(bx) + ay.abs_diff(by) == 1
    }

    pub fn chebyshev(&self, a: TileIndex, b: TileIndex) -> usize {
        let (ax, ay) = self.coords(a);
        let (bx, by) = self.coords(b);
        ax.abs_diff(bx).max(ay.abs_diff(by))
    }

    /// Distance to the nearest border row or column.
    pub fn edge_distance(&self, tile: TileIndex) -> usize {
        let (x, y) = self.coords(tile);
        x.min(y)
            .min(self.width - 1 - x)
            .min(self.height - 1 - y)
    }

    /// Tile plus its 8-directional neighbours that lie on the board.
    pub fn neighborhood(&self, tile: TileIndex) -> impl Iterator<Item = TileIndex> + '_ {
        self.within(tile, 1)
    }

    /// Tiles inside the Chebyshev square of `radius` around `tile`.
    pub fn within(&self, tile: TileIndex, radius: usize) -> impl Iterator<Item = TileIndex> + '_ {
        let (x, y) = self.coords(tile);
        let x0 = x.saturating_sub(radius);
        let y0 = y.saturating_sub(radius);
        let x1 = (x + radius).min(self.width - 1);
        let y1 = (y + radius).min(self.height - 1);
        (y0..=y1).flat_map(move |ny| (x0..=x1).map(move |nx| self.index(nx, ny)))
    }

    /// 4-directional neighbours.
    pub fn neighbors(&self, tile: TileIndex) -> impl Iterator<Item = TileIndex> + '_ {
        self.within(tile, 1)
            .filter(move |other| self.is_adjacent(tile, *other))
    }

    pub fn owned_tiles(&self, player: PlayerIndex) -> impl Iterator<Item = TileIndex> + '_ {
        self.terrain
            .iter()
            .enumerate()
            .filter(move |(_, terrain)| **terrain == Terrain::Owned(player))
            .map(|(tile, _)| tile)
    }

    /// Territory count and total army of a player.
    pub fn territory(&self, player: PlayerIndex) -> (usize, u64) {
        self.owned_tiles(player)
            .fold((0, 0), |(count, army), tile| {
                (count + 1, army + u64::from(self.armies[tile]))
            })
    }

    pub fn cities(&self) -> Vec<TileIndex> {
        self.structure_tiles(Structure::City)
    }

    pub fn towers(&self) -> Vec<TileIndex> {
        self.structure_tiles(Structure::LookoutTower)
    }

    fn structure_tiles(&self, kind: Structure) -> Vec<TileIndex> {
        self.structures
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == kind)
            .map(|(tile, _)| tile)
            .collect()
    }

    /// Shifts owner references above `removed` down by one slot.
    pub(crate) fn compact_owners(&mut self, removed: PlayerIndex) {
        for terrain in &mut self.terrain {
            if let Terrain::Owned(owner) = terrain {
                if *owner > removed {
                    *owner -= 1;
                }
            }
        }
        for ghost in self.ghost_terrain.iter_mut().flatten() {
            if *ghost > removed {
                *ghost -= 1;
            }
        }
    }

    pub fn armies_wire(&self) -> Vec<i32> {
        self.armies.iter().map(|a| to_wire(*a)).collect()
    }

    pub fn terrain_wire(&self) -> Vec<i32> {
        self.terrain.iter().map(|t| t.code()).collect()
    }

    pub fn tower_defense_wire(&self) -> Vec<i32> {
        self.tower_defense.iter().map(|d| to_wire(*d)).collect()
    }

    pub fn ghost_wire(&self) -> Vec<i32> {
        self.ghost_terrain
            .iter()
            .map(|ghost| ghost.map_or(EMPTY_CODE, to_wire))
            .collect()
    }

    /// `[width, height, armies.., terrain.., tower_defense.., ghost_terrain..]`.
    pub fn to_flat(&self) -> Vec<i32> {
        let mut flat = Vec::with_capacity(2 + 4 * self.len());
        flat.push(to_wire(self.width));
        flat.push(to_wire(self.height));
        flat.extend(self.armies_wire());
        flat.extend(self.terrain_wire());
        flat.extend(self.tower_defense_wire());
        flat.extend(self.ghost_wire());
        flat
    }

    /// Rebuilds a board from its flat form; the structure layer comes from the tile lists.
    pub fn from_flat(
        flat: &[i32],
        cities: &[i32],
        towers: &[i32],
    ) -> Result<Self, BoardDecodeError> {
        let [width, height, rest @ ..] = flat else {
            return Err(BoardDecodeError::Truncated);
        };
        let width = count(*width)?;
        let height = count(*height)?;
        let mut board =
            Board::new(width, height).map_err(|_| BoardDecodeError::Truncated)?;
        let len = board.len();
        if rest.len() != 4 * len {
            return Err(BoardDecodeError::Truncated);
        }

        let (armies, rest) = rest.split_at(len);
        let (terrain, rest) = rest.split_at(len);
        let (defense, ghosts) = rest.split_at(len);

        for tile in 0..len {
            board.armies[tile] = u32::try_from(armies[tile])
                .map_err(|_| BoardDecodeError::Negative(armies[tile]))?;
            board.terrain[tile] = Terrain::from_code(terrain[tile])
                .ok_or(BoardDecodeError::InvalidTerrain(terrain[tile]))?;
            board.tower_defense[tile] = u32::try_from(defense[tile])
                .map_err(|_| BoardDecodeError::Negative(defense[tile]))?;
            board.ghost_terrain[tile] = match ghosts[tile] {
                EMPTY_CODE => None,
                code => Some(count(code)?),
            };
        }

        for (list, kind) in [(cities, Structure::City), (towers, Structure::LookoutTower)] {
            for code in list {
                let tile = usize::try_from(*code)
                    .ok()
                    .filter(|tile| *tile < len)
                    .ok_or(BoardDecodeError::StructureOutOfRange(*code))?;
                board.structures[tile] = kind;
            }
        }

        Ok(board)
    }
}

/// Saturating conversion into the `i32` wire representation.
pub fn to_wire<T: TryInto<i32>>(value: T) -> i32 {
    value.try_into().unwrap_or(i32::MAX)
}

fn count(code: i32) -> Result<usize, BoardDecodeError> {
    usize::try_from(code).map_err(|_| BoardDecodeError::Negative(code))
}
