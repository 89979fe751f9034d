/// Gameplay tuning for map generation and structure spawning.

#[derive(Debug, Clone, Copy)]
pub struct MapTuning {
    /// One mountain per this many tiles (10% density).
    pub tiles_per_mountain: usize,

    /// Random attempts per mountain/structure before it is skipped.
    pub placement_attempts: u32,

    /// Candidate tiles sampled when placing a general.
    pub general_samples: u32,

    /// Generals keep at least this many tiles away from the border.
    pub min_edge_distance: usize,

    /// Cities spawned per player at game start (at least one city overall).
    pub cities_per_player: usize,

    /// Minimum Chebyshev distance between two cities.
    pub city_separation: usize,

    /// Inclusive range of the neutral garrison on a fresh city.
    pub city_garrison: (u32, u32),

    /// Euclidean sight radius granted by an owned lookout tower.
    pub sight_radius: usize,

    /// Durability of a fresh lookout tower.
    pub tower_defense: u32,
}

impl MapTuning {
    /// Minimum Chebyshev distance between two lookout towers.
    pub fn tower_separation(&self) -> usize {
        2 * self.sight_radius + 1
    }

    /// Chebyshev distance a new general must keep from existing generals.
    pub fn general_spacing(&self, total_players: usize) -> usize {
        match total_players {
            0..=2 => 8,
            3..=4 => 6,
            _ => 4,
        }
    }
}

impl Default for MapTuning {
    fn default() -> Self {
        Self {
            tiles_per_mountain: 10,
            placement_attempts: 50,
            general_samples: 1000,
            min_edge_distance: 3,
            cities_per_player: 6,
            city_separation: 3,
            city_garrison: (40, 50),
            sight_radius: 5,
            tower_defense: 30,
        }
    }
}
