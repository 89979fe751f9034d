//! Authoritative simulation for one match.
//!
//! The engine owns the board, the player slots and the turn counter. Every mutation goes through
//! the methods below, and each call is appended to an action log so a match can be replayed from
//! its seed (see [`crate::domain::replay`]).

use super::board::{Board, PlayerIndex, Terrain, TileIndex};
use super::errors::EngineError;
use super::placement;
use super::replay::ActionRecord;
use super::snapshot::{FilteredView, GameSnapshot};
use super::state::{EliminationStats, GameState, Player};
use super::systems::combat::{self, AttackInfo, AttackRejection, TargetKind};
use super::systems::growth;
use super::tuning::{ArmyTuning, MapTuning};
use super::visibility::Viewer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;
use tracing::{debug, info};

pub const MIN_PLAYERS: usize = 2;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub width: usize,
    pub height: usize,
    pub seed: u64,
    pub map: MapTuning,
    pub army: ArmyTuning,
}

impl EngineConfig {
    pub fn new(width: usize, height: usize, seed: u64) -> Self {
        Self {
            width,
            height,
            seed,
            map: MapTuning::default(),
            army: ArmyTuning::default(),
        }
    }
}

/// Notable things that happened while resolving an attack or forfeit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    CapturedCity { player: PlayerIndex, tile: TileIndex },
    CapturedTower { player: PlayerIndex, tile: TileIndex },
    /// `by` is `None` when the player forfeited.
    PlayerEliminated { player: PlayerIndex, by: Option<PlayerIndex> },
    GameWon { winner: PlayerIndex },
}

impl fmt::Display for MatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchEvent::CapturedCity { .. } => write!(f, "captured a city"),
            MatchEvent::CapturedTower { .. } => write!(f, "captured a lookout tower"),
            MatchEvent::PlayerEliminated { by: Some(_), .. } => write!(f, "eliminated a player"),
            MatchEvent::PlayerEliminated { by: None, .. } => write!(f, "player forfeited"),
            MatchEvent::GameWon { .. } => write!(f, "won the game"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    pub success: bool,
    pub events: Vec<MatchEvent>,
    /// Present whenever the attack passed validation.
    pub info: Option<AttackInfo>,
    pub rejection: Option<AttackRejection>,
}

impl AttackOutcome {
    fn rejected(reason: AttackRejection) -> Self {
        Self {
            success: false,
            events: Vec::new(),
            info: None,
            rejection: Some(reason),
        }
    }
}

#[derive(Debug)]
pub struct SimulationEngine {
    config: EngineConfig,
    rng: StdRng,
    state: GameState,
    players: Vec<Player>,
    // Parallel to `players`; `None` once the player is eliminated.
    generals: Vec<Option<TileIndex>>,
    log: Vec<ActionRecord>,
    version: u64,
}

impl SimulationEngine {
    /// Allocates the board and scatters mountains. Fails only on unusable dimensions.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let state = GameState::new(fresh_board(&config, &mut rng)?);
        Ok(Self {
            config,
            rng,
            state,
            players: Vec::new(),
            generals: Vec::new(),
            log: Vec::new(),
            version: 0,
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn board(&self) -> &Board {
        &self.state.board
    }

    /// Direct board access for scenario setup. Edits made here are not logged for replay.
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.state.board
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn generals(&self) -> &[Option<TileIndex>] {
        &self.generals
    }

    pub fn log(&self) -> &[ActionRecord] {
        &self.log
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn player_index(&self, user_id: &str) -> Option<PlayerIndex> {
        self.players.iter().position(|p| p.user_id == user_id)
    }

    pub fn alive_players(&self) -> impl Iterator<Item = PlayerIndex> + '_ {
        self.players
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.eliminated)
            .map(|(index, _)| index)
    }

    /// Joins a player before the match starts and places its general.
    pub fn add_player(
        &mut self,
        user_id: &str,
        name: &str,
        is_bot: bool,
    ) -> Result<PlayerIndex, EngineError> {
        self.record(ActionRecord::AddPlayer {
            user_id: user_id.to_string(),
            name: name.to_string(),
            is_bot,
        });
        if self.state.started {
            return Err(EngineError::GameStarted);
        }
        if self.player_index(user_id).is_some() {
            return Err(EngineError::DuplicatePlayer(user_id.to_string()));
        }

        let existing: Vec<TileIndex> = self.generals.iter().flatten().copied().collect();
        let general = placement::place_general(
            &self.state.board,
            &mut self.rng,
            &existing,
            self.players.len() + 1,
            &self.config.map,
        )?;

        let index = self.players.len();
        self.players
            .push(Player::new(user_id.to_string(), name.to_string(), is_bot));
        self.generals.push(Some(general));
        self.state.board.terrain[general] = Terrain::Owned(index);
        self.state.board.armies[general] = 1;
        self.bump();

        debug!(user_id, index, general, "player added");
        Ok(index)
    }

    /// Removes a player before the match starts, keeping slot indices contiguous.
    pub fn remove_player(&mut self, user_id: &str) -> bool {
        self.record(ActionRecord::RemovePlayer {
            user_id: user_id.to_string(),
        });
        if self.state.started {
            return false;
        }
        let Some(index) = self.player_index(user_id) else {
            return false;
        };

        if let Some(general) = self.generals[index] {
            let board = &mut self.state.board;
            board.terrain[general] = Terrain::Empty;
            board.armies[general] = 0;
        }
        self.players.remove(index);
        self.generals.remove(index);
        self.state.board.compact_owners(index);
        self.bump();

        debug!(user_id, index, "player removed");
        true
    }

    /// Spawns cities and towers and opens the match.
    pub fn start_game(&mut self) -> Result<(), EngineError> {
        self.record(ActionRecord::StartGame);
        if self.state.ended {
            return Err(EngineError::GameEnded);
        }
        if self.state.started {
            return Err(EngineError::GameStarted);
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(EngineError::NotEnoughPlayers {
                required: MIN_PLAYERS,
                found: self.players.len(),
            });
        }

        let tuning = self.config.map;
        let city_target = (self.players.len() * tuning.cities_per_player).max(1);
        let cities =
            placement::spawn_cities(&mut self.state.board, &mut self.rng, city_target, &tuning);
        let towers = placement::spawn_towers(&mut self.state.board, &mut self.rng, &tuning);
        self.state.started = true;
        self.bump();

        info!(players = self.players.len(), cities, towers, "game started");
        Ok(())
    }

    /// Advances the turn counter and applies army growth.
    pub fn process_turn(&mut self) {
        self.record(ActionRecord::ProcessTurn);
        if !self.state.is_active() {
            return;
        }
        self.state.turn += 1;
        growth::grow(
            &mut self.state.board,
            &self.generals,
            self.state.turn,
            &self.config.army,
        );
        self.bump();
    }

    /// Commits `armies[from] - 1` against `to`; the origin keeps one army whatever the result.
    pub fn attack(&mut self, player: PlayerIndex, from: TileIndex, to: TileIndex) -> AttackOutcome {
        self.record(ActionRecord::Attack { player, from, to });
        if !self.state.is_active() {
            return AttackOutcome::rejected(AttackRejection::GameNotActive);
        }
        if let Err(reason) = combat::validate(&self.state.board, player, from, to) {
            return AttackOutcome::rejected(reason);
        }

        let resolution = combat::resolve(&mut self.state.board, player, from, to);
        let mut events = Vec::new();
        if resolution.captured {
            match resolution.info.target {
                TargetKind::City => events.push(MatchEvent::CapturedCity { player, tile: to }),
                TargetKind::LookoutTower => {
                    events.push(MatchEvent::CapturedTower { player, tile: to })
                }
                _ => {}
            }
        }

        if let Some(defender) = resolution.defender.filter(|_| resolution.captured) {
            if self.generals.get(defender).copied().flatten() == Some(to) {
                self.eliminate(defender);
                events.push(MatchEvent::PlayerEliminated {
                    player: defender,
                    by: Some(player),
                });
                self.check_last_survivor(&mut events);
            }
        }
        self.bump();

        debug!(
            player,
            from,
            to,
            force = resolution.info.force,
            captured = resolution.captured,
            "attack resolved"
        );
        AttackOutcome {
            success: resolution.info.target == TargetKind::Own || resolution.captured,
            events,
            info: Some(resolution.info),
            rejection: None,
        }
    }

    /// Reverts a player's territory to ghost-neutral ground and retires its general.
    pub fn eliminate_player(&mut self, index: PlayerIndex) -> Result<(), EngineError> {
        self.record(ActionRecord::Eliminate { player: index });
        if index >= self.players.len() {
            return Err(EngineError::UnknownPlayer(index));
        }
        self.eliminate(index);
        self.bump();
        Ok(())
    }

    /// Elimination triggered by the session layer, followed by the victory check.
    pub fn forfeit(&mut self, index: PlayerIndex) -> Result<Vec<MatchEvent>, EngineError> {
        self.record(ActionRecord::Forfeit { player: index });
        if index >= self.players.len() {
            return Err(EngineError::UnknownPlayer(index));
        }
        if !self.state.is_active() {
            return Err(EngineError::GameNotActive);
        }
        let mut events = Vec::new();
        if !self.players[index].eliminated {
            self.eliminate(index);
            events.push(MatchEvent::PlayerEliminated {
                player: index,
                by: None,
            });
            self.check_last_survivor(&mut events);
        }
        self.bump();
        Ok(events)
    }

    /// Ends a running match. A winner, when named, must be a player still alive.
    pub fn end_game(&mut self, winner: Option<PlayerIndex>) -> Result<(), EngineError> {
        self.record(ActionRecord::EndGame { winner });
        if !self.state.is_active() {
            return Err(EngineError::GameNotActive);
        }
        if let Some(index) = winner {
            if self.players.get(index).is_none_or(|p| p.eliminated) {
                return Err(EngineError::InvalidWinner(index));
            }
        }
        self.finish(winner);
        self.bump();
        Ok(())
    }

    /// Discards the board and every player and starts over with fresh terrain.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.record(ActionRecord::Reset);
        let board = fresh_board(&self.config, &mut self.rng)?;
        self.state = GameState::new(board);
        self.players.clear();
        self.generals.clear();
        self.bump();
        info!("game reset");
        Ok(())
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot::capture(
            self.version,
            &self.state,
            &self.players,
            &self.generals,
            self.config.map.sight_radius,
        )
    }

    /// Viewer for a slot; eliminated and unknown slots observe without fog.
    pub fn viewer_for(&self, index: PlayerIndex) -> Viewer {
        self.players
            .get(index)
            .map_or(Viewer::Unrestricted, |p| Viewer::for_player(index, p.eliminated))
    }

    pub fn filtered_view(&self, viewer: Viewer) -> FilteredView {
        FilteredView::build(
            self.version,
            self.state.turn,
            &self.state.board,
            &self.generals,
            viewer,
            self.config.map.sight_radius,
        )
    }

    fn eliminate(&mut self, index: PlayerIndex) {
        let player = &mut self.players[index];
        if player.eliminated {
            return;
        }
        let board = &mut self.state.board;
        let (territory, army) = board.territory(index);
        player.stats = Some(EliminationStats {
            territory,
            army,
            turn: self.state.turn,
        });
        player.eliminated = true;
        self.generals[index] = None;

        let owned: Vec<TileIndex> = board.owned_tiles(index).collect();
        for tile in owned {
            board.ghost_terrain[tile] = Some(index);
            // Ruins are plain ground; the structure layer stays for whoever takes the tile next.
            board.terrain[tile] = Terrain::Empty;
            board.armies[tile] /= 2;
        }

        info!(
            player = index,
            user_id = %player.user_id,
            territory,
            army,
            "player eliminated"
        );
    }

    fn check_last_survivor(&mut self, events: &mut Vec<MatchEvent>) {
        if !self.state.is_active() {
            return;
        }
        let alive: Vec<PlayerIndex> = self.alive_players().collect();
        if let [winner] = alive[..] {
            self.finish(Some(winner));
            events.push(MatchEvent::GameWon { winner });
        }
    }

    fn finish(&mut self, winner: Option<PlayerIndex>) {
        if self.state.ended {
            return;
        }
        self.state.ended = true;
        self.state.winner = winner;
        info!(?winner, turn = self.state.turn, "game ended");
    }

    fn record(&mut self, action: ActionRecord) {
        self.log.push(action);
    }

    fn bump(&mut self) {
        self.version += 1;
    }
}

fn fresh_board(config: &EngineConfig, rng: &mut StdRng) -> Result<Board, EngineError> {
    let mut board = Board::new(config.width, config.height)?;
    placement::place_mountains(&mut board, rng, &config.map);
    Ok(board)
}
