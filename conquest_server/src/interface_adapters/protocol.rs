// Wire protocol DTOs and conversions for public room messages.
// Request/response bodies of the internal HTTP routes live in `net::internal`.

use crate::domain::board::to_wire;
use crate::domain::{
    AttackOutcome, AttackRejection, FilteredView, GameSnapshot, MatchEvent, PlayerIndex,
    PlayerSnapshot, TargetKind, TileIndex, ViewPatch,
};
use crate::use_cases::{RoomPhase, RoomStatus, RosterEntry};
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Sent once the session is bound; `player_index` is null for observers.
    Identity {
        user_id: String,
        player_index: Option<PlayerIndex>,
    },
    RoomState(RoomStateDto),
    MapUpdate(MapUpdateDto),
    AttackResult(AttackResultDto),
    Error { message: String },
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    Join(JoinPayload),
    Attack(AttackPayload),
    StartGame,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinPayload {
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AttackPayload {
    pub from: TileIndex,
    pub to: TileIndex,
}

/// Lifecycle state sent to clients for UI flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStateDto {
    pub phase: PhaseDto,
    pub winner: Option<PlayerIndex>,
    pub host: Option<String>,
    pub turn: u64,
    pub players: Vec<RosterEntryDto>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseDto {
    Lobby,
    Active,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntryDto {
    pub index: PlayerIndex,
    pub user_id: String,
    pub name: String,
    pub is_bot: bool,
    pub eliminated: bool,
}

impl From<&RosterEntry> for RosterEntryDto {
    fn from(entry: &RosterEntry) -> Self {
        Self {
            index: entry.index,
            user_id: entry.user_id.clone(),
            name: entry.name.clone(),
            is_bot: entry.is_bot,
            eliminated: entry.eliminated,
        }
    }
}

impl From<&RoomStatus> for RoomStateDto {
    fn from(status: &RoomStatus) -> Self {
        let (phase, winner) = match status.phase {
            RoomPhase::Lobby => (PhaseDto::Lobby, None),
            RoomPhase::Active => (PhaseDto::Active, None),
            RoomPhase::Ended { winner } => (PhaseDto::Ended, winner),
        };
        Self {
            phase,
            winner,
            host: status.host.clone(),
            turn: status.turn,
            players: status.players.iter().map(RosterEntryDto::from).collect(),
        }
    }
}

/// Per-array diffs against the previous update sent on this connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapUpdateDto {
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

impl From<ViewPatch> for MapUpdateDto {
    fn from(patch: ViewPatch) -> Self {
        Self {
            version: patch.version,
            turn: patch.turn,
            width: patch.width,
            height: patch.height,
            armies: patch.armies,
            terrain: patch.terrain,
            tower_defense: patch.tower_defense,
            ghost_terrain: patch.ghost_terrain,
            visible: patch.visible,
            generals: patch.generals,
            cities: patch.cities,
            towers: patch.towers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResultDto {
    pub from: TileIndex,
    pub to: TileIndex,
    pub success: bool,
    pub rejection: Option<String>,
    pub target: Option<String>,
    pub force: u32,
    pub loss_inflicted: u32,
    pub events: Vec<MatchEventDto>,
}

impl AttackResultDto {
    pub fn new(from: TileIndex, to: TileIndex, outcome: &AttackOutcome) -> Self {
        let info = outcome.info;
        Self {
            from,
            to,
            success: outcome.success,
            rejection: outcome.rejection.map(|r| rejection_code(r).to_string()),
            target: info.map(|i| target_code(i.target).to_string()),
            force: info.map_or(0, |i| i.force),
            loss_inflicted: info.map_or(0, |i| i.loss_inflicted),
            events: outcome.events.iter().map(MatchEventDto::from).collect(),
        }
    }
}

fn rejection_code(rejection: AttackRejection) -> &'static str {
    match rejection {
        AttackRejection::GameNotActive => "game_not_active",
        AttackRejection::OutOfBounds => "out_of_bounds",
        AttackRejection::NotOwner => "not_owner",
        AttackRejection::InsufficientArmy => "insufficient_army",
        AttackRejection::NotAdjacent => "not_adjacent",
        AttackRejection::Mountain => "mountain",
    }
}

fn target_code(target: TargetKind) -> &'static str {
    match target {
        TargetKind::Own => "own",
        TargetKind::Empty => "empty",
        TargetKind::City => "city",
        TargetKind::LookoutTower => "lookout_tower",
        TargetKind::Enemy => "enemy",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchEventDto {
    CapturedCity {
        player: PlayerIndex,
        tile: TileIndex,
    },
    CapturedTower {
        player: PlayerIndex,
        tile: TileIndex,
    },
    PlayerEliminated {
        player: PlayerIndex,
        by: Option<PlayerIndex>,
    },
    GameWon {
        winner: PlayerIndex,
    },
}

impl From<&MatchEvent> for MatchEventDto {
    fn from(event: &MatchEvent) -> Self {
        match *event {
            MatchEvent::CapturedCity { player, tile } => MatchEventDto::CapturedCity { player, tile },
            MatchEvent::CapturedTower { player, tile } => {
                MatchEventDto::CapturedTower { player, tile }
            }
            MatchEvent::PlayerEliminated { player, by } => {
                MatchEventDto::PlayerEliminated { player, by }
            }
            MatchEvent::GameWon { winner } => MatchEventDto::GameWon { winner },
        }
    }
}

/// Full, unfiltered room state for operators and tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDto {
    pub version: u64,
    pub turn: u64,
    pub started: bool,
    pub ended: bool,
    pub winner: Option<PlayerIndex>,
    /// `[width, height, armies…, terrain…, tower_defense…, ghost_terrain…]`.
    pub map: Vec<i32>,
    pub cities: Vec<i32>,
    pub towers: Vec<i32>,
    /// `-1` for eliminated players.
    pub generals: Vec<i32>,
    pub players: Vec<PlayerSnapshotDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshotDto {
    pub index: PlayerIndex,
    pub user_id: String,
    pub name: String,
    pub is_bot: bool,
    pub eliminated: bool,
    pub territory: usize,
    pub army: u64,
    pub eliminated_on_turn: Option<u64>,
}

impl From<&PlayerSnapshot> for PlayerSnapshotDto {
    fn from(player: &PlayerSnapshot) -> Self {
        Self {
            index: player.index,
            user_id: player.user_id.clone(),
            name: player.name.clone(),
            is_bot: player.is_bot,
            eliminated: player.eliminated,
            // Frozen at elimination; live totals otherwise.
            territory: player.stats.map_or(player.territory, |s| s.territory),
            army: player.stats.map_or(player.army, |s| s.army),
            eliminated_on_turn: player.stats.map(|s| s.turn),
        }
    }
}

impl From<&GameSnapshot> for SnapshotDto {
    fn from(snapshot: &GameSnapshot) -> Self {
        Self {
            version: snapshot.version,
            turn: snapshot.turn,
            started: snapshot.started,
            ended: snapshot.ended,
            winner: snapshot.winner,
            map: snapshot.board.to_flat(),
            cities: snapshot.board.cities().into_iter().map(to_wire).collect(),
            towers: snapshot.board.towers().into_iter().map(to_wire).collect(),
            generals: snapshot
                .generals
                .iter()
                .map(|general| general.map_or(-1, to_wire))
                .collect(),
            players: snapshot.players.iter().map(PlayerSnapshotDto::from).collect(),
        }
    }
}

/// One viewer's fogged board, hidden tiles zeroed and flagged in `visible`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredViewDto {
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

impl From<FilteredView> for FilteredViewDto {
    fn from(view: FilteredView) -> Self {
        Self {
            version: view.version,
            turn: view.turn,
            width: view.width,
            height: view.height,
            armies: view.armies,
            terrain: view.terrain,
            tower_defense: view.tower_defense,
            ghost_terrain: view.ghost_terrain,
            visible: view.visible,
            generals: view.generals,
            cities: view.cities,
            towers: view.towers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_type_and_data() {
        let attack: ClientMessage =
            serde_json::from_str(r#"{"type":"Attack","data":{"from":3,"to":4}}"#).unwrap();
        assert!(matches!(
            attack,
            ClientMessage::Attack(AttackPayload { from: 3, to: 4 })
        ));

        let start: ClientMessage = serde_json::from_str(r#"{"type":"StartGame"}"#).unwrap();
        assert!(matches!(start, ClientMessage::StartGame));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"Fly"}"#).is_err());
    }

    #[test]
    fn identity_serializes_observers_as_null() {
        let msg = ServerMessage::Identity {
            user_id: "u".into(),
            player_index: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Identity");
        assert!(json["data"]["player_index"].is_null());
    }

    #[test]
    fn attack_results_carry_codes() {
        let outcome = AttackOutcome {
            success: false,
            events: Vec::new(),
            info: None,
            rejection: Some(AttackRejection::NotAdjacent),
        };
        let dto = AttackResultDto::new(1, 9, &outcome);
        assert_eq!(dto.rejection.as_deref(), Some("not_adjacent"));
        assert_eq!(dto.force, 0);

        let json = serde_json::to_value(MatchEventDto::from(&MatchEvent::GameWon { winner: 2 }))
            .unwrap();
        assert_eq!(json["kind"], "game_won");
        assert_eq!(json["winner"], 2);
    }
}
