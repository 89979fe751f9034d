// Room registry and per-room handles: the command surface used by every adapter.

use super::broadcast::{Subscription, ViewerSet};
use super::room::{room_task, RoomActor};
use super::types::{RoomCommand, RoomStatus};
use crate::domain::{
    AttackOutcome, BotStrategy, EngineConfig, EngineError, FilteredView, GameSnapshot,
    MatchEvent, PlayerIndex, SimulationEngine, TileIndex,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tracing::info;

/// Shared configuration for spawning rooms.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Capacity of each room's command queue.
    pub command_channel_capacity: usize,
    /// Capacity of each viewer's update queue before it is considered lagging.
    pub viewer_channel_capacity: usize,
    pub turn_interval: Duration,
    pub broadcast_interval: Duration,
    pub map_width: usize,
    pub map_height: usize,
    /// Fixed map seed; each room draws a random one when unset.
    pub map_seed: Option<u64>,
    pub bot_strategy: BotStrategy,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            command_channel_capacity: 1024,
            viewer_channel_capacity: 64,
            turn_interval: Duration::from_millis(500),
            broadcast_interval: Duration::from_millis(1000),
            map_width: 25,
            map_height: 25,
            map_seed: None,
            bot_strategy: BotStrategy::default(),
        }
    }
}

/// Errors returned by room registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room already exists")]
    AlreadyExists,
    #[error("room not found")]
    NotFound,
    #[error("only the host can start the game")]
    NotHost,
    /// The room task has stopped.
    #[error("room is closed")]
    Closed,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Cloneable access to one running room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    /// Identifier clients use to target this room.
    pub room_id: Arc<str>,
    commands: mpsc::Sender<RoomCommand>,
    snapshots: watch::Receiver<Arc<GameSnapshot>>,
    status: watch::Receiver<RoomStatus>,
    viewers: ViewerSet,
    viewer_capacity: usize,
}

impl RoomHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| RoomError::Closed)?;
        response.await.map_err(|_| RoomError::Closed)
    }

    pub async fn add_player(
        &self,
        user_id: &str,
        name: &str,
        is_bot: bool,
    ) -> Result<PlayerIndex, RoomError> {
        self.request(|reply| RoomCommand::AddPlayer {
            user_id: user_id.to_string(),
            name: name.to_string(),
            is_bot,
            reply,
        })
        .await?
    }

    pub async fn remove_player(&self, user_id: &str) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::RemovePlayer {
            user_id: user_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn start_game(&self, requested_by: &str) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Start {
            requested_by: requested_by.to_string(),
            reply,
        })
        .await?
    }

    pub async fn submit_attack(
        &self,
        player: PlayerIndex,
        from: TileIndex,
        to: TileIndex,
    ) -> Result<AttackOutcome, RoomError> {
        self.request(|reply| RoomCommand::Attack {
            player,
            from,
            to,
            reply,
        })
        .await
    }

    pub async fn forfeit(&self, user_id: &str) -> Result<Vec<MatchEvent>, RoomError> {
        self.request(|reply| RoomCommand::Forfeit {
            user_id: user_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn end_game(&self, winner: Option<PlayerIndex>) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::End { winner, reply })
            .await?
    }

    pub async fn reset(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Reset { reply }).await?
    }

    /// Latest published snapshot. Never blocks on the room task.
    pub fn snapshot(&self) -> Arc<GameSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// `None` or an unknown index yields the unrestricted observer view.
    pub fn filtered_view(&self, player: Option<PlayerIndex>) -> FilteredView {
        let snapshot = self.snapshot();
        snapshot.filtered(snapshot.viewer_for(player))
    }

    pub fn status(&self) -> RoomStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<RoomStatus> {
        self.status.clone()
    }

    /// Opens a per-viewer diff stream. The first update is a full resync.
    pub async fn subscribe(&self, user_id: Option<String>) -> Subscription {
        self.viewers
            .subscribe(user_id, self.viewer_capacity, &self.snapshot())
            .await
    }

    pub async fn unsubscribe(&self, subscription: &Subscription) {
        self.viewers.unsubscribe(subscription.id).await;
    }

    async fn shutdown(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Shutdown { reply }).await
    }
}

/// Thread-safe registry for active rooms.
#[derive(Debug)]
pub struct RoomRegistry {
    /// Global settings applied to newly created rooms.
    settings: RoomSettings,
    /// Map of room id to active handle.
    rooms: RwLock<HashMap<String, RoomHandle>>,
}

impl RoomRegistry {
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            settings,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a new room and spawns its actor task.
    pub async fn create_room(&self, room_id: String) -> Result<RoomHandle, RoomError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room_id) {
            return Err(RoomError::AlreadyExists);
        }

        let seed = self.settings.map_seed.unwrap_or_else(rand::random);
        let config = EngineConfig::new(self.settings.map_width, self.settings.map_height, seed);
        let engine = SimulationEngine::new(config)?;

        // Channel wiring for the room actor.
        let (command_tx, command_rx) =
            mpsc::channel::<RoomCommand>(self.settings.command_channel_capacity);
        let (snapshot_tx, snapshots) = watch::channel(Arc::new(engine.snapshot()));
        let (status_tx, status) = watch::channel(RoomStatus::default());
        let viewers = ViewerSet::default();

        let room_id: Arc<str> = Arc::from(room_id);
        let actor = RoomActor::new(
            room_id.clone(),
            engine,
            self.settings.clone(),
            command_tx.downgrade(),
            snapshot_tx,
            status_tx,
            viewers.clone(),
        );
        tokio::spawn(room_task(actor, command_rx));

        let room = RoomHandle {
            room_id: room_id.clone(),
            commands: command_tx,
            snapshots,
            status,
            viewers,
            viewer_capacity: self.settings.viewer_channel_capacity,
        };
        rooms.insert(room_id.to_string(), room.clone());
        info!(room_id = %room_id, seed, "room created");
        Ok(room)
    }

    /// Returns a room handle for the provided id, if it exists.
    pub async fn get_room(&self, room_id: &str) -> Option<RoomHandle> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).cloned()
    }

    pub async fn room(&self, room_id: &str) -> Result<RoomHandle, RoomError> {
        self.get_room(room_id).await.ok_or(RoomError::NotFound)
    }

    /// Stops the room's clocks and actor. Outstanding handles see `Closed`.
    pub async fn destroy_room(&self, room_id: &str) -> Result<(), RoomError> {
        let room = self
            .rooms
            .write()
            .await
            .remove(room_id)
            .ok_or(RoomError::NotFound)?;
        // Already stopped is as good as stopped.
        let _ = room.shutdown().await;
        info!(room_id, "room destroyed");
        Ok(())
    }

    pub async fn add_player(
        &self,
        room_id: &str,
        user_id: &str,
        name: &str,
        is_bot: bool,
    ) -> Result<PlayerIndex, RoomError> {
        self.room(room_id)
            .await?
            .add_player(user_id, name, is_bot)
            .await
    }

    pub async fn remove_player(&self, room_id: &str, user_id: &str) -> Result<bool, RoomError> {
        self.room(room_id).await?.remove_player(user_id).await
    }

    pub async fn start_game(&self, room_id: &str, requested_by: &str) -> Result<(), RoomError> {
        self.room(room_id).await?.start_game(requested_by).await
    }

    pub async fn submit_attack(
        &self,
        room_id: &str,
        player: PlayerIndex,
        from: TileIndex,
        to: TileIndex,
    ) -> Result<AttackOutcome, RoomError> {
        self.room(room_id)
            .await?
            .submit_attack(player, from, to)
            .await
    }

    pub async fn snapshot(&self, room_id: &str) -> Result<Arc<GameSnapshot>, RoomError> {
        Ok(self.room(room_id).await?.snapshot())
    }

    pub async fn filtered_view(
        &self,
        room_id: &str,
        player: Option<PlayerIndex>,
    ) -> Result<FilteredView, RoomError> {
        Ok(self.room(room_id).await?.filtered_view(player))
    }

    pub async fn end_game(
        &self,
        room_id: &str,
        winner: Option<PlayerIndex>,
    ) -> Result<(), RoomError> {
        self.room(room_id).await?.end_game(winner).await
    }

    pub async fn reset_room(&self, room_id: &str) -> Result<(), RoomError> {
        self.room(room_id).await?.reset().await
    }

    pub async fn subscribe(
        &self,
        room_id: &str,
        user_id: Option<String>,
    ) -> Result<Subscription, RoomError> {
        Ok(self.room(room_id).await?.subscribe(user_id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AttackRejection;
    use crate::use_cases::types::RoomPhase;

    fn settings() -> RoomSettings {
        RoomSettings {
            map_width: 12,
            map_height: 12,
            map_seed: Some(42),
            turn_interval: Duration::from_millis(100),
            broadcast_interval: Duration::from_millis(200),
            ..RoomSettings::default()
        }
    }

    async fn room_with_two_players(registry: &RoomRegistry) -> RoomHandle {
        let room = registry.create_room("r1".into()).await.unwrap();
        assert_eq!(room.add_player("alice", "Alice", false).await, Ok(0));
        assert_eq!(room.add_player("bob", "Bob", false).await, Ok(1));
        room
    }

    #[tokio::test]
    async fn create_room_rejects_duplicates() {
        let registry = RoomRegistry::new(settings());
        registry.create_room("r1".into()).await.unwrap();
        assert_eq!(
            registry.create_room("r1".into()).await.err(),
            Some(RoomError::AlreadyExists)
        );
        assert_eq!(
            registry.snapshot("missing").await.err(),
            Some(RoomError::NotFound)
        );
    }

    #[tokio::test]
    async fn invalid_dimensions_fail_room_creation() {
        let registry = RoomRegistry::new(RoomSettings {
            map_width: 0,
            ..settings()
        });
        assert!(matches!(
            registry.create_room("bad".into()).await,
            Err(RoomError::Engine(EngineError::InvalidDimensions { .. }))
        ));
        assert!(registry.get_room("bad").await.is_none());
    }

    #[tokio::test]
    async fn only_the_host_may_start() {
        let registry = RoomRegistry::new(settings());
        let room = room_with_two_players(&registry).await;
        assert_eq!(room.status().host.as_deref(), Some("alice"));

        assert_eq!(room.start_game("bob").await, Err(RoomError::NotHost));
        room.start_game("alice").await.unwrap();
        assert_eq!(room.status().phase, RoomPhase::Active);
        assert_eq!(
            room.start_game("alice").await,
            Err(RoomError::Engine(EngineError::GameStarted))
        );
    }

    #[tokio::test]
    async fn host_passes_to_next_human() {
        let registry = RoomRegistry::new(settings());
        let room = registry.create_room("r1".into()).await.unwrap();
        room.add_player("bot", "Bot", true).await.unwrap();
        room.add_player("alice", "Alice", false).await.unwrap();
        room.add_player("bob", "Bob", false).await.unwrap();
        assert_eq!(room.status().host.as_deref(), Some("alice"));

        assert_eq!(room.remove_player("alice").await, Ok(true));
        let status = room.status();
        assert_eq!(status.host.as_deref(), Some("bob"));
        assert_eq!(status.players.len(), 2);
        assert_eq!(status.players[1].index, 1);
    }

    #[tokio::test]
    async fn start_needs_two_players() {
        let registry = RoomRegistry::new(settings());
        let room = registry.create_room("r1".into()).await.unwrap();
        room.add_player("alice", "Alice", false).await.unwrap();
        assert_eq!(
            room.start_game("alice").await,
            Err(RoomError::Engine(EngineError::NotEnoughPlayers {
                required: 2,
                found: 1
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn turns_advance_while_active() {
        let registry = RoomRegistry::new(settings());
        let room = room_with_two_players(&registry).await;
        room.start_game("alice").await.unwrap();

        tokio::time::sleep(Duration::from_millis(550)).await;
        let turn = room.snapshot().turn;
        assert!(turn >= 4, "turn {turn}");

        room.end_game(Some(0)).await.unwrap();
        let ended_at = room.snapshot().turn;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(room.snapshot().turn, ended_at);
        assert_eq!(
            room.status().phase,
            RoomPhase::Ended { winner: Some(0) }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn phases_only_move_forward_until_reset() {
        let registry = RoomRegistry::new(settings());
        let room = room_with_two_players(&registry).await;

        assert_eq!(
            room.end_game(Some(99)).await,
            Err(RoomError::Engine(EngineError::GameNotActive))
        );
        assert_eq!(room.status().phase, RoomPhase::Lobby);

        room.start_game("alice").await.unwrap();
        assert_eq!(
            room.end_game(Some(99)).await,
            Err(RoomError::Engine(EngineError::InvalidWinner(99)))
        );
        room.end_game(Some(1)).await.unwrap();

        assert_eq!(
            room.start_game("alice").await,
            Err(RoomError::Engine(EngineError::GameEnded))
        );
        let turn = room.snapshot().turn;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(room.snapshot().turn, turn);
        assert_eq!(room.status().phase, RoomPhase::Ended { winner: Some(1) });
    }

    #[tokio::test]
    async fn forfeit_in_lobby_leaves_and_in_game_eliminates() {
        let registry = RoomRegistry::new(settings());
        let room = room_with_two_players(&registry).await;
        room.add_player("carol", "Carol", false).await.unwrap();

        assert!(room.forfeit("carol").await.unwrap().is_empty());
        assert_eq!(room.status().players.len(), 2);

        room.start_game("alice").await.unwrap();
        let events = room.forfeit("bob").await.unwrap();
        assert!(events.contains(&MatchEvent::PlayerEliminated {
            player: 1,
            by: None
        }));
        assert!(events.contains(&MatchEvent::GameWon { winner: 0 }));
        assert_eq!(room.status().phase, RoomPhase::Ended { winner: Some(0) });
    }

    #[tokio::test]
    async fn reset_clears_players_and_host() {
        let registry = RoomRegistry::new(settings());
        let room = room_with_two_players(&registry).await;
        room.start_game("alice").await.unwrap();
        room.end_game(None).await.unwrap();

        room.reset().await.unwrap();
        let status = room.status();
        assert_eq!(status.phase, RoomPhase::Lobby);
        assert!(status.players.is_empty());
        assert!(status.host.is_none());
        assert_eq!(room.snapshot().turn, 0);
    }

    #[tokio::test]
    async fn attacks_report_outcomes() {
        let registry = RoomRegistry::new(settings());
        let room = room_with_two_players(&registry).await;

        let outcome = room.submit_attack(0, 0, 1).await.unwrap();
        assert_eq!(outcome.rejection, Some(AttackRejection::GameNotActive));

        room.start_game("alice").await.unwrap();
        let enemy = room.snapshot().generals[1].unwrap();
        let target = if enemy % 12 + 1 < 12 { enemy + 1 } else { enemy - 1 };
        let outcome = room.submit_attack(0, enemy, target).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.rejection, Some(AttackRejection::NotOwner));
    }

    #[tokio::test]
    async fn observer_view_is_unrestricted() {
        let registry = RoomRegistry::new(settings());
        let room = room_with_two_players(&registry).await;
        room.start_game("alice").await.unwrap();

        let observer = room.filtered_view(None);
        assert!(observer.visible.iter().all(|v| *v == 1));
        let player = room.filtered_view(Some(0));
        assert!(player.visible.iter().any(|v| *v == 0));
    }

    #[tokio::test]
    async fn destroyed_rooms_are_closed() {
        let registry = RoomRegistry::new(settings());
        let room = room_with_two_players(&registry).await;
        registry.destroy_room("r1").await.unwrap();

        assert!(registry.get_room("r1").await.is_none());
        assert_eq!(
            room.add_player("dave", "Dave", false).await,
            Err(RoomError::Closed)
        );
        assert_eq!(registry.destroy_room("r1").await, Err(RoomError::NotFound));
    }

    #[tokio::test]
    async fn subscribers_receive_lobby_changes() {
        let registry = RoomRegistry::new(settings());
        let room = registry.create_room("r1".into()).await.unwrap();
        let mut sub = room.subscribe(None).await;
        let initial = sub.recv().await.unwrap();
        let view = initial.apply(&FilteredView::default()).unwrap();

        room.add_player("alice", "Alice", false).await.unwrap();
        let update = sub.recv().await.unwrap();
        let view = update.apply(&view).unwrap();
        assert_eq!(view, room.filtered_view(None));
    }
}
