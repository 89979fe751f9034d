// Room actor: the single task that owns a room's engine and applies its commands in order.

use super::broadcast::{Broadcaster, ViewerSet};
use super::clock::{Periodic, PeriodicTask};
use super::registry::{RoomError, RoomSettings};
use super::types::{RoomCommand, RoomPhase, RoomStatus, RosterEntry};
use crate::domain::{AttackOutcome, EngineError, GameSnapshot, MatchEvent, PlayerIndex, SimulationEngine};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Turn clock job: feeds `Tick` into the room's command queue.
struct TurnClock {
    commands: mpsc::WeakSender<RoomCommand>,
}

impl Periodic for TurnClock {
    async fn tick(&mut self) -> ControlFlow<()> {
        let Some(commands) = self.commands.upgrade() else {
            return ControlFlow::Break(());
        };
        match commands.try_send(RoomCommand::Tick) {
            Ok(()) => ControlFlow::Continue(()),
            Err(TrySendError::Full(_)) => {
                warn!("command queue full; turn tick skipped");
                ControlFlow::Continue(())
            }
            Err(TrySendError::Closed(_)) => ControlFlow::Break(()),
        }
    }
}

struct Clocks {
    turn: PeriodicTask,
    broadcast: PeriodicTask,
}

pub(crate) struct RoomActor {
    room_id: Arc<str>,
    engine: SimulationEngine,
    settings: RoomSettings,
    commands: mpsc::WeakSender<RoomCommand>,
    snapshot_tx: watch::Sender<Arc<GameSnapshot>>,
    status_tx: watch::Sender<RoomStatus>,
    viewers: ViewerSet,
    host: Option<String>,
    clocks: Option<Clocks>,
}

impl RoomActor {
    pub(crate) fn new(
        room_id: Arc<str>,
        engine: SimulationEngine,
        settings: RoomSettings,
        commands: mpsc::WeakSender<RoomCommand>,
        snapshot_tx: watch::Sender<Arc<GameSnapshot>>,
        status_tx: watch::Sender<RoomStatus>,
        viewers: ViewerSet,
    ) -> Self {
        Self {
            room_id,
            engine,
            settings,
            commands,
            snapshot_tx,
            status_tx,
            viewers,
            host: None,
            clocks: None,
        }
    }

    async fn handle(&mut self, command: RoomCommand) -> ControlFlow<()> {
        match command {
            RoomCommand::AddPlayer {
                user_id,
                name,
                is_bot,
                reply,
            } => {
                let result = self.add_player(&user_id, &name, is_bot).await;
                let _ = reply.send(result);
            }
            RoomCommand::RemovePlayer { user_id, reply } => {
                let removed = self.remove_player(&user_id).await;
                let _ = reply.send(removed);
            }
            RoomCommand::Start {
                requested_by,
                reply,
            } => {
                let result = self.start(&requested_by).await;
                let _ = reply.send(result);
            }
            RoomCommand::Attack {
                player,
                from,
                to,
                reply,
            } => {
                let outcome = self.engine.attack(player, from, to);
                self.announce(&outcome.events);
                self.publish().await;
                let _ = reply.send(outcome);
            }
            RoomCommand::Forfeit { user_id, reply } => {
                let events = self.forfeit(&user_id).await;
                let _ = reply.send(events);
            }
            RoomCommand::End { winner, reply } => {
                let result = self.end_game(winner).await;
                let _ = reply.send(result);
            }
            RoomCommand::Reset { reply } => {
                self.stop_clocks().await;
                let result = self.engine.reset().map_err(RoomError::from);
                self.host = None;
                self.publish().await;
                let _ = reply.send(result);
            }
            RoomCommand::Tick => self.tick().await,
            RoomCommand::Shutdown { reply } => {
                self.stop_clocks().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn add_player(
        &mut self,
        user_id: &str,
        name: &str,
        is_bot: bool,
    ) -> Result<PlayerIndex, RoomError> {
        let index = self.engine.add_player(user_id, name, is_bot)?;
        if !is_bot && self.host.is_none() {
            self.host = Some(user_id.to_string());
        }
        info!(room_id = %self.room_id, user_id, index, is_bot, "player joined");
        self.publish().await;
        Ok(index)
    }

    async fn remove_player(&mut self, user_id: &str) -> bool {
        if !self.engine.remove_player(user_id) {
            return false;
        }
        if self.host.as_deref() == Some(user_id) {
            self.host = self
                .engine
                .players()
                .iter()
                .find(|p| !p.is_bot)
                .map(|p| p.user_id.clone());
            debug!(room_id = %self.room_id, host = ?self.host, "host reassigned");
        }
        info!(room_id = %self.room_id, user_id, "player left");
        self.publish().await;
        true
    }

    async fn start(&mut self, requested_by: &str) -> Result<(), RoomError> {
        match RoomPhase::of(self.engine.state()) {
            RoomPhase::Lobby => {}
            RoomPhase::Active => return Err(EngineError::GameStarted.into()),
            RoomPhase::Ended { .. } => return Err(EngineError::GameEnded.into()),
        }
        if self.host.as_deref() != Some(requested_by) {
            return Err(RoomError::NotHost);
        }
        self.engine.start_game()?;
        info!(room_id = %self.room_id, players = self.engine.players().len(), "match started");
        self.publish().await;
        self.start_clocks();
        Ok(())
    }

    async fn end_game(&mut self, winner: Option<PlayerIndex>) -> Result<(), RoomError> {
        self.engine.end_game(winner)?;
        info!(room_id = %self.room_id, ?winner, "game ended");
        self.publish().await;
        Ok(())
    }

    async fn forfeit(&mut self, user_id: &str) -> Vec<MatchEvent> {
        match RoomPhase::of(self.engine.state()) {
            RoomPhase::Lobby => {
                self.remove_player(user_id).await;
                Vec::new()
            }
            RoomPhase::Active => {
                let Some(index) = self.engine.player_index(user_id) else {
                    return Vec::new();
                };
                match self.engine.forfeit(index) {
                    Ok(events) => {
                        info!(room_id = %self.room_id, user_id, index, "player forfeited");
                        self.announce(&events);
                        self.publish().await;
                        events
                    }
                    Err(e) => {
                        warn!(room_id = %self.room_id, user_id, error = %e, "forfeit rejected");
                        Vec::new()
                    }
                }
            }
            RoomPhase::Ended { .. } => Vec::new(),
        }
    }

    async fn tick(&mut self) {
        if !self.engine.state().is_active() {
            return;
        }
        self.engine.process_turn();

        let bots: Vec<PlayerIndex> = self
            .engine
            .alive_players()
            .filter(|index| self.engine.players()[*index].is_bot)
            .collect();
        for bot in bots {
            if !self.engine.state().is_active() {
                break;
            }
            let view = self.engine.filtered_view(self.engine.viewer_for(bot));
            if let Some(intent) = self.settings.bot_strategy.choose_move(&view, bot) {
                let outcome: AttackOutcome = self.engine.attack(bot, intent.from, intent.to);
                self.announce(&outcome.events);
            }
        }
        self.publish().await;
    }

    fn announce(&self, events: &[MatchEvent]) {
        for event in events {
            match event {
                MatchEvent::PlayerEliminated { player, by } => {
                    info!(room_id = %self.room_id, player, by = ?by, "{event}");
                }
                MatchEvent::GameWon { winner } => {
                    info!(room_id = %self.room_id, winner, "{event}");
                }
                MatchEvent::CapturedCity { player, tile }
                | MatchEvent::CapturedTower { player, tile } => {
                    debug!(room_id = %self.room_id, player, tile, "{event}");
                }
            }
        }
    }

    fn status(&self) -> RoomStatus {
        RoomStatus {
            phase: RoomPhase::of(self.engine.state()),
            host: self.host.clone(),
            turn: self.engine.state().turn,
            players: self
                .engine
                .players()
                .iter()
                .enumerate()
                .map(|(index, player)| RosterEntry::from_player(index, player))
                .collect(),
        }
    }

    /// Publishes before any clock is stopped so the final broadcast carries the ending.
    async fn publish(&mut self) {
        let snapshot = Arc::new(self.engine.snapshot());
        self.snapshot_tx.send_replace(snapshot.clone());
        self.status_tx.send_replace(self.status());

        if self.engine.state().ended {
            self.stop_clocks().await;
        }
        if self.clocks.is_none() {
            self.viewers.flush(&snapshot).await;
        }
    }

    fn start_clocks(&mut self) {
        if self.clocks.is_some() {
            return;
        }
        let turn = PeriodicTask::spawn(
            "turn_clock",
            self.settings.turn_interval,
            TurnClock {
                commands: self.commands.clone(),
            },
        );
        let broadcast = PeriodicTask::spawn(
            "broadcast_clock",
            self.settings.broadcast_interval,
            Broadcaster::new(self.snapshot_tx.subscribe(), self.viewers.clone()),
        );
        self.clocks = Some(Clocks { turn, broadcast });
    }

    async fn stop_clocks(&mut self) {
        if let Some(clocks) = self.clocks.take() {
            clocks.turn.shutdown().await;
            clocks.broadcast.shutdown().await;
            debug!(room_id = %self.room_id, "room clocks stopped");
        }
    }
}

/// Drives a room until it is shut down or every handle is gone.
pub(crate) async fn room_task(mut actor: RoomActor, mut commands: mpsc::Receiver<RoomCommand>) {
    info!(room_id = %actor.room_id, "room task started");
    while let Some(command) = commands.recv().await {
        if actor.handle(command).await.is_break() {
            break;
        }
    }
    actor.stop_clocks().await;
    info!(room_id = %actor.room_id, "room task stopped");
}
