// Per-viewer map updates derived from published snapshots.

use super::clock::Periodic;
use crate::domain::{FilteredView, GameSnapshot, PlayerIndex, ViewPatch};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};

#[derive(Debug)]
struct ViewerSlot {
    id: u64,
    /// `None` for observers; players are resolved against each snapshot.
    user_id: Option<String>,
    tx: mpsc::Sender<ViewPatch>,
    /// Last view the client acknowledged by receiving it. `None` forces a full resync.
    cursor: Option<FilteredView>,
}

#[derive(Debug, Default)]
struct Slots {
    next_id: u64,
    slots: Vec<ViewerSlot>,
}

/// Registered viewers of one room.
#[derive(Debug, Clone, Default)]
pub struct ViewerSet {
    inner: Arc<Mutex<Slots>>,
}

/// Receiving end of one viewer's update stream.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    updates: mpsc::Receiver<ViewPatch>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<ViewPatch> {
        self.updates.recv().await
    }
}

impl ViewerSet {
    /// Registers a viewer and queues a full resync against `snapshot`.
    pub async fn subscribe(
        &self,
        user_id: Option<String>,
        capacity: usize,
        snapshot: &GameSnapshot,
    ) -> Subscription {
        let (tx, updates) = mpsc::channel(capacity.max(1));
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = inner.next_id;
        let mut slot = ViewerSlot {
            id,
            user_id,
            tx,
            cursor: None,
        };
        // A fresh channel always has room for the first update.
        let _ = push(&mut slot, snapshot);
        inner.slots.push(slot);
        debug!(viewer_id = id, viewers = inner.slots.len(), "viewer subscribed");
        Subscription { id, updates }
    }

    pub async fn unsubscribe(&self, id: u64) {
        self.inner.lock().await.slots.retain(|slot| slot.id != id);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.slots.len()
    }

    /// Sends every viewer the diff from its cursor to `snapshot`.
    pub async fn flush(&self, snapshot: &GameSnapshot) {
        let mut inner = self.inner.lock().await;
        inner.slots.retain_mut(|slot| match push(slot, snapshot) {
            Delivery::Sent | Delivery::Skipped => true,
            Delivery::Lagging => {
                warn!(viewer_id = slot.id, "viewer lagging; resyncing on next update");
                true
            }
            Delivery::Closed => {
                debug!(viewer_id = slot.id, "viewer channel closed");
                false
            }
        });
    }
}

enum Delivery {
    Sent,
    Skipped,
    Lagging,
    Closed,
}

fn push(slot: &mut ViewerSlot, snapshot: &GameSnapshot) -> Delivery {
    if slot
        .cursor
        .as_ref()
        .is_some_and(|cursor| cursor.version == snapshot.version)
    {
        return Delivery::Skipped;
    }

    let index: Option<PlayerIndex> = slot
        .user_id
        .as_deref()
        .and_then(|user_id| snapshot.player_index(user_id));
    let view = snapshot.filtered(snapshot.viewer_for(index));
    let patch = match &slot.cursor {
        Some(cursor) => ViewPatch::between(cursor, &view),
        None => ViewPatch::between(&FilteredView::default(), &view),
    };

    match slot.tx.try_send(patch) {
        Ok(()) => {
            slot.cursor = Some(view);
            Delivery::Sent
        }
        Err(TrySendError::Full(_)) => {
            slot.cursor = None;
            Delivery::Lagging
        }
        Err(TrySendError::Closed(_)) => Delivery::Closed,
    }
}

/// Broadcast clock job: reads the latest published snapshot and fans it out.
pub struct Broadcaster {
    snapshots: watch::Receiver<Arc<GameSnapshot>>,
    viewers: ViewerSet,
}

impl Broadcaster {
    pub fn new(snapshots: watch::Receiver<Arc<GameSnapshot>>, viewers: ViewerSet) -> Self {
        Self { snapshots, viewers }
    }

    async fn flush_latest(&mut self) {
        let snapshot = self.snapshots.borrow_and_update().clone();
        self.viewers.flush(&snapshot).await;
    }
}

impl Periodic for Broadcaster {
    async fn tick(&mut self) -> ControlFlow<()> {
        self.flush_latest().await;
        ControlFlow::Continue(())
    }

    async fn finish(&mut self) {
        self.flush_latest().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EngineConfig, SimulationEngine};

    fn engine() -> SimulationEngine {
        let mut engine = SimulationEngine::new(EngineConfig::new(12, 12, 7)).unwrap();
        engine.add_player("u0", "Zero", false).unwrap();
        engine.add_player("u1", "One", false).unwrap();
        engine.start_game().unwrap();
        engine
    }

    #[tokio::test]
    async fn first_update_is_a_full_resync() {
        let engine = engine();
        let snapshot = engine.snapshot();
        let viewers = ViewerSet::default();
        let mut sub = viewers.subscribe(Some("u0".into()), 8, &snapshot).await;

        let patch = sub.recv().await.unwrap();
        let view = patch.apply(&FilteredView::default()).unwrap();
        assert_eq!(view, snapshot.filtered(snapshot.viewer_for(Some(0))));
    }

    #[tokio::test]
    async fn unchanged_snapshots_are_not_resent() {
        let mut engine = engine();
        let viewers = ViewerSet::default();
        let mut sub = viewers.subscribe(None, 8, &engine.snapshot()).await;
        sub.recv().await.unwrap();

        viewers.flush(&engine.snapshot()).await;
        assert!(sub.updates.try_recv().is_err());

        engine.process_turn();
        viewers.flush(&engine.snapshot()).await;
        let patch = sub.updates.try_recv().unwrap();
        assert_eq!(patch.version, engine.version());
    }

    #[tokio::test]
    async fn lagging_viewer_gets_a_full_resync() {
        let mut engine = engine();
        let viewers = ViewerSet::default();
        let mut sub = viewers.subscribe(Some("u1".into()), 1, &engine.snapshot()).await;

        // Channel is full with the initial resync, so this update is dropped.
        engine.process_turn();
        viewers.flush(&engine.snapshot()).await;
        sub.recv().await.unwrap();

        engine.process_turn();
        let latest = engine.snapshot();
        viewers.flush(&latest).await;
        let resync = sub.recv().await.unwrap();
        let view = resync.apply(&FilteredView::default()).unwrap();
        assert_eq!(view, latest.filtered(latest.viewer_for(Some(1))));
    }

    #[tokio::test]
    async fn closed_viewers_are_dropped() {
        let mut engine = engine();
        let viewers = ViewerSet::default();
        let sub = viewers.subscribe(None, 4, &engine.snapshot()).await;
        assert_eq!(viewers.len().await, 1);

        drop(sub);
        engine.process_turn();
        viewers.flush(&engine.snapshot()).await;
        assert_eq!(viewers.len().await, 0);
    }
}
