// Connection presence per room member and the delayed forfeit after a disconnect.

use super::registry::RoomRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Connected(u64),
    Departed(u64),
}

type MemberKey = (String, String);

/// Tracks which connection currently speaks for each (room, user) pair.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    members: Mutex<HashMap<MemberKey, Presence>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `conn_id` as the live connection, cancelling any pending forfeit.
    pub async fn connect(&self, room_id: &str, user_id: &str, conn_id: u64) {
        let key = (room_id.to_string(), user_id.to_string());
        let previous = self
            .members
            .lock()
            .await
            .insert(key, Presence::Connected(conn_id));
        if let Some(Presence::Departed(_)) = previous {
            info!(room_id, user_id, conn_id, "player reconnected within grace period");
        }
    }

    /// Returns true when `conn_id` was the live connection and the member is now departed.
    pub async fn disconnect(&self, room_id: &str, user_id: &str, conn_id: u64) -> bool {
        let mut members = self.members.lock().await;
        let key = (room_id.to_string(), user_id.to_string());
        match members.get(&key) {
            Some(Presence::Connected(current)) if *current == conn_id => {
                members.insert(key, Presence::Departed(conn_id));
                true
            }
            // A newer connection took over; nothing to do.
            _ => false,
        }
    }

    pub async fn is_connected(&self, room_id: &str, user_id: &str) -> bool {
        let key = (room_id.to_string(), user_id.to_string());
        matches!(
            self.members.lock().await.get(&key),
            Some(Presence::Connected(_))
        )
    }

    /// Clears the entry only if nobody reconnected since `conn_id` left.
    pub async fn take_departed(&self, room_id: &str, user_id: &str, conn_id: u64) -> bool {
        let mut members = self.members.lock().await;
        let key = (room_id.to_string(), user_id.to_string());
        if members.get(&key) == Some(&Presence::Departed(conn_id)) {
            members.remove(&key);
            true
        } else {
            false
        }
    }

    /// Forfeits the member after `grace` unless it reconnects first.
    pub fn schedule_forfeit(
        self: &Arc<Self>,
        registry: Arc<RoomRegistry>,
        room_id: String,
        user_id: String,
        conn_id: u64,
        grace: Duration,
    ) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if !tracker.take_departed(&room_id, &user_id, conn_id).await {
                debug!(%room_id, %user_id, conn_id, "forfeit cancelled by reconnect");
                return;
            }
            let Some(room) = registry.get_room(&room_id).await else {
                return;
            };
            match room.forfeit(&user_id).await {
                Ok(events) => {
                    info!(%room_id, %user_id, events = events.len(), "disconnect grace expired")
                }
                Err(e) => warn!(%room_id, %user_id, error = %e, "forfeit after disconnect failed"),
            }
        })
    }
}
