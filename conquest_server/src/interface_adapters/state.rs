use crate::use_cases::{PresenceTracker, RoomRegistry};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    // Every running room; injected so tests can build their own.
    pub room_registry: Arc<RoomRegistry>,
    // Room used by sockets that do not name one.
    pub default_room_id: Arc<str>,
    // Live connection per room member, for disconnect forfeits.
    pub presence: Arc<PresenceTracker>,
    pub disconnect_grace: Duration,
}
