// Use cases layer: room lifecycle, clocks and per-viewer broadcasting.

pub mod broadcast;
pub mod clock;
pub mod registry;
pub mod room;
pub mod session;
pub mod types;

pub use broadcast::{Subscription, ViewerSet};
pub use registry::{RoomError, RoomHandle, RoomRegistry, RoomSettings};
pub use session::PresenceTracker;
pub use types::{RoomPhase, RoomStatus, RosterEntry};
