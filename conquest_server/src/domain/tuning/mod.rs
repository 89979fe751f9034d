// Gameplay tuning, kept apart from runtime/server configuration.

pub mod army;
pub mod map;

pub use army::ArmyTuning;
pub use map::MapTuning;
