use crate::domain::BotStrategy;
use std::{env, str::FromStr, time::Duration};

// Runtime/server constants (not gameplay tuning).

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn millis_var(name: &str, default: u64) -> Duration {
    Duration::from_millis(parse_var(name).unwrap_or(default))
}

pub fn http_port() -> u16 {
    parse_var("CONQUEST_SERVER_PORT").unwrap_or(3001)
}

pub fn map_width() -> usize {
    parse_var("MAP_WIDTH").unwrap_or(25)
}

pub fn map_height() -> usize {
    parse_var("MAP_HEIGHT").unwrap_or(25)
}

/// Unset means every room rolls its own seed.
pub fn map_seed() -> Option<u64> {
    parse_var("MAP_SEED")
}

pub fn turn_interval() -> Duration {
    millis_var("TURN_INTERVAL_MS", 500)
}

pub fn broadcast_interval() -> Duration {
    millis_var("BROADCAST_INTERVAL_MS", 1000)
}

pub fn disconnect_grace() -> Duration {
    millis_var("DISCONNECT_GRACE_MS", 30_000)
}

pub fn bot_strategy() -> BotStrategy {
    match env::var("BOT_STRATEGY") {
        Ok(value) => value.parse().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default bot strategy");
            BotStrategy::default()
        }),
        Err(_) => BotStrategy::default(),
    }
}

pub const COMMAND_CHANNEL_CAPACITY: usize = 1024;
pub const VIEWER_CHANNEL_CAPACITY: usize = 64;

pub const DEFAULT_ROOM_ID: &str = "default";
