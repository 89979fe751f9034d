// Per-turn and per-intent rules applied to the board.

pub mod combat;
pub mod growth;
