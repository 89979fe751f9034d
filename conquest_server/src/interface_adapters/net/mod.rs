// Network adapter modules split by client sockets vs internal HTTP routes.

pub mod client;
pub mod internal;

pub use client::ws_handler;
pub use internal::{
    add_player_handler, create_room_handler, destroy_room_handler, end_game_handler,
    filtered_view_handler, remove_player_handler, reset_room_handler, room_state_handler,
    snapshot_handler, start_game_handler,
};
