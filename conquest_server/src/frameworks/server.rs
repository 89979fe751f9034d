// Framework bootstrap for the conquest server runtime.

use crate::frameworks::config;
use crate::interface_adapters::net::{
    add_player_handler, create_room_handler, destroy_room_handler, end_game_handler,
    filtered_view_handler, remove_player_handler, reset_room_handler, room_state_handler,
    snapshot_handler, start_game_handler, ws_handler,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{PresenceTracker, RoomRegistry, RoomSettings};

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/rooms", post(create_room_handler))
        .route(
            "/rooms/{room_id}",
            get(room_state_handler).delete(destroy_room_handler),
        )
        .route("/rooms/{room_id}/players", post(add_player_handler))
        .route(
            "/rooms/{room_id}/players/{user_id}",
            delete(remove_player_handler),
        )
        .route("/rooms/{room_id}/start", post(start_game_handler))
        .route("/rooms/{room_id}/end", post(end_game_handler))
        .route("/rooms/{room_id}/reset", post(reset_room_handler))
        .route("/rooms/{room_id}/snapshot", get(snapshot_handler))
        .route("/rooms/{room_id}/view", get(filtered_view_handler))
        .with_state(state)
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    // build state
    let state = build_state().await?;
    let app = router(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn room_settings() -> RoomSettings {
    RoomSettings {
        command_channel_capacity: config::COMMAND_CHANNEL_CAPACITY,
        viewer_channel_capacity: config::VIEWER_CHANNEL_CAPACITY,
        turn_interval: config::turn_interval(),
        broadcast_interval: config::broadcast_interval(),
        map_width: config::map_width(),
        map_height: config::map_height(),
        map_seed: config::map_seed(),
        bot_strategy: config::bot_strategy(),
    }
}

async fn build_state() -> Result<Arc<AppState>> {
    let settings = room_settings();
    tracing::debug!(
        map_width = settings.map_width,
        map_height = settings.map_height,
        turn_interval_ms = settings.turn_interval.as_millis(),
        broadcast_interval_ms = settings.broadcast_interval.as_millis(),
        bot_strategy = ?settings.bot_strategy,
        "room settings loaded"
    );

    // Setup Room Registry
    // This owns the set of active room actor tasks.
    let room_registry = Arc::new(RoomRegistry::new(settings));

    // The default room serves sockets that do not name one.
    room_registry
        .create_room(config::DEFAULT_ROOM_ID.to_string())
        .await
        .map_err(|e| std::io::Error::other(format!("failed to create default room: {e}")))?;

    Ok(Arc::new(AppState {
        room_registry,
        default_room_id: Arc::from(config::DEFAULT_ROOM_ID),
        presence: Arc::new(PresenceTracker::new()),
        disconnect_grace: config::disconnect_grace(),
    }))
}
