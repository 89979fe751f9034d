// Internal HTTP routes for room orchestration.

use crate::domain::PlayerIndex;
use crate::interface_adapters::http::error_response;
use crate::interface_adapters::protocol::{FilteredViewDto, RoomStateDto, SnapshotDto};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::prefixed_id;
use crate::use_cases::RoomError;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

#[derive(Debug, Default, serde::Deserialize)]
pub struct CreateRoomRequest {
    // Generated when omitted.
    #[serde(default)]
    room_id: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct CreateRoomResponse {
    room_id: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct AddPlayerRequest {
    user_id: String,
    display_name: String,
    #[serde(default)]
    is_bot: bool,
}

#[derive(Debug, serde::Serialize)]
struct AddPlayerResponse {
    player_index: PlayerIndex,
}

#[derive(Debug, serde::Serialize)]
struct RemovePlayerResponse {
    removed: bool,
}

#[derive(Debug, serde::Deserialize)]
pub struct StartGameRequest {
    requested_by: String,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct EndGameRequest {
    #[serde(default)]
    winner: Option<PlayerIndex>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ViewQuery {
    // Omitted for the unrestricted observer view.
    #[serde(default)]
    player_index: Option<PlayerIndex>,
}

pub async fn create_room_handler(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<CreateRoomRequest>>,
) -> Response {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let room_id = match payload.room_id.map(|id| id.trim().to_string()) {
        Some(id) if id.is_empty() => {
            return error_response(StatusCode::BAD_REQUEST, "room_id must not be empty");
        }
        Some(id) => id,
        None => prefixed_id("room"),
    };

    match state.room_registry.create_room(room_id.clone()).await {
        Ok(_) => (StatusCode::CREATED, Json(CreateRoomResponse { room_id })).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn add_player_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(payload): Json<AddPlayerRequest>,
) -> Response {
    let user_id = payload.user_id.trim();
    if user_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "user_id is required");
    }

    match state
        .room_registry
        .add_player(&room_id, user_id, payload.display_name.trim(), payload.is_bot)
        .await
    {
        Ok(player_index) => {
            (StatusCode::CREATED, Json(AddPlayerResponse { player_index })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn remove_player_handler(
    State(state): State<Arc<AppState>>,
    Path((room_id, user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, RoomError> {
    let removed = state.room_registry.remove_player(&room_id, &user_id).await?;
    Ok(Json(RemovePlayerResponse { removed }))
}

pub async fn start_game_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(payload): Json<StartGameRequest>,
) -> Result<impl IntoResponse, RoomError> {
    let room = state.room_registry.room(&room_id).await?;
    room.start_game(payload.requested_by.trim()).await?;
    Ok(Json(RoomStateDto::from(&room.status())))
}

pub async fn end_game_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    payload: Option<Json<EndGameRequest>>,
) -> Result<impl IntoResponse, RoomError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let room = state.room_registry.room(&room_id).await?;
    room.end_game(payload.winner).await?;
    Ok(Json(RoomStateDto::from(&room.status())))
}

pub async fn reset_room_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, RoomError> {
    let room = state.room_registry.room(&room_id).await?;
    room.reset().await?;
    Ok(Json(RoomStateDto::from(&room.status())))
}

pub async fn room_state_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, RoomError> {
    let room = state.room_registry.room(&room_id).await?;
    Ok(Json(RoomStateDto::from(&room.status())))
}

pub async fn snapshot_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, RoomError> {
    let snapshot = state.room_registry.snapshot(&room_id).await?;
    Ok(Json(SnapshotDto::from(snapshot.as_ref())))
}

pub async fn filtered_view_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Result<impl IntoResponse, RoomError> {
    let view = state
        .room_registry
        .filtered_view(&room_id, query.player_index)
        .await?;
    Ok(Json(FilteredViewDto::from(view)))
}

pub async fn destroy_room_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, RoomError> {
    state.room_registry.destroy_room(&room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
