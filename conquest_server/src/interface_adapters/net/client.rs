use crate::domain::{EngineError, PlayerIndex, ViewPatch};
use crate::interface_adapters::http::error_response;
use crate::interface_adapters::protocol::{
    AttackPayload, AttackResultDto, ClientMessage, MapUpdateDto, RoomStateDto, ServerMessage,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::{prefixed_id, rand_id};
use crate::use_cases::{RoomError, RoomHandle, RoomPhase, RoomStatus, Subscription};

use axum::{
    extract::{
        Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::Response,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{Instrument, debug, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    RoomClosed,
    JoinRequired,
    JoinTimeout,
    ClosedBeforeJoin,
}

#[derive(Debug, serde::Deserialize)]
pub struct SessionQuery {
    // The room the client wants to join; the default room when omitted.
    #[serde(default)]
    room_id: Option<String>,
    // Stable identity across reconnects; a guest id is generated when omitted.
    #[serde(default)]
    user_id: Option<String>,
}

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const MAX_USER_ID_LEN: usize = 128;
const MAX_DISPLAY_NAME_LEN: usize = 32;
const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let room_id = query
        .room_id
        .unwrap_or_else(|| state.default_room_id.to_string());

    let user_id = match query.user_id.map(|id| id.trim().to_string()) {
        Some(id) if id.is_empty() || id.len() > MAX_USER_ID_LEN => {
            return error_response(StatusCode::BAD_REQUEST, "invalid user_id");
        }
        Some(id) => id,
        None => prefixed_id("guest"),
    };

    let Some(room) = state.room_registry.get_room(&room_id).await else {
        // Keep not-found responses consistent with the JSON error schema.
        return error_response(StatusCode::NOT_FOUND, "room not found");
    };

    ws.on_upgrade(move |socket| handle_socket(socket, room, state, user_id))
}

async fn handle_socket(socket: WebSocket, room: RoomHandle, state: Arc<AppState>, user_id: String) {
    // Separate connection id so reconnects of the same user are distinguishable in logs.
    let conn_id = rand_id();
    let span = info_span!("conn", conn_id, room_id = %room.room_id, user_id = %user_id);
    run_session(socket, room, state, user_id, conn_id)
        .instrument(span)
        .await;
}

async fn run_session(
    socket: WebSocket,
    room: RoomHandle,
    state: Arc<AppState>,
    user_id: String,
    conn_id: u64,
) {
    let (mut sink, mut stream) = socket.split();

    let mut ctx = match bootstrap_connection(&mut sink, &mut stream, room, user_id).await {
        Ok(ctx) => ctx,
        Err(NetError::ClosedBeforeJoin) => {
            info!("client disconnected before join handshake");
            return;
        }
        Err(e) => {
            warn!(error = ?e, "failed to bootstrap connection");
            let _ = sink.close().await;
            return;
        }
    };

    state
        .presence
        .connect(&ctx.room.room_id, &ctx.user_id, conn_id)
        .await;
    info!(
        player_index = ?ctx.player_index,
        display_name = %ctx.display_name,
        "client connected"
    );

    // Main Client Loop
    if let Err(e) = run_client_loop(&mut sink, &mut stream, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }

    disconnect_cleanup(&state, &ctx, conn_id).await;
}

struct ConnCtx {
    pub user_id: String,
    pub display_name: String,
    pub room: RoomHandle,
    // Index at bind time; attacks re-resolve it because lobby removals shift slots.
    pub player_index: Option<PlayerIndex>,
    pub status_rx: watch::Receiver<RoomStatus>,
    pub subscription: Subscription,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_json: u32,

    pub last_invalid_input_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

#[derive(Debug)]
struct JoinHandshake {
    display_name: String,
    bytes_in: u64,
    msgs_in: u64,
}

async fn bootstrap_connection(
    sink: &mut WsSink,
    stream: &mut WsStream,
    room: RoomHandle,
    user_id: String,
) -> Result<ConnCtx, NetError> {
    // Subscribe before any await so no lifecycle change is missed.
    let mut status_rx = room.watch_status();

    let join = match timeout(JOIN_HANDSHAKE_TIMEOUT, read_join_handshake(sink, stream)).await {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(sink, close_code::POLICY, "join timeout").await;
            return Err(NetError::JoinTimeout);
        }
    };
    let display_name = sanitize_display_name(&join.display_name, &user_id);

    let player_index = match join_room(&room, &user_id, &display_name).await {
        Ok(index) => index,
        Err(RoomError::Closed) => return Err(NetError::RoomClosed),
        Err(e) => {
            // Refused seats still get to watch.
            send_message(sink, &ServerMessage::Error { message: e.to_string() }).await?;
            None
        }
    };

    // Tell the client "This is who you are".
    let identity = ServerMessage::Identity {
        user_id: user_id.clone(),
        player_index,
    };
    let mut bytes_out = send_message(sink, &identity).await? as u64;

    // Clone as soon as we borrow to avoid holding the lock across an await.
    let status = status_rx.borrow_and_update().clone();
    bytes_out += send_message(sink, &ServerMessage::RoomState(RoomStateDto::from(&status))).await?
        as u64;

    // The first map update on this subscription is a full resync.
    let subscription = room.subscribe(Some(user_id.clone())).await;

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        user_id,
        display_name,
        room,
        player_index,
        status_rx,
        subscription,

        msgs_in: join.msgs_in,
        msgs_out: 2,
        bytes_in: join.bytes_in,
        bytes_out,

        invalid_json: 0,

        last_invalid_input_log: now,

        close_frame: None,
    })
}

/// Binds the user to a seat: existing seat on reconnect, new seat in the lobby, observer otherwise.
async fn join_room(
    room: &RoomHandle,
    user_id: &str,
    display_name: &str,
) -> Result<Option<PlayerIndex>, RoomError> {
    if let Some(index) = room.snapshot().player_index(user_id) {
        return Ok(Some(index));
    }
    if room.status().phase != RoomPhase::Lobby {
        return Ok(None);
    }
    match room.add_player(user_id, display_name, false).await {
        Ok(index) => Ok(Some(index)),
        Err(RoomError::Engine(EngineError::GameStarted)) => Ok(None),
        Err(RoomError::Engine(EngineError::DuplicatePlayer(_))) => {
            Ok(room.snapshot().player_index(user_id))
        }
        Err(e) => Err(e),
    }
}

fn sanitize_display_name(raw: &str, user_id: &str) -> String {
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_DISPLAY_NAME_LEN)
        .collect();
    if name.is_empty() {
        user_id.to_string()
    } else {
        name
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

enum SessionEvent {
    Incoming(Option<Result<Message, axum::Error>>),
    MapUpdate(Option<ViewPatch>),
    StatusChanged(Result<(), watch::error::RecvError>),
}

async fn send_message(sink: &mut WsSink, msg: &ServerMessage) -> Result<usize, NetError> {
    // Serialize message safely; log JSON errors instead of panicking
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    sink.send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

async fn send_close_with_reason(
    sink: &mut WsSink,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    sink.send(Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    })))
    .await
    .map_err(NetError::Ws)?;
    sink.close().await.map_err(NetError::Ws)
}

async fn read_join_handshake(
    sink: &mut WsSink,
    stream: &mut WsStream,
) -> Result<JoinHandshake, NetError> {
    loop {
        let Some(incoming) = stream.next().await else {
            return Err(NetError::ClosedBeforeJoin);
        };

        let message = incoming.map_err(NetError::Ws)?;
        match message {
            Message::Text(text) => {
                let bytes_in = text.len() as u64;
                return match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(payload)) => Ok(JoinHandshake {
                        display_name: payload.display_name,
                        bytes_in,
                        msgs_in: 1,
                    }),
                    Ok(_) => {
                        let _ = send_close_with_reason(sink, close_code::POLICY, "join required")
                            .await;
                        Err(NetError::JoinRequired)
                    }
                    Err(_) => {
                        let _ =
                            send_close_with_reason(sink, close_code::POLICY, "invalid join payload")
                                .await;
                        Err(NetError::JoinRequired)
                    }
                };
            }
            Message::Binary(_) => {
                let _ = send_close_with_reason(
                    sink,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::JoinRequired);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn run_client_loop(
    sink: &mut WsSink,
    stream: &mut WsStream,
    ctx: &mut ConnCtx,
) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        let event = tokio::select! {
            incoming = stream.next() => SessionEvent::Incoming(incoming),
            update = ctx.subscription.recv() => SessionEvent::MapUpdate(update),
            changed = ctx.status_rx.changed() => SessionEvent::StatusChanged(changed),
        };

        let control = match event {
            SessionEvent::Incoming(incoming) => match handle_incoming_ws(sink, incoming, ctx).await {
                Ok(control) => control,
                Err(e) => {
                    fatal = Some(e);
                    LoopControl::Disconnect
                }
            },
            SessionEvent::MapUpdate(Some(patch)) => {
                let msg = ServerMessage::MapUpdate(MapUpdateDto::from(patch));
                forward(sink, &msg, ctx).await
            }
            SessionEvent::MapUpdate(None) => {
                warn!("map updates closed; disconnecting");
                fatal = Some(NetError::RoomClosed);
                LoopControl::Disconnect
            }
            SessionEvent::StatusChanged(Ok(())) => {
                let status = ctx.status_rx.borrow_and_update().clone();
                let msg = ServerMessage::RoomState(RoomStateDto::from(&status));
                forward(sink, &msg, ctx).await
            }
            SessionEvent::StatusChanged(Err(_)) => {
                warn!("room state channel closed; disconnecting");
                fatal = Some(NetError::RoomClosed);
                LoopControl::Disconnect
            }
        };

        if let LoopControl::Disconnect = control {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = sink.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = sink.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    sink: &mut WsSink,
    incoming: Option<Result<Message, axum::Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(payload)) => handle_rejoin(sink, ctx, &payload.display_name).await,
                    Ok(ClientMessage::Attack(payload)) => handle_attack(sink, ctx, payload).await,
                    Ok(ClientMessage::StartGame) => {
                        match ctx.room.start_game(&ctx.user_id).await {
                            Ok(()) => Ok(LoopControl::Continue),
                            Err(RoomError::Closed) => Err(NetError::RoomClosed),
                            Err(e) => {
                                let msg = ServerMessage::Error {
                                    message: e.to_string(),
                                };
                                Ok(forward(sink, &msg, ctx).await)
                            }
                        }
                    }
                    Err(parse_err) => {
                        ctx.invalid_json += 1;
                        if should_log(&mut ctx.last_invalid_input_log) {
                            warn!(
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if ctx.invalid_json > MAX_INVALID_JSON {
                            ctx.close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        let msg = ServerMessage::Error {
                            message: "invalid message".to_string(),
                        };
                        Ok(forward(sink, &msg, ctx).await)
                    }
                }
            }
            Message::Binary(_) => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!("websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

// A repeated Join takes a seat after a reset; otherwise it is ignored.
async fn handle_rejoin(
    sink: &mut WsSink,
    ctx: &mut ConnCtx,
    display_name: &str,
) -> Result<LoopControl, NetError> {
    if ctx.room.snapshot().player_index(&ctx.user_id).is_some()
        || ctx.room.status().phase != RoomPhase::Lobby
    {
        if should_log(&mut ctx.last_invalid_input_log) {
            warn!("duplicate join ignored");
        }
        return Ok(LoopControl::Continue);
    }

    ctx.display_name = sanitize_display_name(display_name, &ctx.user_id);
    let msg = match join_room(&ctx.room, &ctx.user_id, &ctx.display_name).await {
        Ok(player_index) => {
            ctx.player_index = player_index;
            ServerMessage::Identity {
                user_id: ctx.user_id.clone(),
                player_index,
            }
        }
        Err(RoomError::Closed) => return Err(NetError::RoomClosed),
        Err(e) => ServerMessage::Error {
            message: e.to_string(),
        },
    };
    Ok(forward(sink, &msg, ctx).await)
}

async fn handle_attack(
    sink: &mut WsSink,
    ctx: &mut ConnCtx,
    AttackPayload { from, to }: AttackPayload,
) -> Result<LoopControl, NetError> {
    let Some(player) = ctx.room.snapshot().player_index(&ctx.user_id) else {
        let msg = ServerMessage::Error {
            message: "observers cannot attack".to_string(),
        };
        return Ok(forward(sink, &msg, ctx).await);
    };

    let outcome = match ctx.room.submit_attack(player, from, to).await {
        Ok(outcome) => outcome,
        Err(_) => return Err(NetError::RoomClosed),
    };
    if let Some(rejection) = outcome.rejection {
        if should_log(&mut ctx.last_invalid_input_log) {
            debug!(player, from, to, ?rejection, "attack rejected");
        }
    }
    let msg = ServerMessage::AttackResult(AttackResultDto::new(from, to, &outcome));
    Ok(forward(sink, &msg, ctx).await)
}

async fn forward(sink: &mut WsSink, msg: &ServerMessage, ctx: &mut ConnCtx) -> LoopControl {
    match send_message(sink, msg).await {
        Ok(bytes) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send message");
            LoopControl::Disconnect
        }
    }
}

async fn disconnect_cleanup(state: &AppState, ctx: &ConnCtx, conn_id: u64) {
    ctx.room.unsubscribe(&ctx.subscription).await;

    let room_id = ctx.room.room_id.to_string();
    let departed = state
        .presence
        .disconnect(&room_id, &ctx.user_id, conn_id)
        .await;
    let seated = ctx.room.snapshot().player_index(&ctx.user_id).is_some();

    if departed && seated {
        state.presence.schedule_forfeit(
            state.room_registry.clone(),
            room_id,
            ctx.user_id.clone(),
            conn_id,
            state.disconnect_grace,
        );
        debug!(
            grace_ms = state.disconnect_grace.as_millis(),
            "forfeit scheduled unless the player reconnects"
        );
    } else if departed {
        // Observers have nothing to forfeit.
        state
            .presence
            .take_departed(&room_id, &ctx.user_id, conn_id)
            .await;
    }

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_json = ctx.invalid_json,
        "connection stats"
    );
    info!("client disconnected");
}
