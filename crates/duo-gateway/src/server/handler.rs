//! WebSocket handler
//!
//! Handles the connection lifecycle: handshake resolution, recovery
//! delivery, the frame pump, and disconnect cleanup.

use crate::handlers::EventRouter;
use crate::protocol::{ClientFrame, ConnectParams, ServerFrame};
use crate::server::GatewayState;
use axum::{
    extract::{ws::Message, Query, State, WebSocketUpgrade},
    response::IntoResponse,
};
use duo_cache::PubSubChannel;
use duo_service::{events, MessageService, SessionService};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Channel buffer size for outgoing frames
const FRAME_BUFFER_SIZE: usize = 100;

/// WebSocket gateway handler
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(state, params, socket))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(
    state: GatewayState,
    params: ConnectParams,
    socket: axum::extract::ws::WebSocket,
) {
    let connection_id = Uuid::new_v4().to_string();

    // Create frame channel for outgoing messages
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(FRAME_BUFFER_SIZE);

    // Register connection
    let connection = state
        .connection_manager()
        .add_connection(connection_id.clone(), tx);

    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    // Resolve the handshake into a session, recovering the previous one
    // when the client's claim checks out.
    let sessions = SessionService::new(state.service_context());
    let handshake = match sessions
        .resolve_handshake(
            &connection_id,
            params.session_id.as_deref(),
            params.chat_room_id.as_deref(),
        )
        .await
    {
        Ok(handshake) => handshake,
        Err(e) => {
            tracing::error!(connection_id = %connection_id, error = %e, "Handshake failed");
            state.connection_manager().remove_connection(&connection_id).await;
            return;
        }
    };

    let session_id = handshake.session.session_id.clone();
    state
        .connection_manager()
        .bind_session(&connection_id, &session_id)
        .await;

    if let Err(e) = state.event_dispatcher().subscribe_session(&session_id).await {
        tracing::warn!(session_id = %session_id, error = %e, "Failed to subscribe to session channel");
    }

    // Announce the bound session before anything else.
    let session_frame = ServerFrame::new(
        events::EVT_SESSION,
        json!({
            "sessionId": session_id,
            "chatRoomId": handshake.recovered_room.as_ref().map(|r| r.id.clone()),
        }),
    );
    if connection.send(session_frame).await.is_err() {
        tracing::warn!(connection_id = %connection_id, "Connection closed during handshake");
        cleanup_connection(&state, &connection_id, &session_id).await;
        return;
    }

    // A recovered participant rejoins its room channel and receives the
    // backlog logged while it was away.
    if let Some(room) = &handshake.recovered_room {
        let channel_name = PubSubChannel::room(&room.id).name();
        state
            .connection_manager()
            .join_channel(&connection_id, &channel_name)
            .await;
        if let Err(e) = state.event_dispatcher().subscribe_room(&room.id).await {
            tracing::warn!(room_id = %room.id, error = %e, "Failed to subscribe to room channel");
        }

        if let Some(resumed_at) = handshake.resumed_at {
            match MessageService::new(state.service_context())
                .missed_since(&room.id, resumed_at)
                .await
            {
                Ok(missed) if !missed.is_empty() => {
                    let frame = ServerFrame::new(
                        events::EVT_MISSED_MESSAGES,
                        json!({ "chatRoomId": room.id, "messages": missed }),
                    );
                    if connection.send(frame).await.is_err() {
                        tracing::warn!(
                            connection_id = %connection_id,
                            "Connection closed during backlog delivery"
                        );
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(room_id = %room.id, error = %e, "Failed to load missed messages");
                }
            }
        }
    }

    // Split the WebSocket
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Clone for tasks
    let state_recv = state.clone();
    let connection_recv = connection.clone();
    let connection_id_recv = connection_id.clone();

    // Spawn task to receive frames from the WebSocket
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    // A malformed frame is logged and dropped, never a
                    // reason to sever the connection.
                    match ClientFrame::from_json(&text) {
                        Ok(frame) => {
                            EventRouter::dispatch(&state_recv, &connection_recv, frame).await;
                        }
                        Err(e) => {
                            tracing::warn!(
                                connection_id = %connection_id_recv,
                                error = %e,
                                "Discarding malformed frame"
                            );
                        }
                    }
                }
                Ok(Message::Binary(_)) => {
                    tracing::debug!(
                        connection_id = %connection_id_recv,
                        "Binary frames not supported, discarding"
                    );
                }
                Ok(Message::Ping(_)) => {
                    tracing::trace!(connection_id = %connection_id_recv, "Ping received");
                    // Pong is handled automatically by axum
                }
                Ok(Message::Pong(_)) => {
                    tracing::trace!(connection_id = %connection_id_recv, "Pong received");
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(connection_id = %connection_id_recv, "Client closed connection");
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = %connection_id_recv,
                        error = %e,
                        "WebSocket error"
                    );
                    return;
                }
            }
        }
    });

    // Clone for send task
    let connection_id_send = connection_id.clone();

    // Spawn task to send frames to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame.to_json() {
                Ok(json) => {
                    if ws_sink.send(Message::Text(json.into())).await.is_err() {
                        tracing::warn!(
                            connection_id = %connection_id_send,
                            "Failed to send frame to WebSocket"
                        );
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        connection_id = %connection_id_send,
                        error = %e,
                        "Failed to serialize frame"
                    );
                }
            }
        }

        // Close the WebSocket when channel is closed
        let _ = ws_sink.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task ended");
        }
        _ = send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task ended");
        }
    }

    cleanup_connection(&state, &connection_id, &session_id).await;
}

/// Clean up a connection on disconnect
///
/// A waiting session is discarded outright; a session in a chat keeps
/// its record so a reconnect can recover the room.
async fn cleanup_connection(state: &GatewayState, connection_id: &str, session_id: &str) {
    tracing::info!(connection_id = %connection_id, session_id = %session_id, "Cleaning up connection");

    state
        .connection_manager()
        .remove_connection(connection_id)
        .await;

    if !state
        .connection_manager()
        .session_has_local_connections(session_id)
    {
        if let Err(e) = state
            .event_dispatcher()
            .unsubscribe_session(session_id)
            .await
        {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to unsubscribe from session channel");
        }
    }

    if let Err(e) = SessionService::new(state.service_context())
        .disconnect(session_id)
        .await
    {
        tracing::warn!(session_id = %session_id, error = %e, "Disconnect bookkeeping failed");
    }
}
