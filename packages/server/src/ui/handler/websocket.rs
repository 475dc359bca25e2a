//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{
    domain::ConnectionState,
    ui::state::{AppState, ConnectQuery},
    usecase::{
        ConnectError, ConnectParticipantUseCase, DisconnectParticipantUseCase, MembershipGuard,
        SendMessageError, SendMessageUseCase,
    },
};

/// Upgrade handler for `/ws/chat/{room_name}`.
///
/// The connection is joined before the upgrade completes; a rejected
/// connection gets an HTTP error and never becomes a WebSocket.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_name): Path<String>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let lifecycle = ConnectionState::Connecting;

    // Create a channel for this connection to receive room messages
    let (tx, rx) = mpsc::unbounded_channel();

    let connect_usecase = ConnectParticipantUseCase::new(
        state.registry.clone(),
        state.broadcaster.clone(),
        state.identity.clone(),
    );

    let connection = match connect_usecase.execute(room_name.clone(), query.username, tx).await {
        Ok(connection) => connection,
        Err(e) => {
            let final_state = lifecycle
                .reject()
                .map_or_else(|err| err.to_string(), |state| state.to_string());
            tracing::warn!(
                "Connection to room '{}' is {}: {}",
                room_name,
                final_state,
                e
            );
            return Err(match e {
                ConnectError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                ConnectError::IdentityResolutionFailed(_) => StatusCode::UNAUTHORIZED,
                ConnectError::SubscribeFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            });
        }
    };

    let joined = lifecycle
        .join(connection.room_id.clone())
        .map_err(|e| {
            tracing::error!("Connection '{}': {}", connection.id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    // From here on the guard owns cleanup, including when the upgrade never completes.
    let guard = MembershipGuard::new(
        connection,
        joined,
        DisconnectParticipantUseCase::new(state.registry.clone(), state.broadcaster.clone()),
    );

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, guard, rx)))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    guard: MembershipGuard,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let (mut sender, mut receiver) = socket.split();
    let connection = guard.connection().clone();
    tracing::info!(
        "Connection '{}' ({}) upgraded in room '{}'",
        connection.id,
        connection.display_name,
        connection.room_id
    );

    let send_usecase = SendMessageUseCase::new(state.broadcaster.clone());

    // Spawn a task to receive messages from this client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", connection.id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    match send_usecase.execute(&connection, text.as_str()).await {
                        Ok(_) => {}
                        // Dropped silently; the connection stays open.
                        Err(SendMessageError::MalformedMessage(reason)) => {
                            tracing::debug!(
                                "Dropping malformed message from '{}': {}",
                                connection.id,
                                reason
                            );
                        }
                        Err(SendMessageError::DeliveryFailed(reason)) => {
                            tracing::warn!(
                                "Failed to publish message from '{}': {}",
                                connection.id,
                                reason
                            );
                        }
                    }
                }
                Message::Ping(_) => {
                    tracing::trace!("Received ping");
                    // Ping/pong is handled automatically by the WebSocket protocol
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", connection.id);
                    break;
                }
                _ => {}
            }
        }
    });

    // Spawn a task to push room messages to this client
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    let id = guard.connection().id;
    let final_state = guard.release().await;
    tracing::info!("Connection '{}' is {}", id, final_state);
}
