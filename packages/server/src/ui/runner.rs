//! Router construction and server lifecycle.

use std::{future::Future, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    config::ServerConfig,
    error::ServerError,
    infrastructure::pubsub::InMemoryBroker,
};

use super::{
    handler::{get_room_detail, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Build the router for one server process
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/rooms/{room_id}", get(get_room_detail))
        .route("/ws/chat/{room_name}", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves, then release every channel
/// subscription held by this process.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state.clone());
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve);

    state.broadcaster.shutdown().await;
    result
}

/// Run a server process with its own in-memory broker
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let broker = InMemoryBroker::new();
    let state = Arc::new(AppState::in_memory(broker, &config.channel_prefix));

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    tracing::info!("Listening on {}", addr);
    tracing::info!("WebSocket endpoint: ws://{}/ws/chat/{{room_name}}?username={{name}}", addr);

    serve(listener, state, shutdown_signal()).await
}
