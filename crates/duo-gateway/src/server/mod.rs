//! Gateway server setup
//!
//! Provides the main WebSocket server configuration and routes.

mod handler;
mod state;

pub use handler::gateway_handler;
pub use state::GatewayState;

use crate::broadcast::{EventDispatcher, EventDispatcherConfig};
use crate::connection::ConnectionManager;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use duo_cache::{Publisher, RedisPool, RedisPoolConfig, RedisStateStore};
use duo_common::{AppConfig, AppError};
use duo_service::{InactivityReaper, RoomService, ServiceContext, ServiceError};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/gateway", get(gateway_handler))
        .route("/health", get(health_check))
        .route("/create-room", post(create_room))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Pre-provision an empty room
///
/// The room starts idle with no participants; the matchmaker never
/// hands it out, but its id can be shared out of band.
async fn create_room(
    axum::extract::State(state): axum::extract::State<GatewayState>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let room = RoomService::new(state.service_context()).create().await?;
    tracing::info!(room_id = %room.id, "Room pre-provisioned");
    Ok((StatusCode::CREATED, Json(json!({ "chatRoomId": room.id }))))
}

/// HTTP-facing wrapper over service errors
struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": self.0.error_code(),
            "detail": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Initialize all dependencies and create `GatewayState`
pub async fn create_gateway_state(config: AppConfig) -> Result<GatewayState, AppError> {
    // Create Redis pool
    tracing::info!("Connecting to Redis...");
    let redis_config = RedisPoolConfig::from(&config.redis);
    let redis_pool = RedisPool::new(redis_config).map_err(|e| AppError::Cache(e.to_string()))?;
    redis_pool
        .health_check()
        .await
        .map_err(|e| AppError::Cache(e.to_string()))?;
    tracing::info!("Redis connection established");

    // Wire the service context over the Redis-backed ports
    let store = Arc::new(RedisStateStore::new(redis_pool.clone()));
    let broadcaster = Arc::new(Publisher::new(redis_pool));
    let service_context = ServiceContext::new(store, broadcaster, config.chat.clone());

    // Create connection manager
    let connection_manager = ConnectionManager::new_shared();

    // Create event dispatcher
    let dispatcher_config = EventDispatcherConfig {
        redis_url: config.redis.url.clone(),
        broadcast_buffer: 1024,
        reconnect_delay_ms: 1000,
    };

    let event_dispatcher = EventDispatcher::new(dispatcher_config, connection_manager.clone())
        .await
        .map_err(|e| AppError::Cache(format!("Failed to create event dispatcher: {e}")))?;

    let event_dispatcher = Arc::new(event_dispatcher);

    // Start the event dispatcher
    event_dispatcher.clone().start();

    // Start the inactivity reaper; every worker runs one, teardown is
    // idempotent across them.
    let reaper = InactivityReaper::new(service_context.clone());
    let _sweep = reaper.start();

    Ok(GatewayState::new(
        service_context,
        connection_manager,
        event_dispatcher,
        config,
    ))
}

/// Run the gateway server
pub async fn run_server(app: Router, addr: &str) -> Result<(), AppError> {
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway listening on ws://{}/gateway", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config.gateway.address();

    // Create gateway state
    let state = create_gateway_state(config).await?;

    // Build application
    let app = create_app(state);

    // Run server
    run_server(app, &addr).await
}
