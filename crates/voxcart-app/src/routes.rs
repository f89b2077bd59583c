//! Router setup with all routes and middleware.

use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::media;
use crate::state::AppState;

/// Create the axum Router with the status API and the media-stream socket.
pub fn create_router(state: AppState) -> Router {
    // Status routes are read-only; dashboards may poll them from anywhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let media_path = state.config.server.media_stream_path.clone();

    let api_routes = Router::new()
        .route("/agents/stats", get(handlers::agent_stats))
        .route("/calls", get(handlers::list_calls))
        .route("/calls/{call_id}", get(handlers::get_call))
        .route("/calls/{call_id}/agent", get(handlers::call_agent));

    Router::new()
        .route("/health", get(handlers::health))
        .route(&media_path, get(media::media_stream))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
