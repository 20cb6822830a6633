pub mod events;
pub mod prompt;

use axum::http::Method;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Build the HTTP surface.
///
/// The service is local and unauthenticated; CORS is deliberately
/// permissive so a browser-hosted client can connect from any origin.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/events", get(events::subscribe_events))
        .route("/prompt", post(prompt::submit_prompt))
        .route("/cancel", post(prompt::cancel_prompt))
        .route("/health", get(health))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
