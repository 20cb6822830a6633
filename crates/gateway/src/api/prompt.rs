//! `POST /prompt` and `POST /cancel` — the command endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use tracing::Instrument;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub content: String,
}

/// Accept a prompt and dispatch the agent loop asynchronously.
///
/// The response only acknowledges acceptance; completion (and any
/// failure, including a busy rejection) is observed on the event stream.
pub async fn submit_prompt(
    State(state): State<AppState>,
    payload: Result<Json<PromptRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("invalid body: {e}") })),
            );
        }
    };
    if req.content.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "content must not be empty" })),
        );
    }

    let runtime = state.runtime.clone();
    let span = tracing::info_span!("prompt");
    tokio::spawn(
        async move {
            match runtime.prompt(req.content).await {
                Ok(()) => tracing::debug!("prompt completed"),
                Err(e) if e.is_cancelled() => tracing::info!("prompt cancelled"),
                Err(e) => tracing::warn!(error = %e, "prompt failed"),
            }
        }
        .instrument(span),
    );

    (StatusCode::OK, Json(serde_json::json!({ "status": "accepted" })))
}

/// Signal the in-flight prompt's cancellation handle. A no-op when
/// nothing is running; 200 either way.
pub async fn cancel_prompt(State(state): State<AppState>) -> impl IntoResponse {
    let signalled = state.session.cancel_current();
    if signalled {
        tracing::info!("cancellation requested");
    }
    Json(serde_json::json!({ "status": "ok", "cancelled": signalled }))
}
