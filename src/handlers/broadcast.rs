use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::broadcast::{BroadcastPolicy, BroadcastReport, broadcast};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct BroadcastRequest {
    pub text: String,
    #[serde(default)]
    pub continue_on_error: bool,
}

pub async fn broadcast_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BroadcastRequest>,
) -> Result<Json<BroadcastReport>, (StatusCode, String)> {
    if payload.text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "text must not be empty".to_string()));
    }

    let policy = if payload.continue_on_error {
        BroadcastPolicy::ContinueOnError
    } else {
        BroadcastPolicy::FailFast
    };

    match broadcast(&*state.registry, &*state.transport, &payload.text, policy).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!(error = %e, "broadcast aborted");
            Err((StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}
