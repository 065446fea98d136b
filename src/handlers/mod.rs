mod health;
mod metrics;
mod broadcast;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use broadcast::broadcast_handler;

use axum::{Router, routing::{get, post}};
use std::sync::Arc;
use crate::state::AppState;

// Admin routes: health, metrics and operator broadcast
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/broadcast", post(broadcast_handler))
        .with_state(state)
}
