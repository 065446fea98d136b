use std::sync::Arc;
use tokio::time::{Duration, Instant, interval};
use tracing::{debug, info};

use crate::rate_limit::WINDOW;
use crate::session::SessionStore;

// Idle sessions younger than one window could still be inside an open window
pub fn effective_ttl(idle_ttl: Duration) -> Duration {
    idle_ttl.max(WINDOW)
}

// Session sweeper - runs every `sweep_interval`, evicting idle sessions
pub async fn session_sweeper(
    sessions: Arc<SessionStore>,
    idle_ttl: Duration,
    sweep_interval: Duration,
) {
    let idle_ttl = effective_ttl(idle_ttl);
    let mut interval = interval(sweep_interval);

    info!(?idle_ttl, ?sweep_interval, "session sweeper started");

    loop {
        interval.tick().await;

        let evicted = sessions.evict_idle(idle_ttl, Instant::now());
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "evicted idle sessions");
        }
    }
}
