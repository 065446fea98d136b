use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Gauge, Histogram, TextEncoder, register_counter, register_gauge,
    register_histogram,
};


lazy_static! {
    pub static ref UPDATES_TOTAL: Counter =
        register_counter!("relay_updates_total", "Total inbound updates handled").unwrap();
    pub static ref COMMANDS_TOTAL: Counter =
        register_counter!("relay_commands_total", "Total bot commands handled").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("relay_rate_limited_total", "Messages refused by the rate policy").unwrap();
    pub static ref BACKEND_REQUESTS: Counter =
        register_counter!("relay_backend_requests_total", "Prompts forwarded to the backend").unwrap();
    pub static ref BACKEND_TIMEOUTS: Counter =
        register_counter!("relay_backend_timeouts_total", "Backend calls that timed out").unwrap();
    pub static ref BACKEND_FAILURES: Counter =
        register_counter!("relay_backend_failures_total", "Backend calls that failed upstream").unwrap();
    pub static ref BACKEND_LATENCY: Histogram = register_histogram!(
        "relay_backend_latency_seconds",
        "Backend latency in seconds"
    )
    .unwrap();
    pub static ref ACTIVE_SESSIONS: Gauge =
        register_gauge!("relay_active_sessions", "Current number of conversation sessions").unwrap();
    pub static ref BROADCAST_MESSAGES: Counter =
        register_counter!("relay_broadcast_messages_total", "Broadcast messages delivered").unwrap();
}

// Render every registered metric in the prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
