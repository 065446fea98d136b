pub mod backend;
pub mod broadcast;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod registry;
pub mod session;
pub mod state;
pub mod sweeper;
pub mod telegram;

#[cfg(test)]
mod testing;
