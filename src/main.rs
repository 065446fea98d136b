use anyhow::Context;
use clap::Parser; // for cli
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use gpt_relay_bot::backend::{CompletionSettings, OpenAiClient};
use gpt_relay_bot::config::Args;
use gpt_relay_bot::dispatcher::Dispatcher;
use gpt_relay_bot::handlers;
use gpt_relay_bot::logging;
use gpt_relay_bot::models::InboundMessage;
use gpt_relay_bot::registry::SqliteRegistry;
use gpt_relay_bot::session::SessionStore;
use gpt_relay_bot::state::AppState;
use gpt_relay_bot::sweeper::session_sweeper;
use gpt_relay_bot::telegram::{TelegramClient, poll_updates};

// Buffer between the telegram poller and the dispatcher
const UPDATE_BUFFER: usize = 100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // parse cli arguments
    let args = Args::parse();
    logging::init_tracing(args.log_json)
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    // a store we cannot reach at startup is the one fatal condition
    let registry = Arc::new(
        SqliteRegistry::connect(&args.database_url)
            .await
            .context("connecting to subscriber store")?,
    );

    let http = reqwest::Client::new();
    let telegram = Arc::new(TelegramClient::new(
        http.clone(),
        &args.telegram_api_url,
        &args.telegram_token,
    ));
    let bot_name = telegram
        .get_me()
        .await
        .context("connecting to telegram")?;
    info!(bot = %bot_name, "connected to telegram");

    let generator = Arc::new(OpenAiClient::new(
        http,
        &args.openai_url,
        args.openai_api_key.clone(),
        CompletionSettings {
            model: args.model.clone(),
            max_tokens: args.max_tokens,
            temperature: args.temperature,
        },
    ));

    let sessions = Arc::new(SessionStore::new());

    // spawn the session sweeper
    let sweeper = tokio::spawn(session_sweeper(
        Arc::clone(&sessions),
        args.session_idle_ttl(),
        args.sweep_interval(),
    ));

    // spawn the dispatcher, fed by the telegram poller
    let (update_tx, update_rx) = mpsc::channel::<InboundMessage>(UPDATE_BUFFER);
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        generator,
        Arc::clone(&telegram),
        Arc::clone(&sessions),
        args.backend_timeout(),
    ));
    let dispatcher_task = tokio::spawn(dispatcher.run(update_rx, args.max_in_flight));
    let poller = tokio::spawn(poll_updates(
        Arc::clone(&telegram),
        update_tx,
        args.poll_timeout(),
    ));

    // admin server
    let state = Arc::new(AppState {
        registry: Arc::clone(&registry),
        transport: Arc::clone(&telegram),
        sessions,
    });
    let addr = format!("{}:{}", args.admin_bind, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding admin server to {addr}"))?;

    info!(%addr, "admin server listening");
    info!(backend = %args.openai_url, model = %args.model, timeout = ?args.backend_timeout(), "forwarding questions");

    let server = axum::serve(listener, handlers::router(state))
        .with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        error!(error = %e, "admin server failed");
    }

    // stop polling; dropping the sender lets the dispatcher drain and exit
    poller.abort();
    let _ = poller.await;
    if let Err(e) = dispatcher_task.await {
        error!(error = %e, "dispatcher task panicked");
    }
    sweeper.abort();
    registry.close().await;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
