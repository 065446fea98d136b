use std::sync::Arc;
use crate::registry::SqliteRegistry;
use crate::session::SessionStore;
use crate::telegram::TelegramClient;
// admin server's shared state

pub struct AppState {
    pub registry: Arc<SqliteRegistry>,
    pub transport: Arc<TelegramClient>,
    pub sessions: Arc<SessionStore>, // same store the dispatcher mutates
}
