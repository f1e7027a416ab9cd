use std::sync::Arc;

use huddle_db::Database;
use huddle_push::Dispatcher;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    /// Heartbeats newer than this many seconds count as "online".
    pub online_window_secs: i64,
}
