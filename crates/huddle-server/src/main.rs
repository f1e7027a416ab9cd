mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use huddle_api::middleware::require_auth;
use huddle_api::state::AppState;
use huddle_api::{
    admin, auth, dms, messages, pins, presence, push, reactions, read_state, typing, uploads,
};
use huddle_push::Dispatcher;

use config::Config;

// Base64 inflates the file by a third; leave room on top of the raw cap.
const BODY_LIMIT: usize = uploads::MAX_UPLOAD_BYTES + 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(huddle_db::Database::open(&PathBuf::from(&config.db_path))?);
    let dispatcher = Dispatcher::new(config.vapid.clone());

    let state = AppState {
        db,
        jwt_secret: config.jwt_secret.clone(),
        dispatcher,
        online_window_secs: config.online_window_secs,
    };

    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/auth/bootstrap", post(auth::bootstrap))
        // Channel messages
        .route(
            "/channels/{channel_id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route(
            "/messages/{message_id}",
            axum::routing::patch(messages::edit_message).delete(messages::delete_message),
        )
        .route("/messages/{message_id}/reactions", post(reactions::toggle_reaction))
        .route(
            "/messages/{message_id}/pin",
            post(pins::pin_message).delete(pins::unpin_message),
        )
        .route("/channels/{channel_id}/pins", get(pins::list_pinned))
        .route("/channels", get(messages::list_my_channels))
        // Direct messages
        .route(
            "/dms/{peer_id}/messages",
            get(dms::list_dms).post(dms::send_dm),
        )
        .route(
            "/dms/messages/{message_id}",
            axum::routing::patch(dms::edit_dm).delete(dms::delete_dm),
        )
        .route(
            "/dms/messages/{message_id}/reactions",
            post(reactions::toggle_dm_reaction),
        )
        // Typing indicators
        .route(
            "/channels/{channel_id}/typing",
            post(typing::set_typing).get(typing::get_typing),
        )
        // Read state
        .route("/channels/{channel_id}/read", post(read_state::mark_read))
        .route("/unread", get(read_state::unread_counts))
        // Presence
        .route("/users/heartbeat", post(presence::heartbeat))
        .route("/users/online", get(presence::online_users))
        .route("/users/status", put(presence::update_status))
        .route("/users", get(presence::list_users))
        // Uploads
        .route(
            "/uploads",
            post(uploads::upload).layer(DefaultBodyLimit::max(BODY_LIMIT)),
        )
        // Push
        .route(
            "/push/subscriptions",
            post(push::subscribe).delete(push::unsubscribe),
        )
        .route("/push/send", post(push::send))
        // Admin
        .route(
            "/admin/channels",
            get(admin::list_channels).post(admin::create_channel),
        )
        .route("/admin/channels/{channel_id}", delete(admin::delete_channel))
        .route(
            "/admin/channels/{channel_id}/members",
            post(admin::add_member),
        )
        .route(
            "/admin/channels/{channel_id}/members/{user_id}",
            delete(admin::remove_member),
        )
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}", axum::routing::patch(admin::update_user))
        .route("/admin/setup", post(admin::setup))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Huddle server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
