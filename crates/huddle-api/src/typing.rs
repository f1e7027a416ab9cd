use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use huddle_db::{Database, format_ts};
use huddle_types::api::{Claims, TypingResponse, UserSummary};

use crate::error::ApiError;
use crate::messages::require_membership;
use crate::state::AppState;
use crate::blocking;

/// Indicators newer than this are "currently typing".
const TYPING_ACTIVE_SECS: i64 = 5;
/// Indicators older than this are garbage-collected on read.
const TYPING_EXPIRY_SECS: i64 = 10;

pub async fn set_typing(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    blocking(move || set_typing_op(&db, claims.sub, channel_id)).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn set_typing_op(db: &Database, caller: Uuid, channel_id: Uuid) -> Result<(), ApiError> {
    require_membership(db, channel_id, caller)?;
    db.upsert_typing(channel_id, caller)?;
    Ok(())
}

pub async fn get_typing(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let users = blocking(move || get_typing_op(&db, claims.sub, channel_id)).await?;
    Ok(Json(TypingResponse { users }))
}

pub fn get_typing_op(
    db: &Database,
    caller: Uuid,
    channel_id: Uuid,
) -> Result<Vec<UserSummary>, ApiError> {
    require_membership(db, channel_id, caller)?;

    let active_cutoff = format_ts(Utc::now() - Duration::seconds(TYPING_ACTIVE_SECS));
    let users = db.typing_users(channel_id, caller, &active_cutoff)?;

    // Opportunistic cleanup of expired indicators; failure is irrelevant.
    let expiry_cutoff = format_ts(Utc::now() - Duration::seconds(TYPING_EXPIRY_SECS));
    if let Err(e) = db.prune_typing(&expiry_cutoff) {
        debug!("typing prune failed (ignored): {e}");
    }

    Ok(users
        .into_iter()
        .map(|u| UserSummary {
            id: u.id,
            email: u.email,
            full_name: u.full_name,
        })
        .collect())
}
