use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use huddle_db::Database;
use huddle_types::api::{Claims, UnreadCountsResponse};

use crate::error::ApiError;
use crate::messages::require_membership;
use crate::state::AppState;
use crate::blocking;

pub async fn mark_read(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    blocking(move || mark_read_op(&db, claims.sub, channel_id)).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Records the caller as read up to the channel's latest message.
pub fn mark_read_op(db: &Database, caller: Uuid, channel_id: Uuid) -> Result<(), ApiError> {
    require_membership(db, channel_id, caller)?;
    let latest = db.latest_message_id(channel_id)?;
    db.upsert_receipt(channel_id, caller, latest)?;
    Ok(())
}

pub async fn unread_counts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let counts = blocking(move || unread_counts_op(&db, claims.sub)).await?;
    Ok(Json(counts))
}

pub fn unread_counts_op(db: &Database, caller: Uuid) -> Result<UnreadCountsResponse, ApiError> {
    let counts: HashMap<Uuid, i64> = db.unread_counts(caller)?.into_iter().collect();
    Ok(UnreadCountsResponse {
        unread_counts: counts,
    })
}
