use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use huddle_db::{Database, format_ts};
use huddle_types::api::{Claims, OnlineResponse, UpdateStatusRequest, UserProfile};

use crate::error::ApiError;
use crate::state::AppState;
use crate::view;
use crate::blocking;

const STATUS_MAX_LEN: usize = 100;

pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    blocking(move || heartbeat_op(&db, claims.sub)).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn heartbeat_op(db: &Database, caller: Uuid) -> Result<(), ApiError> {
    db.touch_last_seen(caller)?;
    Ok(())
}

pub async fn online_users(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let window = state.online_window_secs;
    let ids = blocking(move || online_users_op(&db, window)).await?;
    Ok(Json(OnlineResponse { user_ids: ids }))
}

/// Users whose last heartbeat falls inside the configured window.
pub fn online_users_op(db: &Database, window_secs: i64) -> Result<Vec<Uuid>, ApiError> {
    let cutoff = format_ts(Utc::now() - Duration::seconds(window_secs));
    Ok(db.online_user_ids(&cutoff)?)
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user = blocking(move || update_status_op(&db, claims.sub, req)).await?;
    Ok(Json(user))
}

pub fn update_status_op(
    db: &Database,
    caller: Uuid,
    req: UpdateStatusRequest,
) -> Result<UserProfile, ApiError> {
    let status = match req.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) if s.chars().count() > STATUS_MAX_LEN => {
            return Err(ApiError::BadRequest("status is too long".into()));
        }
        Some(s) => Some(s),
    };
    db.set_status(caller, status)?;
    let user = db
        .get_user(caller)?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(view::profile(user))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let users = blocking(move || list_users_op(&db)).await?;
    Ok(Json(users))
}

/// Active-user directory, shown in the sidebar and DM picker.
pub fn list_users_op(db: &Database) -> Result<Vec<UserProfile>, ApiError> {
    let users = db.list_users(true)?;
    Ok(users.into_iter().map(view::profile).collect())
}
