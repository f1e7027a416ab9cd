use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::warn;
use uuid::Uuid;

use huddle_db::Database;
use huddle_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest, UserProfile};

use crate::error::ApiError;
use crate::state::AppState;
use crate::{blocking, view};

const MIN_PASSWORD_LEN: usize = 8;
const TOKEN_LIFETIME_DAYS: i64 = 30;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Hash before entering the blocking section; argon2 is CPU work either way.
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest("password too short".into()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("password hash failure: {e}")))?
        .to_string();

    let db = state.db.clone();
    let user = blocking(move || {
        register_op(&db, &req.email, &password_hash, req.full_name.as_deref())
    })
    .await?;

    let token = create_token(&state.jwt_secret, user.id, &user.email)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub fn register_op(
    db: &Database,
    email: &str,
    password_hash: &str,
    full_name: Option<&str>,
) -> Result<UserProfile, ApiError> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::BadRequest("invalid email address".into()));
    }

    if db.get_user_by_email(&email)?.is_some() {
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let user = db.create_user(Uuid::new_v4(), &email, password_hash, full_name)?;

    // New users land in the default channel when it exists; best-effort.
    if let Some(general) = db.get_channel_by_name(crate::admin::DEFAULT_CHANNEL)? {
        if let Err(e) = db.add_member(general.id, user.id) {
            warn!("could not add new user to General: {e}");
        }
    }

    Ok(view::profile(user))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user = blocking(move || login_op(&db, &req.email, &req.password)).await?;

    let token = create_token(&state.jwt_secret, user.id, &user.email)?;
    Ok(Json(AuthResponse { user, token }))
}

pub fn login_op(db: &Database, email: &str, password: &str) -> Result<UserProfile, ApiError> {
    let email = email.trim().to_lowercase();
    let user = db
        .get_user_by_email(&email)?
        .ok_or_else(|| ApiError::Unauthorized("invalid credentials".into()))?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(format!("corrupt password hash: {e}")))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized("invalid credentials".into()))?;

    if !user.is_active {
        return Err(ApiError::Forbidden("account is deactivated".into()));
    }

    Ok(view::profile(user))
}

/// One-time bootstrap: while no admin exists anywhere, the caller may
/// promote themselves. Afterwards admin status only moves via the admin
/// PATCH endpoint.
pub async fn bootstrap(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user = blocking(move || bootstrap_op(&db, claims.sub)).await?;
    Ok(Json(user))
}

pub fn bootstrap_op(db: &Database, user_id: Uuid) -> Result<UserProfile, ApiError> {
    if db.admin_count()? > 0 {
        return Err(ApiError::Conflict("an admin already exists".into()));
    }
    let user = db.set_admin(user_id, true)?;
    Ok(view::profile(user))
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp()
            as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failure: {e}")))
}
