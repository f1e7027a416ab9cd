//! HTTP API for Huddle.
//!
//! Each surface lives in its own module as a pair of layers: synchronous
//! operation functions (`*_op`) that take the store plus the caller's
//! identity and enforce authorization, and thin axum handlers that decode
//! the request, run the operation through `spawn_blocking`, and serialize
//! the response. The operation layer is what the integration tests drive.

pub mod admin;
pub mod auth;
pub mod dms;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod pins;
pub mod presence;
pub mod push;
pub mod reactions;
pub mod read_state;
pub mod state;
pub mod typing;
pub mod uploads;
pub mod view;

use error::ApiError;

/// Run a blocking store operation off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!("spawn_blocking join error: {e}");
        ApiError::Internal("task join error".into())
    })?
}
