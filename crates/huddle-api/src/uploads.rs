//! Multipart file uploads. The file lands as a base64 data URL attached to
//! a freshly created channel message or direct message.

use axum::{
    Extension, Json,
    extract::{Multipart, State},
    response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use uuid::Uuid;

use huddle_db::Database;
use huddle_types::api::{Claims, DirectMessageResponse, MessageResponse};

use crate::error::ApiError;
use crate::messages::require_membership;
use crate::state::AppState;
use crate::view;
use crate::blocking;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_MIME: &str = "application/octet-stream";

/// Where an upload goes: a channel (member-gated) or a DM recipient.
pub enum UploadTarget {
    Channel(Uuid),
    Dm(Uuid),
}

/// Parsed multipart form.
pub struct Upload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub target: UploadTarget,
}

pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_multipart(multipart).await?;
    let db = state.db.clone();

    match upload.target {
        UploadTarget::Channel(channel_id) => {
            let msg =
                blocking(move || upload_to_channel_op(&db, claims.sub, channel_id, upload)).await?;
            Ok(Json(msg).into_response())
        }
        UploadTarget::Dm(recipient_id) => {
            let dm =
                blocking(move || upload_to_dm_op(&db, claims.sub, recipient_id, upload)).await?;
            Ok(Json(dm).into_response())
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut filename = None;
    let mut mime_type = None;
    let mut bytes = None;
    let mut kind: Option<String> = None;
    let mut target_id: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                filename = Some(field.file_name().unwrap_or("attachment").to_string());
                mime_type = Some(field.content_type().unwrap_or(DEFAULT_MIME).to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read file: {e}")))?;
                if data.len() > MAX_UPLOAD_BYTES {
                    return Err(ApiError::PayloadTooLarge(MAX_UPLOAD_BYTES));
                }
                bytes = Some(data.to_vec());
            }
            Some("type") => {
                kind = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("failed to read field: {e}")))?,
                );
            }
            Some("target_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read field: {e}")))?;
                target_id = Some(
                    text.parse()
                        .map_err(|_| ApiError::BadRequest("invalid target_id".into()))?,
                );
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| ApiError::BadRequest("missing file field".into()))?;
    let target_id =
        target_id.ok_or_else(|| ApiError::BadRequest("missing target_id field".into()))?;
    let target = match kind.as_deref() {
        Some("channel") => UploadTarget::Channel(target_id),
        Some("dm") => UploadTarget::Dm(target_id),
        _ => {
            return Err(ApiError::BadRequest(
                "type must be \"channel\" or \"dm\"".into(),
            ));
        }
    };

    Ok(Upload {
        filename: filename.unwrap_or_else(|| "attachment".into()),
        mime_type: mime_type.unwrap_or_else(|| DEFAULT_MIME.into()),
        bytes,
        target,
    })
}

fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}

pub fn upload_to_channel_op(
    db: &Database,
    caller: Uuid,
    channel_id: Uuid,
    upload: Upload,
) -> Result<MessageResponse, ApiError> {
    require_membership(db, channel_id, caller)?;

    let content = format!("[Uploaded: {}]", upload.filename);
    let url = data_url(&upload.mime_type, &upload.bytes);
    let row = db.insert_message_with_attachment(
        Uuid::new_v4(),
        channel_id,
        caller,
        &content,
        &upload.filename,
        &url,
        &upload.mime_type,
        upload.bytes.len() as i64,
    )?;
    view::message_view(db, row)
}

pub fn upload_to_dm_op(
    db: &Database,
    caller: Uuid,
    recipient_id: Uuid,
    upload: Upload,
) -> Result<DirectMessageResponse, ApiError> {
    db.get_user(recipient_id)?
        .ok_or_else(|| ApiError::NotFound("recipient not found".into()))?;

    let content = format!("[Uploaded: {}]", upload.filename);
    let url = data_url(&upload.mime_type, &upload.bytes);
    let row = db.insert_dm_with_attachment(
        Uuid::new_v4(),
        caller,
        recipient_id,
        &content,
        &upload.filename,
        &url,
        &upload.mime_type,
        upload.bytes.len() as i64,
    )?;
    view::dm_view(db, row)
}
