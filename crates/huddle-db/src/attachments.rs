use rusqlite::Connection;
use uuid::Uuid;

use crate::models::AttachmentRow;
use crate::{Database, Result, parse_uuid};

impl Database {
    pub fn attachments_for_messages(&self, ids: &[Uuid]) -> Result<Vec<AttachmentRow>> {
        self.with_conn(|conn| batch_attachments(conn, "message_id", ids))
    }

    pub fn attachments_for_dms(&self, ids: &[Uuid]) -> Result<Vec<AttachmentRow>> {
        self.with_conn(|conn| batch_attachments(conn, "dm_id", ids))
    }
}

fn batch_attachments(conn: &Connection, owner_col: &str, ids: &[Uuid]) -> Result<Vec<AttachmentRow>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT id, {owner_col}, filename, data_url, mime_type, size
         FROM attachments WHERE {owner_col} IN ({})",
        placeholders.join(", ")
    );

    let id_strings: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = id_strings
        .iter()
        .map(|id| id as &dyn rusqlite::types::ToSql)
        .collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let id: String = row.get(0)?;
            let owner: String = row.get(1)?;
            Ok(AttachmentRow {
                id: parse_uuid(&id, 0)?,
                owner_id: parse_uuid(&owner, 1)?,
                filename: row.get(2)?,
                data_url: row.get(3)?,
                mime_type: row.get(4)?,
                size: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}
