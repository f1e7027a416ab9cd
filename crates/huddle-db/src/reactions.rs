use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::models::ReactionRow;
use crate::users::OptionalExt;
use crate::{Database, Result, now_ts, parse_uuid};

impl Database {
    /// Toggle a (message, user, emoji) reaction: removes it when present,
    /// inserts it when absent. Returns true when the reaction was added.
    ///
    /// The operation is an involution, not idempotent: applying it twice
    /// restores the prior state, so retries flip state rather than no-op.
    pub fn toggle_reaction(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool> {
        self.with_conn(|conn| toggle(conn, "reactions", message_id, user_id, emoji))
    }

    pub fn toggle_dm_reaction(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool> {
        self.with_conn(|conn| toggle(conn, "dm_reactions", message_id, user_id, emoji))
    }

    pub fn reactions_for_message(&self, message_id: Uuid) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| batch_reactions(conn, "reactions", &[message_id]))
    }

    pub fn reactions_for_dm(&self, message_id: Uuid) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| batch_reactions(conn, "dm_reactions", &[message_id]))
    }

    /// Batch-fetch reactions for a page of messages in one IN query.
    pub fn reactions_for_messages(&self, ids: &[Uuid]) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| batch_reactions(conn, "reactions", ids))
    }

    pub fn reactions_for_dms(&self, ids: &[Uuid]) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| batch_reactions(conn, "dm_reactions", ids))
    }
}

fn toggle(
    conn: &Connection,
    table: &str,
    message_id: Uuid,
    user_id: Uuid,
    emoji: &str,
) -> Result<bool> {
    let existing: Option<String> = conn
        .query_row(
            &format!("SELECT id FROM {table} WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3"),
            params![message_id.to_string(), user_id.to_string(), emoji],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])?;
        Ok(false)
    } else {
        conn.execute(
            &format!(
                "INSERT INTO {table} (id, message_id, user_id, emoji, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            params![
                Uuid::new_v4().to_string(),
                message_id.to_string(),
                user_id.to_string(),
                emoji,
                now_ts()
            ],
        )?;
        Ok(true)
    }
}

fn batch_reactions(conn: &Connection, table: &str, ids: &[Uuid]) -> Result<Vec<ReactionRow>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT message_id, user_id, emoji FROM {table} WHERE message_id IN ({})
         ORDER BY created_at ASC",
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
            let message_id: String = row.get(0)?;
            let user_id: String = row.get(1)?;
            Ok(ReactionRow {
                message_id: parse_uuid(&message_id, 0)?,
                user_id: parse_uuid(&user_id, 1)?,
                emoji: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_is_an_involution() {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        db.create_user(user, "a@example.com", "h", None).unwrap();
        let channel = db
            .create_channel(Uuid::new_v4(), "general", None, None)
            .unwrap();
        let msg = db
            .insert_message(Uuid::new_v4(), channel.id, user, "hi", None)
            .unwrap();

        assert!(db.toggle_reaction(msg.id, user, "👍").unwrap());
        assert_eq!(db.reactions_for_message(msg.id).unwrap().len(), 1);

        assert!(!db.toggle_reaction(msg.id, user, "👍").unwrap());
        assert!(db.reactions_for_message(msg.id).unwrap().is_empty());
    }

    #[test]
    fn distinct_emoji_are_independent() {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        db.create_user(user, "a@example.com", "h", None).unwrap();
        let channel = db
            .create_channel(Uuid::new_v4(), "general", None, None)
            .unwrap();
        let msg = db
            .insert_message(Uuid::new_v4(), channel.id, user, "hi", None)
            .unwrap();

        db.toggle_reaction(msg.id, user, "👍").unwrap();
        db.toggle_reaction(msg.id, user, "🎉").unwrap();
        assert_eq!(db.reactions_for_message(msg.id).unwrap().len(), 2);

        db.toggle_reaction(msg.id, user, "👍").unwrap();
        let remaining = db.reactions_for_message(msg.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].emoji, "🎉");
    }
}
