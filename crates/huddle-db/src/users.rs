use rusqlite::{Row, params};
use uuid::Uuid;

use crate::models::UserRow;
use crate::{Database, Result, StoreError, now_ts, parse_ts, parse_uuid};

const USER_COLS: &str =
    "id, email, password, full_name, is_admin, is_active, status, last_seen_at, created_at, updated_at";

impl Database {
    pub fn create_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        full_name: Option<&str>,
    ) -> Result<UserRow> {
        let now = now_ts();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, full_name, is_admin, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, 1, ?5, ?5)",
                params![id.to_string(), email, password_hash, full_name, now],
            )?;
            query_user(conn, "id", &id.to_string())?.ok_or(StoreError::NotFound)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    pub fn list_users(&self, active_only: bool) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = if active_only {
                format!("SELECT {USER_COLS} FROM users WHERE is_active = 1 ORDER BY created_at DESC")
            } else {
                format!("SELECT {USER_COLS} FROM users ORDER BY created_at DESC")
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], row_to_user)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn is_admin(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let flag: Option<bool> = conn
                .query_row(
                    "SELECT is_admin FROM users WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(flag.unwrap_or(false))
        })
    }

    pub fn admin_count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row("SELECT COUNT(*) FROM users WHERE is_admin = 1", [], |row| {
                row.get(0)
            })?;
            Ok(n)
        })
    }

    pub fn set_admin(&self, id: Uuid, is_admin: bool) -> Result<UserRow> {
        self.update_user_flags(id, None, Some(is_admin))
    }

    /// Apply the admin PATCH: either flag may be absent, meaning unchanged.
    pub fn update_user_flags(
        &self,
        id: Uuid,
        is_active: Option<bool>,
        is_admin: Option<bool>,
    ) -> Result<UserRow> {
        let now = now_ts();
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE users SET
                    is_active = COALESCE(?2, is_active),
                    is_admin = COALESCE(?3, is_admin),
                    updated_at = ?4
                 WHERE id = ?1",
                params![id.to_string(), is_active, is_admin, now],
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }
            query_user(conn, "id", &id.to_string())?.ok_or(StoreError::NotFound)
        })
    }

    pub fn touch_last_seen(&self, id: Uuid) -> Result<()> {
        let now = now_ts();
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE users SET last_seen_at = ?2, updated_at = ?2 WHERE id = ?1",
                params![id.to_string(), now],
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    pub fn set_status(&self, id: Uuid, status: Option<&str>) -> Result<()> {
        let now = now_ts();
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE users SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), status, now],
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    /// Active users whose heartbeat is newer than `cutoff`.
    pub fn online_user_ids(&self, cutoff: &str) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM users WHERE is_active = 1 AND last_seen_at > ?1",
            )?;
            let rows = stmt
                .query_map([cutoff], |row| {
                    let id: String = row.get(0)?;
                    parse_uuid(&id, 0)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn active_user_ids(&self) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM users WHERE is_active = 1")?;
            let rows = stmt
                .query_map([], |row| {
                    let id: String = row.get(0)?;
                    parse_uuid(&id, 0)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &rusqlite::Connection, col: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLS} FROM users WHERE {col} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], row_to_user).optional()?;
    Ok(row)
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let id: String = row.get(0)?;
    let last_seen: Option<String> = row.get(7)?;
    let created: String = row.get(8)?;
    let updated: String = row.get(9)?;

    Ok(UserRow {
        id: parse_uuid(&id, 0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        full_name: row.get(3)?,
        is_admin: row.get(4)?,
        is_active: row.get(5)?,
        status: row.get(6)?,
        last_seen_at: last_seen.as_deref().map(|s| parse_ts(s, 7)).transpose()?,
        created_at: parse_ts(&created, 8)?,
        updated_at: parse_ts(&updated, 9)?,
    })
}

/// Extension trait for optional query results.
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_fetch_user() {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        let user = db
            .create_user(id, "ana@example.com", "hash", Some("Ana"))
            .unwrap();
        assert_eq!(user.email, "ana@example.com");
        assert!(!user.is_admin);
        assert!(user.is_active);

        let by_email = db.get_user_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, id);
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(Uuid::new_v4(), "dup@example.com", "h", None)
            .unwrap();
        let err = db.create_user(Uuid::new_v4(), "dup@example.com", "h", None);
        assert!(err.is_err());
    }

    #[test]
    fn flag_updates_are_partial() {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        db.create_user(id, "bo@example.com", "h", None).unwrap();

        let user = db.update_user_flags(id, None, Some(true)).unwrap();
        assert!(user.is_admin);
        assert!(user.is_active);

        let user = db.update_user_flags(id, Some(false), None).unwrap();
        assert!(user.is_admin);
        assert!(!user.is_active);
    }

    #[test]
    fn online_window_filters_by_heartbeat() {
        let db = Database::open_in_memory().unwrap();
        let awake = Uuid::new_v4();
        let asleep = Uuid::new_v4();
        db.create_user(awake, "awake@example.com", "h", None).unwrap();
        db.create_user(asleep, "asleep@example.com", "h", None).unwrap();

        let cutoff = now_ts();
        db.touch_last_seen(awake).unwrap();

        let online = db.online_user_ids(&cutoff).unwrap();
        assert_eq!(online, vec![awake]);
    }
}
