use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            email         TEXT NOT NULL UNIQUE,
            password      TEXT NOT NULL,
            full_name     TEXT,
            is_admin      INTEGER NOT NULL DEFAULT 0,
            is_active     INTEGER NOT NULL DEFAULT 1,
            status        TEXT,
            last_seen_at  TEXT,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS channels (
            id           TEXT PRIMARY KEY,
            name         TEXT NOT NULL UNIQUE,
            description  TEXT,
            is_private   INTEGER NOT NULL DEFAULT 0,
            created_by   TEXT REFERENCES users(id) ON DELETE SET NULL,
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS channel_members (
            id          TEXT PRIMARY KEY,
            channel_id  TEXT NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            joined_at   TEXT NOT NULL,
            UNIQUE(channel_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_members_user
            ON channel_members(user_id);

        -- seq is the poll cursor: strictly monotonic per insert, so
        -- 'give me everything after seq N' has an exact boundary.
        CREATE TABLE IF NOT EXISTS messages (
            seq          INTEGER PRIMARY KEY AUTOINCREMENT,
            id           TEXT NOT NULL UNIQUE,
            channel_id   TEXT NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            sender_id    TEXT NOT NULL REFERENCES users(id),
            content      TEXT NOT NULL,
            reply_to_id  TEXT REFERENCES messages(id) ON DELETE SET NULL,
            is_edited    INTEGER NOT NULL DEFAULT 0,
            is_pinned    INTEGER NOT NULL DEFAULT 0,
            pinned_at    TEXT,
            pinned_by    TEXT REFERENCES users(id),
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel_id, seq);

        CREATE TABLE IF NOT EXISTS direct_messages (
            seq           INTEGER PRIMARY KEY AUTOINCREMENT,
            id            TEXT NOT NULL UNIQUE,
            sender_id     TEXT NOT NULL REFERENCES users(id),
            recipient_id  TEXT NOT NULL REFERENCES users(id),
            content       TEXT NOT NULL,
            reply_to_id   TEXT REFERENCES direct_messages(id) ON DELETE SET NULL,
            is_edited     INTEGER NOT NULL DEFAULT 0,
            is_read       INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_dms_sender
            ON direct_messages(sender_id, recipient_id, seq);
        CREATE INDEX IF NOT EXISTS idx_dms_recipient
            ON direct_messages(recipient_id, sender_id, seq);

        CREATE TABLE IF NOT EXISTS reactions (
            id          TEXT PRIMARY KEY,
            message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            emoji       TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(message_id, user_id, emoji)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON reactions(message_id);

        CREATE TABLE IF NOT EXISTS dm_reactions (
            id          TEXT PRIMARY KEY,
            message_id  TEXT NOT NULL REFERENCES direct_messages(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            emoji       TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(message_id, user_id, emoji)
        );

        CREATE INDEX IF NOT EXISTS idx_dm_reactions_message
            ON dm_reactions(message_id);

        CREATE TABLE IF NOT EXISTS attachments (
            id          TEXT PRIMARY KEY,
            message_id  TEXT REFERENCES messages(id) ON DELETE CASCADE,
            dm_id       TEXT REFERENCES direct_messages(id) ON DELETE CASCADE,
            filename    TEXT NOT NULL,
            data_url    TEXT NOT NULL,
            mime_type   TEXT NOT NULL,
            size        INTEGER NOT NULL,
            created_at  TEXT NOT NULL,
            CHECK ((message_id IS NULL) != (dm_id IS NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_attachments_message
            ON attachments(message_id);
        CREATE INDEX IF NOT EXISTS idx_attachments_dm
            ON attachments(dm_id);

        CREATE TABLE IF NOT EXISTS typing_indicators (
            id          TEXT PRIMARY KEY,
            channel_id  TEXT NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            updated_at  TEXT NOT NULL,
            UNIQUE(channel_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS read_receipts (
            id               TEXT PRIMARY KEY,
            channel_id       TEXT NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
            user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            last_read_at     TEXT NOT NULL,
            last_message_id  TEXT,
            UNIQUE(channel_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS push_subscriptions (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            endpoint    TEXT NOT NULL,
            p256dh      TEXT NOT NULL,
            auth        TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(user_id, endpoint)
        );
        ",
    )?;

    info!("database migrations complete");
    Ok(())
}
