use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            username        TEXT NOT NULL UNIQUE,
            password        TEXT NOT NULL,
            role            TEXT NOT NULL DEFAULT 'user',
            is_active       INTEGER NOT NULL DEFAULT 1,
            is_superuser    INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS personal (
            user_id         INTEGER PRIMARY KEY REFERENCES users(id),
            phone           TEXT NOT NULL,
            email           TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            modified_at     TEXT
        );

        -- Exactly one of text/photo must be populated on every row.
        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            sender          INTEGER NOT NULL REFERENCES users(id),
            receiver        INTEGER NOT NULL REFERENCES users(id),
            text            TEXT,
            photo           TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT,
            CHECK ((text IS NULL) <> (photo IS NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_pair
            ON messages(sender, receiver, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
