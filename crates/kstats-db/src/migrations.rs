use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS channels (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            salt        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS consent (
            digest      TEXT PRIMARY KEY,
            nick        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            time        TEXT NOT NULL,
            channel     INTEGER NOT NULL REFERENCES channels(id),
            sender      TEXT NOT NULL,
            words       INTEGER NOT NULL,
            characters  INTEGER NOT NULL,
            question    INTEGER NOT NULL,
            exclamation INTEGER NOT NULL,
            caps        INTEGER NOT NULL,
            aggression  INTEGER NOT NULL,
            emoji_happy INTEGER NOT NULL,
            emoji_sad   INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel, time);

        CREATE TABLE IF NOT EXISTS mentions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            time        TEXT NOT NULL,
            channel     INTEGER NOT NULL REFERENCES channels(id),
            source      TEXT NOT NULL,
            target      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_mentions_channel
            ON mentions(channel, time);
        ",
    )?;

    info!("database migrations complete");
    Ok(())
}
