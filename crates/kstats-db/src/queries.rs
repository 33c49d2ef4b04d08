use anyhow::Result;
use rusqlite::params;

use kstats_types::models::{Channel, ConsentEntry, Digest, MessageRecord, ReferenceRecord};
use kstats_types::store::{Store, StoreError};

use crate::Database;

impl Database {
    /// Enroll a channel with its salt, returning the assigned id. Used
    /// by seeding and tests; the bot itself only reads channels.
    pub fn insert_channel(&self, name: &str, salt: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channels (name, salt) VALUES (?1, ?2)",
                params![name, salt],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn query_channels(&self) -> Result<Vec<Channel>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, salt FROM channels")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Channel {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        salt: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn exec_insert_consent(&self, entry: &ConsentEntry) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO consent (digest, nick) VALUES (?1, ?2)",
                params![entry.digest.as_str(), entry.nick],
            )?;
            Ok(())
        })
    }

    fn exec_delete_consent(&self, digest: &Digest) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM consent WHERE digest = ?1", params![digest.as_str()])?;
            Ok(())
        })
    }

    fn exec_insert_message(&self, record: &MessageRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (time, channel, sender, words, characters,
                     question, exclamation, caps, aggression, emoji_happy, emoji_sad)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.time.to_rfc3339(),
                    record.channel,
                    record.sender.as_str(),
                    record.features.words as i64,
                    record.features.characters as i64,
                    record.features.question,
                    record.features.exclamation,
                    record.features.caps,
                    record.features.aggression,
                    record.features.emoji_happy,
                    record.features.emoji_sad,
                ],
            )?;
            Ok(())
        })
    }

    fn exec_insert_reference(&self, record: &ReferenceRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO mentions (time, channel, source, target) VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.time.to_rfc3339(),
                    record.channel,
                    record.source.as_str(),
                    record.target.as_str(),
                ],
            )?;
            Ok(())
        })
    }
}

impl Store for Database {
    fn list_channels(&self) -> Result<Vec<Channel>, StoreError> {
        self.query_channels().map_err(Into::into)
    }

    fn insert_consent(&self, entry: &ConsentEntry) -> Result<(), StoreError> {
        self.exec_insert_consent(entry).map_err(Into::into)
    }

    fn delete_consent(&self, digest: &Digest) -> Result<(), StoreError> {
        self.exec_delete_consent(digest).map_err(Into::into)
    }

    fn insert_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        self.exec_insert_message(record).map_err(Into::into)
    }

    fn insert_reference(&self, record: &ReferenceRecord) -> Result<(), StoreError> {
        self.exec_insert_reference(record).map_err(Into::into)
    }
}
