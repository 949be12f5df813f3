use crate::config::Config;
use anyhow::Context;
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::{Connection, OpenFlags, ToSql};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub mod filter;
pub mod queries;

const SCHEMA: &str = include_str!("schema.sql");

/// Identifier as found in an export: numeric IDs become integers, anything
/// else (e.g. a directory name used as a channel ID) stays text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Numeric strings are folded into `Int` so they are stored as integers.
    pub fn normalized(self) -> Self {
        match self {
            RecordId::Text(text) => match text.trim().parse::<i64>() {
                Ok(n) => RecordId::Int(n),
                Err(_) => RecordId::Text(text),
            },
            other => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RecordId::Text(text) if text.trim().is_empty())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(text) => f.write_str(text),
        }
    }
}

impl ToSql for RecordId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            RecordId::Int(n) => n.to_sql(),
            RecordId::Text(text) => text.to_sql(),
        }
    }
}

/// Stringifies a stored identifier. Large IDs are sent as text so consumers
/// with double-precision numbers do not lose digits.
pub fn id_text(value: Value) -> Option<String> {
    match value {
        Value::Integer(n) => Some(n.to_string()),
        Value::Text(text) => Some(text),
        Value::Real(n) => Some(n.to_string()),
        Value::Null | Value::Blob(_) => None,
    }
}

pub struct ChannelRow<'a> {
    pub id: &'a RecordId,
    pub name: Option<&'a str>,
    pub kind: Option<&'a str>,
    pub guild_id: Option<&'a RecordId>,
}

pub struct MessageRow<'a> {
    pub id: &'a RecordId,
    pub timestamp: &'a str,
    pub contents: &'a str,
    pub attachments: &'a str,
    pub channel_id: &'a RecordId,
}

/// Drops and recreates guilds, channels and messages.
pub fn reset_schema(conn: &Connection) -> anyhow::Result<()> {
    info!("Database: Resetting schema...");
    conn.execute_batch(SCHEMA)
        .context("Failed to recreate archive schema")?;
    debug!("Database: Schema recreated successfully");
    Ok(())
}

pub fn insert_guild(conn: &Connection, id: &RecordId, name: Option<&str>) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO guilds (id, name) VALUES (?1, ?2)",
        (id, name),
    )
}

pub fn insert_channel(conn: &Connection, channel: &ChannelRow<'_>) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO channels (id, name, type, guild_id) VALUES (?1, ?2, ?3, ?4)",
        (channel.id, channel.name, channel.kind, channel.guild_id),
    )
}

pub fn insert_message(conn: &Connection, message: &MessageRow<'_>) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO messages (id, timestamp, contents, attachments, channel_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            message.id,
            message.timestamp,
            message.contents,
            message.attachments,
            message.channel_id,
        ),
    )
}

/// Handle to the archive database. Each call opens its own connection;
/// nothing is pooled or shared between requests.
#[derive(Clone)]
pub struct Database {
    path: Arc<PathBuf>,
}

impl Database {
    pub fn new(config: &Config) -> Self {
        Self::from_path(&config.database_url)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: Arc::new(path.as_ref().to_path_buf()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-write connection, creating the file if needed. Used by the importer.
    pub fn connect(&self) -> anyhow::Result<Connection> {
        let conn = Connection::open(self.path.as_path())
            .with_context(|| format!("Failed to open database at {:?}", self.path))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Read-only connection for the query service.
    pub fn connect_read_only(&self) -> anyhow::Result<Connection> {
        let conn = Connection::open_with_flags(
            self.path.as_path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open database at {:?}", self.path))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Runs `f` on a fresh read-only connection inside the blocking pool.
    pub async fn run_blocking<F, T>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Connection) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.connect_read_only()?;
            f(&conn)
        })
        .await?
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        reset_schema(&conn).unwrap();
        conn
    }

    pub fn add_guild(conn: &Connection, id: i64, name: &str) {
        insert_guild(conn, &RecordId::Int(id), Some(name)).unwrap();
    }

    pub fn add_channel(conn: &Connection, id: i64, name: &str, guild_id: Option<i64>) {
        let id = RecordId::Int(id);
        let guild_id = guild_id.map(RecordId::Int);
        insert_channel(
            conn,
            &ChannelRow {
                id: &id,
                name: Some(name),
                kind: Some("GUILD_TEXT"),
                guild_id: guild_id.as_ref(),
            },
        )
        .unwrap();
    }

    pub fn add_message(conn: &Connection, id: i64, timestamp: &str, contents: &str, attachments: &str, channel_id: i64) {
        insert_message(
            conn,
            &MessageRow {
                id: &RecordId::Int(id),
                timestamp,
                contents,
                attachments,
                channel_id: &RecordId::Int(channel_id),
            },
        )
        .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_schema_reset_clears_rows() {
        let conn = memory_db();
        add_guild(&conn, 1, "g");
        add_channel(&conn, 10, "general", Some(1));
        add_message(&conn, 100, "2024-01-01 00:00:00", "hi", "", 10);

        reset_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_guild_insert_is_idempotent() {
        let conn = memory_db();
        add_guild(&conn, 1, "first");
        add_guild(&conn, 1, "second");

        let (count, name): (i64, String) = conn
            .query_row("SELECT COUNT(*), MAX(name) FROM guilds", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(count, 1);
        // Never updated after creation
        assert_eq!(name, "first");
    }

    #[test]
    fn test_message_requires_existing_channel() {
        let conn = memory_db();
        let result = insert_message(
            &conn,
            &MessageRow {
                id: &RecordId::Int(1),
                timestamp: "2024-01-01",
                contents: "orphan",
                attachments: "",
                channel_id: &RecordId::Int(404),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_message_id_is_rejected() {
        let conn = memory_db();
        add_channel(&conn, 10, "general", None);
        add_message(&conn, 1, "2024-01-01", "a", "", 10);
        let dup = insert_message(
            &conn,
            &MessageRow {
                id: &RecordId::Int(1),
                timestamp: "2024-01-02",
                contents: "b",
                attachments: "",
                channel_id: &RecordId::Int(10),
            },
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_text_channel_id_is_storable() {
        let conn = memory_db();
        let id = RecordId::Text("general-chat".to_string());
        insert_channel(
            &conn,
            &ChannelRow {
                id: &id,
                name: None,
                kind: None,
                guild_id: None,
            },
        )
        .unwrap();
        insert_message(
            &conn,
            &MessageRow {
                id: &RecordId::Int(5),
                timestamp: "2024-01-01",
                contents: "hello",
                attachments: "",
                channel_id: &id,
            },
        )
        .unwrap();

        let stored: Value = conn
            .query_row("SELECT channel_id FROM messages WHERE id = 5", [], |row| row.get(0))
            .unwrap();
        assert_eq!(id_text(stored), Some("general-chat".to_string()));
    }

    #[test]
    fn test_record_id_normalization() {
        let parsed: RecordId = serde_json::from_str("\"999471033436356628\"").unwrap();
        assert_eq!(parsed.normalized(), RecordId::Int(999471033436356628));

        let parsed: RecordId = serde_json::from_str("42").unwrap();
        assert_eq!(parsed.normalized(), RecordId::Int(42));

        let parsed: RecordId = serde_json::from_str("\"dm-archive\"").unwrap();
        assert_eq!(parsed.normalized(), RecordId::Text("dm-archive".to_string()));
        assert!(RecordId::Text("  ".to_string()).is_empty());
    }

    #[tokio::test]
    async fn test_run_blocking_uses_fresh_read_only_connection() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::from_path(dir.path().join("archive.db"));
        {
            let conn = db.connect().unwrap();
            reset_schema(&conn).unwrap();
            add_channel(&conn, 10, "general", None);
            add_message(&conn, 1, "2024-01-01", "hello", "", 10);
        }

        let count = db
            .run_blocking(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get::<_, i64>(0))?)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);

        let write = db
            .run_blocking(|conn| Ok(conn.execute("DELETE FROM messages", [])?))
            .await;
        assert!(write.is_err());
    }
}
