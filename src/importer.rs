use crate::db::{self, ChannelRow, Database, MessageRow, RecordId};
use crate::error::ImportError;
use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const MESSAGES_FILE: &str = "messages.json";
const CHANNEL_FILE: &str = "channel.json";

#[derive(Debug, Deserialize)]
struct ChannelMetadata {
    id: Option<RecordId>,
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<Value>,
    guild: Option<GuildMetadata>,
}

#[derive(Debug, Deserialize)]
struct GuildMetadata {
    id: Option<RecordId>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExportedMessage {
    #[serde(rename = "ID")]
    id: RecordId,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Contents")]
    contents: String,
    #[serde(rename = "Attachments", default)]
    attachments: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub directories_imported: usize,
    pub directories_skipped: usize,
    pub directories_failed: usize,
    pub messages_imported: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

struct ImportedDirectory {
    channel_id: RecordId,
    messages: usize,
}

/// Rebuilds the archive from a directory of per-channel export folders.
pub struct Importer {
    db: Database,
}

impl Importer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Drops existing tables and imports every channel directory under `root`.
    /// A bad directory is logged and skipped; only storage or `root` itself
    /// being unreadable aborts the run.
    pub fn run(&self, root: &Path) -> anyhow::Result<ImportReport> {
        let started_at = Utc::now();
        let mut conn = self.db.connect()?;
        db::reset_schema(&conn)?;

        let mut entries: Vec<PathBuf> = fs::read_dir(root)
            .with_context(|| format!("Failed to read export directory {:?}", root))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        let mut report = ImportReport {
            directories_imported: 0,
            directories_skipped: 0,
            directories_failed: 0,
            messages_imported: 0,
            started_at,
            finished_at: started_at,
        };

        for dir in entries {
            let name = dir_name(&dir);
            match import_directory(&mut conn, &dir) {
                Ok(Some(imported)) => {
                    info!(
                        "Processed {} messages from {} (Channel ID: {})",
                        imported.messages, name, imported.channel_id
                    );
                    report.directories_imported += 1;
                    report.messages_imported += imported.messages;
                }
                Ok(None) => {
                    info!("Skipping {} - not a directory or no {} found", name, MESSAGES_FILE);
                    report.directories_skipped += 1;
                }
                Err(e) => {
                    error!("Import: failed to process {}: {}", name, e);
                    report.directories_failed += 1;
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            "Import finished: {} directories imported, {} skipped, {} failed, {} messages",
            report.directories_imported,
            report.directories_skipped,
            report.directories_failed,
            report.messages_imported
        );
        Ok(report)
    }
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Imports one channel directory in a single transaction: either all of it
/// lands or none of it does. `Ok(None)` means the entry is not a channel export.
fn import_directory(conn: &mut Connection, dir: &Path) -> Result<Option<ImportedDirectory>, ImportError> {
    let messages_path = dir.join(MESSAGES_FILE);
    if !dir.is_dir() || !messages_path.is_file() {
        return Ok(None);
    }

    let name = dir_name(dir);
    let metadata = read_channel_metadata(dir);
    let channel_id = resolve_channel_id(metadata.as_ref().and_then(|m| m.id.clone()), &name);
    let guild = metadata
        .as_ref()
        .and_then(|m| m.guild.as_ref())
        .and_then(|g| {
            g.id.clone()
                .map(RecordId::normalized)
                .filter(|id| !id.is_empty())
                .map(|id| (id, g.name.clone()))
        });

    let records = read_messages(&messages_path)?;

    let tx = conn.transaction()?;
    if let Some((guild_id, guild_name)) = &guild {
        db::insert_guild(&tx, guild_id, guild_name.as_deref())?;
    }

    let kind = metadata.as_ref().and_then(|m| m.kind.clone()).and_then(scalar_text);
    db::insert_channel(
        &tx,
        &ChannelRow {
            id: &channel_id,
            name: metadata.as_ref().and_then(|m| m.name.as_deref()),
            kind: kind.as_deref(),
            guild_id: guild.as_ref().map(|(id, _)| id),
        },
    )?;

    let mut count = 0;
    for (index, record) in records.into_iter().enumerate() {
        let message: ExportedMessage = serde_json::from_value(record)
            .map_err(|source| ImportError::InvalidRecord { index, source })?;
        let attachments = message.attachments.and_then(scalar_text).unwrap_or_default();
        db::insert_message(
            &tx,
            &MessageRow {
                id: &message.id.normalized(),
                timestamp: &message.timestamp,
                contents: &message.contents,
                attachments: &attachments,
                channel_id: &channel_id,
            },
        )?;
        count += 1;
    }

    tx.commit()?;
    Ok(Some(ImportedDirectory {
        channel_id,
        messages: count,
    }))
}

/// A missing or unreadable `channel.json` is not fatal; the directory name
/// is used for identity instead.
fn read_channel_metadata(dir: &Path) -> Option<ChannelMetadata> {
    let path = dir.join(CHANNEL_FILE);
    if !path.is_file() {
        return None;
    }

    let parsed = fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()));

    match parsed {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            warn!("Error reading {} in {}: {}", CHANNEL_FILE, dir_name(dir), e);
            None
        }
    }
}

fn read_messages(path: &Path) -> Result<Vec<Value>, ImportError> {
    let text = fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ImportError::MalformedJson {
        path: path.to_path_buf(),
        source,
    })
}

/// `channel.json` id, else the digits of a `c<digits>` directory name, else
/// the directory name itself.
fn resolve_channel_id(from_metadata: Option<RecordId>, dir_name: &str) -> RecordId {
    if let Some(id) = from_metadata.map(RecordId::normalized).filter(|id| !id.is_empty()) {
        return id;
    }

    if let Some(digits) = dir_name.strip_prefix('c') {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = digits.parse() {
                return RecordId::Int(id);
            }
        }
    }

    RecordId::Text(dir_name.to_string()).normalized()
}

/// Strings pass through; null becomes `None`; anything else is kept as
/// compact JSON.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}
