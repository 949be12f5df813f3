//! Read-side queries for the archive: message listing, aggregates, stats.

use super::filter::{MessageQuery, WhereClause};
use super::id_text;
use crate::attachments::{self, Attachment, FileType};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Cap on rows scanned for the stats file-type histogram.
pub const STATS_SAMPLE_LIMIT: i64 = 1000;

pub const NO_GUILD: &str = "No Guild";
pub const UNKNOWN_GUILD: &str = "Unknown Guild";
pub const DEFAULT_CHANNEL_TYPE: &str = "GUILD_TEXT";

const MESSAGE_SELECT: &str = r#"
SELECT
    m.id,
    m.timestamp,
    m.contents,
    m.attachments,
    m.channel_id,
    c.name AS channel_name,
    c.type AS channel_type,
    g.name AS guild_name
FROM messages m
LEFT JOIN channels c ON m.channel_id = c.id
LEFT JOIN guilds g ON c.guild_id = g.id
"#;

const MESSAGE_COUNT: &str = r#"
SELECT COUNT(*)
FROM messages m
LEFT JOIN channels c ON m.channel_id = c.id
"#;

const CHANNELS_WITH_COUNTS: &str = r#"
SELECT
    c.id,
    c.name,
    c.type,
    g.id AS guild_id,
    g.name AS guild_name,
    COUNT(m.id) AS message_count
FROM channels c
LEFT JOIN messages m ON c.id = m.channel_id
LEFT JOIN guilds g ON c.guild_id = g.id
GROUP BY c.id, c.name, c.type, g.id, g.name
ORDER BY g.name, c.name
"#;

const GUILDS_WITH_COUNTS: &str = r#"
SELECT
    g.id,
    g.name,
    COUNT(DISTINCT c.id) AS channel_count,
    COUNT(m.id) AS message_count
FROM guilds g
LEFT JOIN channels c ON g.id = c.guild_id
LEFT JOIN messages m ON c.id = m.channel_id
GROUP BY g.id, g.name
ORDER BY message_count DESC
"#;

const ATTACHMENT_SAMPLE: &str =
    "SELECT attachments FROM messages WHERE attachments != '' LIMIT ?1";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRecord {
    pub id: String,
    pub timestamp: Option<String>,
    pub contents: Option<String>,
    pub attachments: Vec<Attachment>,
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub channel_type: Option<String>,
    pub guild_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessagePage {
    pub messages: Vec<MessageRecord>,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuildChannels {
    pub guild_name: String,
    pub guild_id: Option<String>,
    pub channels: Vec<ChannelSummary>,
}

pub type ChannelsByGuild = BTreeMap<String, GuildChannels>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuildSummary {
    pub id: String,
    pub name: String,
    pub channel_count: i64,
    pub message_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total_messages: i64,
    pub messages_with_attachments: i64,
    pub date_range: DateRange,
    pub file_types: BTreeMap<FileType, u64>,
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    let raw_attachments: Option<String> = row.get(3)?;
    Ok(MessageRecord {
        id: id_text(row.get(0)?).unwrap_or_default(),
        timestamp: row.get(1)?,
        contents: row.get(2)?,
        attachments: attachments::normalize(raw_attachments.as_deref().unwrap_or_default()),
        channel_id: id_text(row.get(4)?),
        channel_name: row.get(5)?,
        channel_type: row.get(6)?,
        guild_name: row.get(7)?,
    })
}

pub fn count_messages(conn: &Connection, filter: &WhereClause) -> anyhow::Result<i64> {
    let sql = format!("{} WHERE {}", MESSAGE_COUNT, filter.sql);
    let total = conn.query_row(&sql, params_from_iter(filter.params.iter()), |row| row.get(0))?;
    Ok(total)
}

/// Returns one page of messages plus the total for the same predicate.
pub fn list_messages(conn: &Connection, query: &MessageQuery) -> anyhow::Result<MessagePage> {
    let filter = query.where_clause();
    debug!("Query: where={} params={:?}", filter.sql, filter.params);

    let total = count_messages(conn, &filter)?;

    let sql = format!(
        "{} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        MESSAGE_SELECT,
        filter.sql,
        query.order_by()
    );
    let mut params = filter.params;
    params.push(Value::Integer(query.pagination.per_page as i64));
    params.push(Value::Integer(query.pagination.offset()));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), message_from_row)?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }

    debug!("Query: page returned {} of {} messages", messages.len(), total);
    Ok(MessagePage { messages, total })
}

pub fn get_message(conn: &Connection, id: i64) -> anyhow::Result<Option<MessageRecord>> {
    let sql = format!("{} WHERE m.id = ?1", MESSAGE_SELECT);
    let record = conn.query_row(&sql, [id], message_from_row).optional()?;
    Ok(record)
}

pub fn list_channels(conn: &Connection) -> anyhow::Result<ChannelsByGuild> {
    let mut stmt = conn.prepare(CHANNELS_WITH_COUNTS)?;
    let mut rows = stmt.query([])?;

    let mut by_guild = ChannelsByGuild::new();
    while let Some(row) = rows.next()? {
        let id = id_text(row.get(0)?).unwrap_or_default();
        let guild_id = id_text(row.get(3)?);
        let guild_name = row
            .get::<_, Option<String>>(4)?
            .unwrap_or_else(|| NO_GUILD.to_string());

        let entry = by_guild
            .entry(guild_name.clone())
            .or_insert_with(|| GuildChannels {
                guild_name,
                guild_id,
                channels: Vec::new(),
            });

        entry.channels.push(ChannelSummary {
            name: row
                .get::<_, Option<String>>(1)?
                .unwrap_or_else(|| format!("Channel {}", id)),
            kind: row
                .get::<_, Option<String>>(2)?
                .unwrap_or_else(|| DEFAULT_CHANNEL_TYPE.to_string()),
            message_count: row.get(5)?,
            id,
        });
    }

    Ok(by_guild)
}

pub fn list_guilds(conn: &Connection) -> anyhow::Result<Vec<GuildSummary>> {
    let mut stmt = conn.prepare(GUILDS_WITH_COUNTS)?;
    let rows = stmt.query_map([], |row| {
        Ok(GuildSummary {
            id: id_text(row.get(0)?).unwrap_or_default(),
            name: row
                .get::<_, Option<String>>(1)?
                .unwrap_or_else(|| UNKNOWN_GUILD.to_string()),
            channel_count: row.get(2)?,
            message_count: row.get(3)?,
        })
    })?;

    let mut guilds = Vec::new();
    for row in rows {
        guilds.push(row?);
    }
    Ok(guilds)
}

pub fn stats(conn: &Connection) -> anyhow::Result<Stats> {
    let total_messages = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
    let messages_with_attachments = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE attachments != ''",
        [],
        |row| row.get(0),
    )?;
    let date_range = conn.query_row(
        "SELECT MIN(timestamp), MAX(timestamp) FROM messages",
        [],
        |row| {
            Ok(DateRange {
                earliest: row.get(0)?,
                latest: row.get(1)?,
            })
        },
    )?;

    Ok(Stats {
        total_messages,
        messages_with_attachments,
        date_range,
        file_types: file_type_histogram(conn, STATS_SAMPLE_LIMIT)?,
    })
}

/// Counts attachment categories over the first `limit` attachment-bearing
/// messages. Unclassifiable attachments are counted as documents.
pub fn file_type_histogram(conn: &Connection, limit: i64) -> anyhow::Result<BTreeMap<FileType, u64>> {
    let mut stmt = conn.prepare(ATTACHMENT_SAMPLE)?;
    let mut rows = stmt.query([limit])?;

    let mut histogram = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let raw: String = row.get(0)?;
        for attachment in attachments::normalize(&raw) {
            let bucket = match attachment.file_type {
                FileType::Unknown => FileType::Document,
                other => other,
            };
            *histogram.entry(bucket).or_insert(0) += 1;
        }
    }
    Ok(histogram)
}
