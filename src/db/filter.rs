//! Translation of `/messages` query options into parameterized SQL.
//!
//! User input only ever reaches the statement as a bound parameter. The sort
//! column and direction cannot be bound, so they are resolved through closed
//! enums whose SQL tokens are hard-coded.

use crate::attachments::FileType;
use rusqlite::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    Id,
    #[default]
    Timestamp,
    Contents,
    Attachments,
}

impl SortColumn {
    /// Anything outside the allow-list falls back to `timestamp`.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("id") => SortColumn::Id,
            Some("timestamp") => SortColumn::Timestamp,
            Some("contents") => SortColumn::Contents,
            Some("attachments") => SortColumn::Attachments,
            _ => SortColumn::default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::Timestamp => "timestamp",
            SortColumn::Contents => "contents",
            SortColumn::Attachments => "attachments",
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortColumn::Id => "m.id",
            SortColumn::Timestamp => "m.timestamp",
            SortColumn::Contents => "m.contents",
            SortColumn::Attachments => "m.attachments",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl Pagination {
    /// Coerces raw inputs into a usable page window; never rejects.
    pub fn new(page: Option<i64>, per_page: Option<i64>, default_per_page: u32, max_per_page: u32) -> Self {
        let page = page
            .filter(|p| *p >= 1)
            .map(|p| p.min(u32::MAX as i64) as u32)
            .unwrap_or(1);
        let per_page = per_page
            .filter(|p| *p >= 1)
            .map(|p| p.min(max_per_page as i64) as u32)
            .unwrap_or(default_per_page);
        Self { page, per_page }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    pub fn pages(&self, total: i64) -> i64 {
        let per_page = self.per_page.max(1) as i64;
        (total + per_page - 1) / per_page
    }
}

/// A `WHERE` predicate together with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Accumulates `(fragment, values)` pairs and joins them with `AND`.
/// Fragments are fixed SQL text with `?` placeholders.
#[derive(Debug, Default)]
pub struct FilterBuilder {
    fragments: Vec<String>,
    params: Vec<Value>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn and(&mut self, fragment: String, values: impl IntoIterator<Item = Value>) {
        self.fragments.push(fragment);
        self.params.extend(values);
    }

    pub fn search(&mut self, term: &str) -> &mut Self {
        if !term.is_empty() {
            let pattern = format!("%{}%", escape_like(term));
            self.and(
                "(m.contents LIKE ? ESCAPE '\\' OR m.attachments LIKE ? ESCAPE '\\')".to_string(),
                [Value::Text(pattern.clone()), Value::Text(pattern)],
            );
        }
        self
    }

    pub fn channel(&mut self, channel_id: &str) -> &mut Self {
        if !channel_id.trim().is_empty() {
            self.and("m.channel_id = ?".to_string(), [id_param(channel_id)]);
        }
        self
    }

    pub fn guild(&mut self, guild_id: &str) -> &mut Self {
        if !guild_id.trim().is_empty() {
            self.and("c.guild_id = ?".to_string(), [id_param(guild_id)]);
        }
        self
    }

    pub fn file_type(&mut self, file_type: FileType) -> &mut Self {
        let extensions = file_type.extensions();
        if !extensions.is_empty() {
            let fragment = vec!["m.attachments LIKE ?"; extensions.len()].join(" OR ");
            self.and(
                format!("({})", fragment),
                extensions
                    .iter()
                    .map(|ext| Value::Text(format!("%.{}%", ext))),
            );
        }
        self
    }

    pub fn build(self) -> WhereClause {
        let sql = if self.fragments.is_empty() {
            "1=1".to_string()
        } else {
            self.fragments.join(" AND ")
        };
        WhereClause {
            sql,
            params: self.params,
        }
    }
}

/// Options accepted by the message listing.
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    pub search: Option<String>,
    pub channel_id: Option<String>,
    pub guild_id: Option<String>,
    pub file_type: Option<FileType>,
    pub sort_by: SortColumn,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl MessageQuery {
    pub fn where_clause(&self) -> WhereClause {
        let mut builder = FilterBuilder::new();
        if let Some(search) = &self.search {
            builder.search(search);
        }
        if let Some(channel_id) = &self.channel_id {
            builder.channel(channel_id);
        }
        if let Some(guild_id) = &self.guild_id {
            builder.guild(guild_id);
        }
        if let Some(file_type) = self.file_type {
            builder.file_type(file_type);
        }
        builder.build()
    }

    pub fn order_by(&self) -> String {
        let direction = self.sort_order.as_str();
        match self.sort_by {
            SortColumn::Id => format!("m.id {}", direction),
            column => format!("{} {}, m.id {}", column.sql(), direction, direction),
        }
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// IDs are bound as integers when numeric, otherwise as text.
fn id_param(value: &str) -> Value {
    let value = value.trim();
    value
        .parse::<i64>()
        .map(Value::Integer)
        .unwrap_or_else(|_| Value::Text(value.to_string()))
}
