use crate::db::filter::MessageQuery;
use crate::db::queries::{
    self, ChannelsByGuild, GuildSummary, MessagePage, MessageRecord, Stats,
};
use crate::db::Database;
use tracing::error;

/// Read-only access to the archive for the HTTP layer. Aggregate lookups
/// never fail: errors are logged and an empty structure is returned.
#[derive(Clone)]
pub struct ArchiveService {
    db: Database,
}

impl ArchiveService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn list_messages(&self, query: MessageQuery) -> anyhow::Result<MessagePage> {
        self.db
            .run_blocking(move |conn| queries::list_messages(conn, &query))
            .await
    }

    pub async fn get_message(&self, id: i64) -> anyhow::Result<Option<MessageRecord>> {
        self.db
            .run_blocking(move |conn| queries::get_message(conn, id))
            .await
    }

    pub async fn channels_by_guild(&self) -> ChannelsByGuild {
        match self.db.run_blocking(queries::list_channels).await {
            Ok(channels) => channels,
            Err(e) => {
                error!("Error loading channels: {:#}", e);
                ChannelsByGuild::new()
            }
        }
    }

    pub async fn guilds(&self) -> Vec<GuildSummary> {
        match self.db.run_blocking(queries::list_guilds).await {
            Ok(guilds) => guilds,
            Err(e) => {
                error!("Error loading guilds: {:#}", e);
                Vec::new()
            }
        }
    }

    pub async fn stats(&self) -> Stats {
        match self.db.run_blocking(queries::stats).await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Error loading stats: {:#}", e);
                Stats::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{reset_schema, test_support::*};

    #[tokio::test]
    async fn test_aggregates_degrade_to_empty_without_database() {
        let work = tempfile::tempdir().unwrap();
        let service = ArchiveService::new(Database::from_path(work.path().join("missing.db")));

        assert!(service.channels_by_guild().await.is_empty());
        assert!(service.guilds().await.is_empty());
        assert_eq!(service.stats().await, Stats::default());
        // Non-aggregate lookups do surface the failure
        assert!(service.get_message(1).await.is_err());
    }

    #[tokio::test]
    async fn test_reads_through_fresh_connections() {
        let work = tempfile::tempdir().unwrap();
        let db = Database::from_path(work.path().join("archive.db"));
        {
            let conn = db.connect().unwrap();
            reset_schema(&conn).unwrap();
            add_guild(&conn, 1, "Alpha");
            add_channel(&conn, 10, "general", Some(1));
            add_message(&conn, 7, "2024-01-01", "hello", "https://x.com/a.png", 10);
        }

        let service = ArchiveService::new(db);
        let page = service.list_messages(MessageQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.messages[0].id, "7");

        let message = service.get_message(7).await.unwrap().unwrap();
        assert_eq!(message.guild_name.as_deref(), Some("Alpha"));

        assert_eq!(service.guilds().await[0].message_count, 1);
        assert_eq!(service.stats().await.total_messages, 1);
    }
}
