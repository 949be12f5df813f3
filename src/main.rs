use chat_archive::config::Config;
use chat_archive::db::Database;
use chat_archive::importer::Importer;
use chat_archive::services::ArchiveService;
use chat_archive::web::WebServer;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Import an exported chat archive into SQLite and browse it over HTTP.
#[derive(Parser, Debug)]
#[command(name = "chat-archive", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the database from a directory of per-channel exports
    Import {
        /// Export root (defaults to MESSAGES_DIR)
        dir: Option<PathBuf>,
    },
    /// Serve the read-only query API
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Arc::new(Config::from_env()?);
    let db = Database::new(&config);
    info!("Database: {}", db.path().display());

    match cli.command {
        Command::Import { dir } => {
            let root = dir.unwrap_or_else(|| PathBuf::from(&config.messages_dir));
            let importer = Importer::new(db);
            let report = tokio::task::spawn_blocking(move || importer.run(&root)).await??;
            info!(
                "Imported {} messages in {:.1}s",
                report.messages_imported,
                (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
            );
        }
        Command::Serve => {
            let server = WebServer::new(config.clone(), ArchiveService::new(db));
            server.start().await?;
        }
    }

    Ok(())
}
