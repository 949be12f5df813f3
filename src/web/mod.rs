use anyhow::Result;
use salvo::prelude::*;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::services::ArchiveService;

pub mod handlers;
pub mod router;

use self::router::create_router;

/// Shared by every handler through the depot.
#[derive(Clone)]
pub struct AppState {
    pub service: ArchiveService,
    pub default_per_page: u32,
    pub max_per_page: u32,
}

impl AppState {
    pub fn new(service: ArchiveService, config: &Config) -> Self {
        Self {
            service,
            default_per_page: config.default_per_page,
            max_per_page: config.max_per_page,
        }
    }
}

#[derive(Clone)]
pub struct WebServer {
    config: Arc<Config>,
    state: AppState,
}

impl WebServer {
    pub fn new(config: Arc<Config>, service: ArchiveService) -> Self {
        let state = AppState::new(service, &config);
        Self { config, state }
    }

    pub async fn start(&self) -> Result<()> {
        let bind_addr = self.config.bind_addr();
        info!("Starting web server on {}", bind_addr);

        let acceptor = TcpListener::new(bind_addr).bind().await;
        Server::new(acceptor)
            .serve(create_router(self.state.clone()))
            .await;

        Ok(())
    }
}
