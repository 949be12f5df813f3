use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub messages_dir: String,
    // HTTP server settings
    pub bind_address: String,
    pub port: u16,
    // Pagination settings
    pub default_per_page: u32,
    pub max_per_page: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        let default_per_page = env::var("DEFAULT_PER_PAGE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10u32)
            .max(1);
        let max_per_page = env::var("MAX_PER_PAGE")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .unwrap_or(1000u32)
            .max(default_per_page);

        Ok(Config {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "messages.db".to_string()),
            messages_dir: env::var("MESSAGES_DIR").unwrap_or_else(|_| "Messages".to_string()),
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            default_per_page,
            max_per_page,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "messages.db".to_string(),
            messages_dir: "Messages".to_string(),
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            default_per_page: 10,
            max_per_page: 1000,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field("messages_dir", &self.messages_dir)
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("default_per_page", &self.default_per_page)
            .field("max_per_page", &self.max_per_page)
            .finish()
    }
}
