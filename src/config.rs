use anyhow::{bail, Result};
use std::time::Duration;

/// Longest accepted CACHE_TTL_SECS (30 days)
pub const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: String,

    // HTTP
    pub port: u16,
    pub api_token: Option<String>,

    // Cache
    pub cache_ttl_secs: u64,

    // Pagination
    pub default_per_page: u32,
    pub max_per_page: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://translations.db".to_string()),

            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            // Empty token is treated the same as no token
            api_token: std::env::var("API_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            cache_ttl_secs: std::env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),

            default_per_page: std::env::var("DEFAULT_PER_PAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
            max_per_page: std::env::var("MAX_PER_PAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            bail!(
                "CACHE_TTL_SECS ({}) cannot exceed {}",
                self.cache_ttl_secs,
                MAX_CACHE_TTL_SECS
            );
        }
        if self.default_per_page == 0 {
            bail!("DEFAULT_PER_PAGE must be greater than zero");
        }
        if self.default_per_page > self.max_per_page {
            bail!(
                "DEFAULT_PER_PAGE ({}) cannot exceed MAX_PER_PAGE ({})",
                self.default_per_page,
                self.max_per_page
            );
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://translations.db".to_string(),
            port: 8080,
            api_token: None,
            cache_ttl_secs: 3600,
            default_per_page: 50,
            max_per_page: 500,
        }
    }
}
