//! # Configuration
//!
//! Server settings and store selection. Values come from CLI flags with
//! environment fallbacks (see [`crate::cli`]); this module validates them.

use axum::http::HeaderValue;
use clap::ValueEnum;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use taskboard_core::{MemoryStore, RedbStore, StoreError, TaskStore};
use thiserror::Error;

/// Default port; the web frontend expects the API here.
pub const DEFAULT_PORT: u16 = 4000;

/// Default request body cap (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Invalid server settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("port must be non-zero")]
    InvalidPort,

    #[error("invalid listen address: {0}")]
    InvalidHost(String),

    #[error("invalid CORS origin: {0}")]
    InvalidOrigin(String),
}

/// Where tasks live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Process memory; gone on exit.
    Memory,
    /// redb database file.
    Redb,
}

/// A store that can be shared across request handlers.
pub type BoxedStore = Box<dyn TaskStore + Send + Sync>;

/// Open the selected backend. `path` is ignored for [`Backend::Memory`].
pub fn open_store(backend: Backend, path: &Path) -> Result<BoxedStore, StoreError> {
    match backend {
        Backend::Memory => Ok(Box::new(MemoryStore::new())),
        Backend::Redb => Ok(Box::new(RedbStore::create(path)?)),
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    /// Global request budget per second. 0 disables rate limiting.
    pub rate_limit_per_second: u32,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            cors_origins: Vec::new(),
            rate_limit_per_second: 0,
            body_limit_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Resolve the listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        let ip: IpAddr = self
            .host
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Parse the CORS origins into header values.
    pub fn origin_headers(&self) -> Result<Vec<HeaderValue>, ConfigError> {
        self.cors_origins
            .iter()
            .map(|origin| origin.trim())
            .filter(|origin| !origin.is_empty())
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|_| ConfigError::InvalidOrigin(origin.to_string()))
            })
            .collect()
    }

    /// Check every setting at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        self.origin_headers()?;
        Ok(())
    }
}
