//! pool-crawler: a concurrent, resumable web crawler
//!
//! This crate implements a crawl engine built around a bounded worker pool.
//! Workers fetch pages, extract outbound links and feed them back through a
//! single admission gate that enforces a depth limit and guarantees every URL
//! is submitted at most once per run. The visited set survives restarts via
//! periodic checkpoints to a SQLite state file.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Worker pool size must be at least 1, got {0}")]
    InvalidPoolSize(usize),

    #[error("Crawl engine has been shut down")]
    ShutDown,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors raised while loading or saving the visited-set snapshot
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupt state file {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("Failed to replace state file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Errors raised by a [`crawler::Fetcher`]
///
/// Every variant is treated the same way by the engine: the task is retried
/// once, then abandoned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// The URL the failed request was made for
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. }
            | Self::Timeout { url }
            | Self::Transport { url, .. }
            | Self::Body { url, .. } => url,
        }
    }
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for persistence operations
pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Admission, CrawlEngine, CrawlTask, Fetcher, LinkExtractor, SEED_DEPTH};
pub use output::{CrawlStats, CrawlSummary};
pub use state::{RetryTracker, VisitedSet};
pub use storage::{MemoryStateStore, SqliteStateStore, StateStore};
