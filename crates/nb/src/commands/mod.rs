//! Command implementations for the nb CLI.

pub mod actions;
pub mod bulk;
pub mod config;
pub mod list;
pub mod query;
pub mod rule;
pub mod show;
pub mod sync;
pub mod tag;
pub mod view;

use std::fs;
use std::sync::Arc;

use notibox_core::query::QueryError;
use notibox_core::{
    NotificationService, RuleService, ServiceError, SqliteStore, Store, StoreError, SyncError,
    ViewService,
};
use thiserror::Error;
use tracing::debug;

use crate::cli::Cli;
use config::Config;

/// Errors that can occur during command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Notification service error.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Sync error.
    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// GitHub API error.
    #[error("API error: {0}")]
    Api(#[from] notibox_github::Error),

    /// Query error.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for command execution.
pub type Result<T> = std::result::Result<T, CommandError>;

/// Common options passed to all commands.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Output JSON instead of tables.
    pub json_output: bool,
    /// Use colors in output.
    pub use_colors: bool,
    /// Quiet mode (errors only).
    pub quiet: bool,
    /// Verbosity level (0 = normal, 1+ = more detail).
    pub verbose: u8,
}

impl CommandContext {
    /// Creates a context from the parsed CLI and the configured colour preference.
    pub fn from_cli(cli: &Cli, config: &Config) -> Self {
        let color_enabled = config.output.color.unwrap_or(true);
        Self {
            json_output: cli.json,
            use_colors: !cli.no_color && !cli.json && color_enabled,
            quiet: cli.quiet,
            verbose: cli.verbose,
        }
    }
}

/// The local store and the user whose notifications it holds.
pub struct Session {
    pub user_id: String,
    pub store: Arc<dyn Store>,
}

impl Session {
    /// Opens the configured database, creating it on first use.
    pub async fn open(config: &Config) -> Result<Self> {
        let path = config.database_path()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        debug!(path = %path.display(), "opening database");

        let store = SqliteStore::connect(&format!("sqlite://{}", path.display())).await?;
        Ok(Self {
            user_id: config.user_id().to_string(),
            store: Arc::new(store),
        })
    }

    #[cfg(test)]
    pub async fn in_memory(user_id: &str) -> Self {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        Self {
            user_id: user_id.to_string(),
            store: Arc::new(store),
        }
    }

    pub fn notifications(&self) -> NotificationService {
        NotificationService::new(Arc::clone(&self.store))
    }

    pub fn rules(&self) -> RuleService {
        RuleService::new(Arc::clone(&self.store))
    }

    pub fn views(&self) -> ViewService {
        ViewService::new(Arc::clone(&self.store))
    }
}
