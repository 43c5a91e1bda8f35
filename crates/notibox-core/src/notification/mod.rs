//! Notification Service: user actions, bulk updates, listing and tags.
//!
//! The service sits between front ends and the [`Store`]. It validates
//! input before touching storage, turns query strings into compiled SQL,
//! and enriches rows with repositories, tags and action hints.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::query::QueryError;
use crate::store::{Store, StoreError};

mod actions;
mod bulk;
mod list;
mod tags;

pub use actions::parse_snooze_until;
pub use bulk::{BulkOperation, BulkRequest, BulkResult, BulkTarget};
pub use list::{
    ListOptions, ListResponse, NotificationItem, PollItem, PollResponse, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use tags::DEFAULT_TAG_COLOR;

/// Errors returned by the Notification Service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was rejected before reaching storage.
    #[error("{0}")]
    Validation(String),

    /// A referenced notification or tag does not exist for this user.
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    /// A storage call failed. `operation` names what was being attempted.
    #[error("failed to {operation}: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// The query string was invalid.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ServiceError {
    pub(crate) fn store(operation: &'static str) -> impl FnOnce(StoreError) -> ServiceError {
        move |source| ServiceError::Store { operation, source }
    }

    pub(crate) fn not_found(resource: &'static str, id: impl Into<String>) -> ServiceError {
        ServiceError::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Returns true for errors caused by the request itself.
    pub fn is_validation(&self) -> bool {
        matches!(self, ServiceError::Validation(_) | ServiceError::Query(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Source of the current time.
pub type Clock = fn() -> DateTime<Utc>;

/// Orchestrates notification operations over a [`Store`].
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn Store>,
    clock: Clock,
}

impl NotificationService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            clock: Utc::now,
        }
    }

    /// Replaces the clock used for snooze checks and timestamps.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}
