//! Persistence for notifications, repositories, tags, rules, views and sync
//! state.
//!
//! Services talk to storage through the [`Store`] trait so that they can be
//! exercised against an in-memory SQLite database or a test double. The
//! production implementation is [`SqliteStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Notification, PullRequest, Repository, Rule, RuleActions, SyncState, Tag, View,
};
use crate::query::CompiledQuery;

mod sqlite;

pub use sqlite::SqliteStore;

/// Entity type recorded on tag assignments for notifications.
pub const NOTIFICATION_ENTITY: &str = "notification";

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A query parameter could not be encoded.
    #[error("failed to encode parameter: {0}")]
    Encode(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A status mutation applied to one or more notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    MarkRead,
    MarkUnread,
    /// Also clears any snooze.
    Archive,
    Unarchive,
    /// Also clears any snooze.
    Mute,
    Unmute,
    Star,
    Unstar,
    /// Keeps the notification out of the inbox.
    Filter,
    Unfilter,
    /// Hides the notification until the given time and sorts it there.
    Snooze { until: DateTime<Utc> },
    Unsnooze,
}

/// Subject details extracted from a subject payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectFields {
    pub subject_raw: Option<String>,
    pub subject_fetched_at: Option<DateTime<Utc>>,
    pub pull_request_id: Option<i64>,
    pub author_login: Option<String>,
    pub author_id: Option<i64>,
    pub subject_number: Option<i64>,
    pub subject_state: Option<String>,
    pub subject_merged: Option<bool>,
    pub subject_state_reason: Option<String>,
}

/// Insert-or-update input for a notification, keyed by `(user_id, github_id)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationUpsert {
    pub user_id: String,
    pub github_id: String,
    pub repository_id: Option<i64>,
    pub subject_type: String,
    pub subject_title: String,
    pub subject_url: Option<String>,
    pub subject_latest_comment_url: Option<String>,
    pub reason: Option<String>,
    pub github_unread: Option<bool>,
    pub github_updated_at: Option<DateTime<Utc>>,
    pub github_last_read_at: Option<DateTime<Utc>>,
    pub github_url: Option<String>,
    pub github_subscription_url: Option<String>,
    pub payload: Option<String>,
    pub subject: SubjectFields,
}

/// Insert-or-update input for a repository, keyed by `(user_id, full_name)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryUpsert {
    pub user_id: String,
    pub github_id: Option<i64>,
    pub node_id: Option<String>,
    pub name: String,
    pub full_name: String,
    pub owner_login: Option<String>,
    pub owner_id: Option<i64>,
    pub owner_avatar_url: Option<String>,
    pub owner_html_url: Option<String>,
    pub private: Option<bool>,
    pub description: Option<String>,
    pub html_url: Option<String>,
    pub fork: Option<bool>,
    pub visibility: Option<String>,
    pub default_branch: Option<String>,
    pub archived: Option<bool>,
    pub raw: Option<String>,
}

/// Insert-or-update input for a pull request, keyed by
/// `(user_id, repository_id, number)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullRequestUpsert {
    pub user_id: String,
    pub repository_id: i64,
    pub github_id: Option<i64>,
    pub node_id: Option<String>,
    pub number: i64,
    pub title: Option<String>,
    pub state: Option<String>,
    pub draft: Option<bool>,
    pub merged: Option<bool>,
    pub author_login: Option<String>,
    pub author_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

/// Input for creating a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTag {
    pub user_id: String,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub description: Option<String>,
}

/// Input for creating a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewView {
    pub user_id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub query: String,
    pub is_default: bool,
    pub display_order: i64,
}

/// Input for creating a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRule {
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub query: Option<String>,
    pub view_id: Option<String>,
    pub actions: RuleActions,
    pub enabled: bool,
    pub display_order: i64,
}

/// Storage operations used by the services.
///
/// Every method is scoped to one user. Lookups return `Ok(None)` when the
/// row does not exist; only unexpected backend failures are errors.
#[async_trait]
pub trait Store: Send + Sync {
    /// Runs a compiled query and returns one page of rows.
    async fn list_notifications(
        &self,
        user_id: &str,
        query: &CompiledQuery,
    ) -> Result<Vec<Notification>>;

    /// Counts all rows matching a compiled query, ignoring pagination.
    async fn count_notifications(&self, user_id: &str, query: &CompiledQuery) -> Result<i64>;

    /// GitHub ids of all rows matching a compiled query, in list order.
    async fn list_notification_ids(
        &self,
        user_id: &str,
        query: &CompiledQuery,
    ) -> Result<Vec<String>>;

    async fn get_notification(&self, user_id: &str, github_id: &str)
        -> Result<Option<Notification>>;

    /// Loads the given notifications in one round trip. Unknown ids are skipped.
    async fn get_notifications(
        &self,
        user_id: &str,
        github_ids: &[String],
    ) -> Result<Vec<Notification>>;

    /// Applies a status change to one notification and returns the updated row.
    async fn update_notification_status(
        &self,
        user_id: &str,
        github_id: &str,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>>;

    /// Applies a status change to the listed notifications. Returns rows affected.
    async fn bulk_update_by_ids(
        &self,
        user_id: &str,
        github_ids: &[String],
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<u64>;

    /// Applies a status change to every row matching a compiled query.
    async fn bulk_update_by_query(
        &self,
        user_id: &str,
        query: &CompiledQuery,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<u64>;

    /// Inserts or updates a notification.
    ///
    /// When GitHub reports a new `updated_at` for a notification that is not
    /// muted, its read, archived and snooze state are reset.
    async fn upsert_notification(
        &self,
        input: &NotificationUpsert,
        now: DateTime<Utc>,
    ) -> Result<Notification>;

    /// Replaces the subject-derived columns of a notification.
    async fn update_subject(
        &self,
        user_id: &str,
        github_id: &str,
        subject: &SubjectFields,
    ) -> Result<Option<Notification>>;

    async fn upsert_repository(&self, input: &RepositoryUpsert) -> Result<Repository>;

    async fn upsert_pull_request(&self, input: &PullRequestUpsert) -> Result<PullRequest>;

    /// Loads the given repositories in one round trip. Unknown ids are skipped.
    async fn list_repositories(&self, user_id: &str, ids: &[i64]) -> Result<Vec<Repository>>;

    async fn get_repository(&self, user_id: &str, id: i64) -> Result<Option<Repository>>;

    async fn list_tags(&self, user_id: &str) -> Result<Vec<Tag>>;

    async fn get_tag(&self, user_id: &str, tag_id: &str) -> Result<Option<Tag>>;

    async fn get_tag_by_slug(&self, user_id: &str, slug: &str) -> Result<Option<Tag>>;

    /// Creates a tag. A duplicate slug is a [`StoreError::Conflict`].
    async fn create_tag(&self, input: &NewTag, now: DateTime<Utc>) -> Result<Tag>;

    /// Tags assigned to each of the given notification row ids.
    async fn list_tags_for_notifications(
        &self,
        user_id: &str,
        notification_ids: &[i64],
    ) -> Result<Vec<(i64, Tag)>>;

    /// Assigns a tag. An existing assignment is a [`StoreError::Conflict`].
    async fn assign_tag(
        &self,
        user_id: &str,
        tag_id: &str,
        notification_id: i64,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Removes a tag assignment. Returns rows affected.
    async fn remove_tag(&self, user_id: &str, tag_id: &str, notification_id: i64) -> Result<u64>;

    /// Rules in display order.
    async fn list_rules(&self, user_id: &str) -> Result<Vec<Rule>>;

    async fn get_rule(&self, user_id: &str, rule_id: &str) -> Result<Option<Rule>>;

    /// Creates a rule. A duplicate name is a [`StoreError::Conflict`].
    async fn create_rule(&self, input: &NewRule, now: DateTime<Utc>) -> Result<Rule>;

    /// Writes every editable column of `rule` and returns the stored row.
    async fn update_rule(&self, rule: &Rule, now: DateTime<Utc>) -> Result<Option<Rule>>;

    /// Deletes a rule. Returns rows affected.
    async fn delete_rule(&self, user_id: &str, rule_id: &str) -> Result<u64>;

    /// Rules whose query comes from the given view.
    async fn list_rules_for_view(&self, user_id: &str, view_id: &str) -> Result<Vec<Rule>>;

    /// Views in display order.
    async fn list_views(&self, user_id: &str) -> Result<Vec<View>>;

    async fn get_view(&self, user_id: &str, view_id: &str) -> Result<Option<View>>;

    async fn get_view_by_slug(&self, user_id: &str, slug: &str) -> Result<Option<View>>;

    /// Creates a view. A duplicate slug is a [`StoreError::Conflict`].
    async fn create_view(&self, input: &NewView, now: DateTime<Utc>) -> Result<View>;

    /// Writes every editable column of `view` and returns the stored row.
    async fn update_view(&self, view: &View, now: DateTime<Utc>) -> Result<Option<View>>;

    /// Deletes a view and every rule linked to it. Returns views deleted.
    async fn delete_view(&self, user_id: &str, view_id: &str) -> Result<u64>;

    async fn get_sync_state(&self, user_id: &str) -> Result<Option<SyncState>>;

    async fn upsert_sync_state(&self, state: &SyncState) -> Result<()>;
}
