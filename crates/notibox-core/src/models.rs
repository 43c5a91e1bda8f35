//! Records mirrored from GitHub and owned by the local store.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Formats a timestamp the way the store persists it.
///
/// Every timestamp column holds fixed-width UTC RFC 3339 text so that SQL
/// string comparison agrees with chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A mirrored GitHub notification thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub github_id: String,
    pub repository_id: Option<i64>,
    pub pull_request_id: Option<i64>,
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
    pub imported_at: DateTime<Utc>,
    /// Raw thread JSON. Display only, never filtered on.
    pub payload: Option<String>,
    /// Raw subject JSON. Display only, never filtered on.
    pub subject_raw: Option<String>,
    pub subject_fetched_at: Option<DateTime<Utc>>,
    pub author_login: Option<String>,
    pub author_id: Option<i64>,
    pub subject_number: Option<i64>,
    pub subject_state: Option<String>,
    pub subject_merged: Option<bool>,
    pub subject_state_reason: Option<String>,
    pub is_read: bool,
    pub archived: bool,
    pub starred: bool,
    pub muted: bool,
    pub filtered: bool,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub snoozed_at: Option<DateTime<Utc>>,
    pub effective_sort_date: DateTime<Utc>,
}

impl Notification {
    /// Snoozed means a snooze time strictly in the future.
    pub fn is_snoozed(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| until > now)
    }
}

/// A repository a notification belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Repository {
    pub id: i64,
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

/// Pull request metadata extracted from a subject payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PullRequest {
    pub id: i64,
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

/// A user-defined label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-user sync bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SyncState {
    pub user_id: String,
    pub last_successful_poll: Option<DateTime<Utc>>,
    pub latest_notification_at: Option<DateTime<Utc>>,
    pub initial_sync_completed_at: Option<DateTime<Utc>>,
    pub oldest_notification_synced_at: Option<DateTime<Utc>>,
}

/// A named, saved query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct View {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub query: String,
    pub is_default: bool,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a rule does to the notifications it matches.
///
/// Tag lists hold tag ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleActions {
    /// Sets the filtered flag, keeping the notification out of the inbox.
    pub skip_inbox: bool,
    pub mark_read: bool,
    pub star: bool,
    pub archive: bool,
    pub mute: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assign_tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_tags: Vec<String>,
}

impl RuleActions {
    /// Returns true if the rule would not change anything.
    pub fn is_empty(&self) -> bool {
        !(self.skip_inbox || self.mark_read || self.star || self.archive || self.mute)
            && self.assign_tags.is_empty()
            && self.remove_tags.is_empty()
    }
}

/// A saved query with actions applied to newly synced notifications.
///
/// Exactly one of `query` and `view_id` is set. A rule linked to a view
/// follows later edits to the view's query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Rule {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub query: Option<String>,
    pub view_id: Option<String>,
    #[sqlx(json)]
    pub actions: RuleActions,
    pub enabled: bool,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Turns a tag name into its slug: lower case, alphanumerics joined by `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
