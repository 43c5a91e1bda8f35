//! Sync Service: mirrors GitHub notification threads into the local store.
//!
//! A sync run reads the user's [`SyncState`], fetches every thread updated
//! since the last run, and processes them one at a time. Processing a thread
//! upserts its repository, fetches the subject payload, records pull request
//! metadata and finally upserts the notification. A failing thread is logged
//! and counted but never aborts the run, and the next run starts early
//! enough to fetch it again. Enabled rules run against every notification a
//! run inserts for the first time.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use notibox_core::store::SqliteStore;
//! use notibox_core::sync::{SyncService, SyncSettings};
//! use notibox_github::GithubClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::connect("sqlite://notibox.db").await?;
//! let client = GithubClient::new("ghp_token")?;
//! let service = SyncService::new(Arc::new(store), client, SyncSettings::default());
//!
//! let report = service.sync("me").await?;
//! println!("{} of {} threads synced", report.processed, report.fetched);
//! # Ok(())
//! # }
//! ```

mod subject;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use notibox_github::{FetchNotificationsParams, GithubClient, NotificationThread};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::{Notification, SyncState};
use crate::notification::Clock;
use crate::rules::RuleMatcher;
use crate::store::{NotificationUpsert, RepositoryUpsert, Store, StoreError, SubjectFields};

pub use subject::{pull_request_from_payload, supports_refresh, SubjectDetails};

/// Days of history fetched on a user's first sync.
pub const DEFAULT_INITIAL_SYNC_DAYS: u32 = 30;

/// Errors that can occur during sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// GitHub API error.
    #[error("GitHub API error: {0}")]
    Api(#[from] notibox_github::Error),

    /// Storage error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The notification has no subject document that can be fetched.
    #[error("notification '{github_id}' has no subject URL")]
    MissingSubjectUrl { github_id: String },

    /// The notification does not exist locally.
    #[error("notification '{github_id}' not found")]
    NotFound { github_id: String },
}

impl SyncError {
    /// Returns the CLI exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::Api(err) => err.exit_code(),
            _ => 2,
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Limits applied to sync runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// How far back the first sync reaches. `None` fetches all history.
    pub initial_sync_days: Option<u32>,
    /// Caps how many threads the first sync keeps, newest first.
    pub max_count: Option<usize>,
    /// Fetch only threads GitHub still considers unread.
    pub unread_only: bool,
    /// Page size requested from GitHub.
    pub per_page: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            initial_sync_days: Some(DEFAULT_INITIAL_SYNC_DAYS),
            max_count: None,
            unread_only: false,
            per_page: notibox_github::client::MAX_PER_PAGE,
        }
    }
}

/// Outcome of a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Threads returned by GitHub after limits were applied.
    pub fetched: usize,
    pub processed: usize,
    pub failed: usize,
    pub initial: bool,
}

/// Orchestrates synchronization between GitHub and the local store.
pub struct SyncService {
    store: Arc<dyn Store>,
    matcher: RuleMatcher,
    client: GithubClient,
    settings: SyncSettings,
    clock: Clock,
}

impl SyncService {
    pub fn new(store: Arc<dyn Store>, client: GithubClient, settings: SyncSettings) -> Self {
        Self {
            matcher: RuleMatcher::new(store.clone()),
            store,
            client,
            settings,
            clock: Utc::now,
        }
    }

    /// Replaces the clock used for sync windows and bookkeeping.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Runs one sync for `user_id`.
    ///
    /// The first run reaches back `initial_sync_days` and honours
    /// `max_count`; later runs fetch everything updated since the newest
    /// thread seen so far. Sync state is only written when the fetch itself
    /// succeeds.
    #[tracing::instrument(skip_all, fields(user_id = %user_id))]
    pub async fn sync(&self, user_id: &str) -> Result<SyncReport> {
        let now = (self.clock)();
        let state = self
            .store
            .get_sync_state(user_id)
            .await?
            .unwrap_or_else(|| SyncState {
                user_id: user_id.to_string(),
                ..Default::default()
            });
        let initial = state.initial_sync_completed_at.is_none();

        let since = if initial {
            self.settings
                .initial_sync_days
                .map(|days| now - Duration::days(i64::from(days)))
        } else {
            state.latest_notification_at
        };

        let params = FetchNotificationsParams {
            since,
            before: None,
            all: !self.settings.unread_only,
            per_page: self.settings.per_page,
        };
        info!(?since, initial, "fetching notifications");
        let mut threads = self.client.fetch_notifications(&params).await?;

        if initial {
            if let Some(max) = self.settings.max_count {
                if threads.len() > max {
                    debug!(max, dropped = threads.len() - max, "applying initial sync limit");
                    threads.truncate(max);
                }
            }
        }

        let mut report = SyncReport {
            fetched: threads.len(),
            initial,
            ..Default::default()
        };
        let mut newest = state.latest_notification_at;
        let mut oldest = state.oldest_notification_synced_at;
        let mut oldest_failed: Option<DateTime<Utc>> = None;

        for thread in &threads {
            match self.process_thread(user_id, thread).await {
                Ok(_) => {
                    report.processed += 1;
                    newest = newest.max(Some(thread.updated_at));
                    oldest = Some(oldest.map_or(thread.updated_at, |o| o.min(thread.updated_at)));
                }
                Err(err) => {
                    report.failed += 1;
                    oldest_failed =
                        Some(oldest_failed.map_or(thread.updated_at, |f| f.min(thread.updated_at)));
                    warn!(github_id = %thread.id, error = %err, "failed to process notification");
                }
            }
        }

        // GitHub's `since` is inclusive, so stopping just short of the oldest
        // failure fetches it again next run.
        if let Some(failed) = oldest_failed {
            let cap = failed - Duration::seconds(1);
            newest = Some(newest.map_or(cap, |n| n.min(cap)));
        }

        let state = SyncState {
            user_id: user_id.to_string(),
            last_successful_poll: Some(now),
            latest_notification_at: newest,
            initial_sync_completed_at: state.initial_sync_completed_at.or(Some(now)),
            oldest_notification_synced_at: oldest,
        };
        self.store.upsert_sync_state(&state).await?;

        info!(
            fetched = report.fetched,
            processed = report.processed,
            failed = report.failed,
            "sync complete"
        );
        Ok(report)
    }

    /// Mirrors one thread into the store.
    ///
    /// Fetching the subject, recording pull request metadata and running
    /// rules are best effort; only repository and notification writes can
    /// fail the thread. Rules only run when the notification is new.
    pub async fn process_thread(
        &self,
        user_id: &str,
        thread: &NotificationThread,
    ) -> Result<Notification> {
        let repository = self
            .store
            .upsert_repository(&repository_upsert(user_id, thread))
            .await?;

        let subject_raw = match thread.subject.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => match self.client.fetch_subject_raw(url).await {
                Ok(raw) => Some(raw),
                Err(err) => {
                    warn!(github_id = %thread.id, subject_url = url, error = %err,
                        "failed to fetch subject, continuing without it");
                    None
                }
            },
            None => None,
        };

        let mut subject = SubjectFields::default();
        if let Some(raw) = &subject_raw {
            subject = self
                .subject_fields(user_id, &thread.subject.subject_type, Some(repository.id), raw)
                .await;
        }

        let input = NotificationUpsert {
            user_id: user_id.to_string(),
            github_id: thread.id.clone(),
            repository_id: Some(repository.id),
            subject_type: thread.subject.subject_type.clone(),
            subject_title: thread.subject.title.clone(),
            subject_url: thread.subject.url.clone(),
            subject_latest_comment_url: thread.subject.latest_comment_url.clone(),
            reason: Some(thread.reason.clone()).filter(|r| !r.is_empty()),
            github_unread: Some(thread.unread),
            github_updated_at: Some(thread.updated_at),
            github_last_read_at: thread.last_read_at,
            github_url: thread.url.clone(),
            github_subscription_url: thread.subscription_url.clone(),
            payload: raw_json(&thread.raw),
            subject,
        };

        let is_new = self.store.get_notification(user_id, &thread.id).await?.is_none();
        let now = (self.clock)();
        let mut notification = self.store.upsert_notification(&input, now).await?;
        debug!(github_id = %thread.id, is_new, "notification synced");

        if is_new {
            match self
                .matcher
                .apply_rules(user_id, &notification, Some(&repository), now)
                .await
            {
                Ok(matched) if !matched.is_empty() => {
                    debug!(github_id = %thread.id, rules = ?matched, "rules applied");
                    if let Some(updated) = self.store.get_notification(user_id, &thread.id).await? {
                        notification = updated;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(github_id = %thread.id, error = %err, "failed to apply rules");
                }
            }
        }
        Ok(notification)
    }

    /// Refetches the subject of one notification and stores its metadata.
    #[tracing::instrument(skip_all, fields(user_id = %user_id, github_id = %github_id))]
    pub async fn refresh_subject(&self, user_id: &str, github_id: &str) -> Result<Notification> {
        let notification = self
            .store
            .get_notification(user_id, github_id)
            .await?
            .ok_or_else(|| SyncError::NotFound {
                github_id: github_id.to_string(),
            })?;

        let missing = || SyncError::MissingSubjectUrl {
            github_id: github_id.to_string(),
        };
        if !supports_refresh(&notification.subject_type) {
            debug!(subject_type = %notification.subject_type, "subject type cannot be refreshed");
            return Err(missing());
        }
        let url = notification
            .subject_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(missing)?;

        let raw = self.client.fetch_subject_raw(url).await?;
        let mut subject = self
            .subject_fields(
                user_id,
                &notification.subject_type,
                notification.repository_id,
                &raw,
            )
            .await;
        // Not every payload names an author; keep the one we already have.
        if subject.author_login.is_none() {
            subject.author_login = notification.author_login.clone();
            subject.author_id = notification.author_id;
        }

        let updated = self
            .store
            .update_subject(user_id, github_id, &subject)
            .await?
            .ok_or_else(|| SyncError::NotFound {
                github_id: github_id.to_string(),
            })?;
        info!("subject refreshed");
        Ok(updated)
    }

    async fn subject_fields(
        &self,
        user_id: &str,
        subject_type: &str,
        repository_id: Option<i64>,
        raw: &Value,
    ) -> SubjectFields {
        let details = SubjectDetails::from_payload(raw);

        let mut pull_request_id = None;
        if let (true, Some(repository_id)) = (subject::is_pull_request(subject_type), repository_id) {
            match pull_request_from_payload(user_id, repository_id, raw) {
                Ok(Some(input)) => match self.store.upsert_pull_request(&input).await {
                    Ok(pr) => pull_request_id = Some(pr.id),
                    Err(err) => warn!(error = %err, "failed to store pull request metadata"),
                },
                Ok(None) => debug!("pull request payload has no number"),
                Err(err) => warn!(error = %err, "failed to decode pull request payload"),
            }
        }

        SubjectFields {
            subject_raw: raw_json(raw),
            subject_fetched_at: Some((self.clock)()),
            pull_request_id,
            author_login: details.author_login,
            author_id: details.author_id,
            subject_number: details.number,
            subject_state: details.state,
            subject_merged: details.merged,
            subject_state_reason: details.state_reason,
        }
    }
}

fn repository_upsert(user_id: &str, thread: &NotificationThread) -> RepositoryUpsert {
    let repo = &thread.repository;
    RepositoryUpsert {
        user_id: user_id.to_string(),
        github_id: Some(repo.id),
        node_id: repo.node_id.clone(),
        name: repo.name.clone(),
        full_name: repo.full_name.clone(),
        owner_login: Some(repo.owner.login.clone()),
        owner_id: Some(repo.owner.id),
        owner_avatar_url: repo.owner.avatar_url.clone(),
        owner_html_url: repo.owner.html_url.clone(),
        private: Some(repo.private),
        description: repo.description.clone(),
        html_url: repo.html_url.clone(),
        fork: Some(repo.fork),
        visibility: repo.visibility.clone(),
        default_branch: repo.default_branch.clone(),
        archived: repo.archived,
        raw: thread.raw.get("repository").and_then(raw_json),
    }
}

fn raw_json(value: &Value) -> Option<String> {
    if value.is_null() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
