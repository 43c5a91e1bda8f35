//! Single-notification actions.

use chrono::{DateTime, Utc};
use tracing::info;

use super::list::NotificationItem;
use super::{NotificationService, Result, ServiceError};
use crate::models::Notification;
use crate::query::ActionHints;
use crate::store::{NotificationUpsert, StatusChange};

/// Parses an RFC 3339 snooze time.
pub fn parse_snooze_until(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::Validation(
            "snooze requires an RFC 3339 'until' timestamp".to_string(),
        ));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| {
            ServiceError::Validation(format!("invalid snooze time '{}': {}", value, err))
        })
}

impl NotificationService {
    /// Looks up a notification with its repository and tags.
    pub async fn get_notification(&self, user_id: &str, github_id: &str) -> Result<NotificationItem> {
        let notification = self.require(user_id, github_id).await?;
        self.enrich(user_id, notification).await
    }

    pub async fn mark_read(&self, user_id: &str, github_id: &str) -> Result<Notification> {
        self.apply(user_id, github_id, StatusChange::MarkRead).await
    }

    pub async fn mark_unread(&self, user_id: &str, github_id: &str) -> Result<Notification> {
        self.apply(user_id, github_id, StatusChange::MarkUnread).await
    }

    pub async fn archive(&self, user_id: &str, github_id: &str) -> Result<Notification> {
        self.apply(user_id, github_id, StatusChange::Archive).await
    }

    pub async fn unarchive(&self, user_id: &str, github_id: &str) -> Result<Notification> {
        self.apply(user_id, github_id, StatusChange::Unarchive).await
    }

    pub async fn star(&self, user_id: &str, github_id: &str) -> Result<Notification> {
        self.apply(user_id, github_id, StatusChange::Star).await
    }

    pub async fn unstar(&self, user_id: &str, github_id: &str) -> Result<Notification> {
        self.apply(user_id, github_id, StatusChange::Unstar).await
    }

    pub async fn mute(&self, user_id: &str, github_id: &str) -> Result<Notification> {
        self.apply(user_id, github_id, StatusChange::Mute).await
    }

    pub async fn unmute(&self, user_id: &str, github_id: &str) -> Result<Notification> {
        self.apply(user_id, github_id, StatusChange::Unmute).await
    }

    pub async fn unfilter(&self, user_id: &str, github_id: &str) -> Result<Notification> {
        self.apply(user_id, github_id, StatusChange::Unfilter).await
    }

    pub async fn snooze(
        &self,
        user_id: &str,
        github_id: &str,
        until: DateTime<Utc>,
    ) -> Result<Notification> {
        self.apply(user_id, github_id, StatusChange::Snooze { until }).await
    }

    pub async fn unsnooze(&self, user_id: &str, github_id: &str) -> Result<Notification> {
        self.apply(user_id, github_id, StatusChange::Unsnooze).await
    }

    /// Inserts or refreshes a notification mirrored from GitHub.
    pub async fn upsert_notification(&self, input: &NotificationUpsert) -> Result<Notification> {
        self.store
            .upsert_notification(input, self.now())
            .await
            .map_err(ServiceError::store("upsert notification"))
    }

    async fn apply(
        &self,
        user_id: &str,
        github_id: &str,
        change: StatusChange,
    ) -> Result<Notification> {
        let updated = self
            .store
            .update_notification_status(user_id, github_id, change, self.now())
            .await
            .map_err(ServiceError::store("update notification"))?
            .ok_or_else(|| ServiceError::not_found("notification", github_id))?;
        info!(github_id, ?change, "notification updated");
        Ok(updated)
    }

    pub(crate) async fn require(&self, user_id: &str, github_id: &str) -> Result<Notification> {
        self.store
            .get_notification(user_id, github_id)
            .await
            .map_err(ServiceError::store("get notification"))?
            .ok_or_else(|| ServiceError::not_found("notification", github_id))
    }

    pub(crate) async fn enrich(
        &self,
        user_id: &str,
        notification: Notification,
    ) -> Result<NotificationItem> {
        let repository = match notification.repository_id {
            Some(id) => self
                .store
                .get_repository(user_id, id)
                .await
                .map_err(ServiceError::store("get repository"))?,
            None => None,
        };
        let tags = self
            .tags_for(user_id, &[notification.id])
            .await?
            .remove(&notification.id)
            .unwrap_or_default();

        Ok(NotificationItem {
            notification,
            repository,
            tags,
            action_hints: ActionHints::default(),
        })
    }
}
