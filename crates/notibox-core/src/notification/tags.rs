//! Tag assignment.

use tracing::{debug, info};

use super::bulk::ResolvedTarget;
use super::list::NotificationItem;
use super::{BulkTarget, NotificationService, Result, ServiceError};
use crate::models::{slugify, Notification, Tag};
use crate::store::{NewTag, StoreError};

/// Colour given to tags created implicitly by name.
pub const DEFAULT_TAG_COLOR: &str = "#6366f1";

impl NotificationService {
    pub async fn list_tags(&self, user_id: &str) -> Result<Vec<Tag>> {
        self.store
            .list_tags(user_id)
            .await
            .map_err(ServiceError::store("list tags"))
    }

    /// Assigns an existing tag. Assigning a tag twice is not an error.
    pub async fn assign_tag(
        &self,
        user_id: &str,
        github_id: &str,
        tag_id: &str,
    ) -> Result<NotificationItem> {
        let notification = self.require(user_id, github_id).await?;
        let tag = self.require_tag(user_id, tag_id).await?;
        self.assign(user_id, &tag, &notification).await?;
        self.enrich(user_id, notification).await
    }

    /// Assigns a tag by display name, creating it on first use.
    pub async fn assign_tag_by_name(
        &self,
        user_id: &str,
        github_id: &str,
        name: &str,
    ) -> Result<NotificationItem> {
        let tag = self.ensure_tag(user_id, name).await?;
        let notification = self.require(user_id, github_id).await?;
        self.assign(user_id, &tag, &notification).await?;
        self.enrich(user_id, notification).await
    }

    pub async fn remove_tag(
        &self,
        user_id: &str,
        github_id: &str,
        tag_id: &str,
    ) -> Result<NotificationItem> {
        let notification = self.require(user_id, github_id).await?;
        let tag = self.require_tag(user_id, tag_id).await?;
        self.store
            .remove_tag(user_id, &tag.id, notification.id)
            .await
            .map_err(ServiceError::store("remove tag"))?;
        self.enrich(user_id, notification).await
    }

    /// Assigns a tag to every targeted notification. Returns how many now
    /// carry it.
    pub async fn bulk_assign_tag(
        &self,
        user_id: &str,
        target: &BulkTarget,
        tag_id: &str,
    ) -> Result<u64> {
        let resolved = target.resolve(self.now())?;
        let tag = self.require_tag(user_id, tag_id).await?;

        let mut count = 0;
        for notification in self.targeted(user_id, resolved).await? {
            self.assign(user_id, &tag, &notification).await?;
            count += 1;
        }
        info!(tag = %tag.slug, count, "bulk tag assigned");
        Ok(count)
    }

    /// Removes a tag from every targeted notification. Returns how many
    /// assignments were removed.
    pub async fn bulk_remove_tag(
        &self,
        user_id: &str,
        target: &BulkTarget,
        tag_id: &str,
    ) -> Result<u64> {
        let resolved = target.resolve(self.now())?;
        let tag = self.require_tag(user_id, tag_id).await?;

        let mut count = 0;
        for notification in self.targeted(user_id, resolved).await? {
            count += self
                .store
                .remove_tag(user_id, &tag.id, notification.id)
                .await
                .map_err(ServiceError::store("remove tag"))?;
        }
        info!(tag = %tag.slug, count, "bulk tag removed");
        Ok(count)
    }

    async fn assign(&self, user_id: &str, tag: &Tag, notification: &Notification) -> Result<()> {
        match self
            .store
            .assign_tag(user_id, &tag.id, notification.id, self.now())
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict(_)) => {
                debug!(tag = %tag.slug, github_id = %notification.github_id, "tag already assigned");
                Ok(())
            }
            Err(err) => Err(ServiceError::store("assign tag")(err)),
        }
    }

    async fn require_tag(&self, user_id: &str, tag_id: &str) -> Result<Tag> {
        self.store
            .get_tag(user_id, tag_id)
            .await
            .map_err(ServiceError::store("get tag"))?
            .ok_or_else(|| ServiceError::not_found("tag", tag_id))
    }

    /// Finds a tag by name, creating it if it does not exist yet.
    pub async fn ensure_tag(&self, user_id: &str, name: &str) -> Result<Tag> {
        let name = name.trim();
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(ServiceError::Validation(format!(
                "tag name '{}' has no usable characters",
                name
            )));
        }

        if let Some(tag) = self
            .store
            .get_tag_by_slug(user_id, &slug)
            .await
            .map_err(ServiceError::store("get tag"))?
        {
            return Ok(tag);
        }

        let new_tag = NewTag {
            user_id: user_id.to_string(),
            name: name.to_string(),
            slug: slug.clone(),
            color: Some(DEFAULT_TAG_COLOR.to_string()),
            description: None,
        };
        match self.store.create_tag(&new_tag, self.now()).await {
            Ok(tag) => {
                info!(tag = %tag.slug, "tag created");
                Ok(tag)
            }
            // Lost a race with a concurrent create.
            Err(StoreError::Conflict(_)) => self
                .store
                .get_tag_by_slug(user_id, &slug)
                .await
                .map_err(ServiceError::store("get tag"))?
                .ok_or_else(|| ServiceError::not_found("tag", slug)),
            Err(err) => Err(ServiceError::store("create tag")(err)),
        }
    }

    async fn targeted(&self, user_id: &str, target: ResolvedTarget) -> Result<Vec<Notification>> {
        let ids = match target {
            ResolvedTarget::Ids(ids) => ids,
            ResolvedTarget::Query(compiled) => self
                .store
                .list_notification_ids(user_id, &compiled)
                .await
                .map_err(ServiceError::store("list notifications"))?,
        };

        let notifications = self
            .store
            .get_notifications(user_id, &ids)
            .await
            .map_err(ServiceError::store("get notifications"))?;
        if notifications.len() < ids.len() {
            debug!(
                skipped = ids.len() - notifications.len(),
                "skipping unknown notifications"
            );
        }
        Ok(notifications)
    }
}
