//! Listing and polling.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::{NotificationService, Result, ServiceError};
use crate::models::{Notification, Repository, Tag};
use crate::query::{
    compile, parse, ActionHints, CompileOptions, EvalTarget, Evaluator, ValidationError,
};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

/// Parameters for a listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub query: String,
    /// 1-based; values below 1 select the first page.
    pub page: Option<i64>,
    /// Values below 1 select the default; larger values are capped.
    pub page_size: Option<i64>,
}

impl ListOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn page_size(mut self, page_size: i64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Resolves `(page, page_size, offset)`.
    pub(crate) fn pagination(&self) -> (i64, i64, i64) {
        let page = self.page.filter(|p| *p >= 1).unwrap_or(DEFAULT_PAGE);
        let page_size = self
            .page_size
            .filter(|s| *s >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        // Huge page numbers select past the end rather than overflow.
        (page, page_size, (page - 1).saturating_mul(page_size))
    }
}

/// A notification with its repository, tags and action hints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationItem {
    pub notification: Notification,
    pub repository: Option<Repository>,
    pub tags: Vec<Tag>,
    pub action_hints: ActionHints,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResponse {
    pub items: Vec<NotificationItem>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    /// Problems found in the query; the listing used the best-effort parse.
    pub warnings: Vec<ValidationError>,
}

/// The reduced row returned by [`NotificationService::poll_notifications`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollItem {
    pub id: i64,
    pub github_id: String,
    pub effective_sort_date: DateTime<Utc>,
    pub archived: bool,
    pub muted: bool,
    pub subject_title: String,
    pub subject_type: String,
    pub reason: Option<String>,
    pub repository_full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResponse {
    pub items: Vec<PollItem>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

struct Page {
    rows: Vec<Notification>,
    repositories: HashMap<i64, Repository>,
    total: i64,
    page: i64,
    page_size: i64,
    warnings: Vec<ValidationError>,
}

impl NotificationService {
    /// Lists one page of notifications matching a query.
    ///
    /// Invalid queries are not rejected: the best-effort parse is used and
    /// its validation errors are returned as warnings. Action hints need a
    /// clean parse and are left empty otherwise.
    #[tracing::instrument(skip_all, fields(user_id = %user_id, query = %options.query))]
    pub async fn list_notifications(
        &self,
        user_id: &str,
        options: &ListOptions,
    ) -> Result<ListResponse> {
        let now = self.now();
        let page = self.fetch_page(user_id, options, true, now).await?;

        let ids: Vec<i64> = page.rows.iter().map(|n| n.id).collect();
        let mut tags_by_notification = self.tags_for(user_id, &ids).await?;

        let evaluator = match Evaluator::new(&options.query) {
            Ok(evaluator) => Some(evaluator),
            Err(err) => {
                debug!(error = %err, "action hints disabled for invalid query");
                None
            }
        };

        let items = page
            .rows
            .into_iter()
            .map(|notification| {
                let repository = notification
                    .repository_id
                    .and_then(|id| page.repositories.get(&id))
                    .cloned();
                let tags = tags_by_notification
                    .remove(&notification.id)
                    .unwrap_or_default();
                let action_hints = evaluator
                    .as_ref()
                    .map(|evaluator| {
                        let target = EvalTarget::new(&notification)
                            .with_repository(repository.as_ref())
                            .with_tags(&tags);
                        evaluator.compute_action_hints(&target, now)
                    })
                    .unwrap_or_default();
                NotificationItem {
                    notification,
                    repository,
                    tags,
                    action_hints,
                }
            })
            .collect();

        Ok(ListResponse {
            items,
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            warnings: page.warnings,
        })
    }

    /// Lists a page of reduced rows for periodic refresh.
    #[tracing::instrument(skip_all, fields(user_id = %user_id, query = %options.query))]
    pub async fn poll_notifications(
        &self,
        user_id: &str,
        options: &ListOptions,
    ) -> Result<PollResponse> {
        let page = self.fetch_page(user_id, options, false, self.now()).await?;

        let items = page
            .rows
            .into_iter()
            .map(|n| PollItem {
                repository_full_name: n
                    .repository_id
                    .and_then(|id| page.repositories.get(&id))
                    .map(|repo| repo.full_name.clone()),
                id: n.id,
                github_id: n.github_id,
                effective_sort_date: n.effective_sort_date,
                archived: n.archived,
                muted: n.muted,
                subject_title: n.subject_title,
                subject_type: n.subject_type,
                reason: n.reason,
            })
            .collect();

        Ok(PollResponse {
            items,
            total: page.total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    async fn fetch_page(
        &self,
        user_id: &str,
        options: &ListOptions,
        include_subject: bool,
        now: DateTime<Utc>,
    ) -> Result<Page> {
        let parsed = parse(&options.query);
        if !parsed.errors.is_empty() {
            warn!(errors = parsed.errors.len(), "listing with best-effort query");
        }

        let (page, page_size, offset) = options.pagination();
        let compiled = compile(
            &parsed.query,
            &CompileOptions {
                now,
                limit: Some(page_size),
                offset,
                include_subject,
            },
        )?;

        let rows = self
            .store
            .list_notifications(user_id, &compiled)
            .await
            .map_err(ServiceError::store("list notifications"))?;
        let total = self
            .store
            .count_notifications(user_id, &compiled)
            .await
            .map_err(ServiceError::store("count notifications"))?;

        let repositories = self.repositories_for(user_id, &rows).await?;
        debug!(rows = rows.len(), total, page, "fetched page");

        Ok(Page {
            rows,
            repositories,
            total,
            page,
            page_size,
            warnings: parsed.errors,
        })
    }

    /// Loads every repository referenced by `rows` in a single call.
    pub(crate) async fn repositories_for(
        &self,
        user_id: &str,
        rows: &[Notification],
    ) -> Result<HashMap<i64, Repository>> {
        let mut ids: Vec<i64> = rows.iter().filter_map(|n| n.repository_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let repositories = self
            .store
            .list_repositories(user_id, &ids)
            .await
            .map_err(ServiceError::store("load repositories"))?;
        Ok(repositories.into_iter().map(|r| (r.id, r)).collect())
    }

    pub(crate) async fn tags_for(
        &self,
        user_id: &str,
        notification_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Tag>>> {
        let assigned = self
            .store
            .list_tags_for_notifications(user_id, notification_ids)
            .await
            .map_err(ServiceError::store("load tags"))?;

        let mut by_notification: HashMap<i64, Vec<Tag>> = HashMap::new();
        for (notification_id, tag) in assigned {
            by_notification.entry(notification_id).or_default().push(tag);
        }
        Ok(by_notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        assert_eq!(ListOptions::new("").pagination(), (1, 50, 0));
    }

    #[test]
    fn test_pagination_offset() {
        assert_eq!(ListOptions::new("").page(3).page_size(20).pagination(), (3, 20, 40));
    }

    #[test]
    fn test_pagination_clamps_out_of_range_values() {
        assert_eq!(ListOptions::new("").page(0).page_size(0).pagination(), (1, 50, 0));
        assert_eq!(ListOptions::new("").page(-4).pagination(), (1, 50, 0));
        assert_eq!(ListOptions::new("").page(2).page_size(1000).pagination(), (2, 200, 200));
    }

    #[test]
    fn test_pagination_saturates_huge_page() {
        assert_eq!(
            ListOptions::new("").page(i64::MAX).pagination(),
            (i64::MAX, 50, i64::MAX)
        );
        let (_, _, offset) = ListOptions::new("").page(i64::MAX / 2).page_size(200).pagination();
        assert_eq!(offset, i64::MAX);
    }
}
