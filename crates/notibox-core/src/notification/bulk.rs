//! Bulk status updates by id list or query.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::actions::parse_snooze_until;
use super::{NotificationService, Result, ServiceError};
use crate::query::{compile, CompileOptions, CompiledQuery, QueryError};
use crate::store::StatusChange;

/// A status change that can be applied in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkOperation {
    MarkRead,
    MarkUnread,
    Archive,
    Unarchive,
    Mute,
    Unmute,
    Star,
    Unstar,
    Unfilter,
    Snooze,
    Unsnooze,
}

impl BulkOperation {
    pub const ALL: [BulkOperation; 11] = [
        BulkOperation::MarkRead,
        BulkOperation::MarkUnread,
        BulkOperation::Archive,
        BulkOperation::Unarchive,
        BulkOperation::Mute,
        BulkOperation::Unmute,
        BulkOperation::Star,
        BulkOperation::Unstar,
        BulkOperation::Unfilter,
        BulkOperation::Snooze,
        BulkOperation::Unsnooze,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BulkOperation::MarkRead => "mark-read",
            BulkOperation::MarkUnread => "mark-unread",
            BulkOperation::Archive => "archive",
            BulkOperation::Unarchive => "unarchive",
            BulkOperation::Mute => "mute",
            BulkOperation::Unmute => "unmute",
            BulkOperation::Star => "star",
            BulkOperation::Unstar => "unstar",
            BulkOperation::Unfilter => "unfilter",
            BulkOperation::Snooze => "snooze",
            BulkOperation::Unsnooze => "unsnooze",
        }
    }

    fn status_change(&self, snoozed_until: Option<DateTime<Utc>>) -> Result<StatusChange> {
        Ok(match self {
            BulkOperation::MarkRead => StatusChange::MarkRead,
            BulkOperation::MarkUnread => StatusChange::MarkUnread,
            BulkOperation::Archive => StatusChange::Archive,
            BulkOperation::Unarchive => StatusChange::Unarchive,
            BulkOperation::Mute => StatusChange::Mute,
            BulkOperation::Unmute => StatusChange::Unmute,
            BulkOperation::Star => StatusChange::Star,
            BulkOperation::Unstar => StatusChange::Unstar,
            BulkOperation::Unfilter => StatusChange::Unfilter,
            BulkOperation::Unsnooze => StatusChange::Unsnooze,
            BulkOperation::Snooze => match snoozed_until {
                Some(until) => StatusChange::Snooze { until },
                None => {
                    return Err(ServiceError::Validation(
                        "snooze requires an 'until' timestamp".to_string(),
                    ))
                }
            },
        })
    }
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BulkOperation {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        BulkOperation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == normalized)
            .ok_or_else(|| ServiceError::Validation(format!("unknown bulk operation '{}'", s)))
    }
}

/// The rows a bulk operation applies to: explicit ids or a query, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkTarget {
    pub ids: Vec<String>,
    pub query: Option<String>,
}

impl BulkTarget {
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            query: None,
        }
    }

    pub fn query(query: impl Into<String>) -> Self {
        Self {
            ids: Vec::new(),
            query: Some(query.into()),
        }
    }
}

/// Resolved, validated form of a [`BulkTarget`].
pub(crate) enum ResolvedTarget {
    Ids(Vec<String>),
    Query(CompiledQuery),
}

impl BulkTarget {
    /// Validates the target and compiles its query. Never touches storage.
    ///
    /// A blank query with no ids selects the inbox.
    pub(crate) fn resolve(&self, now: DateTime<Utc>) -> Result<ResolvedTarget> {
        let query = self.query.as_deref().map(str::trim);
        match (self.ids.is_empty(), query) {
            (true, None) => Err(ServiceError::Validation(
                "no notification ids or query provided".to_string(),
            )),
            (false, Some(q)) if !q.is_empty() => Err(ServiceError::Validation(
                "cannot specify both ids and query".to_string(),
            )),
            (false, _) => {
                let ids = dedupe_and_sort(&self.ids);
                if ids.is_empty() {
                    return Err(ServiceError::Validation(
                        "no notification ids provided".to_string(),
                    ));
                }
                Ok(ResolvedTarget::Ids(ids))
            }
            (true, Some(query)) => {
                let parsed = crate::query::parse(query);
                if !parsed.errors.is_empty() {
                    return Err(QueryError::invalid(parsed.errors).into());
                }
                let compiled = compile(&parsed.query, &CompileOptions::unbounded(now))?;
                Ok(ResolvedTarget::Query(compiled))
            }
        }
    }
}

/// A bulk update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkRequest {
    pub operation: BulkOperation,
    pub target: BulkTarget,
    /// RFC 3339 timestamp; required for [`BulkOperation::Snooze`].
    pub snoozed_until: Option<String>,
}

/// Outcome of a bulk update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkResult {
    pub affected_count: u64,
}

impl NotificationService {
    /// Applies one status change to many notifications.
    ///
    /// All validation happens before the first storage call. Matching no
    /// rows is not an error.
    ///
    /// A query target runs in its own view scope, the inbox unless it names
    /// one with `in:`. The inbox never holds filtered rows, so unfiltering by
    /// query needs `in:filtered` or `in:anywhere`.
    #[tracing::instrument(skip_all, fields(user_id = %user_id, operation = %request.operation))]
    pub async fn bulk_update(&self, user_id: &str, request: &BulkRequest) -> Result<BulkResult> {
        let now = self.now();
        let snoozed_until = match (request.operation, request.snoozed_until.as_deref()) {
            (BulkOperation::Snooze, Some(value)) => Some(parse_snooze_until(value)?),
            _ => None,
        };
        let change = request.operation.status_change(snoozed_until)?;
        let target = request.target.resolve(now)?;

        let affected_count = match target {
            ResolvedTarget::Ids(ids) => self.bulk_by_ids(user_id, &ids, change, now).await?,
            ResolvedTarget::Query(compiled) => self
                .store
                .bulk_update_by_query(user_id, &compiled, change, now)
                .await
                .map_err(ServiceError::store("bulk update notifications"))?,
        };

        info!(affected_count, "bulk update applied");
        Ok(BulkResult { affected_count })
    }

    async fn bulk_by_ids(
        &self,
        user_id: &str,
        ids: &[String],
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.store
            .bulk_update_by_ids(user_id, ids, change, now)
            .await
            .map_err(ServiceError::store("bulk update notifications"))
    }
}

/// Trims, drops empties and duplicates, and sorts.
pub(crate) fn dedupe_and_sort(ids: &[String]) -> Vec<String> {
    let mut result: Vec<String> = ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    result.sort();
    result.dedup();
    result
}
