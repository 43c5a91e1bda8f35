//! Runs rules against notifications and applies their actions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{Notification, Repository, Rule, RuleActions, Tag};
use crate::query::{EvalTarget, Evaluator};
use crate::store::{Result, StatusChange, Store, StoreError};

impl RuleActions {
    /// The status changes this rule applies, in a fixed order.
    pub fn status_changes(&self) -> Vec<StatusChange> {
        [
            (self.skip_inbox, StatusChange::Filter),
            (self.mark_read, StatusChange::MarkRead),
            (self.star, StatusChange::Star),
            (self.archive, StatusChange::Archive),
            (self.mute, StatusChange::Mute),
        ]
        .into_iter()
        .filter_map(|(enabled, change)| enabled.then_some(change))
        .collect()
    }
}

/// Checks notifications against a user's enabled rules.
#[derive(Clone)]
pub struct RuleMatcher {
    store: Arc<dyn Store>,
}

impl RuleMatcher {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Runs every enabled rule against one notification, in display order,
    /// and applies the actions of each rule that matches.
    ///
    /// Each rule sees the notification as earlier rules left it. A rule whose
    /// query cannot be resolved or parsed is skipped. Returns the names of
    /// the rules that matched.
    pub async fn apply_rules(
        &self,
        user_id: &str,
        notification: &Notification,
        repository: Option<&Repository>,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let rules = self.store.list_rules(user_id).await?;
        let mut current = notification.clone();
        let mut tags = self.tags_of(user_id, &current).await?;
        let mut matched = Vec::new();

        for rule in rules.iter().filter(|rule| rule.enabled) {
            let Some(evaluator) = self.evaluator_for(user_id, rule).await? else {
                continue;
            };
            let target = EvalTarget::new(&current)
                .with_repository(repository)
                .with_tags(&tags);
            if !evaluator.matches(&target, now) {
                continue;
            }

            debug!(rule = %rule.name, github_id = %current.github_id, "rule matched");
            apply_actions(
                self.store.as_ref(),
                user_id,
                std::slice::from_ref(&current.github_id),
                &rule.actions,
                now,
            )
            .await?;
            matched.push(rule.name.clone());

            let refreshed = self.store.get_notification(user_id, &current.github_id).await?;
            if let Some(updated) = refreshed {
                current = updated;
            }
            tags = self.tags_of(user_id, &current).await?;
        }

        Ok(matched)
    }

    /// Builds the evaluator for a rule, or `None` if the rule cannot run.
    async fn evaluator_for(&self, user_id: &str, rule: &Rule) -> Result<Option<Evaluator>> {
        let Some(query) = rule_query(self.store.as_ref(), user_id, rule).await? else {
            return Ok(None);
        };
        match Evaluator::new(&query) {
            Ok(evaluator) => Ok(Some(evaluator)),
            Err(err) => {
                warn!(rule = %rule.name, error = %err, "skipping rule with invalid query");
                Ok(None)
            }
        }
    }

    async fn tags_of(&self, user_id: &str, notification: &Notification) -> Result<Vec<Tag>> {
        Ok(self
            .store
            .list_tags_for_notifications(user_id, &[notification.id])
            .await?
            .into_iter()
            .map(|(_, tag)| tag)
            .collect())
    }
}

/// The query a rule runs: its linked view's query, else its own.
///
/// Returns `None`, with a warning, when neither is usable.
pub(crate) async fn rule_query(
    store: &dyn Store,
    user_id: &str,
    rule: &Rule,
) -> Result<Option<String>> {
    let query = match &rule.view_id {
        Some(view_id) => match store.get_view(user_id, view_id).await? {
            Some(view) => Some(view.query),
            None => {
                warn!(rule = %rule.name, %view_id, "skipping rule linked to missing view");
                return Ok(None);
            }
        },
        None => rule.query.clone(),
    };

    match query.filter(|q| !q.trim().is_empty()) {
        Some(query) => Ok(Some(query)),
        None => {
            warn!(rule = %rule.name, "skipping rule without a query");
            Ok(None)
        }
    }
}

/// Applies rule actions to the listed notifications.
///
/// Tags that no longer exist are skipped. Assigning a tag twice is not an
/// error.
pub(crate) async fn apply_actions(
    store: &dyn Store,
    user_id: &str,
    github_ids: &[String],
    actions: &RuleActions,
    now: DateTime<Utc>,
) -> Result<()> {
    if github_ids.is_empty() {
        return Ok(());
    }

    for change in actions.status_changes() {
        store.bulk_update_by_ids(user_id, github_ids, change, now).await?;
    }

    if actions.assign_tags.is_empty() && actions.remove_tags.is_empty() {
        return Ok(());
    }
    let rows = store.get_notifications(user_id, github_ids).await?;

    for tag_id in &actions.assign_tags {
        if store.get_tag(user_id, tag_id).await?.is_none() {
            warn!(%tag_id, "skipping assignment of missing tag");
            continue;
        }
        for row in &rows {
            match store.assign_tag(user_id, tag_id, row.id, now).await {
                Ok(()) | Err(StoreError::Conflict(_)) => {}
                Err(err) => return Err(err),
            }
        }
    }

    for tag_id in &actions.remove_tags {
        for row in &rows {
            store.remove_tag(user_id, tag_id, row.id).await?;
        }
    }
    Ok(())
}
