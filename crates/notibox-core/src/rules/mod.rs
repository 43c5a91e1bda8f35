//! Rules: saved queries whose actions run on newly synced notifications.
//!
//! A rule either carries its own query or links to a [`View`] and follows
//! that view's query. Sync runs every enabled rule, in display order,
//! against each notification it inserts; see [`RuleMatcher`]. A rule can
//! also be applied once to every notification already stored with
//! [`RuleService::apply_rule`].
//!
//! [`View`]: crate::models::View

mod matcher;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::{Rule, RuleActions};
use crate::notification::{Clock, Result, ServiceError};
use crate::query::{compile, parse, CompileOptions, FieldName, Query, QueryError};
use crate::store::{NewRule, Store, StoreError};

pub use matcher::RuleMatcher;
pub(crate) use matcher::{apply_actions, rule_query};

/// Gap left between consecutive display orders.
pub(crate) const ORDER_STEP: i64 = 100;

/// Input for creating a rule. Exactly one of `query` and `view_id` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRule {
    pub name: String,
    pub description: Option<String>,
    pub query: Option<String>,
    pub view_id: Option<String>,
    pub actions: RuleActions,
    /// Defaults to enabled.
    pub enabled: Option<bool>,
}

/// A partial rule update. Unset fields keep their value.
///
/// Setting `query` unlinks the rule from its view, and setting `view_id`
/// drops its own query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRule {
    pub name: Option<String>,
    pub description: Option<String>,
    pub query: Option<String>,
    pub view_id: Option<String>,
    pub actions: Option<RuleActions>,
    pub enabled: Option<bool>,
}

/// Manages a user's rules.
#[derive(Clone)]
pub struct RuleService {
    store: Arc<dyn Store>,
    clock: Clock,
}

impl RuleService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            clock: Utc::now,
        }
    }

    /// Replaces the clock used for timestamps.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub async fn list_rules(&self, user_id: &str) -> Result<Vec<Rule>> {
        self.store
            .list_rules(user_id)
            .await
            .map_err(ServiceError::store("list rules"))
    }

    pub async fn get_rule(&self, user_id: &str, rule_id: &str) -> Result<Rule> {
        self.store
            .get_rule(user_id, rule_id)
            .await
            .map_err(ServiceError::store("get rule"))?
            .ok_or_else(|| ServiceError::not_found("rule", rule_id))
    }

    /// Creates a rule at the end of the display order.
    #[tracing::instrument(skip_all, fields(user_id = %user_id))]
    pub async fn create_rule(&self, user_id: &str, input: &CreateRule) -> Result<Rule> {
        let name = required_name(&input.name)?;
        let (query, view_id) = match (input.query.as_deref(), input.view_id.as_deref()) {
            (None, None) => {
                return Err(ServiceError::Validation(
                    "either a query or a view is required".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ServiceError::Validation(
                    "only one of query or view can be provided".to_string(),
                ))
            }
            (Some(query), None) => (Some(valid_query(query)?), None),
            (None, Some(view_id)) => (None, Some(self.require_view(user_id, view_id).await?)),
        };
        require_actions(&input.actions)?;
        self.require_tags(user_id, &input.actions).await?;

        let rules = self.list_rules(user_id).await?;
        let display_order = rules.iter().map(|r| r.display_order).max().unwrap_or(0) + ORDER_STEP;

        let new_rule = NewRule {
            user_id: user_id.to_string(),
            name: name.clone(),
            description: input.description.clone(),
            query,
            view_id,
            actions: input.actions.clone(),
            enabled: input.enabled.unwrap_or(true),
            display_order,
        };
        let rule = self
            .store
            .create_rule(&new_rule, self.now())
            .await
            .map_err(|err| duplicate_name(err, "rule", &name, "create rule"))?;
        info!(rule = %rule.name, "rule created");
        Ok(rule)
    }

    #[tracing::instrument(skip_all, fields(user_id = %user_id, rule_id = %rule_id))]
    pub async fn update_rule(
        &self,
        user_id: &str,
        rule_id: &str,
        input: &UpdateRule,
    ) -> Result<Rule> {
        let mut rule = self.get_rule(user_id, rule_id).await?;

        if let Some(name) = &input.name {
            rule.name = required_name(name)?;
        }
        if let Some(description) = &input.description {
            rule.description = Some(description.clone()).filter(|d| !d.trim().is_empty());
        }
        match (input.query.as_deref(), input.view_id.as_deref()) {
            (Some(_), Some(_)) => {
                return Err(ServiceError::Validation(
                    "only one of query or view can be provided".to_string(),
                ))
            }
            (Some(query), None) => {
                rule.query = Some(valid_query(query)?);
                rule.view_id = None;
            }
            (None, Some(view_id)) => {
                rule.view_id = Some(self.require_view(user_id, view_id).await?);
                rule.query = None;
            }
            (None, None) => {}
        }
        if let Some(actions) = &input.actions {
            require_actions(actions)?;
            self.require_tags(user_id, actions).await?;
            rule.actions = actions.clone();
        }
        if let Some(enabled) = input.enabled {
            rule.enabled = enabled;
        }

        self.save(rule).await
    }

    /// Turns a rule on or off.
    pub async fn set_enabled(&self, user_id: &str, rule_id: &str, enabled: bool) -> Result<Rule> {
        let update = UpdateRule {
            enabled: Some(enabled),
            ..Default::default()
        };
        self.update_rule(user_id, rule_id, &update).await
    }

    pub async fn delete_rule(&self, user_id: &str, rule_id: &str) -> Result<()> {
        let deleted = self
            .store
            .delete_rule(user_id, rule_id)
            .await
            .map_err(ServiceError::store("delete rule"))?;
        if deleted == 0 {
            return Err(ServiceError::not_found("rule", rule_id));
        }
        info!(%rule_id, "rule deleted");
        Ok(())
    }

    /// Puts the listed rules first, in the given order. Rules not listed
    /// keep their relative order after them.
    pub async fn reorder_rules(&self, user_id: &str, rule_ids: &[String]) -> Result<Vec<Rule>> {
        if rule_ids.is_empty() {
            return Err(ServiceError::Validation("no rule ids provided".to_string()));
        }
        let mut rules = self.list_rules(user_id).await?;
        for id in rule_ids {
            if !rules.iter().any(|r| &r.id == id) {
                return Err(ServiceError::not_found("rule", id.as_str()));
            }
        }

        rules.sort_by_key(|r| {
            rule_ids
                .iter()
                .position(|id| id == &r.id)
                .unwrap_or(rule_ids.len())
        });
        let mut reordered = Vec::with_capacity(rules.len());
        for (index, mut rule) in rules.into_iter().enumerate() {
            let order = (index as i64 + 1) * ORDER_STEP;
            if rule.display_order != order {
                rule.display_order = order;
                rule = self.save(rule).await?;
            }
            reordered.push(rule);
        }
        Ok(reordered)
    }

    /// Applies a rule's actions to every stored notification its query
    /// matches, in any view scope. Returns how many notifications matched.
    ///
    /// A disabled rule matches nothing.
    #[tracing::instrument(skip_all, fields(user_id = %user_id, rule_id = %rule_id))]
    pub async fn apply_rule(&self, user_id: &str, rule_id: &str) -> Result<u64> {
        let rule = self.get_rule(user_id, rule_id).await?;
        if !rule.enabled {
            info!(rule = %rule.name, "rule disabled, nothing applied");
            return Ok(0);
        }

        let query = rule_query(self.store.as_ref(), user_id, &rule)
            .await
            .map_err(ServiceError::store("resolve rule query"))?
            .ok_or_else(|| {
                ServiceError::Validation(format!("rule '{}' has no usable query", rule.name))
            })?;
        let parsed = parse(&query);
        if !parsed.errors.is_empty() {
            return Err(QueryError::invalid(parsed.errors).into());
        }

        let now = self.now();
        let anywhere = Query::and(
            Query::group(parsed.query),
            Query::field(FieldName::In, ["anywhere"]),
        );
        let compiled = compile(&anywhere, &CompileOptions::unbounded(now))?;
        let ids = self
            .store
            .list_notification_ids(user_id, &compiled)
            .await
            .map_err(ServiceError::store("list notifications"))?;

        apply_actions(self.store.as_ref(), user_id, &ids, &rule.actions, now)
            .await
            .map_err(ServiceError::store("apply rule"))?;
        info!(rule = %rule.name, matched = ids.len(), "rule applied");
        Ok(ids.len() as u64)
    }

    async fn save(&self, rule: Rule) -> Result<Rule> {
        let name = rule.name.clone();
        let id = rule.id.clone();
        self.store
            .update_rule(&rule, self.now())
            .await
            .map_err(|err| duplicate_name(err, "rule", &name, "update rule"))?
            .ok_or_else(|| ServiceError::not_found("rule", id))
    }

    async fn require_view(&self, user_id: &str, view_id: &str) -> Result<String> {
        let view_id = view_id.trim();
        if view_id.is_empty() {
            return Err(ServiceError::Validation("view id cannot be empty".to_string()));
        }
        let view = self
            .store
            .get_view(user_id, view_id)
            .await
            .map_err(ServiceError::store("get view"))?
            .ok_or_else(|| ServiceError::not_found("view", view_id))?;
        Ok(view.id)
    }

    async fn require_tags(&self, user_id: &str, actions: &RuleActions) -> Result<()> {
        for tag_id in actions.assign_tags.iter().chain(&actions.remove_tags) {
            self.store
                .get_tag(user_id, tag_id)
                .await
                .map_err(ServiceError::store("get tag"))?
                .ok_or_else(|| ServiceError::not_found("tag", tag_id.as_str()))?;
        }
        Ok(())
    }
}

pub(crate) fn required_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("name is required".to_string()));
    }
    Ok(name.to_string())
}

fn require_actions(actions: &RuleActions) -> Result<()> {
    if actions.is_empty() {
        return Err(ServiceError::Validation(
            "a rule needs at least one action".to_string(),
        ));
    }
    Ok(())
}

/// Trims a saved query and rejects it unless it parses cleanly.
pub(crate) fn valid_query(query: &str) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ServiceError::Validation("query cannot be empty".to_string()));
    }
    let parsed = parse(query);
    if !parsed.errors.is_empty() {
        return Err(QueryError::invalid(parsed.errors).into());
    }
    Ok(query.to_string())
}

/// Maps a uniqueness conflict to a validation error naming the duplicate.
pub(crate) fn duplicate_name(
    err: StoreError,
    resource: &str,
    name: &str,
    operation: &'static str,
) -> ServiceError {
    if err.is_conflict() {
        ServiceError::Validation(format!("a {} named '{}' already exists", resource, name))
    } else {
        ServiceError::store(operation)(err)
    }
}
