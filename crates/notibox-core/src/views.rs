//! Views: named, saved queries.
//!
//! A view is addressed by id or by the slug derived from its name. Slugs
//! that name a built-in view scope are reserved. Rules may link to a view
//! and follow its query, so deleting a view that rules still use needs
//! `force` and removes those rules too.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::models::{slugify, View};
use crate::notification::{Clock, Result, ServiceError};
use crate::query::{compile, parse, CompileOptions, FieldName, Query};
use crate::rules::{duplicate_name, required_name, valid_query, ORDER_STEP};
use crate::store::{NewView, Store};

/// Slugs a saved view may not take.
pub const RESERVED_SLUGS: &[&str] = &[
    "inbox",
    "archive",
    "snoozed",
    "filtered",
    "anywhere",
    "everything",
    "starred",
    "done",
];

/// Input for creating a view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateView {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub query: String,
    pub is_default: bool,
}

/// A partial view update. Unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateView {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub query: Option<String>,
    pub is_default: Option<bool>,
}

/// A view with the number of unread notifications its query selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSummary {
    #[serde(flatten)]
    pub view: View,
    pub unread_count: i64,
}

/// Manages a user's views.
#[derive(Clone)]
pub struct ViewService {
    store: Arc<dyn Store>,
    clock: Clock,
}

impl ViewService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            clock: Utc::now,
        }
    }

    /// Replaces the clock used for timestamps and snooze checks.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Lists views in display order with their unread counts.
    pub async fn list_views(&self, user_id: &str) -> Result<Vec<ViewSummary>> {
        let views = self
            .store
            .list_views(user_id)
            .await
            .map_err(ServiceError::store("list views"))?;

        let mut summaries = Vec::with_capacity(views.len());
        for view in views {
            let unread_count = self.unread_count(user_id, &view).await?;
            summaries.push(ViewSummary { view, unread_count });
        }
        Ok(summaries)
    }

    /// Finds a view by id, then by slug.
    pub async fn get_view(&self, user_id: &str, key: &str) -> Result<View> {
        let key = key.trim();
        if let Some(view) = self
            .store
            .get_view(user_id, key)
            .await
            .map_err(ServiceError::store("get view"))?
        {
            return Ok(view);
        }
        self.store
            .get_view_by_slug(user_id, &slugify(key))
            .await
            .map_err(ServiceError::store("get view"))?
            .ok_or_else(|| ServiceError::not_found("view", key))
    }

    #[tracing::instrument(skip_all, fields(user_id = %user_id))]
    pub async fn create_view(&self, user_id: &str, input: &CreateView) -> Result<ViewSummary> {
        let name = required_name(&input.name)?;
        let slug = view_slug(&name)?;
        let query = valid_query(&input.query)?;

        let views = self
            .store
            .list_views(user_id)
            .await
            .map_err(ServiceError::store("list views"))?;
        let display_order = views.iter().map(|v| v.display_order).max().unwrap_or(0) + ORDER_STEP;

        let new_view = NewView {
            user_id: user_id.to_string(),
            name: name.clone(),
            slug,
            description: input.description.clone(),
            icon: input.icon.clone(),
            query,
            is_default: input.is_default,
            display_order,
        };
        let view = self
            .store
            .create_view(&new_view, self.now())
            .await
            .map_err(|err| duplicate_name(err, "view", &name, "create view"))?;
        info!(view = %view.slug, "view created");

        let unread_count = self.unread_count(user_id, &view).await?;
        Ok(ViewSummary { view, unread_count })
    }

    #[tracing::instrument(skip_all, fields(user_id = %user_id, view = %key))]
    pub async fn update_view(&self, user_id: &str, key: &str, input: &UpdateView) -> Result<View> {
        let mut view = self.get_view(user_id, key).await?;

        if let Some(name) = &input.name {
            view.name = required_name(name)?;
            view.slug = view_slug(&view.name)?;
        }
        if let Some(description) = &input.description {
            view.description = Some(description.clone()).filter(|d| !d.trim().is_empty());
        }
        if let Some(icon) = &input.icon {
            view.icon = Some(icon.clone()).filter(|i| !i.trim().is_empty());
        }
        if let Some(query) = &input.query {
            view.query = valid_query(query)?;
        }
        if let Some(is_default) = input.is_default {
            view.is_default = is_default;
        }

        self.save(view).await
    }

    /// Deletes a view. Returns how many linked rules were deleted with it.
    ///
    /// Without `force`, a view that rules still use is left alone and the
    /// call fails.
    #[tracing::instrument(skip_all, fields(user_id = %user_id, view = %key))]
    pub async fn delete_view(&self, user_id: &str, key: &str, force: bool) -> Result<usize> {
        let view = self.get_view(user_id, key).await?;
        let linked = self
            .store
            .list_rules_for_view(user_id, &view.id)
            .await
            .map_err(ServiceError::store("list rules"))?
            .len();
        if linked > 0 && !force {
            return Err(ServiceError::Validation(format!(
                "view '{}' is used by {} rule(s); delete with force to remove them too",
                view.slug, linked
            )));
        }

        self.store
            .delete_view(user_id, &view.id)
            .await
            .map_err(ServiceError::store("delete view"))?;
        info!(view = %view.slug, linked_rules = linked, "view deleted");
        Ok(linked)
    }

    /// Puts the listed views first, in the given order.
    pub async fn reorder_views(&self, user_id: &str, keys: &[String]) -> Result<Vec<View>> {
        if keys.is_empty() {
            return Err(ServiceError::Validation("no view ids provided".to_string()));
        }
        let mut ordered_ids = Vec::with_capacity(keys.len());
        for key in keys {
            ordered_ids.push(self.get_view(user_id, key).await?.id);
        }

        let mut views = self
            .store
            .list_views(user_id)
            .await
            .map_err(ServiceError::store("list views"))?;
        views.sort_by_key(|v| {
            ordered_ids
                .iter()
                .position(|id| id == &v.id)
                .unwrap_or(ordered_ids.len())
        });

        let mut reordered = Vec::with_capacity(views.len());
        for (index, mut view) in views.into_iter().enumerate() {
            let order = (index as i64 + 1) * ORDER_STEP;
            if view.display_order != order {
                view.display_order = order;
                view = self.save(view).await?;
            }
            reordered.push(view);
        }
        Ok(reordered)
    }

    /// Counts unread notifications the view selects. A stored query that no
    /// longer parses counts zero.
    async fn unread_count(&self, user_id: &str, view: &View) -> Result<i64> {
        let parsed = parse(&view.query);
        if !parsed.errors.is_empty() {
            warn!(view = %view.slug, "view query has errors, not counting");
            return Ok(0);
        }
        let unread = Query::and(
            Query::group(parsed.query),
            Query::field(FieldName::Is, ["unread"]),
        );
        let compiled = compile(&unread, &CompileOptions::unbounded(self.now()))?;
        self.store
            .count_notifications(user_id, &compiled)
            .await
            .map_err(ServiceError::store("count notifications"))
    }

    async fn save(&self, view: View) -> Result<View> {
        let name = view.name.clone();
        let id = view.id.clone();
        self.store
            .update_view(&view, self.now())
            .await
            .map_err(|err| duplicate_name(err, "view", &name, "update view"))?
            .ok_or_else(|| ServiceError::not_found("view", id))
    }
}

fn view_slug(name: &str) -> Result<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(ServiceError::Validation(
            "name must contain at least one letter or digit".to_string(),
        ));
    }
    if RESERVED_SLUGS.contains(&slug.as_str()) {
        return Err(ServiceError::Validation(format!(
            "slug '{}' is reserved and cannot be used",
            slug
        )));
    }
    Ok(slug)
}
