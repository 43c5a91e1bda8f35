//! In-memory query evaluation.
//!
//! [`Evaluator`] answers "would this notification appear in the query's
//! results?" without touching the database. It evaluates the same
//! [`Predicate`] tree the SQL compiler emits, so both agree on every row.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use notibox_core::models::Notification;
//! use notibox_core::query::{EvalTarget, Evaluator};
//!
//! let evaluator = Evaluator::new("is:unread").unwrap();
//! let notification = Notification {
//!     subject_title: "Fix flaky test".to_string(),
//!     ..Default::default()
//! };
//!
//! assert!(evaluator.matches(&EvalTarget::new(&notification), Utc::now()));
//! ```

use std::borrow::Cow;

use chrono::{DateTime, Utc};

use super::ast::Query;
use super::error::{QueryError, QueryResult};
use super::parser::parse;
use super::predicate::{FlagColumn, Predicate, TextColumn};
use super::scope::{apply_default_scope, ViewScope};
use crate::models::{Notification, Repository, Tag};

/// A notification together with the rows a query may look at.
#[derive(Debug, Clone, Copy)]
pub struct EvalTarget<'a> {
    pub notification: &'a Notification,
    pub repository: Option<&'a Repository>,
    pub tags: &'a [Tag],
}

impl<'a> EvalTarget<'a> {
    pub fn new(notification: &'a Notification) -> Self {
        Self {
            notification,
            repository: None,
            tags: &[],
        }
    }

    pub fn with_repository(mut self, repository: Option<&'a Repository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_tags(mut self, tags: &'a [Tag]) -> Self {
        self.tags = tags;
        self
    }

    fn text(&self, column: TextColumn) -> Cow<'a, str> {
        let n = self.notification;
        let borrowed = |value: Option<&'a String>| Cow::Borrowed(value.map_or("", String::as_str));
        match column {
            TextColumn::SubjectTitle => Cow::Borrowed(n.subject_title.as_str()),
            TextColumn::SubjectType => Cow::Borrowed(n.subject_type.as_str()),
            TextColumn::RepoFullName => {
                Cow::Borrowed(self.repository.map_or("", |r| r.full_name.as_str()))
            }
            TextColumn::AuthorLogin => borrowed(n.author_login.as_ref()),
            TextColumn::SubjectState => borrowed(n.subject_state.as_ref()),
            TextColumn::SubjectNumber => {
                Cow::Owned(n.subject_number.map(|v| v.to_string()).unwrap_or_default())
            }
            TextColumn::Reason => borrowed(n.reason.as_ref()),
            TextColumn::StateReason => borrowed(n.subject_state_reason.as_ref()),
        }
    }

    fn flag(&self, column: FlagColumn) -> bool {
        let n = self.notification;
        match column {
            FlagColumn::Read => n.is_read,
            FlagColumn::Archived => n.archived,
            FlagColumn::Starred => n.starred,
            FlagColumn::Muted => n.muted,
            FlagColumn::Filtered => n.filtered,
            FlagColumn::Merged => n.subject_merged.unwrap_or(false),
        }
    }
}

/// A compiled, reusable in-memory matcher.
#[derive(Debug, Clone)]
pub struct Evaluator {
    scope: ViewScope,
    predicate: Predicate,
}

impl Evaluator {
    /// Parses and prepares a query string.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Invalid`] if the query has validation errors.
    /// Callers that want best-effort behavior should parse themselves and
    /// use [`Evaluator::from_query`].
    pub fn new(input: &str) -> QueryResult<Evaluator> {
        let parsed = parse(input);
        if !parsed.errors.is_empty() {
            return Err(QueryError::invalid(parsed.errors));
        }
        Ok(Self::from_query(&parsed.query))
    }

    /// Prepares an already-parsed query, default scope included.
    pub fn from_query(query: &Query) -> Evaluator {
        let scoped = apply_default_scope(query);
        let predicate = Predicate::All(vec![
            Predicate::for_scope(scoped.scope),
            Predicate::lower(&scoped.filter),
        ]);
        Evaluator {
            scope: scoped.scope,
            predicate,
        }
    }

    /// The view scope the query runs in.
    pub fn scope(&self) -> ViewScope {
        self.scope
    }

    /// Returns true if the target would be in the query's result set at `now`.
    pub fn matches(&self, target: &EvalTarget<'_>, now: DateTime<Utc>) -> bool {
        evaluate(&self.predicate, target, now)
    }
}

fn evaluate(predicate: &Predicate, target: &EvalTarget<'_>, now: DateTime<Utc>) -> bool {
    match predicate {
        Predicate::Always => true,
        Predicate::Never => false,
        Predicate::Flag { column, value } => target.flag(*column) == *value,
        Predicate::Snoozed(value) => target.notification.is_snoozed(now) == *value,
        Predicate::Contains { column, needle } => target
            .text(*column)
            .to_ascii_lowercase()
            .contains(needle.as_str()),
        Predicate::StartsWith { column, prefix } => target
            .text(*column)
            .to_ascii_lowercase()
            .starts_with(prefix.as_str()),
        Predicate::Equals { column, value } => {
            target.text(*column).to_ascii_lowercase() == *value
        }
        Predicate::TagContains(needle) => target
            .tags
            .iter()
            .any(|tag| tag.slug.to_ascii_lowercase().contains(needle.as_str())),
        Predicate::Any(parts) => parts.iter().any(|p| evaluate(p, target, now)),
        Predicate::All(parts) => parts.iter().all(|p| evaluate(p, target, now)),
        Predicate::Not(inner) => !evaluate(inner, target, now),
    }
}

#[cfg(test)]
#[path = "evaluator_tests.rs"]
mod tests;
