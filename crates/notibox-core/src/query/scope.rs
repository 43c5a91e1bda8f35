//! View scope handling (`in:`).
//!
//! Every query runs inside exactly one view scope. The scope is pulled out of
//! the AST up front by [`apply_default_scope`], so both the SQL compiler and
//! the evaluator see the same `(scope, filter)` pair.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ast::{BinaryOp, Query};
use super::fields::FieldName;

/// The partition of notifications a query is evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewScope {
    /// Not archived, snoozed, muted or filtered.
    #[default]
    Inbox,
    /// Archived and not muted.
    Archive,
    /// Snoozed into the future, not archived, not muted.
    Snoozed,
    /// Filtered, not archived, snoozed or muted.
    Filtered,
    /// No restriction.
    Anywhere,
}

impl ViewScope {
    pub fn parse(value: &str) -> Option<ViewScope> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inbox" => Some(ViewScope::Inbox),
            "archive" => Some(ViewScope::Archive),
            "snoozed" => Some(ViewScope::Snoozed),
            "filtered" => Some(ViewScope::Filtered),
            "anywhere" => Some(ViewScope::Anywhere),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewScope::Inbox => "inbox",
            ViewScope::Archive => "archive",
            ViewScope::Snoozed => "snoozed",
            ViewScope::Filtered => "filtered",
            ViewScope::Anywhere => "anywhere",
        }
    }
}

impl fmt::Display for ViewScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query split into its view scope and the remaining user filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedQuery {
    pub scope: ViewScope,
    /// The query with every `in:` term removed.
    pub filter: Query,
}

/// Extracts the view scope from a query.
///
/// The last valid `in:` value in reading order wins; without one the scope is
/// [`ViewScope::Inbox`]. All `in:` terms are removed from the returned filter.
pub fn apply_default_scope(query: &Query) -> ScopedQuery {
    let mut scope = None;
    let filter = strip_scope(query, &mut scope);
    ScopedQuery {
        scope: scope.unwrap_or_default(),
        filter,
    }
}

fn strip_scope(query: &Query, scope: &mut Option<ViewScope>) -> Query {
    match query {
        Query::Field(term) if term.field == FieldName::In => {
            for value in &term.values {
                if let Some(parsed) = ViewScope::parse(value) {
                    *scope = Some(parsed);
                }
            }
            Query::All
        }
        Query::Binary { op, left, right } => {
            let left = strip_scope(left, scope);
            let right = strip_scope(right, scope);
            match (op, left, right) {
                (BinaryOp::And, Query::All, other) | (BinaryOp::And, other, Query::All) => other,
                (BinaryOp::Or, Query::All, _) | (BinaryOp::Or, _, Query::All) => Query::All,
                (op, left, right) => Query::Binary {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            }
        }
        Query::Group(inner) => match strip_scope(inner, scope) {
            Query::All => Query::All,
            inner => Query::Group(Box::new(inner)),
        },
        Query::Not(inner) => Query::Not(Box::new(strip_scope(inner, scope))),
        other => other.clone(),
    }
}
