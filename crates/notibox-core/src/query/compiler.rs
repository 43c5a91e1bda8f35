//! Compiles queries into parameterized SQL for the SQLite store.

use chrono::{DateTime, Utc};

use super::ast::Query;
use super::error::QueryResult;
use super::predicate::{FlagColumn, Predicate, TextColumn};
use super::scope::{apply_default_scope, ViewScope};
use crate::models::format_timestamp;

/// Columns selected for a full notification row, in `Notification` field order.
const NOTIFICATION_COLUMNS: &[&str] = &[
    "n.id",
    "n.user_id",
    "n.github_id",
    "n.repository_id",
    "n.pull_request_id",
    "n.subject_type",
    "n.subject_title",
    "n.subject_url",
    "n.subject_latest_comment_url",
    "n.reason",
    "n.github_unread",
    "n.github_updated_at",
    "n.github_last_read_at",
    "n.github_url",
    "n.github_subscription_url",
    "n.imported_at",
    "n.payload",
    "n.subject_raw",
    "n.subject_fetched_at",
    "n.author_login",
    "n.author_id",
    "n.subject_number",
    "n.subject_state",
    "n.subject_merged",
    "n.subject_state_reason",
    "n.is_read",
    "n.archived",
    "n.starred",
    "n.muted",
    "n.filtered",
    "n.snoozed_until",
    "n.snoozed_at",
    "n.effective_sort_date",
];

/// The select list for a notification row aliased as `n`.
///
/// Without `include_subject` the raw payload columns are selected as NULL.
pub(crate) fn notification_columns(include_subject: bool) -> String {
    NOTIFICATION_COLUMNS
        .iter()
        .map(|column| match *column {
            "n.payload" if !include_subject => "NULL AS payload",
            "n.subject_raw" if !include_subject => "NULL AS subject_raw",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(", ")
}

const FROM_CLAUSE: &str =
    "FROM notifications n LEFT JOIN repositories r ON r.id = n.repository_id";

const ORDER_CLAUSE: &str = "ORDER BY n.effective_sort_date DESC, n.id DESC";

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
}

/// Inputs to [`compile`] that are not part of the query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Reference time for snooze comparisons.
    pub now: DateTime<Utc>,
    /// Page size; `None` selects every match.
    pub limit: Option<i64>,
    pub offset: i64,
    /// Select the raw thread and subject payloads.
    pub include_subject: bool,
}

impl CompileOptions {
    /// Options selecting every match, without payload columns.
    pub fn unbounded(now: DateTime<Utc>) -> Self {
        Self {
            now,
            limit: None,
            offset: 0,
            include_subject: false,
        }
    }

    /// Options for one page of results.
    pub fn page(now: DateTime<Utc>, limit: i64, offset: i64) -> Self {
        Self {
            now,
            limit: Some(limit),
            offset,
            include_subject: true,
        }
    }
}

/// A query lowered to SQL.
///
/// All statements rendered from it take the owning user id as their first
/// parameter, followed by [`CompiledQuery::params`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub scope: ViewScope,
    /// Boolean SQL expression over `n` (notifications) and `r` (repositories).
    pub where_sql: String,
    pub params: Vec<SqlValue>,
    pub limit: Option<i64>,
    pub offset: i64,
    pub include_subject: bool,
}

impl CompiledQuery {
    fn where_clause(&self) -> String {
        format!("WHERE n.user_id = ? AND {}", self.where_sql)
    }

    /// Paginated SELECT of full notification rows.
    pub fn select_sql(&self) -> String {
        let mut sql = format!(
            "SELECT {} {} {} {}",
            notification_columns(self.include_subject),
            FROM_CLAUSE,
            self.where_clause(),
            ORDER_CLAUSE
        );
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit.max(0), self.offset.max(0)));
        }
        sql
    }

    /// COUNT over the same match set, ignoring pagination.
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) {} {}", FROM_CLAUSE, self.where_clause())
    }

    /// Sub-select of matching row ids, ignoring pagination.
    pub fn id_subquery_sql(&self) -> String {
        format!("SELECT n.id {} {}", FROM_CLAUSE, self.where_clause())
    }

    /// Matching GitHub thread ids in list order, ignoring pagination.
    pub fn github_ids_sql(&self) -> String {
        format!(
            "SELECT n.github_id {} {} {}",
            FROM_CLAUSE,
            self.where_clause(),
            ORDER_CLAUSE
        )
    }
}

/// Compiles a parsed query.
///
/// The view scope is extracted with [`apply_default_scope`] and ANDed in
/// once, ahead of the user's terms. Every parser-produced AST compiles.
pub fn compile(query: &Query, options: &CompileOptions) -> QueryResult<CompiledQuery> {
    let scoped = apply_default_scope(query);
    let mut builder = SqlBuilder::new(options.now);

    let scope_sql = builder.emit(&Predicate::for_scope(scoped.scope));
    let where_sql = if scoped.filter.is_all() {
        scope_sql
    } else {
        let filter_sql = builder.emit(&Predicate::lower(&scoped.filter));
        format!("{} AND {}", scope_sql, filter_sql)
    };

    Ok(CompiledQuery {
        scope: scoped.scope,
        where_sql,
        params: builder.params,
        limit: options.limit,
        offset: options.offset,
        include_subject: options.include_subject,
    })
}

struct SqlBuilder {
    now: String,
    params: Vec<SqlValue>,
}

impl SqlBuilder {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: format_timestamp(now),
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: String) {
        self.params.push(SqlValue::Text(value));
    }

    fn emit(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Always => "1".to_string(),
            Predicate::Never => "0".to_string(),
            Predicate::Flag { column, value } => {
                format!("{} = {}", flag_sql(*column), if *value { 1 } else { 0 })
            }
            Predicate::Snoozed(true) => {
                self.bind(self.now.clone());
                "(n.snoozed_until IS NOT NULL AND n.snoozed_until > ?)".to_string()
            }
            Predicate::Snoozed(false) => {
                self.bind(self.now.clone());
                "(n.snoozed_until IS NULL OR n.snoozed_until <= ?)".to_string()
            }
            Predicate::Contains { column, needle } => {
                self.bind(format!("%{}%", escape_like(needle)));
                format!("{} LIKE ? ESCAPE '\\'", text_sql(*column))
            }
            Predicate::StartsWith { column, prefix } => {
                self.bind(format!("{}%", escape_like(prefix)));
                format!("{} LIKE ? ESCAPE '\\'", text_sql(*column))
            }
            Predicate::Equals { column, value } => {
                self.bind(value.clone());
                format!("LOWER({}) = ?", text_sql(*column))
            }
            Predicate::TagContains(needle) => {
                self.bind(format!("%{}%", escape_like(needle)));
                "EXISTS (SELECT 1 FROM tag_assignments ta JOIN tags t ON t.id = ta.tag_id \
                 WHERE ta.entity_type = 'notification' AND ta.entity_id = n.id \
                 AND t.slug LIKE ? ESCAPE '\\')"
                    .to_string()
            }
            Predicate::Any(parts) => self.join(parts, " OR ", "0"),
            Predicate::All(parts) => self.join(parts, " AND ", "1"),
            Predicate::Not(inner) => format!("NOT ({})", self.emit(inner)),
        }
    }

    fn join(&mut self, parts: &[Predicate], separator: &str, empty: &str) -> String {
        if parts.is_empty() {
            return empty.to_string();
        }
        let rendered: Vec<String> = parts.iter().map(|p| self.emit(p)).collect();
        format!("({})", rendered.join(separator))
    }
}

fn flag_sql(column: FlagColumn) -> &'static str {
    match column {
        FlagColumn::Read => "n.is_read",
        FlagColumn::Archived => "n.archived",
        FlagColumn::Starred => "n.starred",
        FlagColumn::Muted => "n.muted",
        FlagColumn::Filtered => "n.filtered",
        FlagColumn::Merged => "COALESCE(n.subject_merged, 0)",
    }
}

fn text_sql(column: TextColumn) -> &'static str {
    match column {
        TextColumn::SubjectTitle => "n.subject_title",
        TextColumn::SubjectType => "n.subject_type",
        TextColumn::RepoFullName => "COALESCE(r.full_name, '')",
        TextColumn::AuthorLogin => "COALESCE(n.author_login, '')",
        TextColumn::SubjectState => "COALESCE(n.subject_state, '')",
        TextColumn::SubjectNumber => "COALESCE(CAST(n.subject_number AS TEXT), '')",
        TextColumn::Reason => "COALESCE(n.reason, '')",
        TextColumn::StateReason => "COALESCE(n.subject_state_reason, '')",
    }
}

/// Escapes LIKE wildcards so user text matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn compiled(input: &str) -> CompiledQuery {
        compile(&parse(input).query, &CompileOptions::page(now(), 50, 0)).unwrap()
    }

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    #[test]
    fn test_empty_query_is_inbox_scope_only() {
        let c = compiled("");
        assert_eq!(c.scope, ViewScope::Inbox);
        assert_eq!(
            c.where_sql,
            "(n.archived = 0 AND (n.snoozed_until IS NULL OR n.snoozed_until <= ?) \
             AND n.muted = 0 AND n.filtered = 0)"
        );
        assert_eq!(c.params, vec![text("2024-06-01T12:00:00Z")]);
    }

    #[test]
    fn test_scope_is_injected_exactly_once() {
        let c = compiled("is:unread repo:cli author:me");
        assert_eq!(c.where_sql.matches("n.archived = 0").count(), 1);
        assert!(c.where_sql.starts_with("(n.archived = 0"));
    }

    #[test]
    fn test_explicit_scope_replaces_default() {
        let c = compiled("in:archive is:unread");
        assert_eq!(c.scope, ViewScope::Archive);
        assert_eq!(
            c.where_sql,
            "(n.archived = 1 AND n.muted = 0) AND n.is_read = 0"
        );
        assert!(c.params.is_empty());

        let c = compiled("in:anywhere");
        assert_eq!(c.where_sql, "1");
    }

    #[test]
    fn test_contains_is_escaped_and_parameterized() {
        let c = compiled("in:anywhere repo:100%_done");
        assert_eq!(c.where_sql, "1 AND COALESCE(r.full_name, '') LIKE ? ESCAPE '\\'");
        assert_eq!(c.params, vec![text("%100\\%\\_done%")]);
    }

    #[test]
    fn test_negation_and_or_list() {
        let c = compiled("in:anywhere -reason:mention,comment");
        assert_eq!(
            c.where_sql,
            "1 AND NOT ((LOWER(COALESCE(n.reason, '')) = ? OR LOWER(COALESCE(n.reason, '')) = ?))"
        );
        assert_eq!(c.params, vec![text("mention"), text("comment")]);
    }

    #[test]
    fn test_unknown_enum_value_compiles_to_false() {
        let c = compiled("in:anywhere type:Gist");
        assert_eq!(c.where_sql, "1 AND 0");
    }

    #[test]
    fn test_tags_use_exists_subquery() {
        let c = compiled("in:anywhere tags:urgent");
        assert!(c.where_sql.contains("EXISTS (SELECT 1 FROM tag_assignments ta"));
        assert_eq!(c.params, vec![text("%urgent%")]);
    }

    #[test]
    fn test_select_sql_orders_and_paginates() {
        let c = compile(&Query::All, &CompileOptions::page(now(), 25, 50)).unwrap();
        let sql = c.select_sql();
        assert!(sql.contains("WHERE n.user_id = ? AND "));
        assert!(sql.ends_with("ORDER BY n.effective_sort_date DESC, n.id DESC LIMIT 25 OFFSET 50"));
        assert!(sql.contains("n.subject_raw"));
    }

    #[test]
    fn test_select_sql_without_subject_nulls_payloads() {
        let c = compile(&Query::All, &CompileOptions::unbounded(now())).unwrap();
        let sql = c.select_sql();
        assert!(sql.contains("NULL AS payload"));
        assert!(sql.contains("NULL AS subject_raw"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_count_sql_shares_where_clause() {
        let c = compiled("is:starred");
        assert_eq!(
            c.count_sql(),
            format!(
                "SELECT COUNT(*) FROM notifications n LEFT JOIN repositories r ON r.id = n.repository_id WHERE n.user_id = ? AND {}",
                c.where_sql
            )
        );
        assert!(!c.count_sql().contains("LIMIT"));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like(r"a%b_c\d"), r"a\%b\_c\\d");
    }
}
