//! SQLite implementation of [`Store`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;
use uuid::Uuid;

use super::{
    NewRule, NewTag, NewView, NotificationUpsert, PullRequestUpsert, RepositoryUpsert, Result,
    StatusChange, Store, StoreError, SubjectFields, NOTIFICATION_ENTITY,
};
use crate::models::{
    format_timestamp, Notification, PullRequest, Repository, Rule, RuleActions, SyncState, Tag,
    View,
};
use crate::query::{notification_columns, CompiledQuery, SqlValue};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS repositories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        github_id INTEGER,
        node_id TEXT,
        name TEXT NOT NULL,
        full_name TEXT NOT NULL,
        owner_login TEXT,
        owner_id INTEGER,
        owner_avatar_url TEXT,
        owner_html_url TEXT,
        private INTEGER,
        description TEXT,
        html_url TEXT,
        fork INTEGER,
        visibility TEXT,
        default_branch TEXT,
        archived INTEGER,
        raw TEXT,
        UNIQUE (user_id, full_name)
    )",
    "CREATE TABLE IF NOT EXISTS pull_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        repository_id INTEGER NOT NULL REFERENCES repositories (id),
        github_id INTEGER,
        node_id TEXT,
        number INTEGER NOT NULL,
        title TEXT,
        state TEXT,
        draft INTEGER,
        merged INTEGER,
        author_login TEXT,
        author_id INTEGER,
        created_at TEXT,
        updated_at TEXT,
        closed_at TEXT,
        merged_at TEXT,
        UNIQUE (user_id, repository_id, number)
    )",
    "CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        github_id TEXT NOT NULL,
        repository_id INTEGER REFERENCES repositories (id),
        pull_request_id INTEGER REFERENCES pull_requests (id),
        subject_type TEXT NOT NULL,
        subject_title TEXT NOT NULL,
        subject_url TEXT,
        subject_latest_comment_url TEXT,
        reason TEXT,
        github_unread INTEGER,
        github_updated_at TEXT,
        github_last_read_at TEXT,
        github_url TEXT,
        github_subscription_url TEXT,
        imported_at TEXT NOT NULL,
        payload TEXT,
        subject_raw TEXT,
        subject_fetched_at TEXT,
        author_login TEXT,
        author_id INTEGER,
        subject_number INTEGER,
        subject_state TEXT,
        subject_merged INTEGER,
        subject_state_reason TEXT,
        is_read INTEGER NOT NULL DEFAULT 0,
        archived INTEGER NOT NULL DEFAULT 0,
        starred INTEGER NOT NULL DEFAULT 0,
        muted INTEGER NOT NULL DEFAULT 0,
        filtered INTEGER NOT NULL DEFAULT 0,
        snoozed_until TEXT,
        snoozed_at TEXT,
        effective_sort_date TEXT NOT NULL,
        UNIQUE (user_id, github_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_notifications_user_sort
        ON notifications (user_id, effective_sort_date DESC, id DESC)",
    "CREATE TABLE IF NOT EXISTS tags (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        slug TEXT NOT NULL,
        color TEXT,
        description TEXT,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, slug)
    )",
    "CREATE TABLE IF NOT EXISTS tag_assignments (
        user_id TEXT NOT NULL,
        tag_id TEXT NOT NULL REFERENCES tags (id) ON DELETE CASCADE,
        entity_type TEXT NOT NULL,
        entity_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (tag_id, entity_type, entity_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_tag_assignments_entity
        ON tag_assignments (entity_type, entity_id)",
    "CREATE TABLE IF NOT EXISTS views (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        slug TEXT NOT NULL,
        description TEXT,
        icon TEXT,
        query TEXT NOT NULL,
        is_default INTEGER NOT NULL DEFAULT 0,
        display_order INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (user_id, slug)
    )",
    "CREATE TABLE IF NOT EXISTS rules (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL COLLATE NOCASE,
        description TEXT,
        query TEXT,
        view_id TEXT REFERENCES views (id) ON DELETE CASCADE,
        actions TEXT NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 1,
        display_order INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (user_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS sync_state (
        user_id TEXT PRIMARY KEY,
        last_successful_poll TEXT,
        latest_notification_at TEXT,
        initial_sync_completed_at TEXT,
        oldest_notification_synced_at TEXT
    )",
];

const REPOSITORY_COLUMNS: &str = "id, user_id, github_id, node_id, name, full_name, owner_login, \
     owner_id, owner_avatar_url, owner_html_url, private, description, html_url, fork, \
     visibility, default_branch, archived, raw";

const PULL_REQUEST_COLUMNS: &str = "id, user_id, repository_id, github_id, node_id, number, \
     title, state, draft, merged, author_login, author_id, created_at, updated_at, closed_at, \
     merged_at";

const TAG_COLUMNS: &str = "t.id, t.user_id, t.name, t.slug, t.color, t.description, t.created_at";

const VIEW_COLUMNS: &str = "id, user_id, name, slug, description, icon, query, is_default, \
     display_order, created_at, updated_at";

const RULE_COLUMNS: &str = "id, user_id, name, description, query, view_id, actions, enabled, \
     display_order, created_at, updated_at";

/// Resets the sort date of a row that is no longer snoozed.
const RESTORE_SORT_DATE: &str = "effective_sort_date = COALESCE(github_updated_at, imported_at)";

/// Binds the owning user id, then a compiled query's parameters.
macro_rules! bind_compiled {
    ($query:expr, $user_id:expr, $compiled:expr) => {{
        let mut query = $query.bind($user_id);
        for param in &$compiled.params {
            query = match param {
                SqlValue::Text(value) => query.bind(value.as_str()),
                SqlValue::Integer(value) => query.bind(*value),
            };
        }
        query
    }};
}

/// A [`Store`] backed by a SQLite connection pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `url` and applies the schema.
    ///
    /// `url` is a sqlx SQLite URL such as `sqlite://notibox.db` or
    /// `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options: SqliteConnectOptions = url
            .parse::<SqliteConnectOptions>()
            .map_err(StoreError::Database)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives and dies with its single connection.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };
        let pool = pool_options.connect_with(options).await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Creates the schema. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!(tables = SCHEMA.len(), "schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// The SET clause for a status change and the values it binds, in order.
fn status_set_clause(change: StatusChange, now: DateTime<Utc>) -> (String, Vec<String>) {
    let clear_snooze = format!("snoozed_until = NULL, snoozed_at = NULL, {}", RESTORE_SORT_DATE);
    match change {
        StatusChange::MarkRead => ("is_read = 1".to_string(), vec![]),
        StatusChange::MarkUnread => ("is_read = 0".to_string(), vec![]),
        StatusChange::Archive => (format!("archived = 1, {}", clear_snooze), vec![]),
        StatusChange::Unarchive => ("archived = 0".to_string(), vec![]),
        StatusChange::Mute => (format!("muted = 1, {}", clear_snooze), vec![]),
        StatusChange::Unmute => ("muted = 0".to_string(), vec![]),
        StatusChange::Star => ("starred = 1".to_string(), vec![]),
        StatusChange::Unstar => ("starred = 0".to_string(), vec![]),
        StatusChange::Filter => ("filtered = 1".to_string(), vec![]),
        StatusChange::Unfilter => ("filtered = 0".to_string(), vec![]),
        StatusChange::Snooze { until } => (
            "snoozed_until = ?, snoozed_at = ?, effective_sort_date = ?".to_string(),
            vec![
                format_timestamp(until),
                format_timestamp(now),
                format_timestamp(until),
            ],
        ),
        StatusChange::Unsnooze => (clear_snooze, vec![]),
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn opt_timestamp(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(format_timestamp)
}

fn actions_json(actions: &RuleActions) -> Result<String> {
    serde_json::to_string(actions).map_err(|err| StoreError::Encode(err.to_string()))
}

impl SqliteStore {
    async fn fetch_notification(
        &self,
        user_id: &str,
        github_id: &str,
    ) -> Result<Option<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications n WHERE n.user_id = ? AND n.github_id = ?",
            notification_columns(true)
        );
        let row = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(github_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn fetch_rule(&self, user_id: &str, rule_id: &str) -> Result<Option<Rule>> {
        let sql = format!("SELECT {} FROM rules WHERE user_id = ? AND id = ?", RULE_COLUMNS);
        let rule = sqlx::query_as::<_, Rule>(&sql)
            .bind(user_id)
            .bind(rule_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(rule)
    }

    async fn fetch_view(&self, user_id: &str, column: &str, value: &str) -> Result<Option<View>> {
        let sql = format!(
            "SELECT {} FROM views WHERE user_id = ? AND {} = ?",
            VIEW_COLUMNS, column
        );
        let view = sqlx::query_as::<_, View>(&sql)
            .bind(user_id)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(view)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn list_notifications(
        &self,
        user_id: &str,
        query: &CompiledQuery,
    ) -> Result<Vec<Notification>> {
        let sql = query.select_sql();
        let rows = bind_compiled!(sqlx::query_as::<_, Notification>(&sql), user_id, query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_notifications(&self, user_id: &str, query: &CompiledQuery) -> Result<i64> {
        let sql = query.count_sql();
        let count = bind_compiled!(sqlx::query_scalar::<_, i64>(&sql), user_id, query)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_notification_ids(
        &self,
        user_id: &str,
        query: &CompiledQuery,
    ) -> Result<Vec<String>> {
        let sql = query.github_ids_sql();
        let ids = bind_compiled!(sqlx::query_scalar::<_, String>(&sql), user_id, query)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn get_notification(
        &self,
        user_id: &str,
        github_id: &str,
    ) -> Result<Option<Notification>> {
        self.fetch_notification(user_id, github_id).await
    }

    async fn get_notifications(
        &self,
        user_id: &str,
        github_ids: &[String],
    ) -> Result<Vec<Notification>> {
        if github_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM notifications n WHERE n.user_id = ? AND n.github_id IN ({}) \
             ORDER BY n.id",
            notification_columns(false),
            placeholders(github_ids.len())
        );
        let mut query = sqlx::query_as::<_, Notification>(&sql).bind(user_id);
        for id in github_ids {
            query = query.bind(id.as_str());
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn update_notification_status(
        &self,
        user_id: &str,
        github_id: &str,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>> {
        let (set_clause, values) = status_set_clause(change, now);
        let sql = format!(
            "UPDATE notifications SET {} WHERE user_id = ? AND github_id = ?",
            set_clause
        );
        let mut update = sqlx::query(&sql);
        for value in &values {
            update = update.bind(value.as_str());
        }
        let result = update
            .bind(user_id)
            .bind(github_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_notification(user_id, github_id).await
    }

    async fn bulk_update_by_ids(
        &self,
        user_id: &str,
        github_ids: &[String],
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        if github_ids.is_empty() {
            return Ok(0);
        }
        let (set_clause, values) = status_set_clause(change, now);
        let sql = format!(
            "UPDATE notifications SET {} WHERE user_id = ? AND github_id IN ({})",
            set_clause,
            placeholders(github_ids.len())
        );
        let mut update = sqlx::query(&sql);
        for value in &values {
            update = update.bind(value.as_str());
        }
        update = update.bind(user_id);
        for id in github_ids {
            update = update.bind(id.as_str());
        }
        let result = update.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn bulk_update_by_query(
        &self,
        user_id: &str,
        query: &CompiledQuery,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let (set_clause, values) = status_set_clause(change, now);
        let sql = format!(
            "UPDATE notifications SET {} WHERE user_id = ? AND id IN ({})",
            set_clause,
            query.id_subquery_sql()
        );
        let mut update = sqlx::query(&sql);
        for value in &values {
            update = update.bind(value.as_str());
        }
        update = update.bind(user_id);
        let result = bind_compiled!(update, user_id, query)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_notification(
        &self,
        input: &NotificationUpsert,
        now: DateTime<Utc>,
    ) -> Result<Notification> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(Option<String>, bool)> = sqlx::query_as(
            "SELECT github_updated_at, muted FROM notifications WHERE user_id = ? AND github_id = ?",
        )
        .bind(&input.user_id)
        .bind(&input.github_id)
        .fetch_optional(&mut *tx)
        .await?;

        let updated_at = opt_timestamp(input.github_updated_at);
        let subject = &input.subject;
        sqlx::query(
            "INSERT INTO notifications (
                user_id, github_id, repository_id, pull_request_id, subject_type, subject_title,
                subject_url, subject_latest_comment_url, reason, github_unread, github_updated_at,
                github_last_read_at, github_url, github_subscription_url, imported_at, payload,
                subject_raw, subject_fetched_at, author_login, author_id, subject_number,
                subject_state, subject_merged, subject_state_reason, effective_sort_date
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                COALESCE(?, ?))
            ON CONFLICT (user_id, github_id) DO UPDATE SET
                repository_id = excluded.repository_id,
                pull_request_id = COALESCE(excluded.pull_request_id, notifications.pull_request_id),
                subject_type = excluded.subject_type,
                subject_title = excluded.subject_title,
                subject_url = excluded.subject_url,
                subject_latest_comment_url = excluded.subject_latest_comment_url,
                reason = excluded.reason,
                github_unread = excluded.github_unread,
                github_updated_at = excluded.github_updated_at,
                github_last_read_at = excluded.github_last_read_at,
                github_url = excluded.github_url,
                github_subscription_url = excluded.github_subscription_url,
                payload = excluded.payload,
                subject_raw = COALESCE(excluded.subject_raw, notifications.subject_raw),
                subject_fetched_at = COALESCE(excluded.subject_fetched_at, notifications.subject_fetched_at),
                author_login = COALESCE(excluded.author_login, notifications.author_login),
                author_id = COALESCE(excluded.author_id, notifications.author_id),
                subject_number = COALESCE(excluded.subject_number, notifications.subject_number),
                subject_state = COALESCE(excluded.subject_state, notifications.subject_state),
                subject_merged = COALESCE(excluded.subject_merged, notifications.subject_merged),
                subject_state_reason = COALESCE(excluded.subject_state_reason, notifications.subject_state_reason),
                effective_sort_date = CASE
                    WHEN notifications.snoozed_until IS NOT NULL THEN notifications.effective_sort_date
                    ELSE COALESCE(excluded.github_updated_at, notifications.effective_sort_date)
                END",
        )
        .bind(&input.user_id)
        .bind(&input.github_id)
        .bind(input.repository_id)
        .bind(subject.pull_request_id)
        .bind(&input.subject_type)
        .bind(&input.subject_title)
        .bind(&input.subject_url)
        .bind(&input.subject_latest_comment_url)
        .bind(&input.reason)
        .bind(input.github_unread)
        .bind(&updated_at)
        .bind(opt_timestamp(input.github_last_read_at))
        .bind(&input.github_url)
        .bind(&input.github_subscription_url)
        .bind(format_timestamp(now))
        .bind(&input.payload)
        .bind(&subject.subject_raw)
        .bind(opt_timestamp(subject.subject_fetched_at))
        .bind(&subject.author_login)
        .bind(subject.author_id)
        .bind(subject.subject_number)
        .bind(&subject.subject_state)
        .bind(subject.subject_merged)
        .bind(&subject.subject_state_reason)
        .bind(&updated_at)
        .bind(format_timestamp(now))
        .execute(&mut *tx)
        .await?;

        // Muted threads stay quiet; others resurface when GitHub moves them.
        let should_reset = matches!(
            (&existing, &updated_at),
            (Some((previous, false)), Some(current)) if previous.as_ref() != Some(current)
        );
        if should_reset {
            debug!(github_id = %input.github_id, "thread updated upstream, resetting status");
            sqlx::query(
                "UPDATE notifications SET is_read = 0, archived = 0, snoozed_until = NULL, \
                 snoozed_at = NULL, effective_sort_date = COALESCE(github_updated_at, imported_at) \
                 WHERE user_id = ? AND github_id = ?",
            )
            .bind(&input.user_id)
            .bind(&input.github_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.fetch_notification(&input.user_id, &input.github_id)
            .await?
            .ok_or_else(|| StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_subject(
        &self,
        user_id: &str,
        github_id: &str,
        subject: &SubjectFields,
    ) -> Result<Option<Notification>> {
        let result = sqlx::query(
            "UPDATE notifications SET subject_raw = ?, subject_fetched_at = ?, \
             pull_request_id = COALESCE(?, pull_request_id), author_login = ?, author_id = ?, \
             subject_number = ?, subject_state = ?, subject_merged = ?, subject_state_reason = ? \
             WHERE user_id = ? AND github_id = ?",
        )
        .bind(&subject.subject_raw)
        .bind(opt_timestamp(subject.subject_fetched_at))
        .bind(subject.pull_request_id)
        .bind(&subject.author_login)
        .bind(subject.author_id)
        .bind(subject.subject_number)
        .bind(&subject.subject_state)
        .bind(subject.subject_merged)
        .bind(&subject.subject_state_reason)
        .bind(user_id)
        .bind(github_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_notification(user_id, github_id).await
    }

    async fn upsert_repository(&self, input: &RepositoryUpsert) -> Result<Repository> {
        let sql = format!(
            "INSERT INTO repositories (
                user_id, github_id, node_id, name, full_name, owner_login, owner_id,
                owner_avatar_url, owner_html_url, private, description, html_url, fork,
                visibility, default_branch, archived, raw
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, full_name) DO UPDATE SET
                github_id = excluded.github_id,
                node_id = excluded.node_id,
                name = excluded.name,
                owner_login = excluded.owner_login,
                owner_id = excluded.owner_id,
                owner_avatar_url = excluded.owner_avatar_url,
                owner_html_url = excluded.owner_html_url,
                private = excluded.private,
                description = excluded.description,
                html_url = excluded.html_url,
                fork = excluded.fork,
                visibility = excluded.visibility,
                default_branch = excluded.default_branch,
                archived = excluded.archived,
                raw = excluded.raw
            RETURNING {}",
            REPOSITORY_COLUMNS
        );
        let repo = sqlx::query_as::<_, Repository>(&sql)
            .bind(&input.user_id)
            .bind(input.github_id)
            .bind(&input.node_id)
            .bind(&input.name)
            .bind(&input.full_name)
            .bind(&input.owner_login)
            .bind(input.owner_id)
            .bind(&input.owner_avatar_url)
            .bind(&input.owner_html_url)
            .bind(input.private)
            .bind(&input.description)
            .bind(&input.html_url)
            .bind(input.fork)
            .bind(&input.visibility)
            .bind(&input.default_branch)
            .bind(input.archived)
            .bind(&input.raw)
            .fetch_one(&self.pool)
            .await?;
        Ok(repo)
    }

    async fn upsert_pull_request(&self, input: &PullRequestUpsert) -> Result<PullRequest> {
        let sql = format!(
            "INSERT INTO pull_requests (
                user_id, repository_id, github_id, node_id, number, title, state, draft, merged,
                author_login, author_id, created_at, updated_at, closed_at, merged_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, repository_id, number) DO UPDATE SET
                github_id = excluded.github_id,
                node_id = excluded.node_id,
                title = excluded.title,
                state = excluded.state,
                draft = excluded.draft,
                merged = excluded.merged,
                author_login = excluded.author_login,
                author_id = excluded.author_id,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                closed_at = excluded.closed_at,
                merged_at = excluded.merged_at
            RETURNING {}",
            PULL_REQUEST_COLUMNS
        );
        let pr = sqlx::query_as::<_, PullRequest>(&sql)
            .bind(&input.user_id)
            .bind(input.repository_id)
            .bind(input.github_id)
            .bind(&input.node_id)
            .bind(input.number)
            .bind(&input.title)
            .bind(&input.state)
            .bind(input.draft)
            .bind(input.merged)
            .bind(&input.author_login)
            .bind(input.author_id)
            .bind(opt_timestamp(input.created_at))
            .bind(opt_timestamp(input.updated_at))
            .bind(opt_timestamp(input.closed_at))
            .bind(opt_timestamp(input.merged_at))
            .fetch_one(&self.pool)
            .await?;
        Ok(pr)
    }

    async fn list_repositories(&self, user_id: &str, ids: &[i64]) -> Result<Vec<Repository>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM repositories WHERE user_id = ? AND id IN ({})",
            REPOSITORY_COLUMNS,
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, Repository>(&sql).bind(user_id);
        for id in ids {
            query = query.bind(*id);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn get_repository(&self, user_id: &str, id: i64) -> Result<Option<Repository>> {
        let sql = format!(
            "SELECT {} FROM repositories WHERE user_id = ? AND id = ?",
            REPOSITORY_COLUMNS
        );
        let repo = sqlx::query_as::<_, Repository>(&sql)
            .bind(user_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(repo)
    }

    async fn list_tags(&self, user_id: &str) -> Result<Vec<Tag>> {
        let sql = format!(
            "SELECT {} FROM tags t WHERE t.user_id = ? ORDER BY t.name",
            TAG_COLUMNS
        );
        let tags = sqlx::query_as::<_, Tag>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    async fn get_tag(&self, user_id: &str, tag_id: &str) -> Result<Option<Tag>> {
        let sql = format!("SELECT {} FROM tags t WHERE t.user_id = ? AND t.id = ?", TAG_COLUMNS);
        let tag = sqlx::query_as::<_, Tag>(&sql)
            .bind(user_id)
            .bind(tag_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tag)
    }

    async fn get_tag_by_slug(&self, user_id: &str, slug: &str) -> Result<Option<Tag>> {
        let sql = format!(
            "SELECT {} FROM tags t WHERE t.user_id = ? AND t.slug = ?",
            TAG_COLUMNS
        );
        let tag = sqlx::query_as::<_, Tag>(&sql)
            .bind(user_id)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tag)
    }

    async fn create_tag(&self, input: &NewTag, now: DateTime<Utc>) -> Result<Tag> {
        let tag = Tag {
            id: Uuid::new_v4().to_string(),
            user_id: input.user_id.clone(),
            name: input.name.clone(),
            slug: input.slug.clone(),
            color: input.color.clone(),
            description: input.description.clone(),
            created_at: now,
        };
        sqlx::query(
            "INSERT INTO tags (id, user_id, name, slug, color, description, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&tag.id)
        .bind(&tag.user_id)
        .bind(&tag.name)
        .bind(&tag.slug)
        .bind(&tag.color)
        .bind(&tag.description)
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await?;
        Ok(tag)
    }

    async fn list_tags_for_notifications(
        &self,
        user_id: &str,
        notification_ids: &[i64],
    ) -> Result<Vec<(i64, Tag)>> {
        if notification_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT ta.entity_id, {} FROM tag_assignments ta JOIN tags t ON t.id = ta.tag_id \
             WHERE ta.user_id = ? AND ta.entity_type = ? AND ta.entity_id IN ({}) \
             ORDER BY ta.entity_id, t.name",
            TAG_COLUMNS,
            placeholders(notification_ids.len())
        );
        let mut query = sqlx::query_as::<_, TagAssignmentRow>(&sql)
            .bind(user_id)
            .bind(NOTIFICATION_ENTITY);
        for id in notification_ids {
            query = query.bind(*id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|row| (row.entity_id, row.tag)).collect())
    }

    async fn assign_tag(
        &self,
        user_id: &str,
        tag_id: &str,
        notification_id: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO tag_assignments (user_id, tag_id, entity_type, entity_id, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(tag_id)
        .bind(NOTIFICATION_ENTITY)
        .bind(notification_id)
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_tag(&self, user_id: &str, tag_id: &str, notification_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM tag_assignments \
             WHERE user_id = ? AND tag_id = ? AND entity_type = ? AND entity_id = ?",
        )
        .bind(user_id)
        .bind(tag_id)
        .bind(NOTIFICATION_ENTITY)
        .bind(notification_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_rules(&self, user_id: &str) -> Result<Vec<Rule>> {
        let sql = format!(
            "SELECT {} FROM rules WHERE user_id = ? ORDER BY display_order, name",
            RULE_COLUMNS
        );
        let rules = sqlx::query_as::<_, Rule>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rules)
    }

    async fn get_rule(&self, user_id: &str, rule_id: &str) -> Result<Option<Rule>> {
        self.fetch_rule(user_id, rule_id).await
    }

    async fn create_rule(&self, input: &NewRule, now: DateTime<Utc>) -> Result<Rule> {
        let rule = Rule {
            id: Uuid::new_v4().to_string(),
            user_id: input.user_id.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            query: input.query.clone(),
            view_id: input.view_id.clone(),
            actions: input.actions.clone(),
            enabled: input.enabled,
            display_order: input.display_order,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO rules (
                id, user_id, name, description, query, view_id, actions, enabled,
                display_order, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&rule.id)
        .bind(&rule.user_id)
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(&rule.query)
        .bind(&rule.view_id)
        .bind(actions_json(&rule.actions)?)
        .bind(rule.enabled)
        .bind(rule.display_order)
        .bind(format_timestamp(now))
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await?;
        Ok(rule)
    }

    async fn update_rule(&self, rule: &Rule, now: DateTime<Utc>) -> Result<Option<Rule>> {
        let result = sqlx::query(
            "UPDATE rules SET name = ?, description = ?, query = ?, view_id = ?, actions = ?,
                enabled = ?, display_order = ?, updated_at = ?
             WHERE user_id = ? AND id = ?",
        )
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(&rule.query)
        .bind(&rule.view_id)
        .bind(actions_json(&rule.actions)?)
        .bind(rule.enabled)
        .bind(rule.display_order)
        .bind(format_timestamp(now))
        .bind(&rule.user_id)
        .bind(&rule.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_rule(&rule.user_id, &rule.id).await
    }

    async fn delete_rule(&self, user_id: &str, rule_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM rules WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(rule_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_rules_for_view(&self, user_id: &str, view_id: &str) -> Result<Vec<Rule>> {
        let sql = format!(
            "SELECT {} FROM rules WHERE user_id = ? AND view_id = ? ORDER BY display_order, name",
            RULE_COLUMNS
        );
        let rules = sqlx::query_as::<_, Rule>(&sql)
            .bind(user_id)
            .bind(view_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rules)
    }

    async fn list_views(&self, user_id: &str) -> Result<Vec<View>> {
        let sql = format!(
            "SELECT {} FROM views WHERE user_id = ? ORDER BY display_order, name",
            VIEW_COLUMNS
        );
        let views = sqlx::query_as::<_, View>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(views)
    }

    async fn get_view(&self, user_id: &str, view_id: &str) -> Result<Option<View>> {
        self.fetch_view(user_id, "id", view_id).await
    }

    async fn get_view_by_slug(&self, user_id: &str, slug: &str) -> Result<Option<View>> {
        self.fetch_view(user_id, "slug", slug).await
    }

    async fn create_view(&self, input: &NewView, now: DateTime<Utc>) -> Result<View> {
        let view = View {
            id: Uuid::new_v4().to_string(),
            user_id: input.user_id.clone(),
            name: input.name.clone(),
            slug: input.slug.clone(),
            description: input.description.clone(),
            icon: input.icon.clone(),
            query: input.query.clone(),
            is_default: input.is_default,
            display_order: input.display_order,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO views (
                id, user_id, name, slug, description, icon, query, is_default,
                display_order, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&view.id)
        .bind(&view.user_id)
        .bind(&view.name)
        .bind(&view.slug)
        .bind(&view.description)
        .bind(&view.icon)
        .bind(&view.query)
        .bind(view.is_default)
        .bind(view.display_order)
        .bind(format_timestamp(now))
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await?;
        Ok(view)
    }

    async fn update_view(&self, view: &View, now: DateTime<Utc>) -> Result<Option<View>> {
        let result = sqlx::query(
            "UPDATE views SET name = ?, slug = ?, description = ?, icon = ?, query = ?,
                is_default = ?, display_order = ?, updated_at = ?
             WHERE user_id = ? AND id = ?",
        )
        .bind(&view.name)
        .bind(&view.slug)
        .bind(&view.description)
        .bind(&view.icon)
        .bind(&view.query)
        .bind(view.is_default)
        .bind(view.display_order)
        .bind(format_timestamp(now))
        .bind(&view.user_id)
        .bind(&view.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_view(&view.user_id, "id", &view.id).await
    }

    async fn delete_view(&self, user_id: &str, view_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM views WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(view_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_sync_state(&self, user_id: &str) -> Result<Option<SyncState>> {
        let state = sqlx::query_as::<_, SyncState>(
            "SELECT user_id, last_successful_poll, latest_notification_at, \
             initial_sync_completed_at, oldest_notification_synced_at \
             FROM sync_state WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(state)
    }

    async fn upsert_sync_state(&self, state: &SyncState) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_state (
                user_id, last_successful_poll, latest_notification_at,
                initial_sync_completed_at, oldest_notification_synced_at
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                last_successful_poll = excluded.last_successful_poll,
                latest_notification_at = excluded.latest_notification_at,
                initial_sync_completed_at = excluded.initial_sync_completed_at,
                oldest_notification_synced_at = excluded.oldest_notification_synced_at",
        )
        .bind(&state.user_id)
        .bind(opt_timestamp(state.last_successful_poll))
        .bind(opt_timestamp(state.latest_notification_at))
        .bind(opt_timestamp(state.initial_sync_completed_at))
        .bind(opt_timestamp(state.oldest_notification_synced_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct TagAssignmentRow {
    entity_id: i64,
    #[sqlx(flatten)]
    tag: Tag,
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
