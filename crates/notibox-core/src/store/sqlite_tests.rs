//! Tests for the SQLite store.

use super::*;
use crate::query::{compile, parse, CompileOptions};
use chrono::{Duration, TimeZone};

// ==================== Test Helpers ====================

const USER: &str = "user-1";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

async fn store() -> SqliteStore {
    SqliteStore::connect("sqlite::memory:").await.unwrap()
}

fn thread(github_id: &str, updated_at: DateTime<Utc>) -> NotificationUpsert {
    NotificationUpsert {
        user_id: USER.to_string(),
        github_id: github_id.to_string(),
        subject_type: "Issue".to_string(),
        subject_title: format!("Thread {github_id}"),
        reason: Some("mention".to_string()),
        github_unread: Some(true),
        github_updated_at: Some(updated_at),
        ..Default::default()
    }
}

fn compiled(query: &str, limit: i64, offset: i64) -> CompiledQuery {
    compile(&parse(query).query, &CompileOptions::page(now(), limit, offset)).unwrap()
}

fn github_ids(rows: &[Notification]) -> Vec<&str> {
    rows.iter().map(|n| n.github_id.as_str()).collect()
}

// ==================== Schema ====================

#[tokio::test]
async fn test_migrate_is_idempotent() {
    let store = store().await;
    store.migrate().await.unwrap();
    store.migrate().await.unwrap();
}

// ==================== Notifications ====================

#[tokio::test]
async fn test_upsert_inserts_and_sorts_by_updated_at() {
    let store = store().await;
    let updated = now() - Duration::hours(3);

    let n = store.upsert_notification(&thread("1", updated), now()).await.unwrap();

    assert_eq!(n.github_id, "1");
    assert_eq!(n.effective_sort_date, updated);
    assert_eq!(n.imported_at, now());
    assert!(!n.is_read);

    let fetched = store.get_notification(USER, "1").await.unwrap().unwrap();
    assert_eq!(fetched, n);
    assert!(store.get_notification("someone-else", "1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_upsert_without_change_keeps_status() {
    let store = store().await;
    let updated = now() - Duration::hours(3);
    store.upsert_notification(&thread("1", updated), now()).await.unwrap();
    store
        .update_notification_status(USER, "1", StatusChange::MarkRead, now())
        .await
        .unwrap();

    let n = store.upsert_notification(&thread("1", updated), now()).await.unwrap();
    assert!(n.is_read);
}

#[tokio::test]
async fn test_upsert_with_new_activity_resets_status() {
    let store = store().await;
    store
        .upsert_notification(&thread("1", now() - Duration::hours(3)), now())
        .await
        .unwrap();
    store
        .update_notification_status(USER, "1", StatusChange::MarkRead, now())
        .await
        .unwrap();
    store
        .update_notification_status(USER, "1", StatusChange::Archive, now())
        .await
        .unwrap();

    let newer = now() - Duration::hours(1);
    let n = store.upsert_notification(&thread("1", newer), now()).await.unwrap();

    assert!(!n.is_read);
    assert!(!n.archived);
    assert_eq!(n.effective_sort_date, newer);
}

#[tokio::test]
async fn test_upsert_with_new_activity_leaves_muted_alone() {
    let store = store().await;
    store
        .upsert_notification(&thread("1", now() - Duration::hours(3)), now())
        .await
        .unwrap();
    store
        .update_notification_status(USER, "1", StatusChange::MarkRead, now())
        .await
        .unwrap();
    store
        .update_notification_status(USER, "1", StatusChange::Mute, now())
        .await
        .unwrap();

    let n = store
        .upsert_notification(&thread("1", now() - Duration::hours(1)), now())
        .await
        .unwrap();
    assert!(n.is_read);
    assert!(n.muted);
}

#[tokio::test]
async fn test_snooze_moves_sort_date_and_archive_restores_it() {
    let store = store().await;
    let updated = now() - Duration::hours(3);
    store.upsert_notification(&thread("1", updated), now()).await.unwrap();

    let until = now() + Duration::hours(2);
    let n = store
        .update_notification_status(USER, "1", StatusChange::Snooze { until }, now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n.snoozed_until, Some(until));
    assert_eq!(n.snoozed_at, Some(now()));
    assert_eq!(n.effective_sort_date, until);

    let n = store
        .update_notification_status(USER, "1", StatusChange::Archive, now())
        .await
        .unwrap()
        .unwrap();
    assert!(n.archived);
    assert_eq!(n.snoozed_until, None);
    assert_eq!(n.snoozed_at, None);
    assert_eq!(n.effective_sort_date, updated);
}

#[tokio::test]
async fn test_status_update_on_missing_row_returns_none() {
    let store = store().await;
    let result = store
        .update_notification_status(USER, "missing", StatusChange::Star, now())
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_update_subject() {
    let store = store().await;
    store
        .upsert_notification(&thread("1", now()), now())
        .await
        .unwrap();

    let subject = SubjectFields {
        subject_raw: Some(r#"{"number":7}"#.to_string()),
        subject_fetched_at: Some(now()),
        author_login: Some("octocat".to_string()),
        subject_number: Some(7),
        subject_state: Some("closed".to_string()),
        subject_state_reason: Some("completed".to_string()),
        ..Default::default()
    };
    let n = store.update_subject(USER, "1", &subject).await.unwrap().unwrap();

    assert_eq!(n.author_login.as_deref(), Some("octocat"));
    assert_eq!(n.subject_number, Some(7));
    assert_eq!(n.subject_state_reason.as_deref(), Some("completed"));
    assert!(store.update_subject(USER, "2", &subject).await.unwrap().is_none());
}

// ==================== Listing ====================

#[tokio::test]
async fn test_list_orders_by_sort_date_then_id() {
    let store = store().await;
    let same = now() - Duration::hours(1);
    store.upsert_notification(&thread("a", same), now()).await.unwrap();
    store.upsert_notification(&thread("b", same), now()).await.unwrap();
    store
        .upsert_notification(&thread("c", now() - Duration::hours(5)), now())
        .await
        .unwrap();
    store
        .upsert_notification(&thread("d", now() - Duration::minutes(5)), now())
        .await
        .unwrap();

    let rows = store
        .list_notifications(USER, &compiled("", 10, 0))
        .await
        .unwrap();
    assert_eq!(github_ids(&rows), vec!["d", "b", "a", "c"]);
    assert_eq!(store.count_notifications(USER, &compiled("", 10, 0)).await.unwrap(), 4);

    let page = store
        .list_notifications(USER, &compiled("", 2, 2))
        .await
        .unwrap();
    assert_eq!(github_ids(&page), vec!["a", "c"]);
}

#[tokio::test]
async fn test_list_without_subject_omits_payloads() {
    let store = store().await;
    let mut input = thread("1", now());
    input.payload = Some("{}".to_string());
    store.upsert_notification(&input, now()).await.unwrap();

    let query = compile(&parse("").query, &CompileOptions::unbounded(now())).unwrap();
    let rows = store.list_notifications(USER, &query).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].payload, None);
}

#[tokio::test]
async fn test_list_joins_repository_for_repo_filter() {
    let store = store().await;
    let repo = store
        .upsert_repository(&RepositoryUpsert {
            user_id: USER.to_string(),
            name: "widgets".to_string(),
            full_name: "acme/widgets".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut input = thread("1", now());
    input.repository_id = Some(repo.id);
    store.upsert_notification(&input, now()).await.unwrap();
    store.upsert_notification(&thread("2", now()), now()).await.unwrap();

    let rows = store
        .list_notifications(USER, &compiled("org:acme", 10, 0))
        .await
        .unwrap();
    assert_eq!(github_ids(&rows), vec!["1"]);

    let rows = store
        .list_notifications(USER, &compiled("-repo:widgets", 10, 0))
        .await
        .unwrap();
    assert_eq!(github_ids(&rows), vec!["2"]);
}

#[tokio::test]
async fn test_get_notifications_loads_many_in_one_call() {
    let store = store().await;
    for id in ["1", "2", "3"] {
        store.upsert_notification(&thread(id, now()), now()).await.unwrap();
    }
    let mut foreign = thread("2", now());
    foreign.user_id = "someone-else".to_string();
    store.upsert_notification(&foreign, now()).await.unwrap();

    let ids = vec!["3".to_string(), "1".to_string(), "missing".to_string()];
    let rows = store.get_notifications(USER, &ids).await.unwrap();
    assert_eq!(github_ids(&rows), vec!["1", "3"]);
    assert!(rows.iter().all(|n| n.user_id == USER));

    assert!(store.get_notifications(USER, &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_filter_change_sets_flag() {
    let store = store().await;
    store.upsert_notification(&thread("1", now()), now()).await.unwrap();

    let n = store
        .update_notification_status(USER, "1", StatusChange::Filter, now())
        .await
        .unwrap()
        .unwrap();
    assert!(n.filtered);
    assert!(store
        .list_notifications(USER, &compiled("", 10, 0))
        .await
        .unwrap()
        .is_empty());
}

// ==================== Bulk ====================

#[tokio::test]
async fn test_bulk_update_by_ids() {
    let store = store().await;
    for id in ["1", "2", "3"] {
        store.upsert_notification(&thread(id, now()), now()).await.unwrap();
    }

    let ids = vec!["1".to_string(), "3".to_string(), "missing".to_string()];
    let affected = store
        .bulk_update_by_ids(USER, &ids, StatusChange::Star, now())
        .await
        .unwrap();
    assert_eq!(affected, 2);

    let rows = store
        .list_notifications(USER, &compiled("is:starred", 10, 0))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let none = store
        .bulk_update_by_ids(USER, &[], StatusChange::Star, now())
        .await
        .unwrap();
    assert_eq!(none, 0);
}

#[tokio::test]
async fn test_bulk_update_by_query() {
    let store = store().await;
    for id in ["1", "2", "3"] {
        store.upsert_notification(&thread(id, now()), now()).await.unwrap();
    }
    store
        .update_notification_status(USER, "2", StatusChange::MarkRead, now())
        .await
        .unwrap();

    let affected = store
        .bulk_update_by_query(USER, &compiled("is:unread", 1, 0), StatusChange::Archive, now())
        .await
        .unwrap();
    // Pagination does not limit bulk updates.
    assert_eq!(affected, 2);

    let remaining = store
        .list_notifications(USER, &compiled("", 10, 0))
        .await
        .unwrap();
    assert_eq!(github_ids(&remaining), vec!["2"]);

    let ids = store
        .list_notification_ids(USER, &compiled("in:archive", 1, 0))
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);
}

// ==================== Tags ====================

fn new_tag(name: &str) -> NewTag {
    NewTag {
        user_id: USER.to_string(),
        name: name.to_string(),
        slug: crate::models::slugify(name),
        color: Some("#6366f1".to_string()),
        description: None,
    }
}

#[tokio::test]
async fn test_tag_create_and_lookup() {
    let store = store().await;
    let tag = store.create_tag(&new_tag("Needs Review"), now()).await.unwrap();

    assert_eq!(tag.slug, "needs-review");
    assert_eq!(store.get_tag(USER, &tag.id).await.unwrap(), Some(tag.clone()));
    assert_eq!(
        store.get_tag_by_slug(USER, "needs-review").await.unwrap(),
        Some(tag.clone())
    );
    assert_eq!(store.list_tags(USER).await.unwrap(), vec![tag]);

    let err = store.create_tag(&new_tag("needs review"), now()).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_tag_assignment() {
    let store = store().await;
    let n = store.upsert_notification(&thread("1", now()), now()).await.unwrap();
    let other = store.upsert_notification(&thread("2", now()), now()).await.unwrap();
    let tag = store.create_tag(&new_tag("urgent"), now()).await.unwrap();

    store.assign_tag(USER, &tag.id, n.id, now()).await.unwrap();
    let err = store.assign_tag(USER, &tag.id, n.id, now()).await.unwrap_err();
    assert!(err.is_conflict());

    let assigned = store
        .list_tags_for_notifications(USER, &[n.id, other.id])
        .await
        .unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].0, n.id);
    assert_eq!(assigned[0].1.slug, "urgent");

    let rows = store
        .list_notifications(USER, &compiled("tags:urg", 10, 0))
        .await
        .unwrap();
    assert_eq!(github_ids(&rows), vec!["1"]);

    assert_eq!(store.remove_tag(USER, &tag.id, n.id).await.unwrap(), 1);
    assert_eq!(store.remove_tag(USER, &tag.id, n.id).await.unwrap(), 0);
}

// ==================== Rules & Views ====================

fn new_view(name: &str, query: &str) -> NewView {
    NewView {
        user_id: USER.to_string(),
        name: name.to_string(),
        slug: crate::models::slugify(name),
        description: None,
        icon: None,
        query: query.to_string(),
        is_default: false,
        display_order: 100,
    }
}

fn new_rule(name: &str, query: Option<&str>, view_id: Option<&str>) -> NewRule {
    NewRule {
        user_id: USER.to_string(),
        name: name.to_string(),
        description: None,
        query: query.map(str::to_string),
        view_id: view_id.map(str::to_string),
        actions: RuleActions {
            skip_inbox: true,
            assign_tags: vec!["tag-1".to_string()],
            ..Default::default()
        },
        enabled: true,
        display_order: 100,
    }
}

#[tokio::test]
async fn test_rule_round_trip_keeps_actions() {
    let store = store().await;
    let rule = store
        .create_rule(&new_rule("Bots", Some("author:dependabot"), None), now())
        .await
        .unwrap();

    let fetched = store.get_rule(USER, &rule.id).await.unwrap().unwrap();
    assert_eq!(fetched, rule);
    assert!(fetched.actions.skip_inbox);
    assert_eq!(fetched.actions.assign_tags, vec!["tag-1"]);

    let err = store
        .create_rule(&new_rule("Bots", Some("is:read"), None), now())
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let later = now() + Duration::minutes(5);
    let edited = Rule {
        enabled: false,
        display_order: 50,
        actions: RuleActions {
            archive: true,
            ..Default::default()
        },
        ..rule.clone()
    };
    let updated = store.update_rule(&edited, later).await.unwrap().unwrap();
    assert!(!updated.enabled);
    assert!(updated.actions.archive);
    assert!(!updated.actions.skip_inbox);
    assert_eq!(updated.updated_at, later);
    assert_eq!(updated.created_at, now());

    assert_eq!(store.delete_rule(USER, &rule.id).await.unwrap(), 1);
    assert!(store.update_rule(&edited, later).await.unwrap().is_none());
    assert!(store.list_rules(USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rules_list_in_display_order() {
    let store = store().await;
    let mut second = new_rule("B", Some("is:read"), None);
    second.display_order = 200;
    store.create_rule(&second, now()).await.unwrap();
    store.create_rule(&new_rule("A", Some("is:read"), None), now()).await.unwrap();

    let names: Vec<String> = store
        .list_rules(USER)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["A", "B"]);
    assert!(store.list_rules("someone-else").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_view_lookup_and_update() {
    let store = store().await;
    let view = store
        .create_view(&new_view("Team Reviews", "reason:review_requested"), now())
        .await
        .unwrap();

    assert_eq!(view.slug, "team-reviews");
    assert_eq!(store.get_view(USER, &view.id).await.unwrap(), Some(view.clone()));
    assert_eq!(
        store.get_view_by_slug(USER, "team-reviews").await.unwrap(),
        Some(view.clone())
    );
    let err = store
        .create_view(&new_view("team reviews", "is:unread"), now())
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let edited = View {
        query: "reason:review_requested is:unread".to_string(),
        ..view.clone()
    };
    let updated = store.update_view(&edited, now()).await.unwrap().unwrap();
    assert_eq!(updated.query, "reason:review_requested is:unread");
    assert_eq!(store.list_views(USER).await.unwrap(), vec![updated]);
}

#[tokio::test]
async fn test_deleting_view_removes_linked_rules() {
    let store = store().await;
    let view = store.create_view(&new_view("Bots", "author:bot"), now()).await.unwrap();
    store
        .create_rule(&new_rule("Linked", None, Some(&view.id)), now())
        .await
        .unwrap();
    store
        .create_rule(&new_rule("Standalone", Some("is:read"), None), now())
        .await
        .unwrap();

    assert_eq!(store.list_rules_for_view(USER, &view.id).await.unwrap().len(), 1);
    assert_eq!(store.delete_view(USER, &view.id).await.unwrap(), 1);

    let remaining: Vec<String> = store
        .list_rules(USER)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(remaining, vec!["Standalone"]);
}

// ==================== Repositories & Sync State ====================

#[tokio::test]
async fn test_repository_upsert_is_keyed_by_full_name() {
    let store = store().await;
    let input = RepositoryUpsert {
        user_id: USER.to_string(),
        name: "widgets".to_string(),
        full_name: "acme/widgets".to_string(),
        private: Some(false),
        ..Default::default()
    };
    let first = store.upsert_repository(&input).await.unwrap();
    let second = store
        .upsert_repository(&RepositoryUpsert {
            private: Some(true),
            ..input
        })
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.private, Some(true));
    assert_eq!(
        store.list_repositories(USER, &[first.id, 999]).await.unwrap(),
        vec![second.clone()]
    );
    assert_eq!(store.get_repository(USER, first.id).await.unwrap(), Some(second));
}

#[tokio::test]
async fn test_pull_request_upsert() {
    let store = store().await;
    let repo = store
        .upsert_repository(&RepositoryUpsert {
            user_id: USER.to_string(),
            name: "widgets".to_string(),
            full_name: "acme/widgets".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let input = PullRequestUpsert {
        user_id: USER.to_string(),
        repository_id: repo.id,
        number: 12,
        state: Some("open".to_string()),
        ..Default::default()
    };
    let first = store.upsert_pull_request(&input).await.unwrap();
    let second = store
        .upsert_pull_request(&PullRequestUpsert {
            state: Some("closed".to_string()),
            merged: Some(true),
            ..input
        })
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.merged, Some(true));
}

#[tokio::test]
async fn test_sync_state_round_trip() {
    let store = store().await;
    assert!(store.get_sync_state(USER).await.unwrap().is_none());

    let state = SyncState {
        user_id: USER.to_string(),
        last_successful_poll: Some(now()),
        latest_notification_at: Some(now() - Duration::hours(1)),
        ..Default::default()
    };
    store.upsert_sync_state(&state).await.unwrap();
    assert_eq!(store.get_sync_state(USER).await.unwrap(), Some(state.clone()));

    let updated = SyncState {
        initial_sync_completed_at: Some(now()),
        ..state
    };
    store.upsert_sync_state(&updated).await.unwrap();
    assert_eq!(store.get_sync_state(USER).await.unwrap(), Some(updated));
}
