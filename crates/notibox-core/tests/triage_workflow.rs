//! End-to-end triage: sync threads from a mock GitHub, then list, act and
//! resync through the public services.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use notibox_core::notification::{BulkOperation, BulkRequest, BulkTarget, ListOptions};
use notibox_core::{NotificationService, SqliteStore, Store, SyncService, SyncSettings};
use notibox_github::{GithubClient, RetryConfig};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER: &str = "me";

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn thread(id: &str, repo: &str, title: &str, updated_at: &str) -> Value {
    let (owner, name) = repo.split_once('/').unwrap();
    json!({
        "id": id,
        "repository": {
            "id": repo.len(),
            "name": name,
            "full_name": repo,
            "owner": {"login": owner, "id": 1}
        },
        "subject": {"title": title, "url": null, "type": "Issue"},
        "reason": "mention",
        "unread": true,
        "updated_at": updated_at
    })
}

struct Harness {
    server: MockServer,
    sync: SyncService,
    notifications: NotificationService,
}

async fn harness() -> Harness {
    let server = MockServer::start().await;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
    let client = GithubClient::with_base_url("token", server.uri())
        .unwrap()
        .with_retry_config(RetryConfig::immediate(0));
    Harness {
        sync: SyncService::new(store.clone(), client, SyncSettings::default()).with_clock(fixed_now),
        notifications: NotificationService::new(store).with_clock(fixed_now),
        server,
    }
}

async fn serve(server: &MockServer, threads: Vec<Value>) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(threads))
        .mount(server)
        .await;
}

fn titles(h: &notibox_core::notification::ListResponse) -> Vec<&str> {
    h.items
        .iter()
        .map(|item| item.notification.subject_title.as_str())
        .collect()
}

#[tokio::test]
async fn test_sync_then_triage() {
    let h = harness().await;
    serve(
        &h.server,
        vec![
            thread("1", "acme/widgets", "Newest", "2024-06-01T10:00:00Z"),
            thread("2", "acme/gears", "Middle", "2024-06-01T09:00:00Z"),
            thread("3", "other/tools", "Oldest", "2024-06-01T08:00:00Z"),
        ],
    )
    .await;
    h.sync.sync(USER).await.unwrap();

    let inbox = h
        .notifications
        .list_notifications(USER, &ListOptions::new(""))
        .await
        .unwrap();
    assert_eq!(inbox.total, 3);
    assert_eq!(titles(&inbox), vec!["Newest", "Middle", "Oldest"]);
    assert_eq!(
        inbox.items[0].repository.as_ref().map(|r| r.full_name.as_str()),
        Some("acme/widgets")
    );

    let result = h
        .notifications
        .bulk_update(
            USER,
            &BulkRequest {
                operation: BulkOperation::Archive,
                target: BulkTarget::query("org:acme"),
                snoozed_until: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(result.affected_count, 2);

    let inbox = h
        .notifications
        .list_notifications(USER, &ListOptions::new(""))
        .await
        .unwrap();
    assert_eq!(titles(&inbox), vec!["Oldest"]);

    let archive = h
        .notifications
        .list_notifications(USER, &ListOptions::new("in:archive"))
        .await
        .unwrap();
    assert_eq!(archive.total, 2);
}

#[tokio::test]
async fn test_new_activity_resurfaces_archived_thread() {
    let h = harness().await;
    serve(
        &h.server,
        vec![thread("1", "acme/widgets", "Flaky test", "2024-06-01T10:00:00Z")],
    )
    .await;
    h.sync.sync(USER).await.unwrap();
    h.notifications.archive(USER, "1").await.unwrap();

    // Same updated_at: the thread stays archived.
    h.sync.sync(USER).await.unwrap();
    let n = h.notifications.get_notification(USER, "1").await.unwrap();
    assert!(n.notification.archived);

    serve(
        &h.server,
        vec![thread("1", "acme/widgets", "Flaky test", "2024-06-01T11:30:00Z")],
    )
    .await;
    h.sync.sync(USER).await.unwrap();

    let n = h.notifications.get_notification(USER, "1").await.unwrap();
    assert!(!n.notification.archived);
    assert!(!n.notification.is_read);
    let inbox = h
        .notifications
        .list_notifications(USER, &ListOptions::new(""))
        .await
        .unwrap();
    assert_eq!(inbox.total, 1);
}

#[tokio::test]
async fn test_muted_thread_stays_hidden_on_new_activity() {
    let h = harness().await;
    serve(
        &h.server,
        vec![thread("1", "acme/widgets", "Chatty", "2024-06-01T10:00:00Z")],
    )
    .await;
    h.sync.sync(USER).await.unwrap();
    h.notifications.mute(USER, "1").await.unwrap();

    serve(
        &h.server,
        vec![thread("1", "acme/widgets", "Chatty", "2024-06-01T11:00:00Z")],
    )
    .await;
    h.sync.sync(USER).await.unwrap();

    let inbox = h
        .notifications
        .list_notifications(USER, &ListOptions::new(""))
        .await
        .unwrap();
    assert_eq!(inbox.total, 0);
    let muted = h
        .notifications
        .list_notifications(USER, &ListOptions::new("in:anywhere is:muted"))
        .await
        .unwrap();
    assert_eq!(muted.total, 1);
}
