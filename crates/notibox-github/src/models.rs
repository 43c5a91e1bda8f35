//! Wire types for the GitHub notifications API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A notification thread as returned by `GET /notifications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationThread {
    pub id: String,
    pub repository: Repository,
    pub subject: Subject,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub unread: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub subscription_url: Option<String>,
    /// The thread exactly as GitHub sent it.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

/// Thread subject (issue, pull request, release, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub latest_comment_url: Option<String>,
    #[serde(rename = "type")]
    pub subject_type: String,
}

/// Repository summary embedded in a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    #[serde(default)]
    pub node_id: Option<String>,
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub archived: Option<bool>,
}

/// Account that owns a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
    pub id: i64,
    #[serde(rename = "type", default)]
    pub owner_type: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl NotificationThread {
    /// Decodes a thread and keeps the original JSON in `raw`.
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        let mut thread: NotificationThread = serde_json::from_value(value.clone())?;
        thread.raw = value;
        Ok(thread)
    }
}

/// Query parameters for `GET /notifications`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchNotificationsParams {
    /// Only threads updated after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only threads updated before this instant.
    pub before: Option<DateTime<Utc>>,
    /// Include threads already marked read on GitHub.
    pub all: bool,
    /// Page size; GitHub caps this at 50.
    pub per_page: u32,
}

impl Default for FetchNotificationsParams {
    fn default() -> Self {
        Self {
            since: None,
            before: None,
            all: true,
            per_page: crate::client::MAX_PER_PAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn thread_json() -> serde_json::Value {
        json!({
            "id": "1",
            "repository": {
                "id": 1296269,
                "node_id": "MDEwOlJlcG9zaXRvcnkxMjk2MjY5",
                "name": "Hello-World",
                "full_name": "octocat/Hello-World",
                "owner": {"login": "octocat", "id": 1, "type": "User"},
                "private": false,
                "fork": false
            },
            "subject": {
                "title": "Greetings",
                "url": "https://api.github.com/repos/octocat/Hello-World/issues/123",
                "latest_comment_url": null,
                "type": "Issue"
            },
            "reason": "subscribed",
            "unread": true,
            "updated_at": "2014-11-07T22:01:45Z",
            "last_read_at": null,
            "url": "https://api.github.com/notifications/threads/1"
        })
    }

    #[test]
    fn test_thread_keeps_raw_payload() {
        let value = thread_json();
        let thread = NotificationThread::from_value(value.clone()).unwrap();
        assert_eq!(thread.id, "1");
        assert_eq!(thread.subject.subject_type, "Issue");
        assert_eq!(thread.repository.owner.login, "octocat");
        assert!(thread.last_read_at.is_none());
        assert_eq!(thread.raw, value);
    }

    #[test]
    fn test_thread_missing_optional_fields() {
        let mut value = thread_json();
        value.as_object_mut().unwrap().remove("url");
        value.as_object_mut().unwrap().remove("reason");
        let thread = NotificationThread::from_value(value).unwrap();
        assert_eq!(thread.url, None);
        assert_eq!(thread.reason, "");
    }
}
