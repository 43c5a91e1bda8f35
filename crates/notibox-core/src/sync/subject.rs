//! Extraction of triage metadata from subject payloads.
//!
//! Subject payloads are whatever GitHub returns for the thread's subject URL:
//! an issue, a pull request, a release, a commit. Every field is optional and
//! missing or mistyped values are simply left empty.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::store::PullRequestUpsert;

/// Subject types GitHub offers no REST document for.
const UNREFRESHABLE_TYPES: &[&str] = &["checkrun", "checksuite", "discussion"];

/// Metadata pulled from a subject payload onto the notification row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectDetails {
    pub author_login: Option<String>,
    pub author_id: Option<i64>,
    pub number: Option<i64>,
    pub state: Option<String>,
    pub merged: Option<bool>,
    pub state_reason: Option<String>,
}

impl SubjectDetails {
    pub fn from_payload(payload: &Value) -> Self {
        let author = payload
            .get("user")
            .filter(|user| user.is_object())
            .or_else(|| payload.get("sender").filter(|sender| sender.is_object()));

        Self {
            author_login: author.and_then(|a| non_empty_str(a, "login")),
            author_id: author.and_then(|a| a.get("id")).and_then(Value::as_i64),
            number: payload.get("number").and_then(Value::as_i64),
            state: non_empty_str(payload, "state"),
            merged: payload.get("merged").and_then(Value::as_bool),
            state_reason: non_empty_str(payload, "state_reason"),
        }
    }
}

/// Returns false for subject types that cannot be refetched.
///
/// Comparison ignores case and underscores, so `CheckSuite` and `check_suite`
/// are both rejected.
pub fn supports_refresh(subject_type: &str) -> bool {
    let normalized: String = subject_type
        .chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    !UNREFRESHABLE_TYPES.contains(&normalized.as_str())
}

pub fn is_pull_request(subject_type: &str) -> bool {
    subject_type.eq_ignore_ascii_case("PullRequest")
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    id: Option<i64>,
    node_id: Option<String>,
    number: Option<i64>,
    title: Option<String>,
    state: Option<String>,
    draft: Option<bool>,
    merged: Option<bool>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    merged_at: Option<DateTime<Utc>>,
    user: Option<PayloadUser>,
}

#[derive(Debug, Deserialize)]
struct PayloadUser {
    login: Option<String>,
    id: Option<i64>,
}

/// Builds pull request metadata from a PR subject payload.
///
/// Returns `Ok(None)` when the payload has no `number`.
pub fn pull_request_from_payload(
    user_id: &str,
    repository_id: i64,
    payload: &Value,
) -> serde_json::Result<Option<PullRequestUpsert>> {
    let pr = PullRequestPayload::deserialize(payload)?;
    let Some(number) = pr.number else {
        return Ok(None);
    };
    let (author_login, author_id) = match pr.user {
        Some(user) => (user.login, user.id),
        None => (None, None),
    };

    Ok(Some(PullRequestUpsert {
        user_id: user_id.to_string(),
        repository_id,
        github_id: pr.id,
        node_id: pr.node_id,
        number,
        title: pr.title,
        state: pr.state,
        draft: pr.draft,
        merged: pr.merged,
        author_login,
        author_id,
        created_at: pr.created_at,
        updated_at: pr.updated_at,
        closed_at: pr.closed_at,
        merged_at: pr.merged_at,
    }))
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_details_from_pull_request() {
        let payload = json!({
            "number": 7,
            "state": "closed",
            "merged": true,
            "user": {"login": "octocat", "id": 1}
        });
        let details = SubjectDetails::from_payload(&payload);
        assert_eq!(details.author_login.as_deref(), Some("octocat"));
        assert_eq!(details.author_id, Some(1));
        assert_eq!(details.number, Some(7));
        assert_eq!(details.state.as_deref(), Some("closed"));
        assert_eq!(details.merged, Some(true));
        assert_eq!(details.state_reason, None);
    }

    #[test]
    fn test_details_fall_back_to_sender() {
        let payload = json!({"sender": {"login": "bot", "id": 99}, "state_reason": "not_planned"});
        let details = SubjectDetails::from_payload(&payload);
        assert_eq!(details.author_login.as_deref(), Some("bot"));
        assert_eq!(details.state_reason.as_deref(), Some("not_planned"));
    }

    #[test]
    fn test_details_ignore_mistyped_fields() {
        let payload = json!({"number": "7", "state": "", "merged": "yes", "user": null});
        assert_eq!(SubjectDetails::from_payload(&payload), SubjectDetails::default());
        assert_eq!(SubjectDetails::from_payload(&json!([1, 2])), SubjectDetails::default());
    }

    #[test]
    fn test_supports_refresh() {
        assert!(supports_refresh("PullRequest"));
        assert!(supports_refresh("Issue"));
        assert!(!supports_refresh("CheckSuite"));
        assert!(!supports_refresh("check_run"));
        assert!(!supports_refresh("Discussion"));
    }

    #[test]
    fn test_pull_request_from_payload() {
        let payload = json!({
            "id": 1001,
            "node_id": "PR_1",
            "number": 7,
            "title": "Add widgets",
            "state": "open",
            "draft": false,
            "merged": false,
            "created_at": "2024-05-01T10:00:00Z",
            "merged_at": null,
            "user": {"login": "octocat", "id": 1}
        });
        let pr = pull_request_from_payload("u", 3, &payload).unwrap().unwrap();
        assert_eq!(pr.repository_id, 3);
        assert_eq!(pr.number, 7);
        assert_eq!(pr.github_id, Some(1001));
        assert_eq!(pr.author_login.as_deref(), Some("octocat"));
        assert_eq!(
            pr.created_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(pr.merged_at, None);
    }

    #[test]
    fn test_pull_request_without_number_is_skipped() {
        let payload = json!({"title": "no number"});
        assert_eq!(pull_request_from_payload("u", 3, &payload).unwrap(), None);
    }

    #[test]
    fn test_pull_request_with_bad_timestamp_is_an_error() {
        let payload = json!({"number": 1, "created_at": "yesterday"});
        assert!(pull_request_from_payload("u", 3, &payload).is_err());
    }
}
