//! Notification output formatting.

use chrono::{DateTime, Utc};
use notibox_core::models::Notification;
use notibox_core::notification::{ListResponse, NotificationItem, PollResponse};
use notibox_core::query::ValidationError;
use owo_colors::OwoColorize;
use serde::Serialize;

use super::helpers::{format_datetime, format_markers, format_relative, format_state, truncate_str};

const TITLE_WIDTH: usize = 50;
const REPO_WIDTH: usize = 24;

/// Formats a listing as JSON.
pub fn format_list_json(response: &ListResponse) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(response)
}

/// Formats a listing as a table.
pub fn format_list_table(response: &ListResponse, now: DateTime<Utc>, use_colors: bool) -> String {
    let mut output = format_warnings(&response.warnings, use_colors);

    if response.items.is_empty() {
        output.push_str("No notifications found.\n");
        return output;
    }

    let header = format!(
        "{:<12} {:<6} {:<24} {:<12} {:<50} {}",
        "ID", "", "Repository", "Type", "Title", "Updated"
    );
    if use_colors {
        output.push_str(&format!("{}\n", header.dimmed()));
    } else {
        output.push_str(&header);
        output.push('\n');
    }

    for item in &response.items {
        output.push_str(&format_row(item, now, use_colors));
        output.push('\n');
    }

    let shown_until = (response.page - 1) * response.page_size + response.items.len() as i64;
    let footer = format!(
        "Page {} ({} of {} shown)",
        response.page, shown_until, response.total
    );
    if use_colors {
        output.push_str(&format!("\n{}\n", footer.dimmed()));
    } else {
        output.push_str(&format!("\n{footer}\n"));
    }

    output
}

fn format_row(item: &NotificationItem, now: DateTime<Utc>, use_colors: bool) -> String {
    let n = &item.notification;
    let repo = item
        .repository
        .as_ref()
        .map(|r| r.full_name.as_str())
        .unwrap_or("");
    let mut title = truncate_str(&n.subject_title, TITLE_WIDTH);
    if !n.is_read && use_colors {
        title = format!("{:<50}", title).bold().to_string();
    }

    let mut line = format!(
        "{:<12} {} {:<24} {:<12} {:<50} {}",
        truncate_str(&n.github_id, 12),
        format_markers(n, now, use_colors),
        truncate_str(repo, REPO_WIDTH),
        truncate_str(&n.subject_type, 12),
        title,
        format_relative(n.effective_sort_date, now),
    );

    if !item.tags.is_empty() {
        let tags: Vec<String> = item.tags.iter().map(|t| format!("#{}", t.slug)).collect();
        let tags = tags.join(" ");
        if use_colors {
            line.push_str(&format!("  {}", tags.cyan()));
        } else {
            line.push_str(&format!("  {tags}"));
        }
    }
    line
}

/// Formats query validation problems, one per line.
pub fn format_warnings(warnings: &[ValidationError], use_colors: bool) -> String {
    let mut output = String::new();
    for warning in warnings {
        let line = format!("warning: {warning}");
        if use_colors {
            output.push_str(&format!("{}\n", line.yellow()));
        } else {
            output.push_str(&line);
            output.push('\n');
        }
    }
    output
}

/// Formats a poll response as JSON.
pub fn format_poll_json(response: &PollResponse) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(response)
}

/// Formats a poll response as a compact table.
pub fn format_poll_table(response: &PollResponse, now: DateTime<Utc>) -> String {
    if response.items.is_empty() {
        return "No notifications found.\n".to_string();
    }

    let mut output = String::new();
    for item in &response.items {
        output.push_str(&format!(
            "{:<12} {:<24} {:<50} {}\n",
            truncate_str(&item.github_id, 12),
            truncate_str(item.repository_full_name.as_deref().unwrap_or(""), REPO_WIDTH),
            truncate_str(&item.subject_title, TITLE_WIDTH),
            format_relative(item.effective_sort_date, now),
        ));
    }
    output.push_str(&format!("{} total\n", response.total));
    output
}

/// Formats a single notification as JSON.
pub fn format_item_json(item: &NotificationItem) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(item)
}

/// Formats a single notification with all of its details.
pub fn format_item_details(item: &NotificationItem, now: DateTime<Utc>, use_colors: bool) -> String {
    let n = &item.notification;
    let mut output = String::new();

    if use_colors {
        output.push_str(&format!("{}\n", n.subject_title.bold()));
    } else {
        output.push_str(&format!("{}\n", n.subject_title));
    }
    output.push('\n');

    output.push_str(&format!("ID:          {}\n", n.github_id));
    if let Some(repo) = &item.repository {
        output.push_str(&format!("Repository:  {}\n", repo.full_name));
    }
    let subject = match n.subject_number {
        Some(number) => format!("{} #{}", n.subject_type, number),
        None => n.subject_type.clone(),
    };
    output.push_str(&format!("Subject:     {}\n", subject));
    let state = format_state(n, use_colors);
    if !state.is_empty() {
        output.push_str(&format!("State:       {}\n", state));
    }
    if let Some(author) = &n.author_login {
        output.push_str(&format!("Author:      {}\n", author));
    }
    if let Some(reason) = &n.reason {
        output.push_str(&format!("Reason:      {}\n", reason));
    }
    output.push_str(&format!("Status:      {}\n", status_words(n, now).join(", ")));
    if let Some(until) = n.snoozed_until.filter(|_| n.is_snoozed(now)) {
        output.push_str(&format!("Snoozed to:  {}\n", format_datetime(until)));
    }
    if let Some(updated) = n.github_updated_at {
        output.push_str(&format!(
            "Updated:     {} ({})\n",
            format_datetime(updated),
            format_relative(updated, now)
        ));
    }
    if !item.tags.is_empty() {
        let names: Vec<&str> = item.tags.iter().map(|t| t.name.as_str()).collect();
        output.push_str(&format!("Tags:        {}\n", names.join(", ")));
    }
    if let Some(url) = n.github_url.as_deref().or(n.subject_url.as_deref()) {
        output.push_str(&format!("URL:         {}\n", url));
    }

    output
}

fn status_words(n: &Notification, now: DateTime<Utc>) -> Vec<&'static str> {
    let mut words = vec![if n.is_read { "read" } else { "unread" }];
    if n.starred {
        words.push("starred");
    }
    if n.archived {
        words.push("archived");
    }
    if n.is_snoozed(now) {
        words.push("snoozed");
    }
    if n.muted {
        words.push("muted");
    }
    if n.filtered {
        words.push("filtered");
    }
    words
}

/// JSON output structure for a status change.
#[derive(Serialize)]
pub struct UpdatedNotificationOutput<'a> {
    pub action: &'a str,
    pub notification: &'a Notification,
}

/// Formats the notification returned by a single action as JSON.
pub fn format_updated_json(
    action: &str,
    notification: &Notification,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&UpdatedNotificationOutput {
        action,
        notification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use notibox_core::models::{Repository, Tag};
    use notibox_core::query::ActionHints;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn item(github_id: &str, title: &str) -> NotificationItem {
        NotificationItem {
            notification: Notification {
                github_id: github_id.to_string(),
                subject_title: title.to_string(),
                subject_type: "PullRequest".to_string(),
                effective_sort_date: now() - Duration::hours(2),
                ..Default::default()
            },
            repository: Some(Repository {
                full_name: "acme/widgets".to_string(),
                ..Default::default()
            }),
            tags: vec![Tag {
                name: "Needs Review".to_string(),
                slug: "needs-review".to_string(),
                ..Default::default()
            }],
            action_hints: ActionHints::default(),
        }
    }

    #[test]
    fn test_empty_list_table() {
        let response = ListResponse {
            items: vec![],
            total: 0,
            page: 1,
            page_size: 50,
            warnings: vec![],
        };
        assert_eq!(format_list_table(&response, now(), false), "No notifications found.\n");
    }

    #[test]
    fn test_list_table_rows() {
        let response = ListResponse {
            items: vec![item("1001", "Fix the widget"), item("1002", "Add gizmo")],
            total: 5,
            page: 1,
            page_size: 2,
            warnings: vec![],
        };
        let table = format_list_table(&response, now(), false);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].starts_with("1001"));
        assert!(lines[1].contains("acme/widgets"));
        assert!(lines[1].contains("2h ago"));
        assert!(lines[1].ends_with("#needs-review"));
        assert!(table.contains("Page 1 (2 of 5 shown)"));
    }

    #[test]
    fn test_item_details() {
        let mut item = item("1001", "Fix the widget");
        item.notification.subject_number = Some(42);
        item.notification.author_login = Some("octocat".to_string());
        item.notification.starred = true;

        let details = format_item_details(&item, now(), false);
        assert!(details.starts_with("Fix the widget\n"));
        assert!(details.contains("Subject:     PullRequest #42"));
        assert!(details.contains("Author:      octocat"));
        assert!(details.contains("Status:      unread, starred"));
        assert!(details.contains("Tags:        Needs Review"));
    }

    #[test]
    fn test_list_json_includes_hints_and_warnings() {
        let response = ListResponse {
            items: vec![item("1001", "Fix the widget")],
            total: 1,
            page: 1,
            page_size: 50,
            warnings: vec![],
        };
        let json: serde_json::Value =
            serde_json::from_str(&format_list_json(&response).unwrap()).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["items"][0]["notification"]["github_id"], "1001");
        assert!(json["items"][0]["action_hints"].is_object());
        assert!(json["warnings"].as_array().unwrap().is_empty());
    }
}
