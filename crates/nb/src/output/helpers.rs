//! Common helper functions for output formatting.

use chrono::{DateTime, Local, Utc};
use notibox_core::models::Notification;
use owo_colors::OwoColorize;

/// Truncates a string to a maximum number of characters.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        s.to_string()
    }
}

/// Formats a timestamp relative to `now`, e.g. "5m ago".
pub fn format_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(ts);
    if elapsed.num_seconds() < 0 {
        return ts.with_timezone(&Local).format("%b %d %H:%M").to_string();
    }
    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_days() < 1 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 7 {
        format!("{}d ago", elapsed.num_days())
    } else {
        ts.with_timezone(&Local).format("%b %d").to_string()
    }
}

/// Formats a datetime for display in local time.
pub fn format_datetime(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// One-character markers for the triage state of a notification.
///
/// Order: unread, starred, snoozed, archived, muted, filtered. Unset
/// positions are blank so that columns line up.
pub fn format_markers(notification: &Notification, now: DateTime<Utc>, use_colors: bool) -> String {
    let markers = [
        (!notification.is_read, '●'),
        (notification.starred, '★'),
        (notification.is_snoozed(now), 'z'),
        (notification.archived, 'a'),
        (notification.muted, 'm'),
        (notification.filtered, 'f'),
    ];

    markers
        .iter()
        .map(|(set, marker)| {
            if !set {
                " ".to_string()
            } else if use_colors {
                match marker {
                    '●' => marker.blue().to_string(),
                    '★' => marker.yellow().to_string(),
                    _ => marker.dimmed().to_string(),
                }
            } else {
                marker.to_string()
            }
        })
        .collect()
}

/// Formats the subject state, e.g. "merged" or "closed (not_planned)".
pub fn format_state(notification: &Notification, use_colors: bool) -> String {
    let state = if notification.subject_merged == Some(true) {
        "merged".to_string()
    } else {
        match (&notification.subject_state, &notification.subject_state_reason) {
            (Some(state), Some(reason)) if state == "closed" => format!("{state} ({reason})"),
            (Some(state), _) => state.clone(),
            (None, _) => return String::new(),
        }
    };

    if !use_colors {
        return state;
    }
    if state == "merged" {
        state.magenta().to_string()
    } else if state == "open" {
        state.green().to_string()
    } else if state.starts_with("closed") {
        state.red().to_string()
    } else {
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("a longer title here", 10), "a longe...");
        assert_eq!(truncate_str("émojis ✨✨✨✨✨", 8), "émoji...");
    }

    #[test]
    fn test_format_relative() {
        assert_eq!(format_relative(now(), now()), "just now");
        assert_eq!(format_relative(now() - Duration::minutes(5), now()), "5m ago");
        assert_eq!(format_relative(now() - Duration::hours(3), now()), "3h ago");
        assert_eq!(format_relative(now() - Duration::days(2), now()), "2d ago");
    }

    #[test]
    fn test_format_markers_without_colors() {
        let notification = Notification {
            is_read: false,
            starred: true,
            snoozed_until: Some(now() + Duration::hours(1)),
            ..Default::default()
        };
        assert_eq!(format_markers(&notification, now(), false), "●★z   ");

        let quiet = Notification {
            is_read: true,
            archived: true,
            snoozed_until: Some(now() - Duration::hours(1)),
            ..Default::default()
        };
        assert_eq!(format_markers(&quiet, now(), false), "   a  ");
    }

    #[test]
    fn test_format_state() {
        let mut notification = Notification {
            subject_state: Some("closed".to_string()),
            subject_merged: Some(true),
            ..Default::default()
        };
        assert_eq!(format_state(&notification, false), "merged");

        notification.subject_merged = Some(false);
        notification.subject_state_reason = Some("not_planned".to_string());
        assert_eq!(format_state(&notification, false), "closed (not_planned)");

        notification.subject_state = None;
        assert_eq!(format_state(&notification, false), "");
    }
}
