//! Rule and view output formatting.

use notibox_core::models::{Rule, RuleActions, Tag, View};
use notibox_core::views::ViewSummary;
use owo_colors::OwoColorize;
use serde::Serialize;

use super::helpers::truncate_str;

/// JSON output structure for the rule list command.
#[derive(Serialize)]
pub struct RulesListOutput<'a> {
    pub rules: &'a [Rule],
}

/// JSON output structure for the view list command.
#[derive(Serialize)]
pub struct ViewsListOutput<'a> {
    pub views: &'a [ViewSummary],
}

pub fn format_rules_json(rules: &[Rule]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&RulesListOutput { rules })
}

pub fn format_views_json(views: &[ViewSummary]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ViewsListOutput { views })
}

/// Summarizes rule actions, e.g. "skip inbox, read, +triage".
///
/// Tag ids are shown by name when the tag is known.
pub fn describe_actions(actions: &RuleActions, tags: &[Tag]) -> String {
    let tag_name = |id: &String| {
        tags.iter()
            .find(|t| &t.id == id)
            .map_or_else(|| id.clone(), |t| t.name.clone())
    };

    let mut parts: Vec<String> = [
        (actions.skip_inbox, "skip inbox"),
        (actions.mark_read, "read"),
        (actions.star, "star"),
        (actions.archive, "archive"),
        (actions.mute, "mute"),
    ]
    .iter()
    .filter(|(set, _)| *set)
    .map(|(_, label)| label.to_string())
    .collect();
    parts.extend(actions.assign_tags.iter().map(|id| format!("+{}", tag_name(id))));
    parts.extend(actions.remove_tags.iter().map(|id| format!("-{}", tag_name(id))));

    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(", ")
    }
}

/// Formats rules as a table in run order.
pub fn format_rules_table(rules: &[Rule], views: &[View], tags: &[Tag], use_colors: bool) -> String {
    if rules.is_empty() {
        return "No rules found.\n".to_string();
    }

    let mut output = String::new();
    let header = format!("{:<20} {:<32} {:<8} {}", "Name", "Matches", "Enabled", "Actions");
    if use_colors {
        output.push_str(&format!("{}\n", header.dimmed()));
    } else {
        output.push_str(&header);
        output.push('\n');
    }

    for rule in rules {
        let matches = match &rule.view_id {
            Some(view_id) => match views.iter().find(|v| &v.id == view_id) {
                Some(view) => format!("view:{}", view.slug),
                None => "view:(missing)".to_string(),
            },
            None => rule.query.clone().unwrap_or_default(),
        };
        let enabled = if rule.enabled { "yes" } else { "no" };
        let row = format!(
            "{:<20} {:<32} {:<8} {}",
            truncate_str(&rule.name, 20),
            truncate_str(&matches, 32),
            enabled,
            describe_actions(&rule.actions, tags)
        );
        if use_colors && !rule.enabled {
            output.push_str(&format!("{}\n", row.dimmed()));
        } else {
            output.push_str(&row);
            output.push('\n');
        }
    }
    output
}

/// Formats views as a table in display order.
pub fn format_views_table(views: &[ViewSummary], use_colors: bool) -> String {
    if views.is_empty() {
        return "No views found.\n".to_string();
    }

    let mut output = String::new();
    let header = format!("{:<20} {:<20} {:>6}  {}", "Name", "Slug", "Unread", "Query");
    if use_colors {
        output.push_str(&format!("{}\n", header.dimmed()));
    } else {
        output.push_str(&header);
        output.push('\n');
    }

    for summary in views {
        let view = &summary.view;
        output.push_str(&format!(
            "{:<20} {:<20} {:>6}  {}\n",
            truncate_str(&view.name, 20),
            truncate_str(&view.slug, 20),
            summary.unread_count,
            view.query
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: &str, name: &str) -> Tag {
        Tag {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_describe_actions() {
        assert_eq!(describe_actions(&RuleActions::default(), &[]), "none");

        let actions = RuleActions {
            skip_inbox: true,
            mark_read: true,
            assign_tags: vec!["t1".to_string()],
            remove_tags: vec!["gone".to_string()],
            ..Default::default()
        };
        assert_eq!(
            describe_actions(&actions, &[tag("t1", "Triage")]),
            "skip inbox, read, +Triage, -gone"
        );
    }

    #[test]
    fn test_format_rules_table() {
        assert_eq!(format_rules_table(&[], &[], &[], false), "No rules found.\n");

        let view = View {
            id: "v1".to_string(),
            slug: "mentions".to_string(),
            ..Default::default()
        };
        let rules = vec![
            Rule {
                name: "Bots".to_string(),
                query: Some("author:bot".to_string()),
                actions: RuleActions {
                    archive: true,
                    ..Default::default()
                },
                enabled: true,
                ..Default::default()
            },
            Rule {
                name: "Linked".to_string(),
                view_id: Some("v1".to_string()),
                ..Default::default()
            },
        ];
        let table = format_rules_table(&rules, &[view], &[], false);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Bots"));
        assert!(lines[1].contains("author:bot"));
        assert!(lines[1].ends_with("archive"));
        assert!(lines[2].contains("view:mentions"));
        assert!(lines[2].contains(" no "));
    }

    #[test]
    fn test_format_views_table() {
        assert_eq!(format_views_table(&[], false), "No views found.\n");

        let views = vec![ViewSummary {
            view: View {
                name: "Mentions".to_string(),
                slug: "mentions".to_string(),
                query: "reason:mention".to_string(),
                ..Default::default()
            },
            unread_count: 4,
        }];
        let table = format_views_table(&views, false);
        let row = table.lines().nth(1).unwrap();
        assert!(row.starts_with("Mentions"));
        assert!(row.contains("     4  reason:mention"));
    }
}
