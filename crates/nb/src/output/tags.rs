//! Tag output formatting.

use notibox_core::models::Tag;
use owo_colors::OwoColorize;
use serde::Serialize;

use super::helpers::truncate_str;

/// JSON output structure for tags list command.
#[derive(Serialize)]
pub struct TagsListOutput<'a> {
    pub tags: &'a [Tag],
}

/// Formats tags as JSON.
pub fn format_tags_json(tags: &[Tag]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&TagsListOutput { tags })
}

/// Formats tags as a table.
pub fn format_tags_table(tags: &[Tag], use_colors: bool) -> String {
    if tags.is_empty() {
        return "No tags found.\n".to_string();
    }

    let mut output = String::new();
    let header = format!("{:<24} {:<24} {}", "Name", "Slug", "Color");
    if use_colors {
        output.push_str(&format!("{}\n", header.dimmed()));
    } else {
        output.push_str(&header);
        output.push('\n');
    }

    for tag in tags {
        output.push_str(&format!(
            "{:<24} {:<24} {}\n",
            truncate_str(&tag.name, 24),
            truncate_str(&tag.slug, 24),
            tag.color.as_deref().unwrap_or("")
        ));
    }
    output
}
