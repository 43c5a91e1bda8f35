//! Tag command implementation.

use notibox_core::models::{slugify, Tag};
use notibox_core::notification::NotificationItem;
use notibox_core::ServiceError;

use super::{CommandContext, Result, Session};
use crate::output::{format_item_json, format_tags_json, format_tags_table};

/// Executes the tag list command.
pub async fn execute_list(ctx: &CommandContext, session: &Session) -> Result<()> {
    let tags = session.notifications().list_tags(&session.user_id).await?;

    if ctx.json_output {
        println!("{}", format_tags_json(&tags)?);
    } else if !ctx.quiet {
        print!("{}", format_tags_table(&tags, ctx.use_colors));
    }
    Ok(())
}

/// Executes the tag assign command. Unknown tag names are created.
pub async fn execute_assign(ctx: &CommandContext, session: &Session, id: &str, name: &str) -> Result<()> {
    let item = session
        .notifications()
        .assign_tag_by_name(&session.user_id, id, name)
        .await?;
    report(ctx, "Tagged", &item)
}

/// Executes the tag remove command. The tag is matched by name or slug.
pub async fn execute_remove(ctx: &CommandContext, session: &Session, id: &str, name: &str) -> Result<()> {
    let service = session.notifications();
    let tags = service.list_tags(&session.user_id).await?;
    let tag = find_tag(&tags, name).ok_or_else(|| ServiceError::NotFound {
        resource: "tag",
        id: name.to_string(),
    })?;

    let item = service.remove_tag(&session.user_id, id, &tag.id).await?;
    report(ctx, "Untagged", &item)
}

pub(crate) fn find_tag<'a>(tags: &'a [Tag], name: &str) -> Option<&'a Tag> {
    let slug = slugify(name);
    tags.iter()
        .find(|tag| tag.name.eq_ignore_ascii_case(name.trim()))
        .or_else(|| tags.iter().find(|tag| !slug.is_empty() && tag.slug == slug))
}

fn report(ctx: &CommandContext, verb: &str, item: &NotificationItem) -> Result<()> {
    if ctx.json_output {
        println!("{}", format_item_json(item)?);
    } else if !ctx.quiet {
        let tags: Vec<&str> = item.tags.iter().map(|t| t.name.as_str()).collect();
        let tags = if tags.is_empty() {
            "no tags".to_string()
        } else {
            tags.join(", ")
        };
        println!("{} {} ({})", verb, item.notification.github_id, tags);
    }
    Ok(())
}
