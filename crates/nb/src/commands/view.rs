//! View command implementation.

use notibox_core::views::CreateView;

use super::{CommandContext, Result, Session};
use crate::output::{format_views_json, format_views_table};

/// Executes the view list command.
pub async fn execute_list(ctx: &CommandContext, session: &Session) -> Result<()> {
    let views = session.views().list_views(&session.user_id).await?;

    if ctx.json_output {
        println!("{}", format_views_json(&views)?);
    } else if !ctx.quiet {
        print!("{}", format_views_table(&views, ctx.use_colors));
    }
    Ok(())
}

/// Executes the view add command.
pub async fn execute_add(ctx: &CommandContext, session: &Session, input: &CreateView) -> Result<()> {
    let summary = session.views().create_view(&session.user_id, input).await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !ctx.quiet {
        println!(
            "Created view {} ({} unread)",
            summary.view.slug, summary.unread_count
        );
    }
    Ok(())
}

/// Executes the view rm command.
pub async fn execute_remove(ctx: &CommandContext, session: &Session, key: &str, force: bool) -> Result<()> {
    let service = session.views();
    let view = service.get_view(&session.user_id, key).await?;
    let removed_rules = service.delete_view(&session.user_id, &view.id, force).await?;

    if ctx.json_output {
        let output = serde_json::json!({
            "deleted": view.slug,
            "deleted_rules": removed_rules,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !ctx.quiet {
        println!("Deleted view {}", view.slug);
        if removed_rules > 0 {
            println!("Deleted {} rule(s) that followed it", removed_rules);
        }
    }
    Ok(())
}

/// Executes the view reorder command.
pub async fn execute_reorder(ctx: &CommandContext, session: &Session, keys: &[String]) -> Result<()> {
    let service = session.views();
    service.reorder_views(&session.user_id, keys).await?;
    execute_list(ctx, session).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandError;
    use notibox_core::ServiceError;

    fn quiet_ctx() -> CommandContext {
        CommandContext {
            json_output: false,
            use_colors: false,
            quiet: true,
            verbose: 0,
        }
    }

    fn view(name: &str, query: &str) -> CreateView {
        CreateView {
            name: name.to_string(),
            query: query.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_add_list_and_remove() {
        let session = Session::in_memory("me").await;
        execute_add(&quiet_ctx(), &session, &view("Team Reviews", "reason:review_requested"))
            .await
            .unwrap();
        execute_add(&quiet_ctx(), &session, &view("Bots", "author:bot")).await.unwrap();
        execute_list(&quiet_ctx(), &session).await.unwrap();

        execute_reorder(&quiet_ctx(), &session, &["bots".to_string()]).await.unwrap();
        let slugs: Vec<String> = session
            .views()
            .list_views("me")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.view.slug)
            .collect();
        assert_eq!(slugs, vec!["bots", "team-reviews"]);

        execute_remove(&quiet_ctx(), &session, "Team Reviews", false).await.unwrap();
        let err = execute_remove(&quiet_ctx(), &session, "team-reviews", false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Service(ServiceError::NotFound { resource: "view", .. })
        ));
    }

    #[tokio::test]
    async fn test_reserved_name_is_rejected() {
        let session = Session::in_memory("me").await;
        let err = execute_add(&quiet_ctx(), &session, &view("Inbox", "is:unread"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Service(ServiceError::Validation(_))));
    }
}
