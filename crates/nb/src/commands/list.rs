//! List command implementation.
//!
//! Lists notifications matching a query, or the reduced poll rows. A saved
//! view's query can stand in for, or narrow, the query given.

use chrono::Utc;
use notibox_core::notification::ListOptions;

use super::{CommandContext, Result, Session};
use crate::output::{format_list_json, format_list_table, format_poll_json, format_poll_table};

/// Options for the list command.
#[derive(Debug, Default)]
pub struct ListCommandOptions {
    /// Query string; empty selects the inbox.
    pub query: String,
    /// Saved view whose query the listing starts from.
    pub view: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Print reduced rows instead of full notifications.
    pub poll: bool,
}

impl ListCommandOptions {
    fn list_options(&self, view_query: Option<&str>) -> ListOptions {
        let query = match view_query {
            Some(view_query) => combine_queries(view_query, &self.query),
            None => self.query.clone(),
        };
        let mut options = ListOptions::new(query);
        options.page = self.page;
        options.page_size = self.per_page;
        options
    }
}

/// Executes the list command.
///
/// # Errors
///
/// Returns an error if the store cannot be read. Invalid queries are
/// reported as warnings next to the best-effort result.
pub async fn execute(ctx: &CommandContext, session: &Session, opts: &ListCommandOptions) -> Result<()> {
    let service = session.notifications();
    let view_query = match &opts.view {
        Some(key) => Some(session.views().get_view(&session.user_id, key).await?.query),
        None => None,
    };
    let options = opts.list_options(view_query.as_deref());

    if opts.poll {
        let response = service.poll_notifications(&session.user_id, &options).await?;
        if ctx.json_output {
            println!("{}", format_poll_json(&response)?);
        } else if !ctx.quiet {
            print!("{}", format_poll_table(&response, Utc::now()));
        }
        return Ok(());
    }

    let response = service.list_notifications(&session.user_id, &options).await?;
    if ctx.json_output {
        println!("{}", format_list_json(&response)?);
    } else if !ctx.quiet {
        print!("{}", format_list_table(&response, Utc::now(), ctx.use_colors));
    }
    Ok(())
}

/// ANDs an extra query onto a view's query.
fn combine_queries(view_query: &str, query: &str) -> String {
    let query = query.trim();
    if query.is_empty() {
        view_query.to_string()
    } else {
        format!("({}) {}", view_query, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_options_pass_through_pagination() {
        let opts = ListCommandOptions {
            query: "repo:cli".to_string(),
            view: None,
            page: Some(2),
            per_page: Some(10),
            poll: false,
        };
        let options = opts.list_options(None);
        assert_eq!(options.query, "repo:cli");
        assert_eq!(options.page, Some(2));
        assert_eq!(options.page_size, Some(10));
    }

    #[test]
    fn test_view_query_is_narrowed_by_query() {
        let opts = ListCommandOptions {
            query: " is:unread ".to_string(),
            ..Default::default()
        };
        assert_eq!(
            opts.list_options(Some("reason:mention OR reason:author")).query,
            "(reason:mention OR reason:author) is:unread"
        );
        let bare = ListCommandOptions::default();
        assert_eq!(bare.list_options(Some("author:bot")).query, "author:bot");
    }

    #[tokio::test]
    async fn test_unknown_view_is_not_found() {
        let session = Session::in_memory("me").await;
        let ctx = CommandContext {
            json_output: false,
            use_colors: false,
            quiet: true,
            verbose: 0,
        };
        let opts = ListCommandOptions {
            view: Some("missing".to_string()),
            ..Default::default()
        };
        let err = execute(&ctx, &session, &opts).await.unwrap_err();
        assert!(matches!(
            err,
            crate::commands::CommandError::Service(notibox_core::ServiceError::NotFound {
                resource: "view",
                ..
            })
        ));
    }
}
