//! Show command implementation.

use chrono::Utc;

use super::{CommandContext, Result, Session};
use crate::output::{format_item_details, format_item_json};

/// Executes the show command.
pub async fn execute(ctx: &CommandContext, session: &Session, id: &str) -> Result<()> {
    let item = session
        .notifications()
        .get_notification(&session.user_id, id)
        .await?;

    if ctx.json_output {
        println!("{}", format_item_json(&item)?);
    } else if !ctx.quiet {
        print!("{}", format_item_details(&item, Utc::now(), ctx.use_colors));
    }
    Ok(())
}
