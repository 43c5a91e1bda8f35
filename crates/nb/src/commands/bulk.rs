//! Bulk command implementation.

use notibox_core::notification::{BulkOperation, BulkRequest, BulkTarget};
use owo_colors::OwoColorize;

use super::{CommandContext, Result, Session};

/// Options for the bulk command.
#[derive(Debug, Default)]
pub struct BulkOptions {
    pub operation: String,
    pub ids: Vec<String>,
    pub query: Option<String>,
    pub until: Option<String>,
}

impl BulkOptions {
    fn request(&self) -> Result<BulkRequest> {
        let operation: BulkOperation = self.operation.parse()?;
        let target = BulkTarget {
            ids: self.ids.clone(),
            query: self.query.clone(),
        };
        Ok(BulkRequest {
            operation,
            target,
            snoozed_until: self.until.clone(),
        })
    }
}

/// Executes the bulk command.
///
/// # Errors
///
/// Returns a validation error before anything is written if the
/// operation, target or snooze time is unusable.
pub async fn execute(ctx: &CommandContext, session: &Session, opts: &BulkOptions) -> Result<()> {
    let request = opts.request()?;
    let result = session
        .notifications()
        .bulk_update(&session.user_id, &request)
        .await?;

    if ctx.json_output {
        let output = serde_json::json!({
            "operation": request.operation.as_str(),
            "affected_count": result.affected_count,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !ctx.quiet {
        let noun = if result.affected_count == 1 {
            "notification"
        } else {
            "notifications"
        };
        let line = format!(
            "{}: {} {}",
            request.operation, result.affected_count, noun
        );
        if ctx.use_colors {
            println!("{}", line.green());
        } else {
            println!("{line}");
        }
    }
    Ok(())
}
