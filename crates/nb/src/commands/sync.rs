//! Sync command implementation.
//!
//! Pulls notifications from GitHub into the local store, and refetches
//! individual subjects on demand.

use notibox_core::SyncService;
use notibox_github::GithubClient;
use owo_colors::OwoColorize;

use super::config::Config;
use super::{CommandContext, Result, Session};
use crate::output::format_updated_json;

fn service(session: &Session, config: &Config, token: &str) -> Result<SyncService> {
    let client = match &config.github.api_url {
        Some(api_url) => GithubClient::with_base_url(token, api_url.as_str())?,
        None => GithubClient::new(token)?,
    };
    Ok(SyncService::new(
        session.store.clone(),
        client,
        config.sync_settings(),
    ))
}

/// Executes the sync command.
///
/// # Errors
///
/// Returns an error if GitHub cannot be reached or the store fails.
/// Failures on individual threads are counted, not returned.
pub async fn execute(ctx: &CommandContext, session: &Session, config: &Config, token: &str) -> Result<()> {
    let service = service(session, config, token)?;

    if ctx.verbose > 0 && !ctx.json_output {
        eprintln!("Syncing notifications from GitHub...");
    }

    let report = service.sync(&session.user_id).await?;

    if ctx.json_output {
        let output = serde_json::json!({
            "status": "success",
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !ctx.quiet {
        let kind = if report.initial { "Initial sync" } else { "Sync" };
        let summary = format!(
            "{} complete: {} fetched, {} stored",
            kind, report.fetched, report.processed
        );
        if ctx.use_colors {
            println!("{}", summary.green());
        } else {
            println!("{summary}");
        }
        if report.failed > 0 {
            let failed = format!("{} notifications could not be stored (see logs)", report.failed);
            if ctx.use_colors {
                println!("{}", failed.yellow());
            } else {
                println!("{failed}");
            }
        }
    }
    Ok(())
}

/// Executes the refresh command.
pub async fn execute_refresh(
    ctx: &CommandContext,
    session: &Session,
    config: &Config,
    token: &str,
    id: &str,
) -> Result<()> {
    let service = service(session, config, token)?;
    let notification = service.refresh_subject(&session.user_id, id).await?;

    if ctx.json_output {
        println!("{}", format_updated_json("refresh", &notification)?);
    } else if !ctx.quiet {
        let state = notification.subject_state.as_deref().unwrap_or("unknown");
        println!(
            "Refreshed {}: {} ({})",
            notification.github_id, notification.subject_title, state
        );
    }
    Ok(())
}
