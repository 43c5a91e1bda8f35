//! Single-notification actions: read, archive, star, mute, snooze and
//! their inverses.

use notibox_core::models::Notification;
use notibox_core::notification::parse_snooze_until;
use notibox_core::NotificationService;
use owo_colors::OwoColorize;

use super::{CommandContext, Result, Session};
use crate::output::format_updated_json;

/// A status change applied to one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MarkRead,
    MarkUnread,
    Archive,
    Unarchive,
    Star,
    Unstar,
    Mute,
    Unmute,
    Unfilter,
    Unsnooze,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::MarkRead => "mark-read",
            Action::MarkUnread => "mark-unread",
            Action::Archive => "archive",
            Action::Unarchive => "unarchive",
            Action::Star => "star",
            Action::Unstar => "unstar",
            Action::Mute => "mute",
            Action::Unmute => "unmute",
            Action::Unfilter => "unfilter",
            Action::Unsnooze => "unsnooze",
        }
    }

    /// Past tense for confirmations.
    fn done(&self) -> &'static str {
        match self {
            Action::MarkRead => "Marked as read",
            Action::MarkUnread => "Marked as unread",
            Action::Archive => "Archived",
            Action::Unarchive => "Moved to inbox",
            Action::Star => "Starred",
            Action::Unstar => "Unstarred",
            Action::Mute => "Muted",
            Action::Unmute => "Unmuted",
            Action::Unfilter => "Unfiltered",
            Action::Unsnooze => "Unsnoozed",
        }
    }

    async fn apply(
        &self,
        service: &NotificationService,
        user_id: &str,
        id: &str,
    ) -> notibox_core::notification::Result<Notification> {
        match self {
            Action::MarkRead => service.mark_read(user_id, id).await,
            Action::MarkUnread => service.mark_unread(user_id, id).await,
            Action::Archive => service.archive(user_id, id).await,
            Action::Unarchive => service.unarchive(user_id, id).await,
            Action::Star => service.star(user_id, id).await,
            Action::Unstar => service.unstar(user_id, id).await,
            Action::Mute => service.mute(user_id, id).await,
            Action::Unmute => service.unmute(user_id, id).await,
            Action::Unfilter => service.unfilter(user_id, id).await,
            Action::Unsnooze => service.unsnooze(user_id, id).await,
        }
    }
}

/// Executes a single action.
pub async fn execute(ctx: &CommandContext, session: &Session, action: Action, id: &str) -> Result<()> {
    let notification = action
        .apply(&session.notifications(), &session.user_id, id)
        .await?;
    report(ctx, action.as_str(), action.done(), &notification)
}

/// Executes the snooze command.
pub async fn execute_snooze(ctx: &CommandContext, session: &Session, id: &str, until: &str) -> Result<()> {
    let until = parse_snooze_until(until)?;
    let notification = session
        .notifications()
        .snooze(&session.user_id, id, until)
        .await?;
    let message = format!("Snoozed until {}", crate::output::helpers::format_datetime(until));
    report(ctx, "snooze", &message, &notification)
}

fn report(ctx: &CommandContext, action: &str, message: &str, notification: &Notification) -> Result<()> {
    if ctx.json_output {
        println!("{}", format_updated_json(action, notification)?);
    } else if !ctx.quiet {
        let title = crate::output::helpers::truncate_str(&notification.subject_title, 60);
        if ctx.use_colors {
            println!("{}: {}", message.green(), title);
        } else {
            println!("{}: {}", message, title);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notibox_core::store::NotificationUpsert;

    fn quiet_ctx() -> CommandContext {
        CommandContext {
            json_output: false,
            use_colors: false,
            quiet: true,
            verbose: 0,
        }
    }

    async fn seeded_session() -> Session {
        let session = Session::in_memory("me").await;
        session
            .notifications()
            .upsert_notification(&NotificationUpsert {
                user_id: "me".to_string(),
                github_id: "1001".to_string(),
                subject_type: "Issue".to_string(),
                subject_title: "Crash on start".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_actions_change_status() {
        let session = seeded_session().await;
        let ctx = quiet_ctx();

        execute(&ctx, &session, Action::Star, "1001").await.unwrap();
        execute(&ctx, &session, Action::Archive, "1001").await.unwrap();

        let item = session
            .notifications()
            .get_notification("me", "1001")
            .await
            .unwrap();
        assert!(item.notification.starred);
        assert!(item.notification.archived);
    }

    #[tokio::test]
    async fn test_snooze_rejects_bad_timestamp() {
        let session = seeded_session().await;
        let err = execute_snooze(&quiet_ctx(), &session, "1001", "tomorrow")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid snooze time"));
    }

    #[tokio::test]
    async fn test_unknown_notification() {
        let session = seeded_session().await;
        let err = execute(&quiet_ctx(), &session, Action::MarkRead, "404")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "notification '404' not found");
    }
}
