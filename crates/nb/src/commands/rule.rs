//! Rule command implementation.
//!
//! Rules are addressed by ID or by name. Tags are given by name: `--tag`
//! creates missing tags, `--untag` needs an existing one.

use notibox_core::models::{Rule, RuleActions};
use notibox_core::rules::CreateRule;
use notibox_core::ServiceError;

use super::tag::find_tag;
use super::{CommandContext, Result, Session};
use crate::cli::RuleAddArgs;
use crate::output::{describe_actions, format_rules_json, format_rules_table};

/// Executes the rule list command.
pub async fn execute_list(ctx: &CommandContext, session: &Session) -> Result<()> {
    let rules = session.rules().list_rules(&session.user_id).await?;

    if ctx.json_output {
        println!("{}", format_rules_json(&rules)?);
    } else if !ctx.quiet {
        let views = session.store.list_views(&session.user_id).await?;
        let tags = session.notifications().list_tags(&session.user_id).await?;
        print!("{}", format_rules_table(&rules, &views, &tags, ctx.use_colors));
    }
    Ok(())
}

/// Executes the rule add command, optionally applying the new rule to
/// stored notifications.
pub async fn execute_add(ctx: &CommandContext, session: &Session, args: &RuleAddArgs) -> Result<()> {
    let actions = actions_from_args(session, args).await?;
    let view_id = match &args.view {
        Some(key) => Some(session.views().get_view(&session.user_id, key).await?.id),
        None => None,
    };
    let input = CreateRule {
        name: args.name.clone(),
        description: args.description.clone(),
        query: args.query.clone(),
        view_id,
        actions,
        enabled: Some(!args.disabled),
    };

    let service = session.rules();
    let rule = service.create_rule(&session.user_id, &input).await?;
    let applied = if args.apply {
        Some(service.apply_rule(&session.user_id, &rule.id).await?)
    } else {
        None
    };

    if ctx.json_output {
        let output = serde_json::json!({
            "rule": rule,
            "applied_count": applied,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !ctx.quiet {
        let tags = session.notifications().list_tags(&session.user_id).await?;
        println!("Created rule {} ({})", rule.name, describe_actions(&rule.actions, &tags));
        if let Some(count) = applied {
            println!("Applied to {} existing notification(s)", count);
        }
    }
    Ok(())
}

/// Executes the rule rm command.
pub async fn execute_remove(ctx: &CommandContext, session: &Session, key: &str) -> Result<()> {
    let rule = resolve_rule(session, key).await?;
    session.rules().delete_rule(&session.user_id, &rule.id).await?;
    report(ctx, "Deleted", &rule)
}

/// Executes the rule enable and disable commands.
pub async fn execute_set_enabled(
    ctx: &CommandContext,
    session: &Session,
    key: &str,
    enabled: bool,
) -> Result<()> {
    let rule = resolve_rule(session, key).await?;
    let rule = session
        .rules()
        .set_enabled(&session.user_id, &rule.id, enabled)
        .await?;
    report(ctx, if enabled { "Enabled" } else { "Disabled" }, &rule)
}

/// Executes the rule apply command.
pub async fn execute_apply(ctx: &CommandContext, session: &Session, key: &str) -> Result<()> {
    let rule = resolve_rule(session, key).await?;
    let count = session.rules().apply_rule(&session.user_id, &rule.id).await?;

    if ctx.json_output {
        let output = serde_json::json!({ "rule": rule.name, "applied_count": count });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !ctx.quiet {
        println!("Applied {} to {} notification(s)", rule.name, count);
    }
    Ok(())
}

/// Executes the rule reorder command.
pub async fn execute_reorder(ctx: &CommandContext, session: &Session, keys: &[String]) -> Result<()> {
    let mut ids = Vec::with_capacity(keys.len());
    for key in keys {
        ids.push(resolve_rule(session, key).await?.id);
    }
    let rules = session.rules().reorder_rules(&session.user_id, &ids).await?;

    if ctx.json_output {
        println!("{}", format_rules_json(&rules)?);
    } else if !ctx.quiet {
        let views = session.store.list_views(&session.user_id).await?;
        let tags = session.notifications().list_tags(&session.user_id).await?;
        print!("{}", format_rules_table(&rules, &views, &tags, ctx.use_colors));
    }
    Ok(())
}

/// Finds a rule by ID, then by case-insensitive name.
async fn resolve_rule(session: &Session, key: &str) -> Result<Rule> {
    let rules = session.rules().list_rules(&session.user_id).await?;
    let key = key.trim();
    rules
        .iter()
        .find(|rule| rule.id == key)
        .or_else(|| rules.iter().find(|rule| rule.name.eq_ignore_ascii_case(key)))
        .cloned()
        .ok_or_else(|| {
            ServiceError::NotFound {
                resource: "rule",
                id: key.to_string(),
            }
            .into()
        })
}

async fn actions_from_args(session: &Session, args: &RuleAddArgs) -> Result<RuleActions> {
    let service = session.notifications();

    let mut assign_tags = Vec::with_capacity(args.tags.len());
    for name in &args.tags {
        assign_tags.push(service.ensure_tag(&session.user_id, name).await?.id);
    }

    let mut remove_tags = Vec::with_capacity(args.untags.len());
    if !args.untags.is_empty() {
        let tags = service.list_tags(&session.user_id).await?;
        for name in &args.untags {
            let tag = find_tag(&tags, name).ok_or_else(|| ServiceError::NotFound {
                resource: "tag",
                id: name.to_string(),
            })?;
            remove_tags.push(tag.id.clone());
        }
    }

    Ok(RuleActions {
        skip_inbox: args.skip_inbox,
        mark_read: args.mark_read,
        star: args.star,
        archive: args.archive,
        mute: args.mute,
        assign_tags,
        remove_tags,
    })
}

fn report(ctx: &CommandContext, verb: &str, rule: &Rule) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(rule)?);
    } else if !ctx.quiet {
        println!("{} rule {}", verb, rule.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandError;
    use notibox_core::store::NotificationUpsert;

    fn quiet_ctx() -> CommandContext {
        CommandContext {
            json_output: false,
            use_colors: false,
            quiet: true,
            verbose: 0,
        }
    }

    fn add_args(name: &str, query: &str) -> RuleAddArgs {
        RuleAddArgs {
            name: name.to_string(),
            query: Some(query.to_string()),
            ..Default::default()
        }
    }

    async fn seed(session: &Session, github_id: &str, reason: &str) {
        session
            .notifications()
            .upsert_notification(&NotificationUpsert {
                user_id: "me".to_string(),
                github_id: github_id.to_string(),
                subject_type: "Issue".to_string(),
                subject_title: "Crash on start".to_string(),
                reason: Some(reason.to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_creates_tags_and_applies() {
        let session = Session::in_memory("me").await;
        seed(&session, "1", "mention").await;
        seed(&session, "2", "subscribed").await;

        let args = RuleAddArgs {
            mark_read: true,
            tags: vec!["Triage".to_string()],
            apply: true,
            ..add_args("Mentions", "reason:mention")
        };
        execute_add(&quiet_ctx(), &session, &args).await.unwrap();

        let rules = session.rules().list_rules("me").await.unwrap();
        assert_eq!(rules.len(), 1);
        let tags = session.notifications().list_tags("me").await.unwrap();
        assert_eq!(rules[0].actions.assign_tags, vec![tags[0].id.clone()]);

        let item = session.notifications().get_notification("me", "1").await.unwrap();
        assert!(item.notification.is_read);
        assert_eq!(item.tags, tags);
        let other = session.notifications().get_notification("me", "2").await.unwrap();
        assert!(!other.notification.is_read);
    }

    #[tokio::test]
    async fn test_add_rejects_rules_without_actions_or_unknown_untag() {
        let session = Session::in_memory("me").await;

        let err = execute_add(&quiet_ctx(), &session, &add_args("Empty", "is:unread"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Service(ServiceError::Validation(_))));

        let args = RuleAddArgs {
            untags: vec!["missing".to_string()],
            ..add_args("Untag", "is:unread")
        };
        let err = execute_add(&quiet_ctx(), &session, &args).await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Service(ServiceError::NotFound { resource: "tag", .. })
        ));
        assert!(session.rules().list_rules("me").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rules_are_addressed_by_name() {
        let session = Session::in_memory("me").await;
        let args = RuleAddArgs {
            star: true,
            ..add_args("Star Mentions", "reason:mention")
        };
        execute_add(&quiet_ctx(), &session, &args).await.unwrap();

        execute_set_enabled(&quiet_ctx(), &session, "star mentions", false).await.unwrap();
        assert!(!session.rules().list_rules("me").await.unwrap()[0].enabled);

        execute_remove(&quiet_ctx(), &session, "Star Mentions").await.unwrap();
        assert!(session.rules().list_rules("me").await.unwrap().is_empty());

        let err = execute_apply(&quiet_ctx(), &session, "Star Mentions").await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Service(ServiceError::NotFound { resource: "rule", .. })
        ));
    }
}
