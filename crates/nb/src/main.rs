use clap::Parser;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands, ConfigCommands, QueryCommands, RuleCommands, TagCommands, ViewCommands};
use commands::actions::Action;
use commands::config::{load_config, Config};
use commands::{CommandContext, CommandError, Session};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                let error_json = serde_json::json!({
                    "error": {
                        "code": error_code(&e),
                        "message": e.to_string(),
                    }
                });
                match serde_json::to_string_pretty(&error_json) {
                    Ok(json) => eprintln!("{json}"),
                    Err(_) => eprintln!("Error: {e}"),
                }
            } else {
                eprintln!("Error: {e}");
            }
            error_exit_code(&e)
        }
    }
}

/// Sends logs to stderr. `RUST_LOG` wins over the verbosity flags.
fn init_tracing(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli) -> commands::Result<()> {
    let Some(command) = &cli.command else {
        return Err(CommandError::Config(
            "No command given. Run `nb --help` for usage".to_string(),
        ));
    };

    // Config commands must work even when the file does not parse.
    if let Commands::Config { command } = command {
        let ctx = CommandContext::from_cli(cli, &Config::default());
        return match command {
            None | Some(ConfigCommands::Show) => commands::config::execute_show(&ctx),
            Some(ConfigCommands::Set { key, value }) => commands::config::execute_set(
                &ctx,
                &commands::config::ConfigSetOptions {
                    key: key.clone(),
                    value: value.clone(),
                },
            ),
            Some(ConfigCommands::Path) => commands::config::execute_path(&ctx),
        };
    }

    let config = load_config()?;
    let ctx = CommandContext::from_cli(cli, &config);

    // Query inspection never opens the store.
    if let Commands::Query { command } = command {
        return match command {
            QueryCommands::Check { query } => commands::query::execute_check(&ctx, query),
            QueryCommands::Fields => commands::query::execute_fields(&ctx),
        };
    }

    let session = Session::open(&config).await?;

    match command {
        Commands::Sync => {
            let token = resolve_token(cli, &config)?;
            commands::sync::execute(&ctx, &session, &config, &token).await
        }
        Commands::Refresh { id } => {
            let token = resolve_token(cli, &config)?;
            commands::sync::execute_refresh(&ctx, &session, &config, &token, id).await
        }
        Commands::List {
            query,
            view,
            page,
            per_page,
            poll,
        } => {
            let opts = commands::list::ListCommandOptions {
                query: query.clone(),
                view: view.clone(),
                page: *page,
                per_page: *per_page,
                poll: *poll,
            };
            commands::list::execute(&ctx, &session, &opts).await
        }
        Commands::Show { id } => commands::show::execute(&ctx, &session, id).await,
        Commands::Read { id } => commands::actions::execute(&ctx, &session, Action::MarkRead, id).await,
        Commands::Unread { id } => {
            commands::actions::execute(&ctx, &session, Action::MarkUnread, id).await
        }
        Commands::Archive { id } => commands::actions::execute(&ctx, &session, Action::Archive, id).await,
        Commands::Unarchive { id } => {
            commands::actions::execute(&ctx, &session, Action::Unarchive, id).await
        }
        Commands::Star { id } => commands::actions::execute(&ctx, &session, Action::Star, id).await,
        Commands::Unstar { id } => commands::actions::execute(&ctx, &session, Action::Unstar, id).await,
        Commands::Mute { id } => commands::actions::execute(&ctx, &session, Action::Mute, id).await,
        Commands::Unmute { id } => commands::actions::execute(&ctx, &session, Action::Unmute, id).await,
        Commands::Unfilter { id } => {
            commands::actions::execute(&ctx, &session, Action::Unfilter, id).await
        }
        Commands::Unsnooze { id } => {
            commands::actions::execute(&ctx, &session, Action::Unsnooze, id).await
        }
        Commands::Snooze { id, until } => {
            commands::actions::execute_snooze(&ctx, &session, id, until).await
        }
        Commands::Bulk {
            operation,
            ids,
            query,
            until,
        } => {
            let opts = commands::bulk::BulkOptions {
                operation: operation.clone(),
                ids: ids.clone(),
                query: query.clone(),
                until: until.clone(),
            };
            commands::bulk::execute(&ctx, &session, &opts).await
        }
        Commands::Tag { command } => match command {
            TagCommands::List => commands::tag::execute_list(&ctx, &session).await,
            TagCommands::Assign { id, name } => {
                commands::tag::execute_assign(&ctx, &session, id, name).await
            }
            TagCommands::Remove { id, name } => {
                commands::tag::execute_remove(&ctx, &session, id, name).await
            }
        },
        Commands::Rule { command } => match command {
            RuleCommands::List => commands::rule::execute_list(&ctx, &session).await,
            RuleCommands::Add(args) => commands::rule::execute_add(&ctx, &session, args).await,
            RuleCommands::Rm { rule } => commands::rule::execute_remove(&ctx, &session, rule).await,
            RuleCommands::Enable { rule } => {
                commands::rule::execute_set_enabled(&ctx, &session, rule, true).await
            }
            RuleCommands::Disable { rule } => {
                commands::rule::execute_set_enabled(&ctx, &session, rule, false).await
            }
            RuleCommands::Apply { rule } => commands::rule::execute_apply(&ctx, &session, rule).await,
            RuleCommands::Reorder { rules } => {
                commands::rule::execute_reorder(&ctx, &session, rules).await
            }
        },
        Commands::View { command } => match command {
            ViewCommands::List => commands::view::execute_list(&ctx, &session).await,
            ViewCommands::Add {
                name,
                query,
                description,
                icon,
            } => {
                let input = notibox_core::views::CreateView {
                    name: name.clone(),
                    description: description.clone(),
                    icon: icon.clone(),
                    query: query.clone(),
                    is_default: false,
                };
                commands::view::execute_add(&ctx, &session, &input).await
            }
            ViewCommands::Rm { view, force } => {
                commands::view::execute_remove(&ctx, &session, view, *force).await
            }
            ViewCommands::Reorder { views } => {
                commands::view::execute_reorder(&ctx, &session, views).await
            }
        },
        Commands::Query { .. } | Commands::Config { .. } => Ok(()),
    }
}

/// Returns the error code string for JSON output.
fn error_code(e: &CommandError) -> &'static str {
    match e {
        CommandError::Service(err) if err.is_not_found() => "NOT_FOUND",
        CommandError::Service(err) if err.is_validation() => "VALIDATION_ERROR",
        CommandError::Service(_) => "STORE_ERROR",
        CommandError::Sync(_) => "SYNC_ERROR",
        CommandError::Store(_) => "STORE_ERROR",
        CommandError::Api(_) => "API_ERROR",
        CommandError::Query(_) => "QUERY_ERROR",
        CommandError::Config(_) => "CONFIG_ERROR",
        CommandError::Io(_) => "IO_ERROR",
        CommandError::Json(_) => "JSON_ERROR",
    }
}

/// Returns the exit code for an error.
fn error_exit_code(e: &CommandError) -> ExitCode {
    ExitCode::from(exit_status(e))
}

fn exit_status(e: &CommandError) -> u8 {
    match e {
        CommandError::Config(_) => 5,
        CommandError::Query(_) => 1,
        CommandError::Service(err) if err.is_validation() || err.is_not_found() => 1,
        CommandError::Service(_) | CommandError::Store(_) => 5,
        CommandError::Api(err) => u8::try_from(err.exit_code()).unwrap_or(1),
        CommandError::Sync(err) => u8::try_from(err.exit_code()).unwrap_or(1),
        CommandError::Io(_) => 3,
        CommandError::Json(_) => 1,
    }
}

/// Resolves the GitHub token with priority: flag > env > config.
///
/// 1. `--token` command line flag
/// 2. `GITHUB_TOKEN` environment variable (clap reads it into the same field)
/// 3. `token` in the config file
fn resolve_token_optional(cli: &Cli, config: &Config) -> Option<String> {
    cli.token
        .as_ref()
        .or(config.token.as_ref())
        .filter(|token| !token.trim().is_empty())
        .cloned()
}

/// Resolves the GitHub token, failing when none is configured.
fn resolve_token(cli: &Cli, config: &Config) -> commands::Result<String> {
    resolve_token_optional(cli, config).ok_or_else(|| {
        CommandError::Config(
            "No GitHub token found. Set GITHUB_TOKEN or run `nb config set token <token>`"
                .to_string(),
        )
    })
}
