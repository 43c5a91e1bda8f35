//! Query command implementation.
//!
//! Validates queries and shows what they compile to, without touching the
//! store.

use chrono::Utc;
use notibox_core::query::{compile, parse, CompileOptions, QueryError};

use super::{CommandContext, Result};
use crate::output::{format_check_json, format_check_text, format_fields_json, format_fields_table};

/// Executes the query check command.
///
/// # Errors
///
/// Returns [`QueryError::Invalid`] when the query has validation errors,
/// after printing them.
pub fn execute_check(ctx: &CommandContext, query: &str) -> Result<()> {
    let parsed = parse(query);
    let compiled = if parsed.errors.is_empty() {
        Some(compile(&parsed.query, &CompileOptions::unbounded(Utc::now()))?)
    } else {
        None
    };

    if ctx.json_output {
        println!("{}", format_check_json(query, &parsed.errors, compiled.as_ref())?);
    } else if !ctx.quiet || !parsed.errors.is_empty() {
        print!(
            "{}",
            format_check_text(query, &parsed.errors, compiled.as_ref(), ctx.use_colors)
        );
    }

    if parsed.errors.is_empty() {
        Ok(())
    } else {
        Err(QueryError::invalid(parsed.errors).into())
    }
}

/// Executes the query fields command.
pub fn execute_fields(ctx: &CommandContext) -> Result<()> {
    if ctx.json_output {
        println!("{}", format_fields_json()?);
    } else {
        print!("{}", format_fields_table(ctx.use_colors));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandError;

    fn quiet_ctx() -> CommandContext {
        CommandContext {
            json_output: false,
            use_colors: false,
            quiet: true,
            verbose: 0,
        }
    }

    #[test]
    fn test_check_valid_query() {
        assert!(execute_check(&quiet_ctx(), "repo:cli is:unread").is_ok());
        assert!(execute_check(&quiet_ctx(), "").is_ok());
    }

    #[test]
    fn test_check_invalid_query_fails() {
        let err = execute_check(&quiet_ctx(), "is:unread (").unwrap_err();
        assert!(matches!(err, CommandError::Query(QueryError::Invalid { .. })));
    }
}
