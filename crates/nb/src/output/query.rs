//! Query inspection output.

use notibox_core::query::fields::{all_fields, MatchKind};
use notibox_core::query::{CompiledQuery, SqlValue, ValidationError};
use owo_colors::OwoColorize;
use serde::Serialize;

/// JSON output structure for `query check`.
#[derive(Serialize)]
pub struct QueryCheckOutput<'a> {
    pub query: &'a str,
    pub valid: bool,
    pub errors: &'a [ValidationError],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    pub params: Vec<serde_json::Value>,
}

fn param_json(value: &SqlValue) -> serde_json::Value {
    match value {
        SqlValue::Text(text) => serde_json::Value::from(text.as_str()),
        SqlValue::Integer(n) => serde_json::Value::from(*n),
    }
}

/// Formats a query check as JSON.
pub fn format_check_json(
    query: &str,
    errors: &[ValidationError],
    compiled: Option<&CompiledQuery>,
) -> Result<String, serde_json::Error> {
    let output = QueryCheckOutput {
        query,
        valid: errors.is_empty(),
        errors,
        scope: compiled.map(|c| c.scope.as_str()),
        sql: compiled.map(CompiledQuery::select_sql),
        params: compiled
            .map(|c| c.params.iter().map(param_json).collect())
            .unwrap_or_default(),
    };
    serde_json::to_string_pretty(&output)
}

/// Formats a query check for humans: errors with a caret under the
/// offending position, or the compiled SQL.
pub fn format_check_text(
    query: &str,
    errors: &[ValidationError],
    compiled: Option<&CompiledQuery>,
    use_colors: bool,
) -> String {
    let mut output = String::new();

    if !errors.is_empty() {
        for error in errors {
            output.push_str(&format!("  {query}\n"));
            let before = query.get(..error.position).unwrap_or(query);
            let caret = format!("{}^", " ".repeat(before.chars().count()));
            if use_colors {
                output.push_str(&format!("  {}\n", caret.red()));
                output.push_str(&format!("{} {}\n", "error:".red().bold(), error.message));
            } else {
                output.push_str(&format!("  {caret}\n"));
                output.push_str(&format!("error: {}\n", error.message));
            }
        }
        return output;
    }

    if let Some(compiled) = compiled {
        output.push_str(&format!("Scope:  {}\n", compiled.scope.as_str()));
        output.push_str(&format!("SQL:    {}\n", compiled.select_sql()));
        if !compiled.params.is_empty() {
            let params: Vec<String> = compiled
                .params
                .iter()
                .map(|p| match p {
                    SqlValue::Text(text) => format!("{text:?}"),
                    SqlValue::Integer(n) => n.to_string(),
                })
                .collect();
            output.push_str(&format!("Params: {}\n", params.join(", ")));
        }
    }
    output
}

fn match_kind_label(kind: MatchKind) -> String {
    match kind {
        MatchKind::Contains => "contains".to_string(),
        MatchKind::Enum(values) => values.join("|"),
        MatchKind::Boolean => "true|false".to_string(),
        MatchKind::Special => "special".to_string(),
    }
}

/// JSON output structure for one queryable field.
#[derive(Serialize)]
pub struct FieldOutput {
    pub name: &'static str,
    pub values: String,
    pub negatable: bool,
    pub description: &'static str,
}

fn field_outputs() -> Vec<FieldOutput> {
    all_fields()
        .map(|spec| FieldOutput {
            name: spec.name.as_str(),
            values: match_kind_label(spec.match_kind),
            negatable: spec.negatable,
            description: spec.description,
        })
        .collect()
}

/// Formats the field registry as JSON.
pub fn format_fields_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&field_outputs())
}

/// Formats the field registry as a table.
pub fn format_fields_table(use_colors: bool) -> String {
    let mut output = String::new();
    let header = format!("{:<12} {:<4} {}", "Field", "Neg", "Description");
    if use_colors {
        output.push_str(&format!("{}\n", header.dimmed()));
    } else {
        output.push_str(&header);
        output.push('\n');
    }

    for field in field_outputs() {
        let negatable = if field.negatable { "yes" } else { "" };
        output.push_str(&format!(
            "{:<12} {:<4} {}\n",
            field.name, negatable, field.description
        ));
        if field.values != "contains" && field.values != "special" {
            output.push_str(&format!("{:<17} values: {}\n", "", field.values));
        }
    }
    output
}
