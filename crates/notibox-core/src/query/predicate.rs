//! Lowering of the AST into column-level predicates.
//!
//! Field semantics live here and only here. The SQL compiler and the
//! in-memory evaluator both consume [`Predicate`] trees produced by
//! [`Predicate::lower`], so a field added to the registry is picked up by
//! both execution paths at once.

use super::ast::{BinaryOp, FieldTerm, FreeTextTerm, Query};
use super::fields::{self, FieldName, IsValue, MatchKind};
use super::scope::ViewScope;

/// Boolean status columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagColumn {
    Read,
    Archived,
    Starred,
    Muted,
    Filtered,
    /// Nullable; an unknown merge state counts as not merged.
    Merged,
}

/// Text columns that queries can search.
///
/// Nullable columns behave as the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColumn {
    SubjectTitle,
    SubjectType,
    RepoFullName,
    AuthorLogin,
    SubjectState,
    SubjectNumber,
    Reason,
    StateReason,
}

/// Columns searched by a free-text term.
pub const FREE_TEXT_COLUMNS: &[TextColumn] = &[
    TextColumn::SubjectTitle,
    TextColumn::SubjectType,
    TextColumn::RepoFullName,
    TextColumn::AuthorLogin,
    TextColumn::SubjectState,
    TextColumn::SubjectNumber,
];

/// A boolean condition over one notification row.
///
/// String operands are stored ASCII-lowercased; all text comparisons are
/// ASCII case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Always,
    Never,
    Flag { column: FlagColumn, value: bool },
    /// `snoozed_until` is set and later than now.
    Snoozed(bool),
    Contains { column: TextColumn, needle: String },
    StartsWith { column: TextColumn, prefix: String },
    Equals { column: TextColumn, value: String },
    /// Some assigned tag's slug contains the needle.
    TagContains(String),
    Any(Vec<Predicate>),
    All(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    fn flag(column: FlagColumn, value: bool) -> Predicate {
        Predicate::Flag { column, value }
    }

    fn negate(self) -> Predicate {
        match self {
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }

    fn any(mut predicates: Vec<Predicate>) -> Predicate {
        match predicates.len() {
            0 => Predicate::Never,
            1 => predicates.remove(0),
            _ => Predicate::Any(predicates),
        }
    }

    /// Lowers a query (already stripped of `in:` terms) into a predicate.
    pub fn lower(query: &Query) -> Predicate {
        match query {
            Query::All => Predicate::Always,
            Query::Field(term) => lower_field(term),
            Query::FreeText(term) => lower_free_text(term),
            Query::Binary { op, left, right } => {
                let parts = vec![Predicate::lower(left), Predicate::lower(right)];
                match op {
                    BinaryOp::And => Predicate::All(parts),
                    BinaryOp::Or => Predicate::Any(parts),
                }
            }
            Query::Group(inner) => Predicate::lower(inner),
            Query::Not(inner) => Predicate::lower(inner).negate(),
        }
    }

    /// The restriction a view scope places on rows.
    pub fn for_scope(scope: ViewScope) -> Predicate {
        use FlagColumn::*;
        match scope {
            ViewScope::Inbox => Predicate::All(vec![
                Predicate::flag(Archived, false),
                Predicate::Snoozed(false),
                Predicate::flag(Muted, false),
                Predicate::flag(Filtered, false),
            ]),
            ViewScope::Archive => Predicate::All(vec![
                Predicate::flag(Archived, true),
                Predicate::flag(Muted, false),
            ]),
            ViewScope::Snoozed => Predicate::All(vec![
                Predicate::Snoozed(true),
                Predicate::flag(Archived, false),
                Predicate::flag(Muted, false),
            ]),
            ViewScope::Filtered => Predicate::All(vec![
                Predicate::flag(Filtered, true),
                Predicate::flag(Archived, false),
                Predicate::Snoozed(false),
                Predicate::flag(Muted, false),
            ]),
            ViewScope::Anywhere => Predicate::Always,
        }
    }
}

fn lower_free_text(term: &FreeTextTerm) -> Predicate {
    let needle = term.text.to_ascii_lowercase();
    let predicate = Predicate::any(
        FREE_TEXT_COLUMNS
            .iter()
            .map(|column| Predicate::Contains {
                column: *column,
                needle: needle.clone(),
            })
            .collect(),
    );
    if term.negated {
        predicate.negate()
    } else {
        predicate
    }
}

fn lower_field(term: &FieldTerm) -> Predicate {
    let predicate = Predicate::any(
        term.values
            .iter()
            .map(|value| lower_value(term.field, value))
            .collect(),
    );
    if term.negated && term.field.spec().negatable {
        predicate.negate()
    } else {
        predicate
    }
}

fn lower_value(field: FieldName, value: &str) -> Predicate {
    let lower = value.trim().to_ascii_lowercase();
    match field {
        // Scope is applied separately; a leftover `in:` constrains nothing.
        FieldName::In => Predicate::Always,
        FieldName::Is => lower_is(&lower),
        FieldName::Repo => Predicate::Contains {
            column: TextColumn::RepoFullName,
            needle: lower,
        },
        FieldName::Org => Predicate::StartsWith {
            column: TextColumn::RepoFullName,
            prefix: format!("{}/", lower.trim_end_matches('/')),
        },
        FieldName::Author => Predicate::Contains {
            column: TextColumn::AuthorLogin,
            needle: lower,
        },
        FieldName::Tags => Predicate::TagContains(lower),
        FieldName::Reason => lower_enum(field, TextColumn::Reason, value),
        FieldName::Type => lower_enum(field, TextColumn::SubjectType, value),
        FieldName::StateReason => lower_enum(field, TextColumn::StateReason, value),
        FieldName::State => {
            if lower == "merged" {
                Predicate::flag(FlagColumn::Merged, true)
            } else {
                lower_enum(field, TextColumn::SubjectState, value)
            }
        }
        FieldName::Merged => match fields::parse_merged(&lower) {
            Some(v) => Predicate::flag(FlagColumn::Merged, v),
            None => Predicate::Never,
        },
        FieldName::Snoozed => match fields::parse_bool(&lower) {
            Some(v) => Predicate::Snoozed(v),
            None => Predicate::Never,
        },
        FieldName::Read => lower_bool(FlagColumn::Read, &lower),
        FieldName::Archived => lower_bool(FlagColumn::Archived, &lower),
        FieldName::Muted => lower_bool(FlagColumn::Muted, &lower),
        FieldName::Filtered => lower_bool(FlagColumn::Filtered, &lower),
        FieldName::Starred => lower_bool(FlagColumn::Starred, &lower),
    }
}

fn lower_is(value: &str) -> Predicate {
    match IsValue::parse(value) {
        Some(IsValue::Read) => Predicate::flag(FlagColumn::Read, true),
        Some(IsValue::Unread) => Predicate::flag(FlagColumn::Read, false),
        Some(IsValue::Archived) => Predicate::flag(FlagColumn::Archived, true),
        Some(IsValue::Muted) => Predicate::flag(FlagColumn::Muted, true),
        Some(IsValue::Snoozed) => Predicate::Snoozed(true),
        Some(IsValue::Starred) => Predicate::flag(FlagColumn::Starred, true),
        Some(IsValue::Filtered) => Predicate::flag(FlagColumn::Filtered, true),
        None => Predicate::Never,
    }
}

fn lower_bool(column: FlagColumn, value: &str) -> Predicate {
    match fields::parse_bool(value) {
        Some(v) => Predicate::flag(column, v),
        None => Predicate::Never,
    }
}

/// Unknown enum values match nothing instead of failing the query.
fn lower_enum(field: FieldName, column: TextColumn, value: &str) -> Predicate {
    let MatchKind::Enum(allowed) = field.spec().match_kind else {
        return Predicate::Never;
    };
    match fields::canonical_enum_value(allowed, value) {
        Some(canonical) => Predicate::Equals {
            column,
            value: canonical.to_ascii_lowercase(),
        },
        None => Predicate::Never,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;

    fn lowered(input: &str) -> Predicate {
        Predicate::lower(&parse(input).query)
    }

    #[test]
    fn test_comma_values_lower_to_any() {
        assert_eq!(
            lowered("reason:mention,comment"),
            Predicate::Any(vec![
                Predicate::Equals {
                    column: TextColumn::Reason,
                    value: "mention".to_string()
                },
                Predicate::Equals {
                    column: TextColumn::Reason,
                    value: "comment".to_string()
                },
            ])
        );
    }

    #[test]
    fn test_unknown_enum_value_never_matches() {
        assert_eq!(lowered("type:Gist"), Predicate::Never);
        assert_eq!(
            lowered("type:Gist,issue"),
            Predicate::Any(vec![
                Predicate::Never,
                Predicate::Equals {
                    column: TextColumn::SubjectType,
                    value: "issue".to_string()
                },
            ])
        );
    }

    #[test]
    fn test_org_becomes_owner_prefix() {
        assert_eq!(
            lowered("org:Acme"),
            Predicate::StartsWith {
                column: TextColumn::RepoFullName,
                prefix: "acme/".to_string()
            }
        );
    }

    #[test]
    fn test_state_merged_uses_merged_flag() {
        assert_eq!(
            lowered("state:merged"),
            Predicate::Flag {
                column: FlagColumn::Merged,
                value: true
            }
        );
    }

    #[test]
    fn test_negation_wraps_field() {
        assert_eq!(
            lowered("-is:unread"),
            Predicate::Not(Box::new(Predicate::Flag {
                column: FlagColumn::Read,
                value: false
            }))
        );
    }

    #[test]
    fn test_free_text_searches_all_text_columns() {
        match lowered("Bug") {
            Predicate::Any(parts) => {
                assert_eq!(parts.len(), FREE_TEXT_COLUMNS.len());
                assert!(parts.iter().all(|p| matches!(
                    p,
                    Predicate::Contains { needle, .. } if needle == "bug"
                )));
            }
            other => panic!("expected Any, got {other:?}"),
        }
    }

    #[test]
    fn test_inbox_scope_excludes_every_hidden_state() {
        let Predicate::All(parts) = Predicate::for_scope(ViewScope::Inbox) else {
            panic!("inbox should be a conjunction");
        };
        assert_eq!(parts.len(), 4);
        assert!(parts.contains(&Predicate::Snoozed(false)));
        assert_eq!(Predicate::for_scope(ViewScope::Anywhere), Predicate::Always);
    }
}
