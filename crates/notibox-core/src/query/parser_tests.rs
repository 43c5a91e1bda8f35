//! Tests for the query parser.

use super::*;
use crate::query::ast::FreeTextTerm;

fn q(input: &str) -> Query {
    let parsed = parse(input);
    assert!(parsed.is_valid(), "unexpected errors for {input:?}: {:?}", parsed.errors);
    parsed.query
}

fn field(name: FieldName, values: &[&str]) -> Query {
    Query::field(name, values.iter().copied())
}

fn kinds(input: &str) -> Vec<ValidationErrorKind> {
    parse(input).errors.into_iter().map(|e| e.kind).collect()
}

// ==================== Basics ====================

#[test]
fn test_empty_input_matches_everything() {
    assert_eq!(q(""), Query::All);
    assert_eq!(q("   \t "), Query::All);
}

#[test]
fn test_single_field_term() {
    assert_eq!(q("repo:cli"), field(FieldName::Repo, &["cli"]));
}

#[test]
fn test_field_names_are_case_insensitive() {
    assert_eq!(q("REPO:cli"), field(FieldName::Repo, &["cli"]));
    assert_eq!(q("Repository:cli"), field(FieldName::Repo, &["cli"]));
}

#[test]
fn test_comma_values_stay_in_one_term() {
    assert_eq!(
        q("reason:mention,comment"),
        field(FieldName::Reason, &["mention", "comment"])
    );
}

#[test]
fn test_quoted_field_value() {
    assert_eq!(q(r#"author:"jane doe""#), field(FieldName::Author, &["jane doe"]));
}

#[test]
fn test_free_text() {
    assert_eq!(q("flaky"), Query::text("flaky"));
    assert_eq!(q(r#""flaky test""#), Query::text("flaky test"));
}

// ==================== Operators ====================

#[test]
fn test_implicit_and() {
    assert_eq!(
        q("is:unread repo:cli"),
        Query::and(field(FieldName::Is, &["unread"]), field(FieldName::Repo, &["cli"]))
    );
}

#[test]
fn test_explicit_and_equals_implicit_and() {
    assert_eq!(q("is:unread AND repo:cli"), q("is:unread repo:cli"));
}

#[test]
fn test_lowercase_and_is_free_text() {
    assert_eq!(
        q("a and b"),
        Query::and(Query::and(Query::text("a"), Query::text("and")), Query::text("b"))
    );
}

#[test]
fn test_and_binds_tighter_than_or() {
    // a OR b c  ==  a OR (b AND c)
    assert_eq!(
        q("a OR b c"),
        Query::or(Query::text("a"), Query::and(Query::text("b"), Query::text("c")))
    );
    // a b OR c  ==  (a AND b) OR c
    assert_eq!(
        q("a b OR c"),
        Query::or(Query::and(Query::text("a"), Query::text("b")), Query::text("c"))
    );
}

#[test]
fn test_operators_are_left_associative() {
    assert_eq!(
        q("a OR b OR c"),
        Query::or(Query::or(Query::text("a"), Query::text("b")), Query::text("c"))
    );
}

#[test]
fn test_parentheses_override_precedence() {
    assert_eq!(
        q("(a OR b) c"),
        Query::and(
            Query::group(Query::or(Query::text("a"), Query::text("b"))),
            Query::text("c")
        )
    );
}

#[test]
fn test_nested_groups() {
    assert_eq!(
        q("((a))"),
        Query::group(Query::group(Query::text("a")))
    );
}

// ==================== Negation ====================

#[test]
fn test_dash_and_not_are_equivalent() {
    assert_eq!(q("-repo:cli"), q("NOT repo:cli"));
    assert_eq!(
        q("-repo:cli"),
        Query::Field(FieldTerm {
            field: FieldName::Repo,
            values: vec!["cli".to_string()],
            negated: true,
        })
    );
}

#[test]
fn test_negated_free_text() {
    assert_eq!(
        q("-wip"),
        Query::FreeText(FreeTextTerm {
            text: "wip".to_string(),
            negated: true,
        })
    );
}

#[test]
fn test_negated_group() {
    assert_eq!(
        q("-(a OR b)"),
        Query::Not(Box::new(Query::group(Query::or(
            Query::text("a"),
            Query::text("b")
        ))))
    );
}

#[test]
fn test_not_binds_tighter_than_and() {
    assert_eq!(
        q("NOT a b"),
        Query::and(Query::text("a").negate(), Query::text("b"))
    );
}

#[test]
fn test_double_negation_cancels() {
    assert_eq!(q("NOT -repo:cli"), field(FieldName::Repo, &["cli"]));
}

// ==================== Validation & Recovery ====================

#[test]
fn test_unterminated_quote_keeps_text() {
    let parsed = parse(r#"is:unread "half open"#);
    assert_eq!(kinds(r#"is:unread "half open"#), vec![ValidationErrorKind::UnterminatedQuote]);
    assert_eq!(
        parsed.query,
        Query::and(field(FieldName::Is, &["unread"]), Query::text("half open"))
    );
}

#[test]
fn test_unknown_field_falls_back_to_free_text() {
    let parsed = parse("auther:jane");
    assert_eq!(parsed.errors.len(), 1);
    assert_eq!(parsed.errors[0].kind, ValidationErrorKind::UnknownField);
    assert!(parsed.errors[0].message.contains("did you mean author"));
    assert_eq!(parsed.query, Query::text("auther:jane"));
}

#[test]
fn test_empty_group_becomes_match_all() {
    let parsed = parse("()");
    assert_eq!(kinds("()"), vec![ValidationErrorKind::EmptyGroup]);
    assert_eq!(parsed.query, Query::All);
}

#[test]
fn test_missing_close_paren() {
    let parsed = parse("(a OR b");
    assert_eq!(kinds("(a OR b"), vec![ValidationErrorKind::UnbalancedParen]);
    assert_eq!(
        parsed.query,
        Query::group(Query::or(Query::text("a"), Query::text("b")))
    );
}

#[test]
fn test_dangling_close_paren_is_ignored() {
    let parsed = parse("a) b");
    assert_eq!(kinds("a) b"), vec![ValidationErrorKind::UnbalancedParen]);
    assert_eq!(parsed.query, Query::and(Query::text("a"), Query::text("b")));
}

#[test]
fn test_missing_value_drops_term() {
    let parsed = parse("repo: cli");
    assert_eq!(kinds("repo: cli"), vec![ValidationErrorKind::MissingValue]);
    assert_eq!(parsed.query, Query::text("cli"));
}

#[test]
fn test_negated_in_is_reported_and_ignored() {
    let parsed = parse("-in:archive");
    assert_eq!(kinds("-in:archive"), vec![ValidationErrorKind::NotNegatable]);
    assert_eq!(parsed.query, field(FieldName::In, &["archive"]));
}

#[test]
fn test_negated_group_with_in_is_reported() {
    for input in ["-(in:archive)", "NOT (repo:cli in:snoozed)", "-(is:unread OR (in:archive))"] {
        assert_eq!(kinds(input), vec![ValidationErrorKind::NotNegatable], "{input}");
    }
    assert!(kinds("-(repo:cli is:unread)").is_empty());
}

#[test]
fn test_invalid_is_value_is_reported_but_kept() {
    let parsed = parse("is:open");
    assert_eq!(kinds("is:open"), vec![ValidationErrorKind::InvalidValue]);
    assert_eq!(parsed.query, field(FieldName::Is, &["open"]));
}

#[test]
fn test_unknown_enum_value_is_not_an_error() {
    assert_eq!(q("reason:bogus"), field(FieldName::Reason, &["bogus"]));
}

#[test]
fn test_dangling_operators() {
    assert_eq!(kinds("a OR"), vec![ValidationErrorKind::DanglingOperator]);
    assert_eq!(parse("a OR").query, Query::text("a"));
    assert_eq!(kinds("AND a"), vec![ValidationErrorKind::DanglingOperator]);
    assert_eq!(kinds("a NOT"), vec![ValidationErrorKind::DanglingOperator]);
}

#[test]
fn test_errors_are_sorted_by_position() {
    let parsed = parse(r#"bogus:x () "open"#);
    let positions: Vec<_> = parsed.errors.iter().map(|e| e.position).collect();
    let mut sorted = positions.clone();
    sorted.sort();
    assert_eq!(positions, sorted);
    assert_eq!(parsed.errors.len(), 3);
}

// ==================== Properties ====================

#[test]
fn test_parse_is_idempotent() {
    let inputs = [
        "",
        "is:unread",
        "repo:cli (reason:mention OR -author:bot) \"exact phrase\"",
        "((a",
        "a) OR ",
        "-in:archive in:anywhere tags:urgent,p1",
        r#""unterminated"#,
    ];
    for input in inputs {
        assert_eq!(parse(input), parse(input), "not idempotent: {input:?}");
    }
}

#[test]
fn test_display_round_trips() {
    let inputs = [
        "is:unread repo:cli",
        "(a OR b) -c",
        "reason:mention,comment OR type:PullRequest",
        r#"author:"jane doe" -"wip pr""#,
        "-(repo:a OR repo:b)",
    ];
    for input in inputs {
        let first = q(input);
        let rendered = first.to_string();
        assert_eq!(q(&rendered), first, "{input:?} rendered as {rendered:?}");
    }
}
