//! Abstract Syntax Tree (AST) for notification queries.

use std::fmt;

use super::fields::FieldName;

/// A `field:value[,value...]` term. Values are ORed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTerm {
    pub field: FieldName,
    pub values: Vec<String>,
    pub negated: bool,
}

/// A bare word or quoted phrase matched against several text columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeTextTerm {
    pub text: String,
    pub negated: bool,
}

/// Boolean connective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
}

/// A parsed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Matches every notification. Produced by empty input and empty groups.
    All,

    /// A field comparison.
    Field(FieldTerm),

    /// A free-text search term.
    FreeText(FreeTextTerm),

    /// `left AND right` or `left OR right`.
    Binary {
        op: BinaryOp,
        left: Box<Query>,
        right: Box<Query>,
    },

    /// A parenthesized sub-expression. Only affects precedence.
    Group(Box<Query>),

    /// Negation of a sub-expression that is not a single term.
    Not(Box<Query>),
}

impl Query {
    /// Creates a field term.
    pub fn field<I, S>(field: FieldName, values: I) -> Query
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query::Field(FieldTerm {
            field,
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        })
    }

    /// Creates a free-text term.
    pub fn text(text: impl Into<String>) -> Query {
        Query::FreeText(FreeTextTerm {
            text: text.into(),
            negated: false,
        })
    }

    /// Creates an AND of two queries.
    pub fn and(left: Query, right: Query) -> Query {
        Query::Binary {
            op: BinaryOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates an OR of two queries.
    pub fn or(left: Query, right: Query) -> Query {
        Query::Binary {
            op: BinaryOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Wraps a query in a group.
    pub fn group(inner: Query) -> Query {
        Query::Group(Box::new(inner))
    }

    /// Negates a query.
    ///
    /// Terms carry their own `negated` flag; double negation cancels out.
    pub fn negate(self) -> Query {
        match self {
            Query::Field(mut term) => {
                term.negated = !term.negated;
                Query::Field(term)
            }
            Query::FreeText(mut term) => {
                term.negated = !term.negated;
                Query::FreeText(term)
            }
            Query::Not(inner) => *inner,
            other => Query::Not(Box::new(other)),
        }
    }

    /// Returns true for the match-everything query.
    pub fn is_all(&self) -> bool {
        matches!(self, Query::All)
    }

    /// Returns true if any term in the tree uses `field`.
    pub fn mentions(&self, field: FieldName) -> bool {
        match self {
            Query::Field(term) => term.field == field,
            Query::Binary { left, right, .. } => left.mentions(field) || right.mentions(field),
            Query::Group(inner) | Query::Not(inner) => inner.mentions(field),
            Query::All | Query::FreeText(_) => false,
        }
    }
}

/// Renders the query back into query-language text.
impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::All => Ok(()),
            Query::Field(term) => {
                if term.negated {
                    f.write_str("-")?;
                }
                write!(f, "{}:", term.field)?;
                for (i, value) in term.values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_value(f, value, true)?;
                }
                Ok(())
            }
            Query::FreeText(term) => {
                if term.negated {
                    f.write_str("-")?;
                }
                write_value(f, &term.text, false)
            }
            Query::Binary { op, left, right } => {
                write_operand(f, left, *op, false)?;
                match op {
                    BinaryOp::And => f.write_str(" ")?,
                    BinaryOp::Or => f.write_str(" OR ")?,
                }
                write_operand(f, right, *op, true)
            }
            Query::Group(inner) => write!(f, "({})", inner),
            Query::Not(inner) => match inner.as_ref() {
                Query::Group(_) => write!(f, "-{}", inner),
                other => write!(f, "-({})", other),
            },
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Query, parent: BinaryOp, right: bool) -> fmt::Result {
    let needs_parens = match operand {
        Query::Binary { op, .. } => (parent == BinaryOp::And && *op == BinaryOp::Or) || (right && *op == parent),
        _ => false,
    };
    if needs_parens {
        write!(f, "({})", operand)
    } else {
        write!(f, "{}", operand)
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &str, in_field: bool) -> fmt::Result {
    let is_keyword = matches!(value, "AND" | "OR" | "NOT");
    let needs_quotes = value.is_empty()
        || is_keyword
        || (!in_field && value.starts_with('-'))
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '"' | ',' | ':' | '\\'));

    if !needs_quotes {
        return f.write_str(value);
    }

    f.write_str("\"")?;
    for c in value.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            other => write!(f, "{}", other)?,
        }
    }
    f.write_str("\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negate_toggles_term_flag() {
        let q = Query::field(FieldName::Repo, ["cli"]).negate();
        assert!(matches!(q, Query::Field(FieldTerm { negated: true, .. })));
        assert_eq!(q.negate(), Query::field(FieldName::Repo, ["cli"]));
    }

    #[test]
    fn test_negate_group_wraps_in_not() {
        let group = Query::group(Query::text("bug"));
        let negated = group.clone().negate();
        assert_eq!(negated, Query::Not(Box::new(group.clone())));
        assert_eq!(negated.negate(), group);
    }

    #[test]
    fn test_mentions() {
        let q = Query::and(
            Query::text("x"),
            Query::group(Query::field(FieldName::In, ["archive"])),
        );
        assert!(q.mentions(FieldName::In));
        assert!(!q.mentions(FieldName::Is));
    }

    #[test]
    fn test_display() {
        let q = Query::and(
            Query::field(FieldName::Reason, ["mention", "comment"]),
            Query::group(Query::or(
                Query::text("hello world"),
                Query::field(FieldName::Repo, ["cli"]).negate(),
            )),
        );
        assert_eq!(q.to_string(), "reason:mention,comment (\"hello world\" OR -repo:cli)");
    }

    #[test]
    fn test_display_adds_parens_for_precedence() {
        let q = Query::and(Query::or(Query::text("a"), Query::text("b")), Query::text("c"));
        assert_eq!(q.to_string(), "(a OR b) c");
    }
}
