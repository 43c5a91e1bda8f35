//! Recursive descent parser for query strings.

use super::ast::{BinaryOp, FieldTerm, Query};
use super::error::{ValidationError, ValidationErrorKind};
use super::fields::{self, FieldName};
use super::lexer::{Lexer, PositionedToken, Token};

/// Output of [`parse`]: a best-effort AST plus every problem found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub query: Query,
    pub errors: Vec<ValidationError>,
}

impl Parsed {
    /// Returns true if no validation errors were found.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parses a query string.
///
/// Never fails: malformed input yields validation errors next to an AST that
/// keeps as much of the query as could be understood. Empty input yields
/// [`Query::All`].
///
/// # Grammar
///
/// ```text
/// or_expr  ::= and_expr ("OR" and_expr)*
/// and_expr ::= unary ("AND"? unary)*
/// unary    ::= ("NOT" | "-") unary | primary
/// primary  ::= "(" or_expr ")" | word ":" values | word | quoted
/// values   ::= value ("," value)*
/// ```
///
/// # Operator Precedence (highest to lowest)
///
/// 1. `NOT` / `-`
/// 2. `AND` and juxtaposition, left-associative
/// 3. `OR`, left-associative
pub fn parse(input: &str) -> Parsed {
    let lexed = Lexer::new(input).tokenize();
    let mut parser = Parser {
        tokens: lexed.tokens,
        position: 0,
        depth: 0,
        errors: lexed.errors,
    };

    let mut query = parser.parse_or_expr();
    while let Some(token) = parser.advance() {
        let position = token.position;
        parser.error(ValidationErrorKind::UnbalancedParen, position, "unexpected token");
        let rest = parser.parse_or_expr();
        query = combine(BinaryOp::And, query, rest);
    }

    let mut errors = parser.errors;
    errors.sort_by_key(|e| e.position);
    Parsed {
        query: query.unwrap_or(Query::All),
        errors,
    }
}

struct Parser {
    tokens: Vec<PositionedToken>,
    position: usize,
    depth: usize,
    errors: Vec<ValidationError>,
}

impl Parser {
    fn peek(&self) -> Option<&PositionedToken> {
        self.tokens.get(self.position)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<PositionedToken> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Position of the current token, or end of input.
    fn here(&self) -> usize {
        self.peek()
            .map(|t| t.position)
            .or_else(|| self.tokens.last().map(|t| t.position + 1))
            .unwrap_or(0)
    }

    fn error(&mut self, kind: ValidationErrorKind, position: usize, message: impl Into<String>) {
        self.errors.push(ValidationError::new(kind, position, message));
    }

    fn starts_term(token: &Token) -> bool {
        matches!(
            token,
            Token::LParen | Token::Not | Token::Word(_) | Token::Quoted(_)
        )
    }

    fn parse_or_expr(&mut self) -> Option<Query> {
        let mut left = self.parse_and_expr();

        while self.peek_token() == Some(&Token::Or) {
            let at = self.here();
            self.advance();
            let right = self.parse_and_expr();
            if left.is_none() || right.is_none() {
                self.error(
                    ValidationErrorKind::DanglingOperator,
                    at,
                    "OR needs a term on both sides",
                );
            }
            left = combine(BinaryOp::Or, left, right);
        }

        left
    }

    fn parse_and_expr(&mut self) -> Option<Query> {
        let mut left = self.parse_unary_expr();

        loop {
            match self.peek_token() {
                Some(Token::And) => {
                    let at = self.here();
                    self.advance();
                    let right = self.parse_unary_expr();
                    if left.is_none() || right.is_none() {
                        self.error(
                            ValidationErrorKind::DanglingOperator,
                            at,
                            "AND needs a term on both sides",
                        );
                    }
                    left = combine(BinaryOp::And, left, right);
                }
                Some(Token::RParen) if self.depth == 0 => {
                    let at = self.here();
                    self.advance();
                    self.error(ValidationErrorKind::UnbalancedParen, at, "unmatched ')'");
                }
                Some(token) if Self::starts_term(token) => {
                    let right = self.parse_unary_expr();
                    left = combine(BinaryOp::And, left, right);
                }
                _ => break,
            }
        }

        left
    }

    fn parse_unary_expr(&mut self) -> Option<Query> {
        if self.peek_token() != Some(&Token::Not) {
            return self.parse_primary();
        }

        let at = self.here();
        self.advance();
        match self.parse_unary_expr() {
            Some(Query::Field(term)) if term.field == FieldName::In => {
                self.error(
                    ValidationErrorKind::NotNegatable,
                    at,
                    "in: cannot be negated; negation ignored",
                );
                Some(Query::Field(term))
            }
            // The scope is extracted before evaluation, so a negated group
            // still selects the scope its in: names.
            Some(inner) if inner.mentions(FieldName::In) => {
                self.error(
                    ValidationErrorKind::NotNegatable,
                    at,
                    "in: cannot be negated inside a group; negation does not apply to it",
                );
                Some(inner.negate())
            }
            Some(inner) => Some(inner.negate()),
            None => {
                self.error(
                    ValidationErrorKind::DanglingOperator,
                    at,
                    "NOT must be followed by a term",
                );
                None
            }
        }
    }

    fn parse_primary(&mut self) -> Option<Query> {
        let token = self.peek()?.clone();

        match token.token {
            Token::LParen => {
                self.advance();
                self.depth += 1;
                let inner = self.parse_or_expr();
                if self.peek_token() == Some(&Token::RParen) {
                    self.advance();
                } else {
                    self.error(
                        ValidationErrorKind::UnbalancedParen,
                        token.position,
                        "missing ')'",
                    );
                }
                self.depth -= 1;

                match inner {
                    Some(inner) => Some(Query::group(inner)),
                    None => {
                        self.error(ValidationErrorKind::EmptyGroup, token.position, "empty group");
                        Some(Query::All)
                    }
                }
            }
            Token::Word(word) => {
                self.advance();
                if self.peek_token() == Some(&Token::Colon) {
                    self.advance();
                    self.parse_term(word, token.position)
                } else {
                    Some(Query::text(word))
                }
            }
            Token::Quoted(text) => {
                self.advance();
                Some(Query::text(text))
            }
            _ => None,
        }
    }

    /// Parses the value list after `name:`.
    fn parse_term(&mut self, name: String, position: usize) -> Option<Query> {
        let values = self.parse_values();

        let Some(field) = FieldName::lookup(&name) else {
            let message = match fields::suggest_field(&name) {
                Some(suggestion) => format!("unknown field: {} (did you mean {}?)", name, suggestion),
                None => format!("unknown field: {}", name),
            };
            self.error(ValidationErrorKind::UnknownField, position, message);
            return Some(Query::text(format!("{}:{}", name, values.join(","))));
        };

        if values.is_empty() {
            self.error(
                ValidationErrorKind::MissingValue,
                position,
                format!("{}: needs a value", field),
            );
            return None;
        }

        for value in &values {
            if let Some(message) = fields::check_value(field, value) {
                self.error(ValidationErrorKind::InvalidValue, position, message);
            }
        }

        Some(Query::Field(FieldTerm {
            field,
            values,
            negated: false,
        }))
    }

    fn parse_values(&mut self) -> Vec<String> {
        let mut values = Vec::new();
        let mut expect_value = true;

        while let Some(token) = self.peek() {
            match &token.token {
                Token::Word(v) | Token::Quoted(v) if expect_value => {
                    // Whitespace right after the colon ends the term.
                    if values.is_empty() && token.spaced {
                        break;
                    }
                    let v = v.trim().to_string();
                    self.advance();
                    if !v.is_empty() {
                        values.push(v);
                    }
                    expect_value = false;
                }
                Token::Comma => {
                    self.advance();
                    expect_value = true;
                }
                _ => break,
            }
        }

        values
    }
}

fn combine(op: BinaryOp, left: Option<Query>, right: Option<Query>) -> Option<Query> {
    match (left, right) {
        (Some(l), Some(r)) => Some(match op {
            BinaryOp::And => Query::and(l, r),
            BinaryOp::Or => Query::or(l, r),
        }),
        (Some(l), None) => Some(l),
        (None, r) => r,
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
