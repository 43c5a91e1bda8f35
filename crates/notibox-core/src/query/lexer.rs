//! Lexer (tokenizer) for query strings.

use super::error::{ValidationError, ValidationErrorKind};

/// A token in a query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Opening parenthesis `(`.
    LParen,
    /// Closing parenthesis `)`.
    RParen,
    /// `:` directly after a field name.
    Colon,
    /// `,` separating values of one field.
    Comma,
    /// The `AND` keyword (upper case only).
    And,
    /// The `OR` keyword (upper case only).
    Or,
    /// The `NOT` keyword or a leading `-`.
    Not,
    /// An unquoted word.
    Word(String),
    /// A double-quoted string with escapes resolved.
    Quoted(String),
}

/// A token with its position in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedToken {
    pub token: Token,
    /// Byte offset where the token starts.
    pub position: usize,
    /// Whether whitespace separated this token from the previous one.
    pub spaced: bool,
}

/// Result of tokenizing a query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerResult {
    pub tokens: Vec<PositionedToken>,
    /// Lexical problems. Tokenizing always runs to the end of input.
    pub errors: Vec<ValidationError>,
}

/// Lexer for query strings.
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    /// Set after a `:` or `,` while reading a field's value list.
    in_values: bool,
    tokens: Vec<PositionedToken>,
    errors: Vec<ValidationError>,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input string.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            in_values: false,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Tokenizes the whole input.
    pub fn tokenize(mut self) -> LexerResult {
        loop {
            let spaced = self.skip_whitespace();
            if spaced {
                self.in_values = false;
            }
            let Some(c) = self.peek() else {
                break;
            };
            let start = self.position;

            let token = match c {
                '(' => {
                    self.bump();
                    self.in_values = false;
                    Token::LParen
                }
                ')' => {
                    self.bump();
                    self.in_values = false;
                    Token::RParen
                }
                '"' => self.read_quoted(),
                ',' if self.in_values => {
                    self.bump();
                    Token::Comma
                }
                '-' if !self.in_values && self.starts_negation() => {
                    self.bump();
                    Token::Not
                }
                _ if self.in_values => Token::Word(self.read_value()),
                _ => self.read_word(),
            };

            let after_value = matches!(token, Token::Word(_) | Token::Quoted(_));
            let is_colon_candidate =
                matches!(token, Token::Word(_)) && self.peek() == Some(':') && !self.in_values;
            self.tokens.push(PositionedToken {
                token,
                position: start,
                spaced,
            });

            if is_colon_candidate {
                let colon_at = self.position;
                self.bump();
                self.tokens.push(PositionedToken {
                    token: Token::Colon,
                    position: colon_at,
                    spaced: false,
                });
                self.in_values = true;
            } else if after_value && self.in_values && self.peek() != Some(',') {
                self.in_values = false;
            }
        }

        LexerResult {
            tokens: self.tokens,
            errors: self.errors,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    /// Skips whitespace, returning whether any was skipped.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.position;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.position > start || self.tokens.is_empty()
    }

    /// A `-` negates when it is followed by something that starts a term.
    fn starts_negation(&self) -> bool {
        let mut chars = self.rest().chars();
        chars.next();
        matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '(' || c == '"')
    }

    fn read_word(&mut self) -> Token {
        let start = self.position;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '"' | ':') {
                break;
            }
            self.bump();
        }
        let word = &self.input[start..self.position];

        if self.peek() != Some(':') {
            match word {
                "AND" => return Token::And,
                "OR" => return Token::Or,
                "NOT" => return Token::Not,
                _ => {}
            }
        }
        if word.is_empty() {
            // A lone ':' that does not follow a word.
            self.bump();
            return Token::Word(":".to_string());
        }
        Token::Word(word.to_string())
    }

    fn read_value(&mut self) -> String {
        let start = self.position;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '"' | ',') {
                break;
            }
            self.bump();
        }
        self.input[start..self.position].to_string()
    }

    fn read_quoted(&mut self) -> Token {
        let start = self.position;
        self.bump();
        let mut value = String::new();

        loop {
            match self.bump() {
                Some('"') => return Token::Quoted(value),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => value.push(other),
                    None => value.push('\\'),
                },
                Some(c) => value.push(c),
                None => {
                    self.errors.push(ValidationError::new(
                        ValidationErrorKind::UnterminatedQuote,
                        start,
                        "unterminated quote",
                    ));
                    return Token::Quoted(value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .tokens
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn test_field_with_value_list() {
        assert_eq!(
            tokens("reason:mention,comment"),
            vec![
                word("reason"),
                Token::Colon,
                word("mention"),
                Token::Comma,
                word("comment")
            ]
        );
    }

    #[test]
    fn test_keywords_are_upper_case_only() {
        assert_eq!(tokens("a AND b"), vec![word("a"), Token::And, word("b")]);
        assert_eq!(tokens("a and b"), vec![word("a"), word("and"), word("b")]);
        assert_eq!(tokens("a OR b"), vec![word("a"), Token::Or, word("b")]);
        assert_eq!(tokens("NOT a"), vec![Token::Not, word("a")]);
    }

    #[test]
    fn test_dash_negation() {
        assert_eq!(
            tokens("-repo:cli"),
            vec![Token::Not, word("repo"), Token::Colon, word("cli")]
        );
        assert_eq!(tokens("-(a)"), vec![Token::Not, Token::LParen, word("a"), Token::RParen]);
        // Dashes inside words and before digits are literal.
        assert_eq!(tokens("foo-bar -1"), vec![word("foo-bar"), word("-1")]);
    }

    #[test]
    fn test_value_may_contain_dash_and_colon() {
        assert_eq!(
            tokens("repo:my-org/my-repo"),
            vec![word("repo"), Token::Colon, word("my-org/my-repo")]
        );
        assert_eq!(
            tokens("author:a:b"),
            vec![word("author"), Token::Colon, word("a:b")]
        );
    }

    #[test]
    fn test_quoted_value_preserves_whitespace_and_escapes() {
        assert_eq!(
            tokens(r#"repo:"a b" "say \"hi\"""#),
            vec![
                word("repo"),
                Token::Colon,
                Token::Quoted("a b".to_string()),
                Token::Quoted("say \"hi\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_unterminated_quote_is_reported_and_consumes_rest() {
        let result = Lexer::new(r#"is:unread "open ended"#).tokenize();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ValidationErrorKind::UnterminatedQuote);
        assert_eq!(result.errors[0].position, 10);
        assert_eq!(
            result.tokens.last().map(|t| t.token.clone()),
            Some(Token::Quoted("open ended".to_string()))
        );
    }

    #[test]
    fn test_whitespace_ends_value_list() {
        let result = Lexer::new("repo: cli").tokenize();
        let kinds: Vec<_> = result.tokens.iter().map(|t| (&t.token, t.spaced)).collect();
        assert_eq!(
            kinds,
            vec![
                (&word("repo"), true),
                (&Token::Colon, false),
                (&word("cli"), true)
            ]
        );
    }

    #[test]
    fn test_commas_outside_values_are_literal() {
        assert_eq!(tokens("foo,bar"), vec![word("foo,bar")]);
    }

    #[test]
    fn test_parens_and_positions() {
        let result = Lexer::new("(a OR b)").tokenize();
        let positions: Vec<_> = result.tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 3, 6, 7]);
    }
}
