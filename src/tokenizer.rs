// src/tokenizer.rs
use serde::Serialize;

use crate::errors::TokenizerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Operator,
    Dot,
    Comma,
    Paren,
    Bracket,
    Arrow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    /// Byte offset of the first character of the token.
    pub position: usize,
    /// Byte offset just past the token in the source, quotes included.
    pub end: usize,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>, position: usize, end: usize) -> Self {
        Self { kind, value: value.into(), position, end }
    }

    pub fn is(&self, kind: TokenKind, value: &str) -> bool {
        self.kind == kind && self.value == value
    }
}

const TWO_CHAR_OPERATORS: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];

/// Split an expression into tokens. Whitespace-only input yields an empty vector.
pub fn tokenize(input: &str) -> Result<Vec<Token>, TokenizerError> {
    let mut scanner = Scanner::new(input);
    let mut tokens = Vec::new();
    loop {
        scanner.skip_ws();
        let Some(c) = scanner.peek_char() else { break };
        let start = scanner.i;

        // `=>` must win over `==`/`>=` style prefixes
        if scanner.peek_str("=>") {
            scanner.i += 2;
            tokens.push(Token::new(TokenKind::Arrow, "=>", start, scanner.i));
            continue;
        }
        if let Some(op) = TWO_CHAR_OPERATORS.iter().find(|op| scanner.peek_str(op)) {
            scanner.i += 2;
            tokens.push(Token::new(TokenKind::Operator, *op, start, scanner.i));
            continue;
        }

        match c {
            '<' | '>' | '!' => {
                scanner.i += 1;
                tokens.push(Token::new(TokenKind::Operator, c.to_string(), start, scanner.i));
            }
            '.' => {
                scanner.i += 1;
                tokens.push(Token::new(TokenKind::Dot, ".", start, scanner.i));
            }
            ',' => {
                scanner.i += 1;
                tokens.push(Token::new(TokenKind::Comma, ",", start, scanner.i));
            }
            '(' | ')' => {
                scanner.i += 1;
                tokens.push(Token::new(TokenKind::Paren, c.to_string(), start, scanner.i));
            }
            '[' | ']' => {
                scanner.i += 1;
                tokens.push(Token::new(TokenKind::Bracket, c.to_string(), start, scanner.i));
            }
            '\'' => {
                let text = scanner.scan_string()?;
                tokens.push(Token::new(TokenKind::String, text, start, scanner.i));
            }
            c if c.is_ascii_digit() => {
                let text = scanner.scan_number();
                tokens.push(Token::new(TokenKind::Number, text, start, scanner.i));
            }
            c if c == '_' || c.is_ascii_alphabetic() => {
                let text = scanner.scan_identifier();
                tokens.push(Token::new(TokenKind::Identifier, text, start, scanner.i));
            }
            other => {
                return Err(TokenizerError::new(format!("Unexpected character: {other}"), start));
            }
        }
    }
    Ok(tokens)
}

struct Scanner<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    fn scan_identifier(&mut self) -> &'a str {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if c == '_' || c.is_ascii_alphanumeric() {
                self.i += 1;
            } else {
                break;
            }
        }
        &self.s[start..self.i]
    }

    // A dot is only part of the number when a digit follows it, so `1.5` is a
    // decimal while `items.0x` style access keeps its dot token.
    fn scan_number(&mut self) -> &'a str {
        let start = self.i;
        self.skip_digits();
        if self.peek_char() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            self.i += 1;
            self.skip_digits();
        }
        &self.s[start..self.i]
    }

    fn scan_string(&mut self) -> Result<String, TokenizerError> {
        let start = self.i;
        self.i += 1;
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            self.i += c.len_utf8();
            match c {
                '\'' => return Ok(out),
                '\\' => match self.peek_char() {
                    Some(nc @ ('\'' | '\\')) => {
                        self.i += 1;
                        out.push(nc);
                    }
                    // unrecognized escapes are kept verbatim
                    _ => out.push('\\'),
                },
                _ => out.push(c),
            }
        }
        Err(TokenizerError::new("Unterminated string literal", start))
    }

    fn skip_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.i += 1;
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.s[self.i..].chars().nth(n)
    }

    fn peek_str(&self, lit: &str) -> bool {
        self.s[self.i..].starts_with(lit)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<(TokenKind, String)> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.value))
            .collect()
    }

    #[test]
    fn decimal_number_keeps_single_dot() {
        assert_eq!(
            kinds("score >= 7.5"),
            vec![
                (TokenKind::Identifier, "score".to_string()),
                (TokenKind::Operator, ">=".to_string()),
                (TokenKind::Number, "7.5".to_string()),
            ]
        );
    }

    #[test]
    fn dot_without_digit_is_not_decimal() {
        assert_eq!(
            kinds("1.x"),
            vec![
                (TokenKind::Number, "1".to_string()),
                (TokenKind::Dot, ".".to_string()),
                (TokenKind::Identifier, "x".to_string()),
            ]
        );
    }

    #[test]
    fn arrow_beats_comparison() {
        assert_eq!(kinds("a=>b")[1], (TokenKind::Arrow, "=>".to_string()));
        assert_eq!(kinds("a>=b")[1], (TokenKind::Operator, ">=".to_string()));
    }

    #[test]
    fn escapes_in_strings() {
        assert_eq!(kinds(r"'it\'s'")[0].1, "it's");
        assert_eq!(kinds(r"'a\\b'")[0].1, r"a\b");
        assert_eq!(kinds(r"'a\nb'")[0].1, r"a\nb");
    }

    #[test]
    fn span_end_covers_quotes_and_escapes() {
        let tokens = tokenize(r"x == 'it\'s'").unwrap();
        let spans: Vec<(usize, usize)> = tokens.iter().map(|t| (t.position, t.end)).collect();
        assert_eq!(spans, vec![(0, 1), (2, 4), (5, 12)]);
    }

    #[test]
    fn trailing_backslash_is_unterminated() {
        let err = tokenize("'end\\").unwrap_err();
        assert_eq!(err.message, "Unterminated string literal");
        assert_eq!(err.position, 0);
    }

    #[test]
    fn positions_are_byte_offsets() {
        let tokens = tokenize("'é' == x").unwrap();
        assert_eq!(tokens[1].position, 5);
        assert_eq!(tokens[2].position, 8);
    }
}
