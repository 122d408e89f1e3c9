// src/parser.rs
use std::str::FromStr;

use num_bigint::BigInt;

use crate::errors::ParseError;
use crate::expression::{BinaryOp, Expr, FieldPath, Literal, PathSegment};
use crate::functions::Registry;
use crate::tokenizer::{Token, TokenKind};

/// Deepest nesting of sub-expressions (parentheses, arguments, negations) accepted.
pub const MAX_EXPRESSION_DEPTH: usize = 32;

/// Parse a token stream into an expression tree.
///
/// Precedence from lowest to highest: `=>` (right-associative), `||`, `&&`,
/// `==`/`!=`, relational, unary `!`, postfix (`.field`, `[i]`, `.length`,
/// `.every(...)`), primary.
pub fn parse(tokens: &[Token]) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(tokens);
    if tokens.is_empty() {
        return Err(ParseError::new("Unexpected end of expression", 0));
    }
    let expr = parser.parse_expression()?;
    if let Some(tok) = parser.peek() {
        return Err(ParseError::new(
            format!("Unexpected token '{}'", tok.value),
            tok.position,
        ));
    }
    Ok(expr)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0, depth: 0 }
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let result = self.parse_implication();
        self.depth -= 1;
        result
    }

    fn parse_implication(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_or()?;
        if self.eat(TokenKind::Arrow, "=>") {
            let right = self.parse_expression()?;
            return Ok(Expr::binary(BinaryOp::Implies, left, right));
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut terms = vec![self.parse_and()?];
        while self.eat(TokenKind::Operator, "||") {
            terms.push(self.parse_and()?);
        }
        Ok(balanced(BinaryOp::Or, terms))
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut terms = vec![self.parse_equality()?];
        while self.eat(TokenKind::Operator, "&&") {
            terms.push(self.parse_equality()?);
        }
        Ok(balanced(BinaryOp::And, terms))
    }

    // Comparison chains nest to the left, so every chained operator counts
    // against the depth budget.
    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_relational()?;
        while let Some(op) = self.eat_operator(&["==", "!="]) {
            self.enter()?;
            let right = self.parse_relational()?;
            left = Expr::binary(op, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;
        while let Some(op) = self.eat_operator(&["<", "<=", ">", ">="]) {
            self.enter()?;
            let right = self.parse_unary()?;
            left = Expr::binary(op, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(TokenKind::Operator, "!") {
            self.enter()?;
            let inner = self.parse_unary();
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(TokenKind::Dot, ".") {
                let dot = self.advance_position();
                let name = self.expect_identifier("Expected property name after '.'")?;
                if name == "length" {
                    self.enter()?;
                    expr = Expr::Length(Box::new(expr));
                    continue;
                }
                if name == "every" && self.check(TokenKind::Paren, "(") {
                    expr = self.parse_every(expr, dot)?;
                    continue;
                }
                match &mut expr {
                    Expr::Field(path) => path.push(PathSegment::Key(name)),
                    _ => return Err(ParseError::new("Property access requires a field path", dot)),
                }
            } else if self.check(TokenKind::Bracket, "[") {
                let open = self.advance_position();
                let Expr::Field(path) = &mut expr else {
                    return Err(ParseError::new("Index access requires a field path", open));
                };
                let segment = self.parse_index_segment()?;
                path.push(segment);
                self.expect(TokenKind::Bracket, "]")?;
            } else {
                break;
            }
        }
        self.depth = depth;
        Ok(expr)
    }

    fn parse_index_segment(&mut self) -> Result<PathSegment, ParseError> {
        let Some(tok) = self.advance() else {
            return Err(self.unexpected_end());
        };
        match tok.kind {
            TokenKind::Number => tok
                .value
                .parse::<usize>()
                .map(PathSegment::Index)
                .map_err(|_| ParseError::new(format!("Invalid index '{}'", tok.value), tok.position)),
            TokenKind::String => Ok(PathSegment::Key(tok.value.clone())),
            _ => Err(ParseError::new(
                format!("Unexpected token '{}' in index", tok.value),
                tok.position,
            )),
        }
    }

    // `.every(p => body)`: the receiver must be a field path.
    fn parse_every(&mut self, target: Expr, at: usize) -> Result<Expr, ParseError> {
        let Expr::Field(path) = target else {
            return Err(ParseError::new("'.every' requires a field path", at));
        };
        self.expect(TokenKind::Paren, "(")?;
        let param = self.expect_identifier("Expected lambda parameter")?;
        self.expect(TokenKind::Arrow, "=>")?;
        let body = self.parse_expression()?;
        self.expect(TokenKind::Paren, ")")?;
        Ok(Expr::Every { path, param, body: Box::new(body) })
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(tok) = self.advance() else {
            return Err(self.unexpected_end());
        };
        match tok.kind {
            TokenKind::Number => parse_number(tok).map(Expr::Literal),
            TokenKind::String => Ok(Expr::Literal(Literal::String(tok.value.clone()))),
            TokenKind::Identifier => self.parse_identifier(tok),
            TokenKind::Paren if tok.value == "(" => {
                let inner = self.parse_expression()?;
                self.expect(TokenKind::Paren, ")")?;
                Ok(inner)
            }
            TokenKind::Bracket if tok.value == "[" => {
                let items = self.parse_list(TokenKind::Bracket, "]")?;
                Ok(Expr::Array(items))
            }
            _ => Err(ParseError::new(
                format!("Unexpected token '{}'", tok.value),
                tok.position,
            )),
        }
    }

    fn parse_identifier(&mut self, tok: &Token) -> Result<Expr, ParseError> {
        let literal = match tok.value.as_str() {
            "true" => Some(Literal::Bool(true)),
            "false" => Some(Literal::Bool(false)),
            "null" => Some(Literal::Null),
            "undefined" => Some(Literal::Undefined),
            _ => None,
        };
        if let Some(lit) = literal {
            return Ok(Expr::Literal(lit));
        }

        if !self.check(TokenKind::Paren, "(") {
            return Ok(Expr::Field(FieldPath::new(tok.value.clone())));
        }
        let Some(function) = Registry::global().get(&tok.value) else {
            return Err(ParseError::new(
                format!("Unknown function '{}'", tok.value),
                tok.position,
            ));
        };
        self.advance();
        let args = self.parse_list(TokenKind::Paren, ")")?;
        if !function.arity.contains(&args.len()) {
            let (min, max) = (function.arity.start(), function.arity.end());
            let expected = if min == max { min.to_string() } else { format!("{min} to {max}") };
            return Err(ParseError::new(
                format!(
                    "Function '{}' expects {expected} argument(s), got {}",
                    function.name,
                    args.len()
                ),
                tok.position,
            ));
        }
        Ok(Expr::Call { function, args })
    }

    // Comma separated expressions up to the closing token, which is consumed.
    fn parse_list(&mut self, kind: TokenKind, close: &str) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        if self.eat(kind, close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expression()?);
            if self.eat(TokenKind::Comma, ",") {
                continue;
            }
            self.expect(kind, close)?;
            return Ok(items);
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_EXPRESSION_DEPTH {
            let position = self.peek().map_or_else(|| self.end_position(), |t| t.position);
            return Err(ParseError::new(
                format!("Expression nesting exceeds maximum depth of {MAX_EXPRESSION_DEPTH}"),
                position,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    fn advance_position(&mut self) -> usize {
        self.advance().map_or_else(|| self.end_position(), |t| t.position)
    }

    fn check(&self, kind: TokenKind, value: &str) -> bool {
        self.peek().is_some_and(|t| t.is(kind, value))
    }

    fn eat(&mut self, kind: TokenKind, value: &str) -> bool {
        if self.check(kind, value) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_operator(&mut self, ops: &[&str]) -> Option<BinaryOp> {
        let tok = self.peek()?;
        if tok.kind != TokenKind::Operator || !ops.contains(&tok.value.as_str()) {
            return None;
        }
        let op = BinaryOp::from_operator(&tok.value)?;
        self.pos += 1;
        Some(op)
    }

    fn expect(&mut self, kind: TokenKind, value: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(tok) if tok.is(kind, value) => {
                self.pos += 1;
                Ok(())
            }
            Some(tok) => Err(ParseError::new(
                format!("Expected '{value}' but found '{}'", tok.value),
                tok.position,
            )),
            None => Err(ParseError::new(
                format!("Expected '{value}' but reached end of expression"),
                self.end_position(),
            )),
        }
    }

    fn expect_identifier(&mut self, message: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(tok) if tok.kind == TokenKind::Identifier => {
                self.pos += 1;
                Ok(tok.value.clone())
            }
            Some(tok) => Err(ParseError::new(message, tok.position)),
            None => Err(ParseError::new(message, self.end_position())),
        }
    }

    fn unexpected_end(&self) -> ParseError {
        ParseError::new("Unexpected end of expression", self.end_position())
    }

    fn end_position(&self) -> usize {
        self.tokens.last().map_or(0, |t| t.end)
    }
}

/// Fold a `&&`/`||` chain by pairing neighbours, so the tree grows with the
/// logarithm of the chain length. Operands keep their left-to-right order,
/// which keeps short-circuiting unchanged.
fn balanced(op: BinaryOp, mut terms: Vec<Expr>) -> Expr {
    while terms.len() > 1 {
        let mut paired = Vec::with_capacity(terms.len().div_ceil(2));
        let mut rest = terms.into_iter();
        while let Some(left) = rest.next() {
            paired.push(match rest.next() {
                Some(right) => Expr::binary(op, left, right),
                None => left,
            });
        }
        terms = paired;
    }
    match terms.pop() {
        Some(expr) => expr,
        None => Expr::Literal(Literal::Bool(op == BinaryOp::And)),
    }
}

fn parse_number(tok: &Token) -> Result<Literal, ParseError> {
    let invalid = || ParseError::new(format!("Invalid number '{}'", tok.value), tok.position);
    if tok.value.contains('.') {
        tok.value.parse::<f64>().map(Literal::Float).map_err(|_| invalid())
    } else {
        BigInt::from_str(&tok.value).map(Literal::Integer).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;
    use pretty_assertions::assert_eq;

    fn parse_str(input: &str) -> Result<Expr, ParseError> {
        parse(&tokenize(input).unwrap())
    }

    fn field(path: &str) -> Expr {
        Expr::Field(FieldPath::from_dotted(path))
    }

    #[test]
    fn implication_binds_loosest_and_right() {
        let expr = parse_str("a => b => c || d").unwrap();
        let expected = Expr::binary(
            BinaryOp::Implies,
            field("a"),
            Expr::binary(
                BinaryOp::Implies,
                field("b"),
                Expr::binary(BinaryOp::Or, field("c"), field("d")),
            ),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse_str("a || b && c").unwrap();
        let expected = Expr::binary(
            BinaryOp::Or,
            field("a"),
            Expr::binary(BinaryOp::And, field("b"), field("c")),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn relational_binds_tighter_than_equality() {
        let expr = parse_str("a < b == c").unwrap();
        let expected = Expr::binary(
            BinaryOp::Eq,
            Expr::binary(BinaryOp::Lt, field("a"), field("b")),
            field("c"),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn dotted_and_indexed_path() {
        let expr = parse_str("links[0].authority_scope['x']").unwrap();
        let mut path = FieldPath::new("links");
        path.push(PathSegment::Index(0));
        path.push(PathSegment::Key("authority_scope".into()));
        path.push(PathSegment::Key("x".into()));
        assert_eq!(expr, Expr::Field(path));
    }

    #[test]
    fn every_lambda() {
        let expr = parse_str("items.every(i => i.ok)").unwrap();
        let Expr::Every { path, param, body } = expr else {
            panic!("expected every node");
        };
        assert_eq!(path.to_string(), "items");
        assert_eq!(param, "i");
        assert_eq!(*body, field("i.ok"));
    }

    #[test]
    fn unknown_function_is_rejected() {
        let err = parse_str("frobnicate(x)").unwrap_err();
        assert_eq!(err.message, "Unknown function 'frobnicate'");
        assert_eq!(err.position, 0);
    }

    #[test]
    fn arity_is_checked() {
        let err = parse_str("len(a, b)").unwrap_err();
        assert_eq!(err.message, "Function 'len' expects 1 argument(s), got 2");
    }

    #[test]
    fn nesting_limit() {
        let deep = format!("{}x{}", "(".repeat(40), ")".repeat(40));
        let err = parse_str(&deep).unwrap_err();
        assert!(err.message.contains("maximum depth"));
        let ok = format!("{}x{}", "(".repeat(20), ")".repeat(20));
        assert!(parse_str(&ok).is_ok());
    }

    #[test]
    fn logical_chains_fold_pairwise() {
        let three = parse_str("a || b || c").unwrap();
        let expected = Expr::binary(
            BinaryOp::Or,
            Expr::binary(BinaryOp::Or, field("a"), field("b")),
            field("c"),
        );
        assert_eq!(three, expected);

        let four = parse_str("a && b && c && d").unwrap();
        let expected = Expr::binary(
            BinaryOp::And,
            Expr::binary(BinaryOp::And, field("a"), field("b")),
            Expr::binary(BinaryOp::And, field("c"), field("d")),
        );
        assert_eq!(four, expected);
    }

    #[test]
    fn comparison_chains_count_towards_depth() {
        let ok = vec!["x"; MAX_EXPRESSION_DEPTH].join(" == ");
        assert!(parse_str(&ok).is_ok());
        let deep = vec!["x"; MAX_EXPRESSION_DEPTH + 1].join(" == ");
        assert!(parse_str(&deep).unwrap_err().message.contains("maximum depth"));
    }

    #[test]
    fn end_position_includes_closing_quote() {
        let err = parse_str("len('ab'").unwrap_err();
        assert_eq!(err.position, 8);
    }

    #[test]
    fn trailing_tokens_rejected() {
        let err = parse_str("a b").unwrap_err();
        assert_eq!(err.position, 2);
    }
}
