use constraint_expr::tokenizer::{tokenize, Token, TokenKind};
use pretty_assertions::assert_eq;

fn tok(kind: TokenKind, value: &str, position: usize) -> Token {
    let quotes = if kind == TokenKind::String { 2 } else { 0 };
    let end = position + value.len() + quotes;
    Token { kind, value: value.to_string(), position, end }
}

#[test]
fn test_empty_and_whitespace_input() {
    assert_eq!(tokenize("").unwrap(), vec![]);
    assert_eq!(tokenize("   ").unwrap(), vec![]);
    assert_eq!(tokenize("\t\n ").unwrap(), vec![]);
}

#[test]
fn test_simple_comparison_positions() {
    assert_eq!(
        tokenize("status == 'active'").unwrap(),
        vec![
            tok(TokenKind::Identifier, "status", 0),
            tok(TokenKind::Operator, "==", 7),
            tok(TokenKind::String, "active", 10),
        ]
    );
}

#[test]
fn test_dotted_field_name_inside_string() {
    let values: Vec<String> = tokenize("bigint_sum(candidates, 'usage.cost_micro')")
        .unwrap()
        .into_iter()
        .map(|t| t.value)
        .collect();
    assert_eq!(
        values,
        vec!["bigint_sum", "(", "candidates", ",", "usage.cost_micro", ")"]
    );
}

#[test]
fn test_dotted_access_splits_into_tokens() {
    let kinds: Vec<TokenKind> = tokenize("a.b.c").unwrap().into_iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Identifier,
            TokenKind::Dot,
            TokenKind::Identifier,
            TokenKind::Dot,
            TokenKind::Identifier,
        ]
    );
}

#[test]
fn test_all_operators() {
    let values: Vec<String> = tokenize("== != <= >= && || < > ! =>")
        .unwrap()
        .into_iter()
        .map(|t| t.value)
        .collect();
    assert_eq!(values, vec!["==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "=>"]);
}

#[test]
fn test_keywords_are_identifiers() {
    for word in ["null", "true", "false", "undefined"] {
        let tokens = tokenize(word).unwrap();
        assert_eq!(tokens, vec![tok(TokenKind::Identifier, word, 0)]);
    }
}

#[test]
fn test_brackets_and_arrow() {
    assert_eq!(
        tokenize("xs.every(x => x[0])").unwrap(),
        vec![
            tok(TokenKind::Identifier, "xs", 0),
            tok(TokenKind::Dot, ".", 2),
            tok(TokenKind::Identifier, "every", 3),
            tok(TokenKind::Paren, "(", 8),
            tok(TokenKind::Identifier, "x", 9),
            tok(TokenKind::Arrow, "=>", 11),
            tok(TokenKind::Identifier, "x", 14),
            tok(TokenKind::Bracket, "[", 15),
            tok(TokenKind::Number, "0", 16),
            tok(TokenKind::Bracket, "]", 17),
            tok(TokenKind::Paren, ")", 18),
        ]
    );
}

#[test]
fn test_unterminated_string() {
    let err = tokenize("'unterminated").unwrap_err();
    assert_eq!(err.message, "Unterminated string literal");
    assert_eq!(err.position, 0);

    let err = tokenize("x == 'bad").unwrap_err();
    assert_eq!(err.position, 5);
}

#[test]
fn test_unexpected_character() {
    let err = tokenize("x @ y").unwrap_err();
    assert_eq!(err.message, "Unexpected character: @");
    assert_eq!(err.position, 2);

    assert!(tokenize("a = b").is_err());
    assert!(tokenize("a & b").is_err());
    assert!(tokenize("\"double\"").is_err());
}
