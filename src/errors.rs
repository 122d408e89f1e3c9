use thiserror::Error;

/// Raised by the tokenizer for an unterminated string or a character outside the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position}")]
pub struct TokenizerError {
    pub message: String,
    /// Byte offset of the offending character.
    pub position: usize,
}

impl TokenizerError {
    pub(crate) fn new(message: impl Into<String>, position: usize) -> Self {
        Self { message: message.into(), position }
    }
}

/// Raised by the parser for malformed token sequences.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, position: usize) -> Self {
        Self { message: message.into(), position }
    }
}

// Authoring errors only. Bad data never surfaces here, it evaluates to false.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    #[error("tokenizer error: {0}")]
    Tokenize(#[from] TokenizerError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

impl ConstraintError {
    pub fn position(&self) -> usize {
        match self {
            ConstraintError::Tokenize(e) => e.position,
            ConstraintError::Parse(e) => e.position,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ConstraintError::Tokenize(e) => &e.message,
            ConstraintError::Parse(e) => &e.message,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConstraintError>;
