// src/expression.rs
use std::fmt;

use num_bigint::BigInt;

use crate::functions::Builtin;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    /// Integer literals are kept exact so they compare against big-integer amounts.
    Integer(BigInt),
    Float(f64),
    Bool(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A dot/bracket chain rooted at an identifier, e.g. `links[0].authority_scope`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    root: String,
    rest: Vec<PathSegment>,
}

impl FieldPath {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into(), rest: Vec::new() }
    }

    /// Builds a path from a dotted string such as `usage.cost_micro`.
    pub fn from_dotted(path: &str) -> Self {
        let mut parts = path.split('.');
        let mut out = Self::new(parts.next().unwrap_or_default());
        for part in parts {
            out.push(PathSegment::Key(part.to_string()));
        }
        out
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.rest.push(segment);
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn rest(&self) -> &[PathSegment] {
        &self.rest
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for seg in &self.rest {
            match seg {
                PathSegment::Key(k) => write!(f, ".{k}")?,
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Implies,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl BinaryOp {
    pub(crate) fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "=>" => BinaryOp::Implies,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Lte,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Gte,
            _ => return None,
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Implies => "=>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
        };
        write!(f, "{s}")
    }
}

/// Immutable expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Field(FieldPath),
    /// Resolved against the registry at parse time.
    Call {
        function: &'static Builtin,
        args: Vec<Expr>,
    },
    Array(Vec<Expr>),
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Length(Box<Expr>),
    Every {
        path: FieldPath,
        param: String,
        body: Box<Expr>,
    },
}

impl Expr {
    pub(crate) fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary { op, left: Box::new(left), right: Box::new(right) }
    }
}
