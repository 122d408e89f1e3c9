use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeInclusive;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::context::EvalOptions;
use crate::evaluator::Evaluator;
use crate::expression::{Expr, FieldPath};
use crate::value::Operand;

mod arithmetic;
mod audit;
mod governance;
mod saga;
mod structural;
mod temporal;
mod time;
mod tree;

pub use audit::GENESIS_HASH;
pub use tree::MAX_TREE_DEPTH;

/// Native implementation of a builtin. Handlers are total: bad data yields
/// `false` (or another in-band value), never a panic.
pub type Handler = for<'e, 'a> fn(&Args<'e, 'a>) -> Operand<'a>;

/// Keywords that may not be used as builtin names.
pub const KEYWORDS: [&str; 6] = ["true", "false", "null", "undefined", "every", "length"];

/// Worked example attached to a builtin. Every example doubles as a conformance case.
#[derive(Debug, Clone, Serialize)]
pub struct Example {
    pub description: &'static str,
    pub context: Value,
    pub expression: &'static str,
    pub expected: bool,
}

#[derive(Serialize)]
pub struct Builtin {
    pub name: &'static str,
    pub signature: &'static str,
    pub description: &'static str,
    pub arity: RangeInclusive<usize>,
    #[serde(skip)]
    pub handler: Handler,
    pub examples: Vec<Example>,
}

impl Builtin {
    fn new(
        name: &'static str,
        signature: &'static str,
        arity: RangeInclusive<usize>,
        handler: Handler,
    ) -> Self {
        Self { name, signature, description: "", arity, handler, examples: Vec::new() }
    }

    fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    fn example(
        mut self,
        description: &'static str,
        context: Value,
        expression: &'static str,
        expected: bool,
    ) -> Self {
        self.examples.push(Example { description, context, expression, expected });
        self
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

// Builtins are unique by name.
impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Arguments of one builtin call.
///
/// Arguments are evaluated on demand, so a handler that only needs the
/// syntactic field path (`changed`, `previous`, `delta`) never resolves it.
pub struct Args<'e, 'a> {
    evaluator: &'e Evaluator<'a>,
    exprs: &'e [Expr],
}

impl<'e, 'a> Args<'e, 'a> {
    pub(crate) fn new(evaluator: &'e Evaluator<'a>, exprs: &'e [Expr]) -> Self {
        Self { evaluator, exprs }
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Evaluated argument `index`, or absent when not supplied.
    pub fn get(&self, index: usize) -> Operand<'a> {
        self.exprs
            .get(index)
            .map_or(Operand::Absent, |expr| self.evaluator.eval(expr))
    }

    /// Argument `index` when it is written as a field path.
    pub fn path(&self, index: usize) -> Option<&'e FieldPath> {
        match self.exprs.get(index) {
            Some(Expr::Field(path)) => Some(path),
            _ => None,
        }
    }

    pub fn evaluator(&self) -> &'e Evaluator<'a> {
        self.evaluator
    }

    pub fn options(&self) -> &'a EvalOptions {
        self.evaluator.options()
    }
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::with_builtins);

/// Immutable table of every builtin, built on first use.
pub struct Registry {
    inner: BTreeMap<&'static str, Builtin>,
}

impl Registry {
    pub fn global() -> &'static Registry {
        &REGISTRY
    }

    fn with_builtins() -> Self {
        let inner = arithmetic::builtins()
            .into_iter()
            .chain(structural::builtins())
            .chain(temporal::builtins())
            .chain(time::builtins())
            .chain(tree::builtins())
            .chain(saga::builtins())
            .chain(governance::builtins())
            .chain(audit::builtins())
            .map(|b| (b.name, b))
            .collect();
        Self { inner }
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.inner.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.inner.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Builtin> {
        self.inner.values()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Builtin names plus language keywords.
pub fn reserved_names() -> BTreeSet<&'static str> {
    Registry::global().names().chain(KEYWORDS).collect()
}

fn fail(reason: &str) -> Operand<'static> {
    tracing::debug!(reason, "builtin failed closed");
    Operand::bool(false)
}

fn as_object<'v>(operand: &'v Operand<'_>) -> Option<&'v Map<String, Value>> {
    operand.as_json().and_then(Value::as_object)
}

fn as_array<'v>(operand: &'v Operand<'_>) -> Option<&'v [Value]> {
    operand.as_json().and_then(Value::as_array).map(Vec::as_slice)
}

fn is_completed(step: &Value) -> bool {
    step.get("status").and_then(Value::as_str) == Some("completed")
}
