pub mod comparison;
pub mod context;
pub mod errors;
pub mod evaluator;
pub mod expression;
pub mod functions;
pub mod numeric;
pub mod parser;
pub mod tokenizer;
pub mod value;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, trace};

pub use context::EvalOptions;
pub use errors::{ConstraintError, ParseError, Result, TokenizerError};
pub use evaluator::Evaluator;
pub use expression::Expr;
pub use functions::{reserved_names, Registry};
pub use parser::MAX_EXPRESSION_DEPTH;

/// Tokenize and parse an expression.
pub fn parse_expression(expression: &str) -> Result<Expr> {
    let tokens = tokenizer::tokenize(expression)?;
    Ok(parser::parse(&tokens)?)
}

/// Syntax-only check for constraint authoring tools.
pub fn validate_expression(expression: &str) -> Result<()> {
    parse_expression(expression).map(|_| ())
}

/// Evaluate `expression` against `context` with default options.
///
/// Only a malformed expression is an error. Missing or malformed data makes
/// the constraint evaluate to `false`.
pub fn evaluate_constraint(context: &Value, expression: &str) -> Result<bool> {
    evaluate_constraint_with(context, expression, &EvalOptions::default())
}

pub fn evaluate_constraint_with(
    context: &Value,
    expression: &str,
    options: &EvalOptions,
) -> Result<bool> {
    let expr = parse_expression(expression)?;
    Ok(Evaluator::new(context, options).evaluate(&expr))
}

/// Default number of parsed expressions a [`ConstraintEvaluator`] keeps.
pub const MAX_CACHED_EXPRESSIONS: usize = 1024;

#[derive(Default)]
struct ParseCache {
    entries: HashMap<String, Arc<Expr>>,
    // insertion order, oldest first
    order: VecDeque<String>,
}

/// Evaluator that keeps its options and caches parsed expressions, for
/// validating many records against the same constraint set.
///
/// The cache is bounded. Once it holds `capacity` expressions the oldest
/// entry is evicted (FIFO) to make room.
pub struct ConstraintEvaluator {
    options: EvalOptions,
    capacity: usize,
    cache: RwLock<ParseCache>,
}

impl Default for ConstraintEvaluator {
    fn default() -> Self {
        Self::new(EvalOptions::default())
    }
}

impl ConstraintEvaluator {
    pub fn new(options: EvalOptions) -> Self {
        Self::with_capacity(options, MAX_CACHED_EXPRESSIONS)
    }

    /// A capacity of zero disables caching.
    pub fn with_capacity(options: EvalOptions, capacity: usize) -> Self {
        Self { options, capacity, cache: RwLock::new(ParseCache::default()) }
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    /// Parse `expression`, reusing an earlier parse of the same text.
    pub fn compile(&self, expression: &str) -> Result<Arc<Expr>> {
        if let Some(expr) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(expression)
        {
            trace!(expression, "parse cache hit");
            return Ok(Arc::clone(expr));
        }
        let expr = Arc::new(parse_expression(expression).inspect_err(|e| {
            debug!(expression, error = %e, "constraint expression rejected");
        })?);
        if self.capacity == 0 {
            return Ok(expr);
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if cache.entries.contains_key(expression) {
            return Ok(expr);
        }
        while cache.entries.len() >= self.capacity {
            let Some(oldest) = cache.order.pop_front() else {
                cache.entries.clear();
                break;
            };
            cache.entries.remove(&oldest);
            trace!(expression = %oldest, "parse cache eviction");
        }
        cache.entries.insert(expression.to_string(), Arc::clone(&expr));
        cache.order.push_back(expression.to_string());
        Ok(expr)
    }

    pub fn evaluate(&self, context: &Value, expression: &str) -> Result<bool> {
        let expr = self.compile(expression)?;
        Ok(Evaluator::new(context, &self.options).evaluate(&expr))
    }

    /// Number of expressions currently cached.
    pub fn cached(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).entries.len()
    }
}
