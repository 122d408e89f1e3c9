use std::cmp::Ordering;

use serde_json::Value;
use tracing::debug;

use crate::comparison::{cmp_operands, equals};
use crate::context::{self, EvalOptions};
use crate::expression::{BinaryOp, Expr, FieldPath, Literal};
use crate::functions::Args;
use crate::value::Operand;

/// Walks an expression tree against one context.
///
/// Evaluation is total: whatever the shape of the context, the result is an
/// operand, and [`Evaluator::evaluate`] reduces it to a boolean.
pub struct Evaluator<'a> {
    context: &'a Value,
    options: &'a EvalOptions,
    // Lambda parameters introduced by `.every(p => ...)`, innermost last.
    bindings: Vec<(String, &'a Value)>,
}

impl<'a> Evaluator<'a> {
    pub fn new(context: &'a Value, options: &'a EvalOptions) -> Self {
        Self { context, options, bindings: Vec::new() }
    }

    pub fn context(&self) -> &'a Value {
        self.context
    }

    pub fn options(&self) -> &'a EvalOptions {
        self.options
    }

    pub fn evaluate(&self, expr: &Expr) -> bool {
        self.eval(expr).is_truthy()
    }

    pub fn eval(&self, expr: &Expr) -> Operand<'a> {
        match expr {
            Expr::Literal(lit) => literal(lit),
            Expr::Field(path) => Operand::from_option(self.resolve(path)),
            Expr::Call { function, args } => (function.handler)(&Args::new(self, args)),
            Expr::Array(items) => Operand::List(items.iter().map(|e| self.eval(e)).collect()),
            Expr::Not(inner) => Operand::bool(!self.evaluate(inner)),
            Expr::Binary { op, left, right } => Operand::bool(self.binary(*op, left, right)),
            Expr::Length(inner) => Operand::count(length(&self.eval(inner))),
            Expr::Every { path, param, body } => Operand::bool(self.every(path, param, body)),
        }
    }

    /// Resolve a field path, consulting lambda bindings before the context.
    pub fn resolve(&self, path: &FieldPath) -> Option<&'a Value> {
        let bound = self
            .bindings
            .iter()
            .rev()
            .find(|(name, _)| name == path.root())
            .map(|(_, value)| *value);
        match bound {
            Some(start) => context::lookup(start, path.rest()),
            None => context::resolve(self.context, path),
        }
    }

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> bool {
        match op {
            BinaryOp::And => self.evaluate(left) && self.evaluate(right),
            BinaryOp::Or => self.evaluate(left) || self.evaluate(right),
            BinaryOp::Implies => !self.evaluate(left) || self.evaluate(right),
            BinaryOp::Eq | BinaryOp::Ne => {
                let same = equals(
                    &self.eval(left),
                    &self.eval(right),
                    self.options.absent_equals_null,
                );
                same == (op == BinaryOp::Eq)
            }
            BinaryOp::Lt => self.ordered(left, right, |o| o == Ordering::Less),
            BinaryOp::Lte => self.ordered(left, right, |o| o != Ordering::Greater),
            BinaryOp::Gt => self.ordered(left, right, |o| o == Ordering::Greater),
            BinaryOp::Gte => self.ordered(left, right, |o| o != Ordering::Less),
        }
    }

    fn ordered<F>(&self, left: &Expr, right: &Expr, pred: F) -> bool
    where
        F: Fn(Ordering) -> bool,
    {
        cmp_operands(&self.eval(left), &self.eval(right), pred)
    }

    fn every(&self, path: &FieldPath, param: &str, body: &Expr) -> bool {
        let Some(Value::Array(items)) = self.resolve(path) else {
            debug!(path = %path, "every() target is not an array");
            return false;
        };
        items.iter().all(|item| self.bind(param, item).evaluate(body))
    }

    fn bind(&self, name: &str, value: &'a Value) -> Evaluator<'a> {
        let mut bindings = self.bindings.clone();
        bindings.push((name.to_string(), value));
        Evaluator { context: self.context, options: self.options, bindings }
    }
}

/// Evaluate a parsed expression with default options.
pub fn evaluate(context: &Value, expr: &Expr) -> bool {
    let options = EvalOptions::default();
    Evaluator::new(context, &options).evaluate(expr)
}

fn literal<'a>(lit: &Literal) -> Operand<'a> {
    match lit {
        Literal::String(s) => Operand::string(s.clone()),
        Literal::Integer(n) => Operand::Int(n.clone()),
        Literal::Float(f) => Operand::number(*f),
        Literal::Bool(b) => Operand::bool(*b),
        Literal::Null => Operand::owned(Value::Null),
        Literal::Undefined => Operand::Absent,
    }
}

// `.length`: arrays and strings only.
fn length(operand: &Operand<'_>) -> usize {
    match operand {
        Operand::List(items) => items.len(),
        Operand::Json(v) => match v.as_ref() {
            Value::Array(items) => items.len(),
            Value::String(s) => s.chars().count(),
            _ => 0,
        },
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::tokenizer::tokenize;
    use serde_json::json;

    fn eval_with(ctx: &Value, options: &EvalOptions, src: &str) -> bool {
        let expr = parse(&tokenize(src).unwrap()).unwrap();
        Evaluator::new(ctx, options).evaluate(&expr)
    }

    fn eval(ctx: &Value, src: &str) -> bool {
        eval_with(ctx, &EvalOptions::default(), src)
    }

    #[test]
    fn logical_operators_and_implication() {
        let ctx = json!({"enabled": false});
        assert!(eval(&ctx, "enabled => missing.deep == 1"));
        assert!(eval(&ctx, "!enabled || nope.nope == 1"));
        assert!(!eval(&ctx, "enabled && true"));
    }

    #[test]
    fn absent_is_not_null_unless_configured() {
        let ctx = json!({"present": null});
        assert!(!eval(&ctx, "missing == null"));
        assert!(eval(&ctx, "missing == undefined"));
        assert!(eval(&ctx, "present == null"));
        let loose = EvalOptions::default().with_absent_equals_null(true);
        assert!(eval_with(&ctx, &loose, "missing == null"));
        assert!(eval_with(&ctx, &loose, "eq(missing, null)"));
    }

    #[test]
    fn every_binds_parameter() {
        let ctx = json!({"items": [{"qty": 1}, {"qty": 3}], "qty": 0});
        assert!(eval(&ctx, "items.every(i => i.qty > 0)"));
        assert!(!eval(&ctx, "items.every(i => i.qty > 1)"));
        assert!(eval(&ctx, "qty == 0"));
        assert!(!eval(&ctx, "qty.every(i => true)"));
    }

    #[test]
    fn length_postfix() {
        let ctx = json!({"items": [1, 2, 3], "name": "héllo", "n": 5});
        assert!(eval(&ctx, "items.length == 3"));
        assert!(eval(&ctx, "name.length == 5"));
        assert!(eval(&ctx, "n.length == 0"));
    }
}
