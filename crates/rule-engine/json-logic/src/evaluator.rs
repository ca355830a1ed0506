//! High-level evaluator interface for JSON Logic
//!
//! This module provides a unified interface for parsing, compiling, and
//! evaluating JSON Logic expressions with automatic tiering.

use crate::{
    ast::Expr,
    compiler::{CompiledBytecode, Compiler},
    config::Config,
    error::JsonLogicResult,
    iter_eval::IterativeEvaluator,
    parser::parse,
    vm::{EvalContext, VM},
};
use parking_lot::RwLock;
use ruleforge_core::Value;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A cached, compiled JSON Logic expression ready for evaluation.
///
/// Expressions complex enough to clear `bytecode_min_complexity` are compiled
/// eagerly. Simpler expressions start as AST-only (Tier 0) and are promoted to
/// bytecode (Tier 1) once they cross `bytecode_promotion_threshold`
/// evaluations, under the same hot-rule-gets-compiled policy as
/// [`crate::tiered`]'s standalone cache.
#[derive(Debug)]
pub struct CachedExpression {
    /// Parsed AST
    pub ast: Arc<Expr>,
    /// Compiled bytecode, populated eagerly or after promotion
    bytecode: RwLock<Option<Arc<CompiledBytecode>>>,
    /// Variables referenced in the expression
    pub variables: Vec<String>,
    /// Node count for complexity estimation
    pub node_count: usize,
    /// Number of times this expression has been evaluated
    eval_count: AtomicU64,
    /// Evaluation count at which this expression promotes to bytecode
    promotion_threshold: u64,
}

impl Clone for CachedExpression {
    fn clone(&self) -> Self {
        Self {
            ast: Arc::clone(&self.ast),
            bytecode: RwLock::new(self.bytecode.read().clone()),
            variables: self.variables.clone(),
            node_count: self.node_count,
            eval_count: AtomicU64::new(self.eval_count.load(Ordering::Relaxed)),
            promotion_threshold: self.promotion_threshold,
        }
    }
}

impl CachedExpression {
    /// Create a new cached expression from JSON, applying the default tiering config
    pub fn from_json(json: &JsonValue) -> JsonLogicResult<Self> {
        Self::from_json_with_config(json, &Config::default())
    }

    /// Create a new cached expression from JSON under an explicit tiering config
    pub fn from_json_with_config(json: &JsonValue, config: &Config) -> JsonLogicResult<Self> {
        let ast = parse(json)?;
        let node_count = ast.node_count();
        let variables = ast.collect_variables().iter().map(|s| s.to_string()).collect();

        // Compile to bytecode if expression is complex enough
        let bytecode = if node_count >= config.bytecode_min_complexity {
            let mut compiler = Compiler::new();
            match compiler.compile(&ast) {
                Ok(bc) => Some(Arc::new(bc)),
                Err(_) => None, // Fall back to AST interpreter if compilation fails
            }
        } else {
            None
        };

        Ok(Self {
            ast: Arc::new(ast),
            bytecode: RwLock::new(bytecode),
            variables,
            node_count,
            eval_count: AtomicU64::new(0),
            promotion_threshold: config.bytecode_promotion_threshold,
        })
    }

    /// Force bytecode compilation regardless of complexity
    pub fn compile_bytecode(&self) -> JsonLogicResult<()> {
        if self.bytecode.read().is_none() {
            let mut compiler = Compiler::new();
            let bc = Arc::new(compiler.compile(&self.ast)?);
            *self.bytecode.write() = Some(bc);
        }
        Ok(())
    }

    /// Check if this expression has compiled bytecode
    pub fn has_bytecode(&self) -> bool {
        self.bytecode.read().is_some()
    }

    /// Number of times this expression has been evaluated
    pub fn eval_count(&self) -> u64 {
        self.eval_count.load(Ordering::Relaxed)
    }

    fn bytecode_snapshot(&self) -> Option<Arc<CompiledBytecode>> {
        self.bytecode.read().clone()
    }

    /// Record one evaluation and promote to bytecode once the threshold is crossed.
    fn record_eval_and_maybe_promote(&self) {
        let count = self.eval_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= self.promotion_threshold && self.bytecode.read().is_none() {
            if let Err(e) = self.compile_bytecode() {
                tracing::warn!(error = %e, "failed to promote expression to bytecode");
            }
        }
    }
}

/// The main JSON Logic evaluator
///
/// Provides a high-level interface for evaluating JSON Logic expressions
/// with automatic caching and tiered execution.
#[derive(Debug, Default)]
pub struct Evaluator {
    /// Reusable VM instance
    vm: VM,
    /// Tiering and evaluation limits
    config: Config,
}

impl Evaluator {
    /// Create a new evaluator with default limits
    pub fn new() -> Self {
        Self { vm: VM::new(), config: Config::default() }
    }

    /// Create a new evaluator under an explicit config
    pub fn with_config(config: Config) -> Self {
        Self { vm: VM::with_stack_limit(config.bytecode_stack_limit), config }
    }

    /// Parse and evaluate a JSON Logic expression in one step
    pub fn evaluate(&mut self, rule: &JsonValue, data: &JsonValue) -> JsonLogicResult<Value> {
        let ast = parse(rule)?;

        // For simple expressions, use AST interpretation
        if ast.node_count() < self.config.bytecode_min_complexity {
            self.evaluate_ast(&ast, data)
        } else {
            // Try to compile and execute bytecode
            let mut compiler = Compiler::new();
            match compiler.compile(&ast) {
                Ok(bytecode) => {
                    let context = EvalContext::from_json(data, &bytecode);
                    self.vm.execute(&bytecode, &context)
                }
                Err(_) => {
                    // Fall back to AST interpreter
                    self.evaluate_ast(&ast, data)
                }
            }
        }
    }

    /// Evaluate a cached expression
    pub fn evaluate_cached(&mut self, expr: &CachedExpression, data: &JsonValue) -> JsonLogicResult<Value> {
        expr.record_eval_and_maybe_promote();
        if let Some(bytecode) = expr.bytecode_snapshot() {
            let context = EvalContext::from_json(data, &bytecode);
            self.vm.execute(&bytecode, &context)
        } else {
            self.evaluate_ast(&expr.ast, data)
        }
    }

    /// Evaluate with a pre-built context (for bytecode execution)
    pub fn evaluate_with_bytecode(
        &mut self,
        bytecode: &CompiledBytecode,
        context: &EvalContext,
    ) -> JsonLogicResult<Value> {
        self.vm.execute(bytecode, context)
    }

    /// Evaluate an AST expression directly (Tier 0 - loop-based, no recursion)
    pub fn evaluate_ast(&self, expr: &Expr, data: &JsonValue) -> JsonLogicResult<Value> {
        let data_value = Value::from_json(data);
        IterativeEvaluator::with_config(self.config.clone()).evaluate(expr, &data_value)
    }

    /// Evaluate a cached expression with Value data directly (avoids JSON conversion).
    ///
    /// This is more efficient when context is already available as Value.
    pub fn evaluate_cached_value(&mut self, expr: &CachedExpression, data: &Value) -> JsonLogicResult<Value> {
        expr.record_eval_and_maybe_promote();
        if let Some(bytecode) = expr.bytecode_snapshot() {
            // Use from_value to avoid expensive JSON conversion of entire data
            // This only extracts the variables needed by the bytecode
            let context = EvalContext::from_value(data, &bytecode);
            self.vm.execute(&bytecode, &context)
        } else {
            // For AST evaluation, we can use Value directly
            IterativeEvaluator::with_config(self.config.clone()).evaluate(&expr.ast, data)
        }
    }
}

/// Convenience function for one-shot evaluation
pub fn evaluate(rule: &JsonValue, data: &JsonValue) -> JsonLogicResult<Value> {
    Evaluator::new().evaluate(rule, data)
}

/// Convenience function for parsing and caching an expression
pub fn compile(rule: &JsonValue) -> JsonLogicResult<CachedExpression> {
    CachedExpression::from_json(rule)
}



/// Property-based tests using proptest
#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        /// Arithmetic addition is commutative: a + b == b + a
        #[test]
        fn addition_is_commutative(a in -1000i64..1000, b in -1000i64..1000) {
            let rule1 = json!({"+": [{"var": "a"}, {"var": "b"}]});
            let rule2 = json!({"+": [{"var": "b"}, {"var": "a"}]});
            let data = json!({"a": a, "b": b});

            let result1 = evaluate(&rule1, &data).unwrap().to_number();
            let result2 = evaluate(&rule2, &data).unwrap().to_number();

            prop_assert!((result1 - result2).abs() < 1e-10);
        }

        /// Multiplication is commutative: a * b == b * a
        #[test]
        fn multiplication_is_commutative(a in -100i64..100, b in -100i64..100) {
            let rule1 = json!({"*": [{"var": "a"}, {"var": "b"}]});
            let rule2 = json!({"*": [{"var": "b"}, {"var": "a"}]});
            let data = json!({"a": a, "b": b});

            let result1 = evaluate(&rule1, &data).unwrap().to_number();
            let result2 = evaluate(&rule2, &data).unwrap().to_number();

            prop_assert!((result1 - result2).abs() < 1e-10);
        }

        /// Addition identity: a + 0 == a
        #[test]
        fn addition_identity(a in -1000i64..1000) {
            let rule = json!({"+": [{"var": "a"}, 0]});
            let data = json!({"a": a});

            let result = evaluate(&rule, &data).unwrap().to_number();
            prop_assert!((result - (a as f64)).abs() < 1e-10);
        }

        /// Multiplication identity: a * 1 == a
        #[test]
        fn multiplication_identity(a in -1000i64..1000) {
            let rule = json!({"*": [{"var": "a"}, 1]});
            let data = json!({"a": a});

            let result = evaluate(&rule, &data).unwrap().to_number();
            prop_assert!((result - (a as f64)).abs() < 1e-10);
        }

        /// Comparison reflexivity: a == a is always true
        #[test]
        fn equality_reflexive(a in -1000i64..1000) {
            let rule = json!({"==": [{"var": "a"}, {"var": "a"}]});
            let data = json!({"a": a});

            let result = evaluate(&rule, &data).unwrap();
            prop_assert_eq!(result, Value::Bool(true));
        }

        /// Comparison: a > b implies !(a <= b)
        #[test]
        fn comparison_consistency(a in -100i64..100, b in -100i64..100) {
            let gt_rule = json!({">": [{"var": "a"}, {"var": "b"}]});
            let le_rule = json!({"<=": [{"var": "a"}, {"var": "b"}]});
            let data = json!({"a": a, "b": b});

            let gt_result = evaluate(&gt_rule, &data).unwrap();
            let le_result = evaluate(&le_rule, &data).unwrap();

            // a > b and a <= b should be mutually exclusive
            match (gt_result, le_result) {
                (Value::Bool(gt), Value::Bool(le)) => {
                    prop_assert_ne!(gt, le, "a={}, b={}: > and <= should be exclusive", a, b);
                }
                _ => prop_assert!(false, "Expected boolean results"),
            }
        }

        /// Boolean double negation: !!a == truthy(a)
        #[test]
        fn double_negation(a in prop::bool::ANY) {
            let rule = json!({"!!": [{"var": "a"}]});
            let data = json!({"a": a});

            let result = evaluate(&rule, &data).unwrap();
            prop_assert_eq!(result, Value::Bool(a));
        }

        /// AND with false is always false
        #[test]
        fn and_with_false(a in prop::bool::ANY) {
            let rule = json!({"and": [{"var": "a"}, false]});
            let data = json!({"a": a});

            let result = evaluate(&rule, &data).unwrap();
            prop_assert!(!result.is_truthy());
        }

        /// OR with true is always truthy
        #[test]
        fn or_with_true(a in prop::bool::ANY) {
            let rule = json!({"or": [{"var": "a"}, true]});
            let data = json!({"a": a});

            let result = evaluate(&rule, &data).unwrap();
            prop_assert!(result.is_truthy());
        }

        /// If condition selects correct branch
        #[test]
        fn if_selects_correct_branch(cond in prop::bool::ANY) {
            let rule = json!({
                "if": [{"var": "cond"}, "then", "else"]
            });
            let data = json!({"cond": cond});

            let result = evaluate(&rule, &data).unwrap();
            let expected = if cond { "then" } else { "else" };
            prop_assert_eq!(result, Value::String(expected.into()));
        }

        /// Variable with default uses default when null
        #[test]
        fn var_default_when_null(default in -100i64..100) {
            let rule = json!({"var": ["missing", default]});
            let data = json!({});

            let result = evaluate(&rule, &data).unwrap().to_number() as i64;
            prop_assert_eq!(result, default);
        }
    }
}
