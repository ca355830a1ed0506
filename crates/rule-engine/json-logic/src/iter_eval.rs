//! Loop-based (iterative) evaluator for JSON Logic
//!
//! This module provides a non-recursive evaluator that processes expressions
//! using explicit work tracking instead of call stack recursion. This prevents
//! stack overflow on deeply nested expressions.
//!
//! # Design
//!
//! Instead of recursive `eval_expr()` calls, we use:
//! - `work`: Vec of pending operations to process
//! - `values`: Vec of computed intermediate values
//!
//! The evaluator runs a loop that processes work items until complete.
//!
//! # Safety
//!
//! This implementation avoids unsafe code by using proper lifetime bounds.
//! The work queue only lives for the duration of a single `evaluate()` call,
//! and all references in it are valid for that duration.

use indexmap::IndexMap;
use ruleforge_core::Value;

use crate::ast::Expr;
use crate::config::Config;
use crate::error::{JsonLogicError, JsonLogicResult};

/// A pending operation in the work queue
#[derive(Debug)]
enum WorkItem<'a> {
    /// Evaluate an expression and push result to value stack
    Eval(&'a Expr),

    /// Combine N values from stack using an operation
    Combine(CombineOp, usize),

    /// Special handling for short-circuit AND
    /// (remaining_exprs, total_count)
    AndNext(&'a [Expr], usize),

    /// Special handling for short-circuit OR
    OrNext(&'a [Expr], usize),

    /// If/else chain: check condition result, then branch or continue
    /// (then_expr, remaining_exprs after then)
    IfConditionCheck(&'a Expr, &'a [Expr]),

    /// Check if condition for ternary, then evaluate appropriate branch
    TernaryCheck(&'a Expr, &'a Expr),

    /// Chain comparison: check if prev < curr, continue or short-circuit
    /// (remaining_exprs, comparison_fn_id)
    ChainCompareNext(&'a [Expr], ChainCmpOp),

    /// Array map: process next item or finish
    /// (mapper_expr, remaining_items, collected_results)
    MapNext(&'a Expr, Vec<Value>, Vec<Value>),

    /// Array filter: process next item or finish
    /// (predicate_expr, remaining_items, collected_results)
    FilterNext(&'a Expr, Vec<Value>, Vec<Value>),

    /// Filter check: if truthy, keep the item
    FilterCheck(&'a Expr, Value, Vec<Value>, Vec<Value>),

    /// Array reduce: process next item or finish
    /// (reducer_expr, remaining_items, accumulator)
    ReduceNext(&'a Expr, Vec<Value>),

    /// All: check result and continue or short-circuit
    AllNext(&'a Expr, Vec<Value>),

    /// Some: check result and continue or short-circuit
    SomeNext(&'a Expr, Vec<Value>),

    /// None: check result and continue or short-circuit
    NoneNext(&'a Expr, Vec<Value>),

    /// Substr: compute the substring after evaluating args
    SubstrCompute(bool), // has_length_arg

    /// Missing: check each key
    MissingNext(&'a [Expr], Vec<Value>),

    /// MissingSome: check keys and track found count
    MissingSomeNext(&'a [Expr], usize, usize, Vec<Value>),

    /// Division: check for zero and compute
    DivCheck,

    /// Modulo: check for zero and compute
    ModCheck,

    /// Negate the top value (for unary minus)
    Negate,

    /// Convert to boolean
    ToBool,

    /// Logical NOT
    Not,

    /// Log and pass through
    Log,
}

/// Operations that combine multiple values
#[derive(Debug, Clone, Copy)]
enum CombineOp {
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    Add,
    Sub,
    Mul,
    Min,
    Max,
    Cat,
    Merge,
    In,
}

/// Chain comparison operations
#[derive(Debug, Clone, Copy)]
enum ChainCmpOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl ChainCmpOp {
    fn compare(&self, a: &Value, b: &Value) -> bool {
        use std::cmp::Ordering;
        match (self, a.partial_cmp(b)) {
            (ChainCmpOp::Lt, Some(Ordering::Less)) => true,
            (ChainCmpOp::Le, Some(o)) => o != Ordering::Greater,
            (ChainCmpOp::Gt, Some(Ordering::Greater)) => true,
            (ChainCmpOp::Ge, Some(o)) => o != Ordering::Less,
            _ => false,
        }
    }
}

/// Loop-based JSON Logic evaluator
///
/// This evaluator uses an explicit work queue instead of recursion,
/// preventing stack overflow on deeply nested expressions.
pub struct IterativeEvaluator {
    config: Config,
}

impl Default for IterativeEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl IterativeEvaluator {
    /// Create a new evaluator with default limits
    pub fn new() -> Self {
        Self { config: Config::default() }
    }

    /// Create a new evaluator with explicit limits
    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    /// Evaluate an expression against data
    ///
    /// This is safe because all references in the work queue are bounded
    /// by the lifetime of `expr` and `data`, which outlive this function call.
    pub fn evaluate(&mut self, expr: &Expr, data: &Value) -> JsonLogicResult<Value> {
        // Work queue and values are local to this function call
        // All references in work are valid for lifetime 'a where expr: &'a Expr
        let mut work: Vec<WorkItem<'_>> = Vec::with_capacity(64);
        let mut values: Vec<Value> = Vec::with_capacity(32);

        work.push(WorkItem::Eval(expr));

        let mut iterations = 0;
        while let Some(item) = work.pop() {
            iterations += 1;
            if iterations > self.config.eval_max_steps {
                return Err(JsonLogicError::StackOverflow);
            }
            if work.len() > self.config.eval_work_queue_limit {
                return Err(JsonLogicError::StackOverflow);
            }

            process_item(item, data, &mut work, &mut values, &self.config)?;
        }

        values.pop().ok_or(JsonLogicError::RuntimeError(
            "No result value after evaluation".into(),
        ))
    }
}

/// Process a single work item
fn process_item<'a>(
    item: WorkItem<'a>,
    data: &Value,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
    config: &Config,
) -> JsonLogicResult<()> {
    match item {
        WorkItem::Eval(expr) => eval_expr(expr, data, work, values, config)?,
        WorkItem::Combine(op, count) => combine(op, count, values)?,
        WorkItem::AndNext(exprs, total) => and_next(exprs, total, work, values)?,
        WorkItem::OrNext(exprs, total) => or_next(exprs, total, work, values)?,
        WorkItem::IfConditionCheck(then_expr, remaining) => {
            if_condition_check(then_expr, remaining, work, values)?
        }
        WorkItem::TernaryCheck(then_expr, else_expr) => {
            ternary_check(then_expr, else_expr, work, values)?
        }
        WorkItem::ChainCompareNext(exprs, op) => chain_compare_next(exprs, op, work, values)?,
        WorkItem::MapNext(mapper, remaining, results) => {
            map_next(mapper, remaining, results, data, work, values, config)?
        }
        WorkItem::FilterNext(pred, remaining, results) => {
            filter_next(pred, remaining, results, data, work, values, config)?
        }
        WorkItem::FilterCheck(pred, item_val, remaining, results) => {
            filter_check(pred, item_val, remaining, results, work, values)?
        }
        WorkItem::ReduceNext(reducer, remaining) => {
            reduce_next(reducer, remaining, data, work, values, config)?
        }
        WorkItem::AllNext(pred, remaining) => all_next(pred, remaining, data, work, values, config)?,
        WorkItem::SomeNext(pred, remaining) => some_next(pred, remaining, data, work, values, config)?,
        WorkItem::NoneNext(pred, remaining) => none_next(pred, remaining, data, work, values, config)?,
        WorkItem::SubstrCompute(has_len) => substr_compute(has_len, values)?,
        WorkItem::MissingNext(keys, missing) => missing_next(keys, missing, data, work, values, config)?,
        WorkItem::MissingSomeNext(keys, min, found, missing) => {
            missing_some_next(keys, min, found, missing, data, work, values, config)?
        }
        WorkItem::DivCheck => div_check(values)?,
        WorkItem::ModCheck => mod_check(values)?,
        WorkItem::Negate => negate(values)?,
        WorkItem::ToBool => to_bool(values)?,
        WorkItem::Not => not(values)?,
        WorkItem::Log => log_value(values)?,
    }
    Ok(())
}

/// Start evaluating an expression
fn eval_expr<'a>(
    expr: &'a Expr,
    data: &Value,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
    config: &Config,
) -> JsonLogicResult<()> {
    match expr {
        Expr::Literal(v) => {
            values.push(v.clone());
        }

        Expr::Var(var) => {
            let value = get_variable(&var.path, data)
                .or_else(|| var.default.clone())
                .unwrap_or(Value::Null);
            values.push(value);
        }

        Expr::Eq(a, b) => {
            work.push(WorkItem::Combine(CombineOp::Eq, 2));
            work.push(WorkItem::Eval(b));
            work.push(WorkItem::Eval(a));
        }

        Expr::StrictEq(a, b) => {
            work.push(WorkItem::Combine(CombineOp::StrictEq, 2));
            work.push(WorkItem::Eval(b));
            work.push(WorkItem::Eval(a));
        }

        Expr::Ne(a, b) => {
            work.push(WorkItem::Combine(CombineOp::Ne, 2));
            work.push(WorkItem::Eval(b));
            work.push(WorkItem::Eval(a));
        }

        Expr::StrictNe(a, b) => {
            work.push(WorkItem::Combine(CombineOp::StrictNe, 2));
            work.push(WorkItem::Eval(b));
            work.push(WorkItem::Eval(a));
        }

        Expr::Lt(exprs) => start_chain_compare(exprs, ChainCmpOp::Lt, work, values)?,
        Expr::Le(exprs) => start_chain_compare(exprs, ChainCmpOp::Le, work, values)?,
        Expr::Gt(exprs) => start_chain_compare(exprs, ChainCmpOp::Gt, work, values)?,
        Expr::Ge(exprs) => start_chain_compare(exprs, ChainCmpOp::Ge, work, values)?,

        Expr::Not(a) => {
            work.push(WorkItem::Not);
            work.push(WorkItem::Eval(a));
        }

        Expr::ToBool(a) => {
            work.push(WorkItem::ToBool);
            work.push(WorkItem::Eval(a));
        }

        Expr::And(exprs) => {
            if exprs.is_empty() {
                values.push(Value::Bool(true));
            } else {
                work.push(WorkItem::AndNext(&exprs[1..], exprs.len()));
                work.push(WorkItem::Eval(&exprs[0]));
            }
        }

        Expr::Or(exprs) => {
            if exprs.is_empty() {
                values.push(Value::Bool(false));
            } else {
                work.push(WorkItem::OrNext(&exprs[1..], exprs.len()));
                work.push(WorkItem::Eval(&exprs[0]));
            }
        }

        Expr::If(exprs) => {
            if exprs.is_empty() {
                values.push(Value::Null);
            } else if exprs.len() == 1 {
                // Single element is the else clause
                work.push(WorkItem::Eval(&exprs[0]));
            } else {
                // exprs[0] = condition, exprs[1] = then, exprs[2..] = remaining
                let remaining = if exprs.len() > 2 { &exprs[2..] } else { &[] as &[Expr] };
                work.push(WorkItem::IfConditionCheck(&exprs[1], remaining));
                work.push(WorkItem::Eval(&exprs[0]));
            }
        }

        Expr::Ternary(cond, then_expr, else_expr) => {
            work.push(WorkItem::TernaryCheck(then_expr, else_expr));
            work.push(WorkItem::Eval(cond));
        }

        Expr::Add(exprs) => {
            if exprs.is_empty() {
                values.push(Value::Float(0.0));
            } else {
                work.push(WorkItem::Combine(CombineOp::Add, exprs.len()));
                for expr in exprs.iter().rev() {
                    work.push(WorkItem::Eval(expr));
                }
            }
        }

        Expr::Sub(exprs) => {
            if exprs.is_empty() {
                values.push(Value::Float(0.0));
            } else if exprs.len() == 1 {
                // Unary negation
                work.push(WorkItem::Negate);
                work.push(WorkItem::Eval(&exprs[0]));
            } else {
                work.push(WorkItem::Combine(CombineOp::Sub, exprs.len()));
                for expr in exprs.iter().rev() {
                    work.push(WorkItem::Eval(expr));
                }
            }
        }

        Expr::Mul(exprs) => {
            if exprs.is_empty() {
                values.push(Value::Float(1.0));
            } else {
                work.push(WorkItem::Combine(CombineOp::Mul, exprs.len()));
                for expr in exprs.iter().rev() {
                    work.push(WorkItem::Eval(expr));
                }
            }
        }

        Expr::Div(a, b) => {
            work.push(WorkItem::DivCheck);
            work.push(WorkItem::Eval(b));
            work.push(WorkItem::Eval(a));
        }

        Expr::Mod(a, b) => {
            work.push(WorkItem::ModCheck);
            work.push(WorkItem::Eval(b));
            work.push(WorkItem::Eval(a));
        }

        Expr::Min(exprs) => {
            if exprs.is_empty() {
                values.push(Value::Float(f64::INFINITY));
            } else {
                work.push(WorkItem::Combine(CombineOp::Min, exprs.len()));
                for expr in exprs.iter().rev() {
                    work.push(WorkItem::Eval(expr));
                }
            }
        }

        Expr::Max(exprs) => {
            if exprs.is_empty() {
                values.push(Value::Float(f64::NEG_INFINITY));
            } else {
                work.push(WorkItem::Combine(CombineOp::Max, exprs.len()));
                for expr in exprs.iter().rev() {
                    work.push(WorkItem::Eval(expr));
                }
            }
        }

        Expr::Cat(exprs) => {
            if exprs.is_empty() {
                values.push(Value::String(String::new()));
            } else {
                work.push(WorkItem::Combine(CombineOp::Cat, exprs.len()));
                for expr in exprs.iter().rev() {
                    work.push(WorkItem::Eval(expr));
                }
            }
        }

        Expr::Substr(s, start, len) => {
            let has_len = len.is_some();
            work.push(WorkItem::SubstrCompute(has_len));
            if let Some(len_expr) = len {
                work.push(WorkItem::Eval(len_expr.as_ref()));
            }
            work.push(WorkItem::Eval(start));
            work.push(WorkItem::Eval(s));
        }

        Expr::Map(arr, mapper) => {
            // First evaluate the array synchronously
            let arr_val = eval_to_value(arr, data, work, values, config)?;
            let items = match arr_val {
                Value::Array(items) => items,
                _ => vec![],
            };
            check_iteration_limit("map", items.len(), config)?;
            if items.is_empty() {
                values.push(Value::Array(vec![]));
            } else {
                work.push(WorkItem::MapNext(mapper.as_ref(), items, vec![]));
            }
        }

        Expr::Filter(arr, predicate) => {
            let arr_val = eval_to_value(arr, data, work, values, config)?;
            let items = match arr_val {
                Value::Array(items) => items,
                _ => vec![],
            };
            check_iteration_limit("filter", items.len(), config)?;
            if items.is_empty() {
                values.push(Value::Array(vec![]));
            } else {
                work.push(WorkItem::FilterNext(predicate.as_ref(), items, vec![]));
            }
        }

        Expr::Reduce(arr, reducer, initial) => {
            let arr_val = eval_to_value(arr, data, work, values, config)?;
            let items = match arr_val {
                Value::Array(items) => items,
                _ => {
                    // Not an array, return initial value
                    work.push(WorkItem::Eval(initial));
                    return Ok(());
                }
            };
            check_iteration_limit("reduce", items.len(), config)?;

            // Evaluate initial value synchronously
            let init_val = eval_to_value(initial, data, work, values, config)?;
            values.push(init_val);

            if !items.is_empty() {
                work.push(WorkItem::ReduceNext(reducer.as_ref(), items));
            }
        }

        Expr::All(arr, predicate) => {
            let arr_val = eval_to_value(arr, data, work, values, config)?;
            let items = match arr_val {
                Value::Array(items) => items,
                _ => {
                    values.push(Value::Bool(false));
                    return Ok(());
                }
            };
            check_iteration_limit("all", items.len(), config)?;
            if items.is_empty() {
                values.push(Value::Bool(false));
            } else {
                work.push(WorkItem::AllNext(predicate.as_ref(), items));
            }
        }

        Expr::Some(arr, predicate) => {
            let arr_val = eval_to_value(arr, data, work, values, config)?;
            let items = match arr_val {
                Value::Array(items) => items,
                _ => {
                    values.push(Value::Bool(false));
                    return Ok(());
                }
            };
            check_iteration_limit("some", items.len(), config)?;
            if items.is_empty() {
                values.push(Value::Bool(false));
            } else {
                work.push(WorkItem::SomeNext(predicate.as_ref(), items));
            }
        }

        Expr::None(arr, predicate) => {
            let arr_val = eval_to_value(arr, data, work, values, config)?;
            let items = match arr_val {
                Value::Array(items) => items,
                _ => {
                    values.push(Value::Bool(true));
                    return Ok(());
                }
            };
            check_iteration_limit("none", items.len(), config)?;
            if items.is_empty() {
                values.push(Value::Bool(true));
            } else {
                work.push(WorkItem::NoneNext(predicate.as_ref(), items));
            }
        }

        Expr::Merge(exprs) => {
            if exprs.is_empty() {
                values.push(Value::Array(vec![]));
            } else {
                work.push(WorkItem::Combine(CombineOp::Merge, exprs.len()));
                for expr in exprs.iter().rev() {
                    work.push(WorkItem::Eval(expr));
                }
            }
        }

        Expr::In(needle, haystack) => {
            work.push(WorkItem::Combine(CombineOp::In, 2));
            work.push(WorkItem::Eval(haystack));
            work.push(WorkItem::Eval(needle));
        }

        Expr::Missing(keys) => {
            if keys.is_empty() {
                values.push(Value::Array(vec![]));
            } else {
                work.push(WorkItem::MissingNext(&keys[..], vec![]));
            }
        }

        Expr::MissingSome(min_required, keys) => {
            let min_val = eval_to_value(min_required, data, work, values, config)?;
            let min = min_val.to_number() as usize;

            if keys.is_empty() {
                values.push(Value::Array(vec![]));
            } else {
                work.push(WorkItem::MissingSomeNext(&keys[..], min, 0, vec![]));
            }
        }

        Expr::Log(inner) => {
            work.push(WorkItem::Log);
            work.push(WorkItem::Eval(inner));
        }
    }
    Ok(())
}

/// Helper: evaluate expression synchronously (for array source evaluation)
/// This uses a separate local work queue to avoid lifetime issues
fn eval_to_value<'a>(
    expr: &'a Expr,
    data: &Value,
    _outer_work: &mut Vec<WorkItem<'a>>,
    _outer_values: &mut Vec<Value>,
    config: &Config,
) -> JsonLogicResult<Value> {
    // Use a fresh local work queue for sub-evaluation
    let mut work: Vec<WorkItem<'a>> = Vec::with_capacity(16);
    let mut values: Vec<Value> = Vec::with_capacity(8);

    work.push(WorkItem::Eval(expr));

    let mut iterations = 0;
    while let Some(item) = work.pop() {
        iterations += 1;
        if iterations > config.eval_max_steps {
            return Err(JsonLogicError::StackOverflow);
        }
        process_item(item, data, &mut work, &mut values, config)?;
    }

    values.pop().ok_or(JsonLogicError::RuntimeError(
        "No result from sub-evaluation".into(),
    ))
}

/// Bound the number of elements an array operator will process.
fn check_iteration_limit(operator: &str, len: usize, config: &Config) -> JsonLogicResult<()> {
    if len > config.array_iteration_limit {
        return Err(JsonLogicError::ArrayIterationLimitExceeded {
            operator: operator.to_string(),
            limit: config.array_iteration_limit,
        });
    }
    Ok(())
}

/// Start a chain comparison
fn start_chain_compare<'a>(
    exprs: &'a [Expr],
    op: ChainCmpOp,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
) -> JsonLogicResult<()> {
    if exprs.len() < 2 {
        values.push(Value::Bool(false));
        return Ok(());
    }

    // Evaluate first two, then continue chain
    work.push(WorkItem::ChainCompareNext(&exprs[2..], op));
    work.push(WorkItem::Eval(&exprs[1]));
    work.push(WorkItem::Eval(&exprs[0]));
    Ok(())
}

/// Continue chain comparison
fn chain_compare_next<'a>(
    remaining: &'a [Expr],
    op: ChainCmpOp,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
) -> JsonLogicResult<()> {
    let curr = values.pop().ok_or(JsonLogicError::StackOverflow)?;
    let prev = values.pop().ok_or(JsonLogicError::StackOverflow)?;

    if !op.compare(&prev, &curr) {
        // Short-circuit: comparison failed
        values.push(Value::Bool(false));
        return Ok(());
    }

    if remaining.is_empty() {
        // All comparisons passed
        values.push(Value::Bool(true));
    } else {
        // Continue with next comparison
        // Push current value back as "prev" for next comparison
        values.push(curr);
        work.push(WorkItem::ChainCompareNext(&remaining[1..], op));
        work.push(WorkItem::Eval(&remaining[0]));
    }
    Ok(())
}

/// Continue AND evaluation with short-circuit
fn and_next<'a>(
    remaining: &'a [Expr],
    _total: usize,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
) -> JsonLogicResult<()> {
    let val = values.last().ok_or(JsonLogicError::StackOverflow)?;

    if !val.is_truthy() {
        // Short-circuit: keep the falsy value as result
        return Ok(());
    }

    if remaining.is_empty() {
        // All truthy, last value is result (already on stack)
        return Ok(());
    }

    // Pop the truthy intermediate, evaluate next
    values.pop();
    work.push(WorkItem::AndNext(&remaining[1..], _total));
    work.push(WorkItem::Eval(&remaining[0]));
    Ok(())
}

/// Continue OR evaluation with short-circuit
fn or_next<'a>(
    remaining: &'a [Expr],
    _total: usize,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
) -> JsonLogicResult<()> {
    let val = values.last().ok_or(JsonLogicError::StackOverflow)?;

    if val.is_truthy() {
        // Short-circuit: keep the truthy value as result
        return Ok(());
    }

    if remaining.is_empty() {
        // All falsy, last value is result (already on stack)
        return Ok(());
    }

    // Pop the falsy intermediate, evaluate next
    values.pop();
    work.push(WorkItem::OrNext(&remaining[1..], _total));
    work.push(WorkItem::Eval(&remaining[0]));
    Ok(())
}

/// Check if condition result and branch accordingly
fn if_condition_check<'a>(
    then_expr: &'a Expr,
    remaining: &'a [Expr],
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
) -> JsonLogicResult<()> {
    let cond = values.pop().ok_or(JsonLogicError::StackOverflow)?;

    if cond.is_truthy() {
        // Condition is true, evaluate then branch
        work.push(WorkItem::Eval(then_expr));
    } else if remaining.is_empty() {
        // No more conditions, no else clause - return null
        values.push(Value::Null);
    } else if remaining.len() == 1 {
        // Single remaining element is the else clause
        work.push(WorkItem::Eval(&remaining[0]));
    } else {
        // More condition/then pairs: remaining[0] = next condition, remaining[1] = next then
        let next_remaining = if remaining.len() > 2 { &remaining[2..] } else { &[] as &[Expr] };
        work.push(WorkItem::IfConditionCheck(&remaining[1], next_remaining));
        work.push(WorkItem::Eval(&remaining[0]));
    }
    Ok(())
}

/// Check ternary condition and evaluate appropriate branch
fn ternary_check<'a>(
    then_expr: &'a Expr,
    else_expr: &'a Expr,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
) -> JsonLogicResult<()> {
    let cond = values.pop().ok_or(JsonLogicError::StackOverflow)?;
    if cond.is_truthy() {
        work.push(WorkItem::Eval(then_expr));
    } else {
        work.push(WorkItem::Eval(else_expr));
    }
    Ok(())
}

/// Map: process next item
fn map_next<'a>(
    mapper: &'a Expr,
    mut remaining: Vec<Value>,
    mut results: Vec<Value>,
    _data: &Value,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
    config: &Config,
) -> JsonLogicResult<()> {
    if remaining.is_empty() {
        values.push(Value::Array(results));
        return Ok(());
    }

    let item = remaining.remove(0);
    // Evaluate mapper with item as data - use a nested evaluation
    let result = eval_to_value(mapper, &item, work, values, config)?;
    results.push(result);

    // Continue with remaining
    work.push(WorkItem::MapNext(mapper, remaining, results));
    Ok(())
}

/// Filter: process next item
fn filter_next<'a>(
    predicate: &'a Expr,
    mut remaining: Vec<Value>,
    results: Vec<Value>,
    _data: &Value,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
    config: &Config,
) -> JsonLogicResult<()> {
    if remaining.is_empty() {
        values.push(Value::Array(results));
        return Ok(());
    }

    let item = remaining.remove(0);
    // Evaluate predicate with item as data
    let pred_result = eval_to_value(predicate, &item, work, values, config)?;
    values.push(pred_result);
    work.push(WorkItem::FilterCheck(predicate, item, remaining, results));
    Ok(())
}

/// Filter: check predicate result
fn filter_check<'a>(
    predicate: &'a Expr,
    item: Value,
    remaining: Vec<Value>,
    mut results: Vec<Value>,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
) -> JsonLogicResult<()> {
    let keep = values.pop().ok_or(JsonLogicError::StackOverflow)?;
    if keep.is_truthy() {
        results.push(item);
    }
    work.push(WorkItem::FilterNext(predicate, remaining, results));
    Ok(())
}

/// Reduce: process next item
fn reduce_next<'a>(
    reducer: &'a Expr,
    mut remaining: Vec<Value>,
    _data: &Value,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
    config: &Config,
) -> JsonLogicResult<()> {
    if remaining.is_empty() {
        // Accumulator is already on stack
        return Ok(());
    }

    let accumulator = values.pop().ok_or(JsonLogicError::StackOverflow)?;
    let current = remaining.remove(0);

    // Build reduce context
    let reduce_data = Value::Object(IndexMap::from([
        ("current".to_string(), current),
        ("accumulator".to_string(), accumulator),
    ]));

    // Evaluate reducer with context
    let new_acc = eval_to_value(reducer, &reduce_data, work, values, config)?;
    values.push(new_acc);

    if !remaining.is_empty() {
        work.push(WorkItem::ReduceNext(reducer, remaining));
    }
    Ok(())
}

/// All: check result and continue
fn all_next<'a>(
    predicate: &'a Expr,
    mut remaining: Vec<Value>,
    _data: &Value,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
    config: &Config,
) -> JsonLogicResult<()> {
    if remaining.is_empty() {
        values.push(Value::Bool(true));
        return Ok(());
    }

    let item = remaining.remove(0);
    let result = eval_to_value(predicate, &item, work, values, config)?;

    if !result.is_truthy() {
        // Short-circuit
        values.push(Value::Bool(false));
        return Ok(());
    }

    work.push(WorkItem::AllNext(predicate, remaining));
    Ok(())
}

/// Some: check result and continue
fn some_next<'a>(
    predicate: &'a Expr,
    mut remaining: Vec<Value>,
    _data: &Value,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
    config: &Config,
) -> JsonLogicResult<()> {
    if remaining.is_empty() {
        values.push(Value::Bool(false));
        return Ok(());
    }

    let item = remaining.remove(0);
    let result = eval_to_value(predicate, &item, work, values, config)?;

    if result.is_truthy() {
        // Short-circuit
        values.push(Value::Bool(true));
        return Ok(());
    }

    work.push(WorkItem::SomeNext(predicate, remaining));
    Ok(())
}

/// None: check result and continue
fn none_next<'a>(
    predicate: &'a Expr,
    mut remaining: Vec<Value>,
    _data: &Value,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
    config: &Config,
) -> JsonLogicResult<()> {
    if remaining.is_empty() {
        values.push(Value::Bool(true));
        return Ok(());
    }

    let item = remaining.remove(0);
    let result = eval_to_value(predicate, &item, work, values, config)?;

    if result.is_truthy() {
        // Short-circuit
        values.push(Value::Bool(false));
        return Ok(());
    }

    work.push(WorkItem::NoneNext(predicate, remaining));
    Ok(())
}

/// Compute substring after args are evaluated
fn substr_compute(has_len: bool, values: &mut Vec<Value>) -> JsonLogicResult<()> {
    let (s_val, start_val, len_opt) = if has_len {
        let len_val = values.pop().ok_or(JsonLogicError::StackOverflow)?;
        let start = values.pop().ok_or(JsonLogicError::StackOverflow)?;
        let s = values.pop().ok_or(JsonLogicError::StackOverflow)?;
        (s, start, Some(len_val))
    } else {
        let start = values.pop().ok_or(JsonLogicError::StackOverflow)?;
        let s = values.pop().ok_or(JsonLogicError::StackOverflow)?;
        (s, start, None)
    };

    let s_str = s_val.to_display_string();
    let start_num = start_val.to_number() as i64;

    let chars: Vec<char> = s_str.chars().collect();
    let len_chars = chars.len() as i64;

    let actual_start = if start_num < 0 {
        (len_chars + start_num).max(0) as usize
    } else {
        start_num.min(len_chars) as usize
    };

    let result = if let Some(length_val) = len_opt {
        let length = length_val.to_number() as i64;
        if length < 0 {
            let end = (len_chars + length).max(actual_start as i64) as usize;
            chars[actual_start..end].iter().collect()
        } else {
            let end = (actual_start + length as usize).min(chars.len());
            chars[actual_start..end].iter().collect()
        }
    } else {
        chars[actual_start..].iter().collect()
    };

    values.push(Value::String(result));
    Ok(())
}

/// Missing: check next key
fn missing_next<'a>(
    keys: &'a [Expr],
    mut missing: Vec<Value>,
    data: &Value,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
    config: &Config,
) -> JsonLogicResult<()> {
    if keys.is_empty() {
        values.push(Value::Array(missing));
        return Ok(());
    }

    let key_val = eval_to_value(&keys[0], data, work, values, config)?;
    let key_str = key_val.to_display_string();

    if get_variable_ref(&key_str, data).is_none() {
        missing.push(Value::String(key_str));
    }

    work.push(WorkItem::MissingNext(&keys[1..], missing));
    Ok(())
}

/// MissingSome: check keys and track found
fn missing_some_next<'a>(
    keys: &'a [Expr],
    min: usize,
    mut found: usize,
    mut missing: Vec<Value>,
    data: &Value,
    work: &mut Vec<WorkItem<'a>>,
    values: &mut Vec<Value>,
    config: &Config,
) -> JsonLogicResult<()> {
    if keys.is_empty() {
        if found >= min {
            values.push(Value::Array(vec![]));
        } else {
            values.push(Value::Array(missing));
        }
        return Ok(());
    }

    let key_val = eval_to_value(&keys[0], data, work, values, config)?;
    let key_str = key_val.to_display_string();

    if get_variable_ref(&key_str, data).is_some() {
        found += 1;
    } else {
        missing.push(Value::String(key_str));
    }

    work.push(WorkItem::MissingSomeNext(&keys[1..], min, found, missing));
    Ok(())
}

/// Division with zero check
fn div_check(values: &mut Vec<Value>) -> JsonLogicResult<()> {
    let b = values.pop().ok_or(JsonLogicError::StackOverflow)?;
    let a = values.pop().ok_or(JsonLogicError::StackOverflow)?;
    values.push(a.checked_div(&b)?);
    Ok(())
}

/// Modulo with zero check
fn mod_check(values: &mut Vec<Value>) -> JsonLogicResult<()> {
    let b = values.pop().ok_or(JsonLogicError::StackOverflow)?;
    let a = values.pop().ok_or(JsonLogicError::StackOverflow)?;
    values.push(a.checked_rem(&b)?);
    Ok(())
}

/// Negate top value
fn negate(values: &mut Vec<Value>) -> JsonLogicResult<()> {
    let val = values.pop().ok_or(JsonLogicError::StackOverflow)?;
    values.push(val.checked_neg()?);
    Ok(())
}

/// Convert to boolean
fn to_bool(values: &mut Vec<Value>) -> JsonLogicResult<()> {
    let val = values.pop().ok_or(JsonLogicError::StackOverflow)?;
    values.push(Value::Bool(val.is_truthy()));
    Ok(())
}

/// Logical NOT
fn not(values: &mut Vec<Value>) -> JsonLogicResult<()> {
    let val = values.pop().ok_or(JsonLogicError::StackOverflow)?;
    values.push(Value::Bool(!val.is_truthy()));
    Ok(())
}

/// Log and pass through
#[allow(unused_variables)]
fn log_value(values: &mut Vec<Value>) -> JsonLogicResult<()> {
    let val = values.last().ok_or(JsonLogicError::StackOverflow)?;
    #[cfg(debug_assertions)]
    eprintln!("[JSON Logic log] {:?}", val);
    Ok(())
}

/// Combine multiple values using an operation
fn combine(op: CombineOp, count: usize, values: &mut Vec<Value>) -> JsonLogicResult<()> {
    if count == 0 {
        return Err(JsonLogicError::RuntimeError("Combine with zero count".into()));
    }

    // Pop values (they were pushed in reverse order, so they come out in correct order)
    let mut vals = Vec::with_capacity(count);
    for _ in 0..count {
        vals.push(values.pop().ok_or(JsonLogicError::StackOverflow)?);
    }
    vals.reverse();

    let result = match op {
        CombineOp::Eq => {
            Value::Bool(vals[0].loose_equals(&vals[1]))
        }
        CombineOp::StrictEq => {
            Value::Bool(vals[0] == vals[1])
        }
        CombineOp::Ne => {
            Value::Bool(!vals[0].loose_equals(&vals[1]))
        }
        CombineOp::StrictNe => {
            Value::Bool(vals[0] != vals[1])
        }
        CombineOp::Add => {
            let mut vals = vals.into_iter();
            let mut acc = vals.next().unwrap();
            for v in vals {
                acc = acc.checked_add(&v)?;
            }
            acc
        }
        CombineOp::Sub => {
            // N-ary subtraction: a - b - c - d = ((a - b) - c) - d
            let mut vals = vals.into_iter();
            let mut acc = vals.next().unwrap();
            for v in vals {
                acc = acc.checked_sub(&v)?;
            }
            acc
        }
        CombineOp::Mul => {
            let mut vals = vals.into_iter();
            let mut acc = vals.next().unwrap();
            for v in vals {
                acc = acc.checked_mul(&v)?;
            }
            acc
        }
        CombineOp::Min => {
            let mut vals = vals.into_iter();
            let mut min_val = vals.next().unwrap();
            for v in vals {
                if v.partial_cmp(&min_val) == Some(std::cmp::Ordering::Less) {
                    min_val = v;
                }
            }
            min_val
        }
        CombineOp::Max => {
            let mut vals = vals.into_iter();
            let mut max_val = vals.next().unwrap();
            for v in vals {
                if v.partial_cmp(&max_val) == Some(std::cmp::Ordering::Greater) {
                    max_val = v;
                }
            }
            max_val
        }
        CombineOp::Cat => {
            let s: String = vals.iter().map(|v| v.to_display_string()).collect();
            Value::String(s)
        }
        CombineOp::Merge => {
            let mut result = Vec::new();
            for v in vals {
                match v {
                    Value::Array(items) => result.extend(items),
                    other => result.push(other),
                }
            }
            Value::Array(result)
        }
        CombineOp::In => {
            let needle = &vals[0];
            let haystack = &vals[1];
            let found = match haystack {
                Value::Array(items) => items.iter().any(|item| needle.loose_equals(item)),
                Value::String(s) => {
                    let needle_str = needle.to_display_string();
                    s.contains(&needle_str)
                }
                _ => false,
            };
            Value::Bool(found)
        }
    };

    values.push(result);
    Ok(())
}

/// Get a variable from data by path (returns reference to avoid cloning)
fn get_variable_ref<'a>(path: &str, data: &'a Value) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(data);
    }

    let mut current = data;

    // Use iterator instead of collecting to Vec to avoid allocation
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(arr) => {
                let idx: usize = segment.parse().ok()?;
                arr.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Get a variable from data by path (clones the result for ownership)
#[inline]
fn get_variable(path: &str, data: &Value) -> Option<Value> {
    get_variable_ref(path, data).cloned()
}

/// Convenience function for one-shot evaluation using iterative evaluator
pub fn evaluate_iterative(expr: &Expr, data: &Value) -> JsonLogicResult<Value> {
    IterativeEvaluator::new().evaluate(expr, data)
}
