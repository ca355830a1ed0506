//! Rule executor with DAG-based dependency resolution
//!
//! Provides:
//! - Sequential execution following topological order
//! - Parallel execution within dependency levels (one rayon task per rule)
//! - Caching of compiled expressions

use hashbrown::HashMap;
use parking_lot::RwLock;
use rayon::prelude::*;
use ruleforge_core::{Rule, RuleId, Value};
use ruleforge_json_logic::{CachedExpression, Config, Evaluator};
use crate::context::ExecutionContext;
use crate::dag::RuleDag;
use crate::error::{RuleEngineError, RuleEngineResult};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Compiled rule with cached expression
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Original rule
    pub rule: Arc<Rule>,
    /// Compiled JSON Logic expression
    pub expression: Arc<CachedExpression>,
}

impl CompiledRule {
    /// Compile a rule under the given tiering config, so the cached expression's
    /// bytecode gate and promotion threshold match what it will be evaluated under.
    pub fn compile(rule: Rule, config: &Config) -> RuleEngineResult<Self> {
        let json_expr: serde_json::Value = serde_json::from_str(&rule.compiled_expression)
            .map_err(|e| RuleEngineError::EvaluationError(format!("Invalid expression JSON: {}", e)))?;

        let expression = CachedExpression::from_json_with_config(&json_expr, config)
            .map_err(|e| RuleEngineError::EvaluationError(e.to_string()))?;

        Ok(Self {
            rule: Arc::new(rule),
            expression: Arc::new(expression),
        })
    }
}

/// Result of executing a rule
#[derive(Debug, Clone)]
pub struct RuleResult {
    /// The rule ID
    pub rule_id: RuleId,
    /// The output attributes and their values
    pub outputs: Vec<(String, Value)>,
    /// Execution time in nanoseconds
    pub execution_time_ns: u64,
}

/// Result of executing all rules
#[derive(Debug)]
pub struct ExecutionResult {
    /// Results for each rule
    pub rule_results: Vec<RuleResult>,
    /// Final context with all computed values
    pub context: ExecutionContext,
    /// Total execution time in nanoseconds
    pub total_time_ns: u64,
    /// Execution levels (for debugging/analysis)
    pub levels: Vec<Vec<RuleId>>,
}

impl ExecutionResult {
    /// Get the result for a specific rule
    pub fn get_result(&self, rule_id: &RuleId) -> Option<&RuleResult> {
        self.rule_results.iter().find(|r| &r.rule_id == rule_id)
    }

    /// Get the value of a specific output
    pub fn get_output(&self, output: &str) -> Option<&Value> {
        self.context.get(output)
    }
}

/// The main rule executor
///
/// Compiled rules are cached behind a `parking_lot::RwLock`, so a single
/// `Arc<RuleExecutor>` can be shared across threads and run concurrent
/// executions without any `&mut self` borrow.
#[derive(Debug, Default)]
pub struct RuleExecutor {
    /// Tiering/limits config handed to each evaluation
    config: Config,
    /// Compiled rules cache
    compiled_rules: RwLock<HashMap<RuleId, CompiledRule>>,
}

impl RuleExecutor {
    /// Create a new executor under the default config
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            compiled_rules: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new executor under an explicit config
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            compiled_rules: RwLock::new(HashMap::new()),
        }
    }

    /// Pre-compile a set of rules
    pub fn compile_rules(&self, rules: &[Rule]) -> RuleEngineResult<()> {
        for rule in rules {
            if self.compiled_rules.read().contains_key(&rule.id) {
                continue;
            }
            let compiled = CompiledRule::compile(rule.clone(), &self.config)?;
            self.compiled_rules.write().insert(rule.id.clone(), compiled);
        }
        Ok(())
    }

    /// Execute rules in topological order, running each dependency level's rules
    /// concurrently since rules within a level share no data dependency.
    #[instrument(skip(self, rules, context))]
    pub fn execute(
        &self,
        rules: &[Rule],
        context: &mut ExecutionContext,
    ) -> RuleEngineResult<ExecutionResult> {
        let start = std::time::Instant::now();

        // Build DAG
        let dag = RuleDag::from_rules(rules)?;
        let levels = dag.execution_levels()?;

        // Pre-compile all rules
        self.compile_rules(rules)?;

        let mut rule_results = Vec::with_capacity(rules.len());

        // Execute level by level; rules inside a level run in parallel, levels run in sequence
        for level in &levels {
            let data = context.to_value();
            let compiled_rules = self.compiled_rules.read();

            let outcomes: Vec<Result<RuleResult, (RuleId, RuleEngineError)>> = level
                .par_iter()
                .map(|rule_id| Self::evaluate_rule(&compiled_rules, &self.config, rule_id, &data))
                .collect();

            drop(compiled_rules);

            let mut failures = Vec::new();
            for outcome in outcomes {
                match outcome {
                    Ok(result) => {
                        for (path, value) in &result.outputs {
                            context.set(path.clone(), value.clone())?;
                        }
                        rule_results.push(result);
                    }
                    Err((rule_id, err)) => failures.push((rule_id, err)),
                }
            }

            if !failures.is_empty() {
                return Err(RuleEngineError::MultipleRuleFailures(failures));
            }
        }

        let total_time_ns = start.elapsed().as_nanos() as u64;

        Ok(ExecutionResult {
            rule_results,
            context: context.clone(),
            total_time_ns,
            levels,
        })
    }

    /// Evaluate a single rule against a fixed input snapshot.
    ///
    /// Takes a fresh `Evaluator` per call so concurrent invocations across rayon's
    /// thread pool never share VM state.
    fn evaluate_rule(
        compiled_rules: &HashMap<RuleId, CompiledRule>,
        config: &Config,
        rule_id: &RuleId,
        data: &Value,
    ) -> Result<RuleResult, (RuleId, RuleEngineError)> {
        let compiled = compiled_rules
            .get(rule_id)
            .ok_or_else(|| (rule_id.clone(), RuleEngineError::RuleNotFound(format!("{:?}", rule_id))))?;

        let start = std::time::Instant::now();

        let mut evaluator = Evaluator::with_config(config.clone());
        let value = evaluator
            .evaluate_cached_value(&compiled.expression, data)
            .map_err(|e| {
                (
                    rule_id.clone(),
                    RuleEngineError::EvaluationError(format!(
                        "Rule '{:?}' evaluation failed: {}",
                        rule_id, e
                    )),
                )
            })?;

        let execution_time_ns = start.elapsed().as_nanos() as u64;

        let outputs: Vec<(String, Value)> = compiled
            .rule
            .output_attributes
            .iter()
            .map(|output_path| (output_path.path.as_str().to_string(), value.clone()))
            .collect();

        debug!(
            rule_id = ?rule_id,
            outputs = ?outputs,
            execution_time_ns = execution_time_ns,
            "Rule executed"
        );

        Ok(RuleResult {
            rule_id: rule_id.clone(),
            outputs,
            execution_time_ns,
        })
    }

    /// Get statistics about compiled rules
    pub fn stats(&self) -> ExecutorStats {
        let compiled_rules = self.compiled_rules.read();
        let total_nodes: usize = compiled_rules.values()
            .map(|r| r.expression.node_count)
            .sum();

        ExecutorStats {
            compiled_rules: compiled_rules.len(),
            total_ast_nodes: total_nodes,
            rules_with_bytecode: compiled_rules.values()
                .filter(|r| r.expression.has_bytecode())
                .count(),
        }
    }

    /// Clear the compiled rules cache
    pub fn clear_cache(&self) {
        self.compiled_rules.write().clear();
    }
}

/// Statistics about the executor
#[derive(Debug, Clone)]
pub struct ExecutorStats {
    /// Number of compiled rules in cache
    pub compiled_rules: usize,
    /// Total AST nodes across all rules
    pub total_ast_nodes: usize,
    /// Number of rules with bytecode compilation
    pub rules_with_bytecode: usize,
}
