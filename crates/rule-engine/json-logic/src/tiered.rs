//! Tiered Compilation for JSON Logic
//!
//! Implements automatic promotion from AST interpretation to bytecode VM
//! based on evaluation count. This optimizes frequently-used rules.
//!
//! Tiers:
//! - Tier 0 (AST): Default for all new rules, fastest startup
//! - Tier 1 (Bytecode): After PROMOTION_THRESHOLD evaluations, compiled to bytecode
//! - Tier 2 (JIT): Reserved for future Cranelift JIT compilation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use ruleforge_core::Value;

use crate::config::Config;
use crate::iter_eval::IterativeEvaluator;
use crate::{CompiledBytecode, Compiler, EvalContext, Expr, JsonLogicResult, VM};

/// Compilation tier for a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CompilationTier {
    /// Tier 0: AST interpretation (default)
    Ast,
    /// Tier 1: Bytecode VM execution
    Bytecode,
    /// Tier 2: JIT compiled (future)
    Jit,
}

impl Default for CompilationTier {
    fn default() -> Self {
        Self::Ast
    }
}

/// A compiled rule with tier tracking
pub struct CompiledRule {
    /// The parsed AST (always available)
    pub ast: Expr,
    /// Compiled bytecode (populated after promotion to Tier 1)
    bytecode: Option<CompiledBytecode>,
    /// Current compilation tier
    tier: CompilationTier,
    /// Number of times this rule has been evaluated
    eval_count: AtomicU64,
    /// Tiering/limits config this rule evaluates under
    config: Config,
}

impl CompiledRule {
    /// Create a new compiled rule at Tier 0 (AST), under the default config
    pub fn new(ast: Expr) -> Self {
        Self::with_config_default(ast, Config::default())
    }

    /// Create a new compiled rule at Tier 0 (AST) under an explicit config
    pub fn with_config_default(ast: Expr, config: Config) -> Self {
        Self {
            ast,
            bytecode: None,
            tier: CompilationTier::Ast,
            eval_count: AtomicU64::new(0),
            config,
        }
    }

    /// Create a new compiled rule pre-compiled to Tier 1 (Bytecode)
    pub fn with_bytecode(ast: Expr, bytecode: CompiledBytecode) -> Self {
        Self {
            ast,
            bytecode: Some(bytecode),
            tier: CompilationTier::Bytecode,
            eval_count: AtomicU64::new(0),
            config: Config::default(),
        }
    }

    /// Get the current compilation tier
    pub fn tier(&self) -> CompilationTier {
        self.tier
    }

    /// Get the evaluation count
    pub fn eval_count(&self) -> u64 {
        self.eval_count.load(Ordering::Relaxed)
    }

    /// Check if this rule should be promoted to a higher tier (uses its own config's threshold)
    pub fn should_promote(&self) -> bool {
        self.should_promote_at(self.config.bytecode_promotion_threshold)
    }

    /// Check if this rule should be promoted with a custom threshold
    pub fn should_promote_at(&self, threshold: u64) -> bool {
        self.tier == CompilationTier::Ast
            && self.eval_count.load(Ordering::Relaxed) >= threshold
    }

    /// Promote to Tier 1 (Bytecode)
    pub fn promote_to_bytecode(&mut self) -> JsonLogicResult<()> {
        if self.tier != CompilationTier::Ast {
            return Ok(()); // Already promoted or higher
        }

        let mut compiler = Compiler::new();
        let bytecode = compiler.compile(&self.ast)?;
        self.bytecode = Some(bytecode);
        self.tier = CompilationTier::Bytecode;
        Ok(())
    }

    /// Evaluate this rule with automatic tier selection
    pub fn evaluate(&self, data: &serde_json::Value) -> JsonLogicResult<Value> {
        // Increment evaluation count
        self.eval_count.fetch_add(1, Ordering::Relaxed);

        match self.tier {
            CompilationTier::Ast => {
                // Use loop-based evaluator (no recursion, prevents stack overflow)
                let data_val = Value::from_json(data);
                IterativeEvaluator::with_config(self.config.clone()).evaluate(&self.ast, &data_val)
            }
            CompilationTier::Bytecode | CompilationTier::Jit => {
                if let Some(ref bytecode) = self.bytecode {
                    let context = EvalContext::from_json(data, bytecode);
                    let mut vm = VM::with_stack_limit(self.config.bytecode_stack_limit);
                    vm.execute(bytecode, &context)
                } else {
                    // Fallback to loop-based evaluator if bytecode not available
                    let data_val = Value::from_json(data);
                    IterativeEvaluator::with_config(self.config.clone()).evaluate(&self.ast, &data_val)
                }
            }
        }
    }

    /// Serialize to a persistable format
    pub fn to_persisted(&self) -> PersistedRule {
        PersistedRule {
            ast: self.ast.clone(),
            bytecode: self.bytecode.clone(),
            tier: self.tier,
            eval_count: self.eval_count.load(Ordering::Relaxed),
        }
    }

    /// Restore from a persisted format, under the default config
    pub fn from_persisted(persisted: PersistedRule) -> Self {
        Self {
            ast: persisted.ast,
            bytecode: persisted.bytecode,
            tier: persisted.tier,
            eval_count: AtomicU64::new(persisted.eval_count),
            config: Config::default(),
        }
    }

    /// Get the bytecode if available
    pub fn bytecode(&self) -> Option<&CompiledBytecode> {
        self.bytecode.as_ref()
    }
}

/// Serializable version of CompiledRule for persistence
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PersistedRule {
    /// The parsed AST
    pub ast: Expr,
    /// Compiled bytecode (if promoted to Tier 1)
    pub bytecode: Option<CompiledBytecode>,
    /// Current compilation tier
    pub tier: CompilationTier,
    /// Number of evaluations at time of persistence
    pub eval_count: u64,
}

impl PersistedRule {
    /// Serialize to JSON bytes
    pub fn to_json(&self) -> JsonLogicResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| crate::JsonLogicError::InvalidStructure(e.to_string()))
    }

    /// Deserialize from JSON bytes
    pub fn from_json(bytes: &[u8]) -> JsonLogicResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| crate::JsonLogicError::InvalidStructure(e.to_string()))
    }
}

/// Cache for compiled rules with automatic tier promotion
pub struct RuleCache {
    /// Cached compiled rules by rule ID
    rules: RwLock<HashMap<String, Arc<RwLock<CompiledRule>>>>,
    /// Promotion threshold (configurable)
    promotion_threshold: u64,
    /// Config new rules are compiled under
    config: Config,
}

impl RuleCache {
    /// Create a new rule cache under the default config
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new rule cache under an explicit config
    pub fn with_config(config: Config) -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
            promotion_threshold: config.bytecode_promotion_threshold,
            config,
        }
    }

    /// Create a new rule cache with custom promotion threshold, default config otherwise
    pub fn with_threshold(threshold: u64) -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
            promotion_threshold: threshold,
            config: Config::default(),
        }
    }

    /// Get or create a compiled rule for the given ID and expression
    pub fn get_or_compile(&self, rule_id: &str, expr: &Expr) -> Arc<RwLock<CompiledRule>> {
        // Check if rule exists
        {
            let rules = self.rules.read().unwrap();
            if let Some(rule) = rules.get(rule_id) {
                return Arc::clone(rule);
            }
        }

        // Create new rule
        let compiled = Arc::new(RwLock::new(CompiledRule::with_config_default(
            expr.clone(),
            self.config.clone(),
        )));

        // Insert into cache
        {
            let mut rules = self.rules.write().unwrap();
            rules.insert(rule_id.to_string(), Arc::clone(&compiled));
        }

        compiled
    }

    /// Evaluate a rule with automatic caching and tier promotion
    pub fn evaluate(
        &self,
        rule_id: &str,
        expr: &Expr,
        data: &serde_json::Value,
    ) -> JsonLogicResult<Value> {
        let compiled = self.get_or_compile(rule_id, expr);

        // Evaluate
        let result = {
            let rule = compiled.read().unwrap();
            rule.evaluate(data)
        };

        // Check for promotion after evaluation
        {
            let rule = compiled.read().unwrap();
            if rule.should_promote_at(self.promotion_threshold) {
                drop(rule); // Release read lock
                let mut rule = compiled.write().unwrap();
                if rule.should_promote_at(self.promotion_threshold) {
                    // Double-check after acquiring write lock
                    if let Err(e) = rule.promote_to_bytecode() {
                        // Continue with AST tier; the rule stays correct, just unpromoted
                        tracing::warn!(rule_id, error = %e, "failed to promote rule to bytecode");
                    }
                }
            }
        }

        result
    }

    /// Force compile a rule to bytecode (Tier 1)
    pub fn force_compile(&self, rule_id: &str, expr: &Expr) -> JsonLogicResult<()> {
        let compiled = self.get_or_compile(rule_id, expr);
        let mut rule = compiled.write().unwrap();
        rule.promote_to_bytecode()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let rules = self.rules.read().unwrap();
        let mut stats = CacheStats::default();

        for (_, rule) in rules.iter() {
            let rule = rule.read().unwrap();
            stats.total_rules += 1;
            match rule.tier() {
                CompilationTier::Ast => stats.tier0_rules += 1,
                CompilationTier::Bytecode => stats.tier1_rules += 1,
                CompilationTier::Jit => stats.tier2_rules += 1,
            }
            stats.total_evaluations += rule.eval_count();
        }

        stats
    }

    /// Clear the cache
    pub fn clear(&self) {
        let mut rules = self.rules.write().unwrap();
        rules.clear();
    }

    /// Remove a specific rule from the cache
    pub fn remove(&self, rule_id: &str) -> bool {
        let mut rules = self.rules.write().unwrap();
        rules.remove(rule_id).is_some()
    }

    /// Get the number of cached rules
    pub fn len(&self) -> usize {
        self.rules.read().unwrap().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.rules.read().unwrap().is_empty()
    }
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the rule cache
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Total number of rules in cache
    pub total_rules: usize,
    /// Number of rules at Tier 0 (AST)
    pub tier0_rules: usize,
    /// Number of rules at Tier 1 (Bytecode)
    pub tier1_rules: usize,
    /// Number of rules at Tier 2 (JIT)
    pub tier2_rules: usize,
    /// Total number of evaluations across all rules
    pub total_evaluations: u64,
}
