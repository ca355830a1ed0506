//! Configuration for JSON Logic evaluation.
//!
//! There is no process-wide singleton: every evaluator, compiler, and cache
//! takes a `Config` by value or reference at construction time, so two
//! evaluations in the same process can run under different limits (tests in
//! particular rely on this). `Config::from_env()` is an opt-in convenience
//! constructor for callers that do want to source settings from the
//! environment with the prefix `RULE_ENGINE_`.

/// JSON Logic evaluation limits and tiering thresholds.
#[derive(Debug, Clone)]
pub struct Config {
    /// How many times a rule must be evaluated before compiling to bytecode.
    /// Rules evaluated fewer times stay as AST (interpreted). Hot rules get compiled.
    /// Environment variable: RULE_ENGINE_BYTECODE_PROMOTION_THRESHOLD
    /// Default: 100
    pub bytecode_promotion_threshold: u64,

    /// Minimum expression complexity (AST node count) to consider for bytecode compilation.
    /// Simple expressions like `{"var": "x"}` stay as AST since compilation overhead isn't worth it.
    /// Environment variable: RULE_ENGINE_BYTECODE_MIN_COMPLEXITY
    /// Default: 5
    pub bytecode_min_complexity: usize,

    /// Maximum operand stack size for the bytecode VM.
    /// Environment variable: RULE_ENGINE_BYTECODE_STACK_LIMIT
    /// Default: 65536
    pub bytecode_stack_limit: usize,

    /// Maximum pending operations in the iterative evaluator's work queue.
    /// Environment variable: RULE_ENGINE_EVAL_WORK_QUEUE_LIMIT
    /// Default: 1000000
    pub eval_work_queue_limit: usize,

    /// Maximum evaluation steps (loop iterations) before aborting.
    /// Environment variable: RULE_ENGINE_EVAL_MAX_STEPS
    /// Default: 1000000
    pub eval_max_steps: usize,

    /// Maximum number of elements `map`/`filter`/`reduce`/`all`/`some`/`none`
    /// will iterate over before failing with `ArrayIterationLimitExceeded`.
    /// Environment variable: RULE_ENGINE_ARRAY_ITERATION_LIMIT
    /// Default: 100000
    pub array_iteration_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bytecode_promotion_threshold: 100,
            bytecode_min_complexity: 5,
            bytecode_stack_limit: 65_536,
            eval_work_queue_limit: 1_000_000,
            eval_max_steps: 1_000_000,
            array_iteration_limit: 100_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// `Default` for anything unset or unparseable. Never called implicitly
    /// by the evaluator — callers opt into this explicitly.
    pub fn from_env() -> Self {
        Self {
            bytecode_promotion_threshold: parse_env("RULE_ENGINE_BYTECODE_PROMOTION_THRESHOLD", 100),
            bytecode_min_complexity: parse_env("RULE_ENGINE_BYTECODE_MIN_COMPLEXITY", 5),
            bytecode_stack_limit: parse_env("RULE_ENGINE_BYTECODE_STACK_LIMIT", 65_536),
            eval_work_queue_limit: parse_env("RULE_ENGINE_EVAL_WORK_QUEUE_LIMIT", 1_000_000),
            eval_max_steps: parse_env("RULE_ENGINE_EVAL_MAX_STEPS", 1_000_000),
            array_iteration_limit: parse_env("RULE_ENGINE_ARRAY_ITERATION_LIMIT", 100_000),
        }
    }
}

/// Parse an environment variable with a default value
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
