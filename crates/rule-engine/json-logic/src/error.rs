//! Error types for JSON Logic parsing, compilation, and evaluation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JsonLogicError {
    #[error("Core value error: {0}")]
    Core(#[from] ruleforge_core::CoreError),


    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid argument count for '{op}': expected {expected}, got {actual}")]
    InvalidArgumentCount {
        op: String,
        expected: String,
        actual: usize,
    },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    #[error("Invalid variable path: {0}")]
    InvalidVariablePath(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid expression structure: {0}")]
    InvalidStructure(String),

    #[error("Compilation error: {0}")]
    CompilationError(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("Stack underflow")]
    StackUnderflow,

    /// The tree-walking / iterative evaluator exceeded its configured step
    /// or work-queue budget. Distinct from `VmStackOverflow`, which bounds
    /// the bytecode VM's value stack depth instead.
    #[error("Stack overflow")]
    StackOverflow,

    /// The bytecode VM's value stack exceeded its configured depth limit.
    #[error("VM stack overflow (limit: {0})")]
    VmStackOverflow(usize),

    #[error("Invalid bytecode at offset {0}")]
    InvalidBytecode(usize),

    #[error("Array iteration limit exceeded in '{operator}': more than {limit} elements")]
    ArrayIterationLimitExceeded { operator: String, limit: usize },
}

pub type JsonLogicResult<T> = Result<T, JsonLogicError>;
