//! Bytecode Virtual Machine for JSON Logic
//!
//! A fast stack-based VM for executing compiled JSON Logic expressions.

use ruleforge_core::Value;
use smallvec::SmallVec;

use crate::{CompiledBytecode, JsonLogicError, JsonLogicResult, OpCode};

/// Default maximum stack depth, used by `VM::new()`. Override with
/// `VM::with_stack_limit` (the tiered rule cache sizes this from `Config`).
const DEFAULT_MAX_STACK_DEPTH: usize = 1024;

/// Execution context containing variable values
pub struct EvalContext {
    /// Variable values by index (matching bytecode.variable_names order)
    pub values: Vec<Value>,
}

impl EvalContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Create context with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Build context from a map of variable names to values
    pub fn from_map(
        map: &std::collections::HashMap<String, Value>,
        bytecode: &CompiledBytecode,
    ) -> Self {
        let mut values = vec![Value::Null; bytecode.variable_names.len()];
        for (name, idx) in &bytecode.variable_map {
            if let Some(value) = map.get(name) {
                values[*idx as usize] = value.clone();
            }
        }
        Self { values }
    }

    /// Build context from JSON value (for nested access)
    pub fn from_json(
        data: &serde_json::Value,
        bytecode: &CompiledBytecode,
    ) -> Self {
        let mut values = vec![Value::Null; bytecode.variable_names.len()];

        for (name, idx) in &bytecode.variable_map {
            if let Some(value) = get_json_path(data, name) {
                values[*idx as usize] = Value::from_json(&value);
            }
        }

        Self { values }
    }

    /// Build context directly from a core `Value`, skipping the JSON
    /// intermediate representation when the caller already has one
    /// (e.g. `ExecutionContext::to_value()`).
    pub fn from_value(data: &Value, bytecode: &CompiledBytecode) -> Self {
        let mut values = vec![Value::Null; bytecode.variable_names.len()];

        for (name, idx) in &bytecode.variable_map {
            if let Some(value) = get_value_path(data, name) {
                values[*idx as usize] = value;
            }
        }

        Self { values }
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Get a value from JSON by dot-separated path
fn get_json_path(data: &serde_json::Value, path: &str) -> Option<serde_json::Value> {
    if path.is_empty() {
        return Some(data.clone());
    }

    let mut current = data;
    for segment in path.split('.') {
        match current {
            serde_json::Value::Object(map) => {
                current = map.get(segment)?;
            }
            serde_json::Value::Array(arr) => {
                let idx: usize = segment.parse().ok()?;
                current = arr.get(idx)?;
            }
            _ => return None,
        }
    }

    Some(current.clone())
}

/// Get a value from a core `Value` by dot-separated path
fn get_value_path(data: &Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return Some(data.clone());
    }

    let mut current = data;
    for segment in path.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(segment)?;
            }
            Value::Array(arr) => {
                let idx: usize = segment.parse().ok()?;
                current = arr.get(idx)?;
            }
            _ => return None,
        }
    }

    Some(current.clone())
}

/// Bytecode Virtual Machine
#[derive(Debug)]
pub struct VM {
    /// Execution stack
    stack: SmallVec<[Value; 32]>,
    /// Maximum operand stack depth before `VmStackOverflow`
    max_stack_depth: usize,
}

impl VM {
    /// Create a new VM with the default stack depth limit
    pub fn new() -> Self {
        Self {
            stack: SmallVec::new(),
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
        }
    }

    /// Create a new VM with an explicit stack depth limit (e.g. from
    /// `Config::bytecode_stack_limit`)
    pub fn with_stack_limit(max_stack_depth: usize) -> Self {
        Self {
            stack: SmallVec::new(),
            max_stack_depth,
        }
    }

    /// Execute bytecode with the given context
    pub fn execute(
        &mut self,
        bytecode: &CompiledBytecode,
        context: &EvalContext,
    ) -> JsonLogicResult<Value> {
        self.stack.clear();

        let code = &bytecode.bytecode;
        let constants = &bytecode.constants;
        let mut pc: usize = 0;

        while pc < code.len() {
            let op = OpCode::from_byte(code[pc])
                .ok_or(JsonLogicError::InvalidBytecode(pc))?;

            match op {
                OpCode::Nop => {
                    pc += 1;
                }

                OpCode::LoadConst => {
                    let idx = read_u16(code, pc + 1) as usize;
                    if idx >= constants.len() {
                        return Err(JsonLogicError::InvalidBytecode(pc));
                    }
                    self.push(constants[idx].clone())?;
                    pc += 3;
                }

                OpCode::LoadVar => {
                    let idx = read_u16(code, pc + 1) as usize;
                    if idx >= context.values.len() {
                        return Err(JsonLogicError::VariableNotFound(format!("index {}", idx)));
                    }
                    self.push(context.values[idx].clone())?;
                    pc += 3;
                }

                OpCode::LoadVarWithDefault => {
                    let var_idx = read_u16(code, pc + 1) as usize;
                    let default_idx = read_u16(code, pc + 3) as usize;

                    let value = if var_idx < context.values.len() {
                        let v = &context.values[var_idx];
                        if matches!(v, Value::Null) {
                            // Variable is null, use default
                            if default_idx >= constants.len() {
                                return Err(JsonLogicError::InvalidBytecode(pc));
                            }
                            constants[default_idx].clone()
                        } else {
                            v.clone()
                        }
                    } else {
                        // Variable not found, use default
                        if default_idx >= constants.len() {
                            return Err(JsonLogicError::InvalidBytecode(pc));
                        }
                        constants[default_idx].clone()
                    };

                    self.push(value)?;
                    pc += 5;
                }

                OpCode::Dup => {
                    let top = self.peek()?.clone();
                    self.push(top)?;
                    pc += 1;
                }

                OpCode::Pop => {
                    self.pop()?;
                    pc += 1;
                }

                OpCode::Rot3 => {
                    let z = self.pop()?;
                    let y = self.pop()?;
                    let x = self.pop()?;
                    self.push(z)?;
                    self.push(x)?;
                    self.push(y)?;
                    pc += 1;
                }

                // Comparison operations
                OpCode::Eq => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a.loose_equals(&b)))?;
                    pc += 1;
                }

                OpCode::StrictEq => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a == b))?;
                    pc += 1;
                }

                OpCode::Ne => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(!a.loose_equals(&b)))?;
                    pc += 1;
                }

                OpCode::StrictNe => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a != b))?;
                    pc += 1;
                }

                OpCode::Lt => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a.partial_cmp(&b) == Some(std::cmp::Ordering::Less)))?;
                    pc += 1;
                }

                OpCode::Le => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let result = a.partial_cmp(&b)
                        .map(|o| o != std::cmp::Ordering::Greater)
                        .unwrap_or(false);
                    self.push(Value::Bool(result))?;
                    pc += 1;
                }

                OpCode::Gt => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a.partial_cmp(&b) == Some(std::cmp::Ordering::Greater)))?;
                    pc += 1;
                }

                OpCode::Ge => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let result = a.partial_cmp(&b)
                        .map(|o| o != std::cmp::Ordering::Less)
                        .unwrap_or(false);
                    self.push(Value::Bool(result))?;
                    pc += 1;
                }

                // Logical operations
                OpCode::Not => {
                    let a = self.pop()?;
                    self.push(Value::Bool(!a.is_truthy()))?;
                    pc += 1;
                }

                OpCode::ToBool => {
                    let a = self.pop()?;
                    self.push(Value::Bool(a.is_truthy()))?;
                    pc += 1;
                }

                OpCode::And | OpCode::Or => {
                    // These should have been compiled away into jumps
                    // but if we see them, just AND/OR the top two values
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let result = if op == OpCode::And {
                        a.is_truthy() && b.is_truthy()
                    } else {
                        a.is_truthy() || b.is_truthy()
                    };
                    self.push(Value::Bool(result))?;
                    pc += 1;
                }

                // Arithmetic
                OpCode::Add => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(a.checked_add(&b)?)?;
                    pc += 1;
                }

                OpCode::Sub => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(a.checked_sub(&b)?)?;
                    pc += 1;
                }

                OpCode::Mul => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(a.checked_mul(&b)?)?;
                    pc += 1;
                }

                OpCode::Div => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(a.checked_div(&b)?)?;
                    pc += 1;
                }

                OpCode::Mod => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(a.checked_rem(&b)?)?;
                    pc += 1;
                }

                OpCode::Neg => {
                    let a = self.pop()?;
                    self.push(a.checked_neg()?)?;
                    pc += 1;
                }

                OpCode::Min => {
                    let count = code[pc + 1] as usize;
                    let mut min_val = self.pop()?;
                    for _ in 1..count {
                        let val = self.pop()?;
                        if val.partial_cmp(&min_val) == Some(std::cmp::Ordering::Less) {
                            min_val = val;
                        }
                    }
                    self.push(min_val)?;
                    pc += 2;
                }

                OpCode::Max => {
                    let count = code[pc + 1] as usize;
                    let mut max_val = self.pop()?;
                    for _ in 1..count {
                        let val = self.pop()?;
                        if val.partial_cmp(&max_val) == Some(std::cmp::Ordering::Greater) {
                            max_val = val;
                        }
                    }
                    self.push(max_val)?;
                    pc += 2;
                }

                // String
                OpCode::Cat => {
                    let count = code[pc + 1] as usize;
                    let mut result = String::new();
                    let mut values: Vec<Value> = Vec::with_capacity(count);
                    for _ in 0..count {
                        values.push(self.pop()?);
                    }
                    values.reverse();
                    for val in values {
                        result.push_str(&val.to_display_string());
                    }
                    self.push(Value::String(result))?;
                    pc += 2;
                }

                OpCode::Substr => {
                    let has_length = code[pc + 1] != 0;
                    let (s, start, length) = if has_length {
                        let l = self.pop()?;
                        let st = self.pop()?;
                        let s = self.pop()?;
                        (s, st, Some(l))
                    } else {
                        let st = self.pop()?;
                        let s = self.pop()?;
                        (s, st, None)
                    };

                    let s = s.to_display_string();
                    let start_idx = start.as_int().unwrap_or(0) as usize;
                    let chars: Vec<char> = s.chars().collect();

                    let result = if let Some(len) = length {
                        let len = len.as_int().unwrap_or(chars.len() as i64) as usize;
                        chars
                            .into_iter()
                            .skip(start_idx)
                            .take(len)
                            .collect::<String>()
                    } else {
                        chars.into_iter().skip(start_idx).collect::<String>()
                    };

                    self.push(Value::String(result))?;
                    pc += 2;
                }

                // Control flow
                OpCode::Jump => {
                    let offset = read_u16(code, pc + 1) as usize;
                    pc = pc + 3 + offset;
                }

                OpCode::JumpIfFalse => {
                    let cond = self.pop()?;
                    if !cond.is_truthy() {
                        let offset = read_u16(code, pc + 1) as usize;
                        pc = pc + 3 + offset;
                    } else {
                        pc += 3;
                    }
                }

                OpCode::JumpIfTrue => {
                    let cond = self.pop()?;
                    if cond.is_truthy() {
                        let offset = read_u16(code, pc + 1) as usize;
                        pc = pc + 3 + offset;
                    } else {
                        pc += 3;
                    }
                }

                // Array
                OpCode::In => {
                    let arr = self.pop()?;
                    let val = self.pop()?;

                    let result = match &arr {
                        Value::Array(items) => items.iter().any(|item| val.loose_equals(item)),
                        Value::String(s) => {
                            if let Value::String(needle) = &val {
                                s.contains(needle.as_str())
                            } else {
                                false
                            }
                        }
                        _ => false,
                    };

                    self.push(Value::Bool(result))?;
                    pc += 1;
                }

                OpCode::Return => {
                    return self.pop();
                }
            }
        }

        // If we reach here without Return, return top of stack or null
        if self.stack.is_empty() {
            Ok(Value::Null)
        } else {
            self.pop()
        }
    }

    /// Push value onto stack
    #[inline(always)]
    fn push(&mut self, value: Value) -> JsonLogicResult<()> {
        if self.stack.len() >= self.max_stack_depth {
            return Err(JsonLogicError::VmStackOverflow(self.max_stack_depth));
        }
        self.stack.push(value);
        Ok(())
    }

    /// Pop value from stack
    #[inline(always)]
    fn pop(&mut self) -> JsonLogicResult<Value> {
        self.stack.pop().ok_or(JsonLogicError::StackUnderflow)
    }

    /// Peek at top of stack
    #[inline(always)]
    fn peek(&self) -> JsonLogicResult<&Value> {
        self.stack.last().ok_or(JsonLogicError::StackUnderflow)
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

/// Read u16 from bytecode (little-endian)
#[inline(always)]
fn read_u16(code: &[u8], offset: usize) -> u16 {
    let lo = code.get(offset).copied().unwrap_or(0) as u16;
    let hi = code.get(offset + 1).copied().unwrap_or(0) as u16;
    lo | (hi << 8)
}
