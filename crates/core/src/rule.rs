//! Rule definitions: a JSON-Logic expression plus its declared input and
//! output attribute paths.
//!
//! Rule types are dynamically defined strings, not a hardcoded enum — the
//! DAG builder only cares about the input/output path declarations below.

use serde::{Deserialize, Serialize};

use crate::{validation, AttributePath, CoreError, CoreResult, RuleId};

/// Input attribute reference with an evaluation-order hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleInputAttribute {
    pub rule_id: RuleId,
    pub path: AttributePath,
    pub order: i32,
}

impl RuleInputAttribute {
    pub fn new(rule_id: RuleId, path: impl Into<AttributePath>, order: i32) -> Self {
        Self { rule_id, path: path.into(), order }
    }
}

/// Output attribute reference with an evaluation-order hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOutputAttribute {
    pub rule_id: RuleId,
    pub path: AttributePath,
    pub order: i32,
}

impl RuleOutputAttribute {
    pub fn new(rule_id: RuleId, path: impl Into<AttributePath>, order: i32) -> Self {
        Self { rule_id, path: path.into(), order }
    }
}

/// A rule definition that computes output attributes from input attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    /// Free-form rule-type label (e.g. `"premium-calculation"`), informational only.
    pub rule_type: String,
    /// Input attribute paths, ordered.
    pub input_attributes: Vec<RuleInputAttribute>,
    /// Output attribute paths, ordered.
    pub output_attributes: Vec<RuleOutputAttribute>,
    /// JSON-Logic expression, stored as a JSON string.
    pub compiled_expression: String,
    pub description: Option<String>,
    pub enabled: bool,
    /// Tie-breaker for ordering rules within the same DAG level.
    pub order_index: i32,
}

impl Rule {
    pub fn new(rule_type: impl Into<String>, compiled_expression: impl Into<String>) -> Self {
        Self {
            id: RuleId::new(),
            rule_type: rule_type.into(),
            input_attributes: Vec::new(),
            output_attributes: Vec::new(),
            compiled_expression: compiled_expression.into(),
            description: None,
            enabled: true,
            order_index: 0,
        }
    }

    pub fn from_json_logic(rule_type: impl Into<String>, expression: serde_json::Value) -> Self {
        Self::new(rule_type, serde_json::to_string(&expression).unwrap_or_default())
    }

    pub fn with_id(mut self, id: RuleId) -> Self {
        self.id = id;
        self
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = impl Into<AttributePath>>) -> Self {
        let rule_id = self.id;
        self.input_attributes = inputs
            .into_iter()
            .enumerate()
            .map(|(i, path)| RuleInputAttribute::new(rule_id, path, i.min(i32::MAX as usize) as i32))
            .collect();
        self
    }

    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = impl Into<AttributePath>>) -> Self {
        let rule_id = self.id;
        self.output_attributes = outputs
            .into_iter()
            .enumerate()
            .map(|(i, path)| RuleOutputAttribute::new(rule_id, path, i.min(i32::MAX as usize) as i32))
            .collect();
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order_index = order;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn input_count(&self) -> usize {
        self.input_attributes.len()
    }

    pub fn output_count(&self) -> usize {
        self.output_attributes.len()
    }

    pub fn depends_on(&self, attr: &AttributePath) -> bool {
        self.input_attributes.iter().any(|a| &a.path == attr)
    }

    pub fn produces(&self, attr: &AttributePath) -> bool {
        self.output_attributes.iter().any(|a| &a.path == attr)
    }

    pub fn get_expression(&self) -> CoreResult<serde_json::Value> {
        serde_json::from_str(&self.compiled_expression)
            .map_err(|e| CoreError::SerializationError(e.to_string()))
    }

    /// Structural validation only — does not touch the DAG (see the
    /// rule-engine crate for cross-rule invariants like single-producer).
    pub fn validate(&self) -> CoreResult<()> {
        if !validation::is_valid_rule_type(&self.rule_type) {
            return Err(CoreError::ValidationFailed {
                field: "rule_type".to_string(),
                message: format!("rule type '{}' does not match required pattern", self.rule_type),
            });
        }

        if let Some(desc) = &self.description {
            if !validation::is_valid_description(desc) {
                return Err(CoreError::ValidationFailed {
                    field: "description".to_string(),
                    message: "description does not match required pattern".to_string(),
                });
            }
        }

        if self.compiled_expression.is_empty() {
            return Err(CoreError::ValidationFailed {
                field: "compiled_expression".to_string(),
                message: "compiled expression cannot be empty".to_string(),
            });
        }
        self.get_expression().map_err(|_| CoreError::ValidationFailed {
            field: "compiled_expression".to_string(),
            message: "compiled expression is not valid JSON".to_string(),
        })?;

        if self.output_attributes.is_empty() {
            return Err(CoreError::ValidationFailed {
                field: "output_attributes".to_string(),
                message: "rule must have at least one output attribute".to_string(),
            });
        }

        for input in &self.input_attributes {
            if self.output_attributes.iter().any(|o| o.path == input.path) {
                return Err(CoreError::ValidationFailed {
                    field: "input_attributes".to_string(),
                    message: format!("path '{}' cannot be both an input and an output of the same rule", input.path),
                });
            }
        }

        Ok(())
    }
}

/// Fluent builder for constructing rules.
pub struct RuleBuilder {
    rule_type: String,
    inputs: Vec<AttributePath>,
    outputs: Vec<AttributePath>,
    expression: Option<serde_json::Value>,
    description: Option<String>,
    enabled: bool,
    order_index: i32,
}

impl RuleBuilder {
    pub fn new(rule_type: impl Into<String>) -> Self {
        Self {
            rule_type: rule_type.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            expression: None,
            description: None,
            enabled: true,
            order_index: 0,
        }
    }

    pub fn input(mut self, attr: impl Into<AttributePath>) -> Self {
        self.inputs.push(attr.into());
        self
    }

    pub fn output(mut self, attr: impl Into<AttributePath>) -> Self {
        self.outputs.push(attr.into());
        self
    }

    pub fn expression(mut self, expr: serde_json::Value) -> Self {
        self.expression = Some(expr);
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order_index = order;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn build(self) -> CoreResult<Rule> {
        let expression = self.expression.ok_or_else(|| CoreError::ValidationFailed {
            field: "expression".to_string(),
            message: "rule expression is required".to_string(),
        })?;
        let rule_id = RuleId::new();

        if self.inputs.len() > i32::MAX as usize || self.outputs.len() > i32::MAX as usize {
            return Err(CoreError::ValidationFailed {
                field: "inputs/outputs".to_string(),
                message: "too many declared attributes".to_string(),
            });
        }

        let compiled_expression = serde_json::to_string(&expression)
            .map_err(|e| CoreError::SerializationError(format!("failed to serialize rule expression: {e}")))?;

        Ok(Rule {
            id: rule_id,
            rule_type: self.rule_type,
            input_attributes: self
                .inputs
                .into_iter()
                .enumerate()
                .map(|(i, path)| RuleInputAttribute::new(rule_id, path, i as i32))
                .collect(),
            output_attributes: self
                .outputs
                .into_iter()
                .enumerate()
                .map(|(i, path)| RuleOutputAttribute::new(rule_id, path, i as i32))
                .collect(),
            compiled_expression,
            description: self.description,
            enabled: self.enabled,
            order_index: self.order_index,
        })
    }
}
