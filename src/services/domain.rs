//! Wire payloads shared by every role.

use serde::{Deserialize, Serialize};

/// Two operands, e.g. `{"operandA":2,"operandB":3}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub operand_a: f64,
    pub operand_b: f64,
}

impl Problem {
    pub fn new(operand_a: f64, operand_b: f64) -> Self {
        Self { operand_a, operand_b }
    }

    pub fn solve(&self, op: OperationType) -> CalcResult {
        let value = match op {
            OperationType::Sum => self.operand_a + self.operand_b,
            OperationType::Subtract => self.operand_a - self.operand_b,
        };
        CalcResult { value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalcResult {
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Sum,
    Subtract,
}

impl OperationType {
    /// Route path served for this operation.
    pub fn path(&self) -> &'static str {
        match self {
            OperationType::Sum => "/sum",
            OperationType::Subtract => "/subtract",
        }
    }

    pub fn span_name(&self) -> &'static str {
        match self {
            OperationType::Sum => "sum",
            OperationType::Subtract => "subtract",
        }
    }
}

/// A computed operation as stored by the history role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Assigned by the history store; ignored on input.
    #[serde(default)]
    pub id: u64,
    pub operand_a: f64,
    pub operand_b: f64,
    pub operation_type: OperationType,
    #[serde(default)]
    pub result: Option<CalcResult>,
}

impl Operation {
    pub fn new(problem: Problem, operation_type: OperationType, result: CalcResult) -> Self {
        Self {
            id: 0,
            operand_a: problem.operand_a,
            operand_b: problem.operand_b,
            operation_type,
            result: Some(result),
        }
    }
}
