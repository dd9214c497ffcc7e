/// Boolean conditions evaluated against a token
use crate::runtime::token::{DataType, Payload, Token};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator for numeric conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl CompareOp {
    fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
            CompareOp::Ge => left >= right,
            CompareOp::Gt => left > right,
        }
    }
}

/// Decides which branch a token takes
///
/// Conditions are tagged by `type` in flow definitions, e.g.
/// `{"type": "compare", "op": "gt", "value": 0.5}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Holds for every token
    Always,
    /// Integer or double payload compared with a constant
    Compare { op: CompareOp, value: f64 },
    /// JSON rendition of the payload equals `value` exactly
    Equals { value: Value },
    /// Payload is of the given type
    IsType { data_type: DataType },
    /// Container payload holds a value under `key`
    HasKey { key: String },
    /// Boolean payload that is true
    IsTrue,
    Not { condition: Box<Condition> },
}

impl Condition {
    /// Evaluate against a token; fails for payloads the condition cannot inspect
    pub fn evaluate(&self, token: &Token) -> Result<bool, String> {
        let payload = token.payload();
        match self {
            Condition::Always => Ok(true),
            Condition::Compare { op, value } => {
                let number = match payload {
                    Payload::Integer(i) => *i as f64,
                    Payload::Double(d) => *d,
                    other => {
                        return Err(format!("cannot compare a {} payload", other.data_type()));
                    }
                };
                Ok(op.holds(number, *value))
            }
            Condition::Equals { value } => Ok(payload.to_json() == *value),
            Condition::IsType { data_type } => Ok(*data_type == payload.data_type()),
            Condition::HasKey { key } => Ok(match payload {
                Payload::Container(container) => container.has(key),
                _ => false,
            }),
            Condition::IsTrue => match payload {
                Payload::Boolean(b) => Ok(*b),
                other => Err(format!("expected a boolean, got a {} payload", other.data_type())),
            },
            Condition::Not { condition } => condition.evaluate(token).map(|holds| !holds),
        }
    }
}
