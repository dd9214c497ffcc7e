/// Token and payload model
///
/// A token wraps exactly one payload value. Tokens are immutable and are moved
/// from producer to consumer, so every token is read exactly once.
/// Actors declare the payload types they accept and generate with `DataType`;
/// `DataType::Unknown` defers the check to runtime and matches everything.

use crate::runtime::container::{Container, ContainerKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Declared payload type used for `accepts()` / `generates()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Any type, checked at runtime
    Unknown,
    Text,
    Integer,
    Double,
    Boolean,
    /// Numeric record (row of a dataset)
    Instance,
    /// Arbitrary JSON document
    Json,
    /// Structured result container of the given kind
    Container(ContainerKind),
}

impl DataType {
    /// Whether a value of type `other` can be handed to a slot of this type
    pub fn is_compatible(&self, other: &DataType) -> bool {
        matches!(self, DataType::Unknown) || matches!(other, DataType::Unknown) || self == other
    }

    /// Whether any of `accepted` can take a value of type `offered`
    pub fn any_compatible(accepted: &[DataType], offered: &DataType) -> bool {
        accepted.iter().any(|t| t.is_compatible(offered))
    }

    /// Human-readable list, used in error messages
    pub fn describe(types: &[DataType]) -> String {
        if types.is_empty() {
            return "nothing".to_string();
        }
        types
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Unknown => write!(f, "unknown"),
            DataType::Text => write!(f, "text"),
            DataType::Integer => write!(f, "integer"),
            DataType::Double => write!(f, "double"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Instance => write!(f, "instance"),
            DataType::Json => write!(f, "json"),
            DataType::Container(kind) => write!(f, "container<{}>", kind),
        }
    }
}

/// Numeric record, e.g. one row of a dataset
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Instance {
    pub values: Vec<f64>,
}

impl Instance {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Squared euclidean distance; `None` if the dimensions differ
    pub fn squared_distance(&self, other: &[f64]) -> Option<f64> {
        if self.values.len() != other.len() {
            return None;
        }
        Some(
            self.values
                .iter()
                .zip(other)
                .map(|(a, b)| (a - b) * (a - b))
                .sum(),
        )
    }
}

/// The value carried by a token
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Instance(Instance),
    Json(Value),
    Container(Container),
}

impl Payload {
    /// Declared type of this payload
    pub fn data_type(&self) -> DataType {
        match self {
            Payload::Text(_) => DataType::Text,
            Payload::Integer(_) => DataType::Integer,
            Payload::Double(_) => DataType::Double,
            Payload::Boolean(_) => DataType::Boolean,
            Payload::Instance(_) => DataType::Instance,
            Payload::Json(_) => DataType::Json,
            Payload::Container(c) => DataType::Container(c.kind()),
        }
    }

    /// Convert a JSON value supplied from outside the flow
    ///
    /// Strings, integers, floats and booleans map to their scalar payloads,
    /// arrays consisting only of numbers become instances, anything else is
    /// kept as JSON.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => Payload::Text(s),
            Value::Bool(b) => Payload::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Payload::Integer(i),
                None => Payload::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_number) => {
                Payload::Instance(Instance::new(
                    items.iter().filter_map(Value::as_f64).collect(),
                ))
            }
            other => Payload::Json(other),
        }
    }

    /// JSON rendition used by the API and by file sinks
    pub fn to_json(&self) -> Value {
        match self {
            Payload::Text(s) => Value::String(s.clone()),
            Payload::Integer(i) => Value::from(*i),
            Payload::Double(d) => Value::from(*d),
            Payload::Boolean(b) => Value::Bool(*b),
            Payload::Instance(inst) => Value::from(inst.values.clone()),
            Payload::Json(v) => v.clone(),
            Payload::Container(c) => c.to_json(),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// Immutable wrapper around a single payload
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    payload: Payload,
}

impl Token {
    pub fn new(payload: Payload) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub fn data_type(&self) -> DataType {
        self.payload.data_type()
    }
}

impl From<Payload> for Token {
    fn from(payload: Payload) -> Self {
        Token::new(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_is_compatible_both_ways() {
        assert!(DataType::Unknown.is_compatible(&DataType::Text));
        assert!(DataType::Integer.is_compatible(&DataType::Unknown));
        assert!(!DataType::Integer.is_compatible(&DataType::Text));
        assert!(DataType::any_compatible(
            &[DataType::Text, DataType::Instance],
            &DataType::Instance
        ));
    }

    #[test]
    fn json_conversion_picks_scalar_types() {
        assert_eq!(Payload::from_json(json!("a")), Payload::Text("a".into()));
        assert_eq!(Payload::from_json(json!(3)), Payload::Integer(3));
        assert_eq!(Payload::from_json(json!(1.5)), Payload::Double(1.5));
        assert_eq!(
            Payload::from_json(json!([1, 2.5])),
            Payload::Instance(Instance::new(vec![1.0, 2.5]))
        );
        assert_eq!(
            Payload::from_json(json!({"k": 1})).data_type(),
            DataType::Json
        );
        // mixed arrays stay JSON
        assert_eq!(Payload::from_json(json!([1, "x"])).data_type(), DataType::Json);
    }

    #[test]
    fn distance_requires_matching_dimensions() {
        let inst = Instance::new(vec![0.0, 3.0]);
        assert_eq!(inst.squared_distance(&[4.0, 0.0]), Some(25.0));
        assert_eq!(inst.squared_distance(&[1.0]), None);
    }
}
