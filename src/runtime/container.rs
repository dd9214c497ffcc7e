/// Typed result containers
///
/// A container is an ordered set of named slots produced by one actor and read
/// by others. Key names are part of the producer's public contract, so they
/// are exposed as `Key<T>` constants which also fix the value type: reading a
/// key either yields a `&T` or a precondition error, never a silent default.

use crate::clustering::ClusterModel;
use crate::runtime::token::Instance;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{fmt, marker::PhantomData};
use thiserror::Error;

/// Which producer family a container belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// Output of clustering actors and their post-processors
    Clustering,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Clustering => write!(f, "clustering"),
        }
    }
}

/// Contract violations when reading or writing containers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContainerError {
    #[error("{kind} container is missing required key '{key}'")]
    MissingKey { kind: ContainerKind, key: String },

    #[error("key '{key}' holds a {actual} value, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("key '{key}' already present, refusing to overwrite")]
    DuplicateKey { key: String },

    #[error("key '{key}' is not declared by '{processor}'")]
    UndeclaredKey { key: String, processor: String },

    #[error("cannot compute '{key}': {message}")]
    Computation { key: String, message: String },
}

/// A single value stored in a container slot
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerValue {
    Model(ClusterModel),
    Instance(Instance),
    Integer(i64),
    Double(f64),
    Distribution(Vec<f64>),
    Text(String),
}

impl ContainerValue {
    fn type_name(&self) -> &'static str {
        match self {
            ContainerValue::Model(_) => "model",
            ContainerValue::Instance(_) => "instance",
            ContainerValue::Integer(_) => "integer",
            ContainerValue::Double(_) => "double",
            ContainerValue::Distribution(_) => "distribution",
            ContainerValue::Text(_) => "text",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ContainerValue::Model(model) => json!({
                "clusterer": model.clusterer,
                "centroids": model.centroids,
                "counts": model.counts,
            }),
            ContainerValue::Instance(inst) => json!(inst.values),
            ContainerValue::Integer(i) => json!(i),
            ContainerValue::Double(d) => json!(d),
            ContainerValue::Distribution(dist) => json!(dist),
            ContainerValue::Text(s) => json!(s),
        }
    }
}

/// Rust types that can live in a container slot
pub trait ContainerType: Sized {
    const TYPE_NAME: &'static str;

    fn wrap(self) -> ContainerValue;

    fn peek(value: &ContainerValue) -> Option<&Self>;
}

macro_rules! container_type {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl ContainerType for $ty {
            const TYPE_NAME: &'static str = $name;

            fn wrap(self) -> ContainerValue {
                ContainerValue::$variant(self)
            }

            fn peek(value: &ContainerValue) -> Option<&Self> {
                match value {
                    ContainerValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

container_type!(ClusterModel, Model, "model");
container_type!(Instance, Instance, "instance");
container_type!(i64, Integer, "integer");
container_type!(f64, Double, "double");
container_type!(Vec<f64>, Distribution, "distribution");
container_type!(String, Text, "text");

/// Compile-time key token: a stable name bound to a value type
pub struct Key<T> {
    name: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _value: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.name).finish()
    }
}

/// Ordered mapping from key names to values
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    kind: ContainerKind,
    entries: Vec<(String, ContainerValue)>,
}

impl Container {
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Key names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Untyped lookup by name
    pub fn value(&self, key: &str) -> Result<&ContainerValue, ContainerError> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .ok_or_else(|| ContainerError::MissingKey {
                kind: self.kind,
                key: key.to_string(),
            })
    }

    /// Typed lookup
    pub fn get<T: ContainerType>(&self, key: Key<T>) -> Result<&T, ContainerError> {
        let value = self.value(key.name())?;
        T::peek(value).ok_or_else(|| ContainerError::TypeMismatch {
            key: key.name().to_string(),
            expected: T::TYPE_NAME,
            actual: value.type_name(),
        })
    }

    /// Check that all named keys are present, reporting the first missing one
    pub fn require(&self, keys: &[&str]) -> Result<(), ContainerError> {
        match keys.iter().find(|k| !self.has(k)) {
            Some(missing) => Err(ContainerError::MissingKey {
                kind: self.kind,
                key: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Add a new key; existing keys are never overwritten
    pub fn insert<T: ContainerType>(&mut self, key: Key<T>, value: T) -> Result<(), ContainerError> {
        self.insert_value(key.name(), value.wrap())
    }

    pub fn insert_value(&mut self, key: &str, value: ContainerValue) -> Result<(), ContainerError> {
        if self.has(key) {
            return Err(ContainerError::DuplicateKey {
                key: key.to_string(),
            });
        }
        self.entries.push((key.to_string(), value));
        Ok(())
    }

    /// Explicit overwrite, returns the previous value if there was one
    pub fn replace_value(&mut self, key: &str, value: ContainerValue) -> Option<ContainerValue> {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key.to_string(), value));
                None
            }
        }
    }

    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (key, value) in &self.entries {
            map.insert(key.clone(), value.to_json());
        }
        Value::Object(map)
    }
}
