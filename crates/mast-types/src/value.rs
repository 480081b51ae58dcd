//! Typed scalar and composite values.
//!
//! Every variable in the address space holds a [`Value`]; every write is
//! type-checked against the variable's declared [`DataType`] before the
//! assignment happens. Object values are name→value maps composed from an
//! object variable's properties.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// The declared type of a variable or template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean flag.
    Bool,
    /// UTF-8 string.
    Str,
    /// Floating-point numeric, optionally carrying a measurement unit.
    Num,
    /// Composite of named properties, each itself typed.
    Object,
}

impl DataType {
    /// Returns the canonical lowercase name of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Str => "str",
            Self::Num => "num",
            Self::Object => "object",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error coercing a [`Value`] to a concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected} value, got {actual}")]
pub struct ValueTypeError {
    /// The type the caller asked for.
    pub expected: DataType,
    /// The type the value actually has.
    pub actual: DataType,
}

/// A typed value carried by variables, messages, and scope frames.
///
/// Serialization is untagged, so values read naturally on the wire:
/// `true`, `"idle"`, `42.0`, `{"speed": 0.0, "state": "idle"}`.
///
/// # Example
///
/// ```
/// use mast_types::{DataType, Value};
///
/// let v = Value::from(21.5);
/// assert_eq!(v.data_type(), DataType::Num);
/// assert_eq!(v.as_num(), Some(21.5));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Num(f64),
    /// String value.
    Str(String),
    /// Composite name→value map.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the [`DataType`] of this value.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Num(_) => DataType::Num,
            Self::Str(_) => DataType::Str,
            Self::Object(_) => DataType::Object,
        }
    }

    /// Returns the boolean, if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number, if this is a `Num`.
    #[must_use]
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a `Str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the property map, if this is an `Object`.
    #[must_use]
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Coerces to a number or reports the mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`ValueTypeError`] when the value is not numeric.
    pub fn expect_num(&self) -> Result<f64, ValueTypeError> {
        self.as_num().ok_or(ValueTypeError {
            expected: DataType::Num,
            actual: self.data_type(),
        })
    }

    /// Returns `true` when this value matches the declared type.
    #[must_use]
    pub fn matches(&self, data_type: DataType) -> bool {
        self.data_type() == data_type
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Num(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Num(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Object(map)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
