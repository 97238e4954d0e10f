use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};

/// The result of statically evaluating an expression.
///
/// `Unknown` marks a value that only exists once the configuration is applied
/// (computed resource attributes, data sources, module outputs, ...). It is not
/// an error: composite expressions propagate it, and coercing it into a
/// concrete shape reports [`ConversionError::Unknown`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Unknown,
}

impl Value {
    pub fn null() -> Value {
        Value::Null
    }

    pub fn bool(value: bool) -> Value {
        Value::Bool(value)
    }

    pub fn integer(value: i64) -> Value {
        Value::Integer(value)
    }

    pub fn float(value: f64) -> Value {
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            return Value::Integer(value as i64);
        }
        Value::Float(value)
    }

    pub fn string(value: impl Into<String>) -> Value {
        Value::String(value.into())
    }

    pub fn list(values: Vec<Value>) -> Value {
        Value::List(values)
    }

    pub fn map(entries: IndexMap<String, Value>) -> Value {
        Value::Map(entries)
    }

    pub fn unknown() -> Value {
        Value::Unknown
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    /// True if this value, or anything nested in it, is unknown.
    pub fn contains_unknown(&self) -> bool {
        match self {
            Value::Unknown => true,
            Value::List(values) => values.iter().any(Value::contains_unknown),
            Value::Map(entries) => entries.values().any(Value::contains_unknown),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Unknown => "unknown",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Converts a scalar into its string form, the way it renders inside a
    /// template. Numbers and booleans are converted, collections are not.
    pub fn as_scalar(&self) -> Result<String, ConversionError> {
        match self {
            Value::String(value) => Ok(value.clone()),
            Value::Bool(value) => Ok(value.to_string()),
            Value::Integer(value) => Ok(value.to_string()),
            Value::Float(value) => Ok(format_float(*value)),
            Value::Unknown => Err(ConversionError::Unknown),
            Value::Null => Err(ConversionError::Null),
            other => Err(ConversionError::mismatch("string", other)),
        }
    }

    pub fn as_string_list(&self) -> Result<Vec<String>, ConversionError> {
        match self {
            Value::List(values) => values
                .iter()
                .map(|value| match value {
                    Value::Null => Err(ConversionError::mismatch("string", value)),
                    value => value.as_scalar(),
                })
                .collect(),
            Value::Unknown => Err(ConversionError::Unknown),
            Value::Null => Err(ConversionError::Null),
            other => Err(ConversionError::mismatch("list of string", other)),
        }
    }

    pub fn as_string_map(&self) -> Result<IndexMap<String, String>, ConversionError> {
        match self {
            Value::Map(entries) => {
                let mut res = IndexMap::with_capacity(entries.len());
                for (key, value) in entries.iter() {
                    let value = match value {
                        Value::Null => return Err(ConversionError::mismatch("string", value)),
                        value => value.as_scalar()?,
                    };
                    res.insert(key.clone(), value);
                }
                Ok(res)
            }
            Value::Unknown => Err(ConversionError::Unknown),
            Value::Null => Err(ConversionError::Null),
            other => Err(ConversionError::mismatch("map of string", other)),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Unknown => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(*value),
            Value::Integer(value) => serde_json::Value::from(*value),
            Value::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(value) => serde_json::Value::String(value.clone()),
            Value::List(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Integer(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", format_float(*value)),
            Value::String(value) => write!(f, "{:?}", value),
            Value::List(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Unknown => write!(f, "(known after apply)"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

/// Why a [`Value`] could not be converted into a requested shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConversionError {
    /// The value is not statically known.
    Unknown,
    /// The value is `null`.
    Null,
    TypeMismatch { expected: String, found: String },
}

impl ConversionError {
    pub fn mismatch(expected: impl Into<String>, found: &Value) -> Self {
        ConversionError::TypeMismatch {
            expected: expected.into(),
            found: found.type_name().to_string(),
        }
    }

    /// Unknown and null values are not statically decidable and should not
    /// be reported as errors.
    pub fn is_soft(&self) -> bool {
        matches!(self, ConversionError::Unknown | ConversionError::Null)
    }
}

impl Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::Unknown => write!(f, "value is not statically known"),
            ConversionError::Null => write!(f, "value is null"),
            ConversionError::TypeMismatch { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for ConversionError {}

/// Typed coercion out of an evaluated [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value.as_scalar()
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(value) => Ok(*value),
            Value::String(value) if value == "true" => Ok(true),
            Value::String(value) if value == "false" => Ok(false),
            Value::Unknown => Err(ConversionError::Unknown),
            Value::Null => Err(ConversionError::Null),
            other => Err(ConversionError::mismatch("bool", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Integer(value) => Ok(*value),
            Value::String(text) => text.parse().map_err(|_| ConversionError::mismatch("number", value)),
            Value::Unknown => Err(ConversionError::Unknown),
            Value::Null => Err(ConversionError::Null),
            other => Err(ConversionError::mismatch("integer", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Integer(value) => Ok(*value as f64),
            Value::Float(value) => Ok(*value),
            Value::String(text) => text.parse().map_err(|_| ConversionError::mismatch("number", value)),
            Value::Unknown => Err(ConversionError::Unknown),
            Value::Null => Err(ConversionError::Null),
            other => Err(ConversionError::mismatch("number", other)),
        }
    }
}

impl FromValue for Vec<String> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value.as_string_list()
    }
}

impl FromValue for IndexMap<String, String> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value.as_string_map()
    }
}

impl FromValue for BTreeMap<String, String> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.as_string_map()?.into_iter().collect())
    }
}

impl FromValue for HashMap<String, String> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.as_string_map()?.into_iter().collect())
    }
}
