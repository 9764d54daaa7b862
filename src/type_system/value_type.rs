//! The closed catalog of value kinds a variable may hold.
use super::error::ValueTypeError;
use super::possible_values::PossibleValues;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Integer,
    Float,
    String,
    Date,
    Enum,
}

impl ValueType {
    pub const ALL: [ValueType; 6] = [
        ValueType::Boolean,
        ValueType::Integer,
        ValueType::Float,
        ValueType::String,
        ValueType::Date,
        ValueType::Enum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Date => "date",
            ValueType::Enum => "enum",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Float)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = ValueTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boolean" | "bool" => Ok(ValueType::Boolean),
            "integer" | "int" => Ok(ValueType::Integer),
            "float" => Ok(ValueType::Float),
            "string" | "str" => Ok(ValueType::String),
            "date" => Ok(ValueType::Date),
            "enum" => Ok(ValueType::Enum),
            _ => Err(ValueTypeError::UnknownValueType(s.to_string())),
        }
    }
}

/// Static description of a value type: how it is held at runtime, how it
/// is serialized, and how it behaves across period sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTypeDescriptor {
    pub value_type: ValueType,
    pub runtime: &'static str,
    pub json_type: &'static str,
    /// Zero value of the type. Enumerations have none: their default must be a declared variant.
    pub default: Option<Value>,
    /// Amounts scale with the period length; flags, dates and categories do not.
    pub is_period_size_independent: bool,
}

pub fn describe(value_type: ValueType) -> ValueTypeDescriptor {
    let (runtime, json_type, default, is_period_size_independent) = match value_type {
        ValueType::Boolean => ("bool", "boolean", Some(Value::Bool(false)), true),
        ValueType::Integer => ("i64", "integer", Some(Value::Int(0)), false),
        ValueType::Float => ("f64", "number", Some(Value::Float(0.0)), false),
        ValueType::String => ("String", "string", Some(Value::Str(String::new())), true),
        ValueType::Date => ("NaiveDate", "string", Some(Value::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default())), true),
        ValueType::Enum => ("variant", "string", None, true),
    };
    ValueTypeDescriptor { value_type, runtime, json_type, default, is_period_size_independent }
}

/// Looks a value type up by its declared name.
pub fn describe_named(name: &str) -> Result<ValueTypeDescriptor, ValueTypeError> {
    Ok(describe(name.parse()?))
}

/// A runtime value of one of the `ValueType`s.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    /// Index into the owning variable's `PossibleValues`.
    Enum(usize),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Boolean,
            Value::Int(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::String,
            Value::Date(_) => ValueType::Date,
            Value::Enum(_) => ValueType::Enum,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self { Value::Bool(b) => Some(*b), _ => None }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self { Value::Int(i) => Some(*i), _ => None }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self { Value::Str(s) => Some(s), _ => None }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self { Value::Date(d) => Some(*d), _ => None }
    }

    /// Reads a JSON value as `value_type`, checking enum membership and string width.
    pub fn from_json(
        value_type: ValueType,
        json: &Json,
        possible_values: Option<&PossibleValues>,
        max_length: Option<usize>,
    ) -> Result<Value, ValueTypeError> {
        let mismatch = || ValueTypeError::Mismatch { expected: value_type, found: json_kind(json).to_string() };
        match value_type {
            ValueType::Boolean => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
            ValueType::Integer => json.as_i64().map(Value::Int).ok_or_else(mismatch),
            ValueType::Float => json.as_f64().map(Value::Float).ok_or_else(mismatch),
            ValueType::String => {
                let text = json.as_str().ok_or_else(mismatch)?;
                let len = text.chars().count();
                match max_length {
                    Some(max) if len > max => Err(ValueTypeError::TooLong { max, len }),
                    _ => Ok(Value::Str(text.to_string())),
                }
            }
            ValueType::Date => {
                let text = json.as_str().ok_or_else(mismatch)?;
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map(Value::Date)
                    .map_err(|_| ValueTypeError::InvalidDate(text.to_string()))
            }
            ValueType::Enum => {
                let key = json.as_str().ok_or_else(mismatch)?;
                let possible_values = possible_values.ok_or(super::error::PossibleValuesError::Empty)?;
                Ok(possible_values.parse(key)?)
            }
        }
    }

    /// Serializes the value; enum values are written as their variant key.
    pub fn to_json(&self, possible_values: Option<&PossibleValues>) -> Json {
        match self {
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => Json::from(*f),
            Value::Str(s) => Json::String(s.clone()),
            Value::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Value::Enum(idx) => match possible_values.and_then(|pv| pv.key_of(self)) {
                Some(key) => Json::String(key.to_string()),
                None => Json::from(*idx),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Enum(idx) => write!(f, "#{}", idx),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Int(i) }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self { Value::Float(x) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Str(s.to_string()) }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self { Value::Date(d) }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
