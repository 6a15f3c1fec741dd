//! Typed parameter bags.
//!
//! `Parameters` wraps the decoded JSON object of a tool call. Validation
//! against a [`ParameterSchema`] is structural only (required keys, enum
//! membership, string length). Type coercion happens lazily in the typed
//! accessors, which tool bodies call before trusting a value.

use crate::error::ParamError;
use crate::schema::ParameterSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    values: Map<String, Value>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode raw argument text accumulated from a stream.
    ///
    /// Blank text is an empty bag; anything that is not a JSON object fails.
    pub fn from_json_str(raw: &str) -> Result<Self, ParamError> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(values)) => Ok(Self { values }),
            Ok(other) => Err(ParamError::Decode(format!(
                "expected an object, got {}",
                type_name(&other)
            ))),
            Err(e) => Err(ParamError::Decode(e.to_string())),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// A key holding JSON `null` counts as absent.
    pub fn has(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(v) if !v.is_null())
    }

    pub fn get(&self, key: &str) -> Result<&Value, ParamError> {
        self.values
            .get(key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ParamError::Missing(key.to_string()))
    }

    /// Strings are returned as-is; other scalars use their display form.
    pub fn get_string(&self, key: &str) -> Result<String, ParamError> {
        self.get(key).map(display_value)
    }

    /// Integers, floats (truncated) and numeric strings are accepted.
    pub fn get_int(&self, key: &str) -> Result<i64, ParamError> {
        let wrong = || ParamError::WrongType {
            key: key.to_string(),
            expected: "integer",
        };
        match self.get(key)? {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(i)
                } else if let Some(f) = n.as_f64().filter(|f| f.is_finite()) {
                    Ok(f.trunc() as i64)
                } else {
                    Err(wrong())
                }
            }
            Value::String(s) => s.trim().parse::<i64>().map_err(|_| wrong()),
            _ => Err(wrong()),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ParamError> {
        match self.get(key)? {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => match s.trim() {
                "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
                "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
                _ => Err(ParamError::WrongType {
                    key: key.to_string(),
                    expected: "boolean",
                }),
            },
            _ => Err(ParamError::WrongType {
                key: key.to_string(),
                expected: "boolean",
            }),
        }
    }

    pub fn get_string_list(&self, key: &str) -> Result<Vec<String>, ParamError> {
        match self.get(key)? {
            Value::Array(items) => Ok(items.iter().map(display_value).collect()),
            _ => Err(ParamError::WrongType {
                key: key.to_string(),
                expected: "string list",
            }),
        }
    }

    pub fn string_or(&self, key: &str, default: &str) -> Result<String, ParamError> {
        if self.has(key) {
            self.get_string(key)
        } else {
            Ok(default.to_string())
        }
    }

    pub fn opt_string(&self, key: &str) -> Result<Option<String>, ParamError> {
        if self.has(key) {
            self.get_string(key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn int_or(&self, key: &str, default: i64) -> Result<i64, ParamError> {
        if self.has(key) {
            self.get_int(key)
        } else {
            Ok(default)
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ParamError> {
        if self.has(key) {
            self.get_bool(key)
        } else {
            Ok(default)
        }
    }

    /// Check required keys, enum membership and string length bounds.
    ///
    /// Returns the first violation found: required keys in declared order,
    /// then properties in name order.
    pub fn validate(&self, schema: &ParameterSchema) -> Result<(), ParamError> {
        for key in &schema.required {
            if !self.has(key) {
                return Err(ParamError::Missing(key.clone()));
            }
        }

        for (key, prop) in &schema.properties {
            let Ok(value) = self.get(key) else {
                continue;
            };

            if !prop.enum_values.is_empty() {
                let form = display_value(value);
                if !prop.enum_values.iter().any(|allowed| *allowed == form) {
                    return Err(ParamError::NotInEnum {
                        key: key.clone(),
                        allowed: prop.enum_values.clone(),
                    });
                }
            }

            if prop.kind == "string"
                && let Value::String(s) = value
            {
                let len = s.chars().count();
                if let Some(min) = prop.min_length.filter(|m| len < *m) {
                    return Err(ParamError::TooShort { key: key.clone(), min });
                }
                if let Some(max) = prop.max_length.filter(|m| len > *m) {
                    return Err(ParamError::TooLong { key: key.clone(), max });
                }
            }
        }

        Ok(())
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

/// Display form used for string coercion and enum comparison.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
