//! Declarative parameter schemas.
//!
//! A schema is pure data: it is advertised to the model as JSON Schema and
//! consulted by [`Parameters::validate`](crate::params::Parameters::validate).
//! Properties are kept in a `BTreeMap` so validation visits them in a stable
//! order and the first reported violation is deterministic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The object-level schema of a tool's arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl ParameterSchema {
    /// An empty object schema.
    pub fn object() -> Self {
        Self {
            kind: "object".into(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn property(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(names.into_iter().map(Into::into));
        self
    }

    /// JSON Schema form, as sent to the provider.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
    }
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::object()
    }
}

/// Schema of a single property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,

    #[serde(rename = "minLength", default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    #[serde(rename = "maxLength", default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Element schema for `array` properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
}

impl PropertySchema {
    fn of(kind: &str, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            default: None,
            enum_values: Vec::new(),
            min_length: None,
            max_length: None,
            items: None,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::of("string", description)
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::of("integer", description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::of("boolean", description)
    }

    pub fn object(description: impl Into<String>) -> Self {
        Self::of("object", description)
    }

    /// An array of strings.
    pub fn string_array(description: impl Into<String>) -> Self {
        Self {
            items: Some(Box::new(Self::of("string", ""))),
            ..Self::of("array", description)
        }
    }

    /// An array whose elements follow `items`.
    pub fn array_of(description: impl Into<String>, items: PropertySchema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of("array", description)
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_serializes_as_json_schema() {
        let schema = ParameterSchema::object()
            .property(
                "mode",
                PropertySchema::string("Write mode")
                    .with_enum(["overwrite", "append"])
                    .with_default("overwrite"),
            )
            .property("path", PropertySchema::string("Target").with_length(Some(1), None))
            .required(["path"]);

        let value = schema.to_json();
        assert_eq!(value["type"], "object");
        assert_eq!(value["required"], json!(["path"]));
        assert_eq!(value["properties"]["mode"]["enum"], json!(["overwrite", "append"]));
        assert_eq!(value["properties"]["mode"]["default"], "overwrite");
        assert_eq!(value["properties"]["path"]["minLength"], 1);
        assert!(value["properties"]["path"].get("maxLength").is_none());
    }

    #[test]
    fn string_array_carries_items() {
        let value = serde_json::to_value(PropertySchema::string_array("Commands")).unwrap();
        assert_eq!(value["type"], "array");
        assert_eq!(value["items"]["type"], "string");
    }
}
