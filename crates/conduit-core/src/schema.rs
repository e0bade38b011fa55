//! Declarative configuration schemas.
//!
//! A [`ConfigSchema`] describes the shape a service expects its configuration
//! to have: a list of fields with a kind, whether each is required, and an
//! optional default. The registry runs [`ConfigSchema::check`] before handing
//! a configuration to the service's own `validate` callback; any violation is
//! reported as a configuration validation failure.
//!
//! Schemas are plain serde types, so integrations that ship their schema as a
//! JSON file can load it with [`ConfigSchema::from_json_str`]:
//!
//! ```json
//! {
//!   "fields": [
//!     { "name": "host", "kind": "string", "required": true },
//!     { "name": "port", "kind": "integer", "default": 8080 }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// The JSON kind a field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    /// Any JSON value, including `null`.
    Any,
}

impl FieldKind {
    /// Returns `true` if `value` has this kind.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }

    /// Lowercase name used in messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Any => "any",
        }
    }
}

/// One field of a [`ConfigSchema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Key of the field in the configuration object.
    pub name: String,

    /// Expected JSON kind.
    pub kind: FieldKind,

    /// Whether the field must be present (after defaults are applied).
    #[serde(default)]
    pub required: bool,

    /// Value inserted when the field is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Human-readable description, shown by configuration UIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSchema {
    /// A field that must be present.
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
            description: None,
        }
    }

    /// A field that may be absent.
    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    /// Sets the value used when the field is absent.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Sets the field description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A schema violation found by [`ConfigSchema::check`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    /// The configuration is not a JSON object.
    #[error("configuration must be an object, got {found}")]
    NotAnObject { found: &'static str },

    /// A required field is missing and has no default.
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    /// A field has the wrong kind.
    #[error("field '{field}' must be of type {expected}, got {found}")]
    WrongKind {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A field not declared by the schema was supplied.
    #[error("unknown field '{field}'")]
    UnknownField { field: String },
}

/// Declarative shape of a service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    /// Declared fields, in display order.
    #[serde(default)]
    pub fields: Vec<FieldSchema>,

    /// Whether keys not listed in `fields` are accepted.
    #[serde(default = "default_allow_unknown")]
    pub allow_unknown: bool,
}

fn default_allow_unknown() -> bool {
    true
}

impl Default for ConfigSchema {
    fn default() -> Self {
        Self::any()
    }
}

impl ConfigSchema {
    /// A schema that accepts any value unchanged.
    pub fn any() -> Self {
        Self {
            fields: Vec::new(),
            allow_unknown: true,
        }
    }

    /// An empty object schema; add fields with [`field`](Self::field).
    pub fn object() -> Self {
        Self::any()
    }

    /// Adds a field.
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Rejects keys not declared by the schema.
    pub fn deny_unknown(mut self) -> Self {
        self.allow_unknown = false;
        self
    }

    /// Parses a schema from its JSON representation.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Returns `true` if this schema places no constraint on the value.
    pub fn is_unconstrained(&self) -> bool {
        self.fields.is_empty() && self.allow_unknown
    }

    /// Checks `value` against the schema.
    ///
    /// Returns the value with defaults filled in for absent fields. A `null`
    /// optional field is treated as absent.
    pub fn check(&self, value: &Value) -> Result<Value, SchemaViolation> {
        if self.is_unconstrained() {
            return Ok(value.clone());
        }

        // An absent configuration behaves like an empty object so that
        // defaults can still be applied.
        let empty = Map::new();
        let object = match value {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(SchemaViolation::NotAnObject {
                    found: kind_name(other),
                });
            }
        };

        let mut checked = object.clone();

        for field in &self.fields {
            match object.get(&field.name) {
                Some(v) if !v.is_null() || field.kind == FieldKind::Any => {
                    if !field.kind.matches(v) {
                        return Err(SchemaViolation::WrongKind {
                            field: field.name.clone(),
                            expected: field.kind.as_str(),
                            found: kind_name(v),
                        });
                    }
                }
                _ => {
                    if let Some(default) = &field.default {
                        checked.insert(field.name.clone(), default.clone());
                    } else if field.required {
                        return Err(SchemaViolation::MissingField {
                            field: field.name.clone(),
                        });
                    }
                }
            }
        }

        if !self.allow_unknown
            && let Some(key) = object
                .keys()
                .find(|key| !self.fields.iter().any(|f| &f.name == *key))
        {
            return Err(SchemaViolation::UnknownField { field: key.clone() });
        }

        Ok(Value::Object(checked))
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lights_schema() -> ConfigSchema {
        ConfigSchema::object()
            .field(FieldSchema::required("host", FieldKind::String))
            .field(FieldSchema::optional("port", FieldKind::Integer).with_default(8080))
            .field(FieldSchema::optional("secure", FieldKind::Boolean))
    }

    #[test]
    fn test_any_schema_passes_through() {
        let schema = ConfigSchema::any();
        assert_eq!(schema.check(&json!(42)).unwrap(), json!(42));
        assert_eq!(schema.check(&Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_defaults_are_applied() {
        let checked = lights_schema().check(&json!({ "host": "a" })).unwrap();
        assert_eq!(checked, json!({ "host": "a", "port": 8080 }));
    }

    #[test]
    fn test_missing_required_field() {
        let err = lights_schema().check(&json!({ "port": 1 })).unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::MissingField {
                field: "host".into()
            }
        );
    }

    #[test]
    fn test_wrong_kind() {
        let err = lights_schema()
            .check(&json!({ "host": "a", "port": 1.5 }))
            .unwrap_err();
        assert_eq!(err.to_string(), "field 'port' must be of type integer, got number");
    }

    #[test]
    fn test_not_an_object() {
        let err = lights_schema().check(&json!("a")).unwrap_err();
        assert!(matches!(err, SchemaViolation::NotAnObject { found: "string" }));
    }

    #[test]
    fn test_unknown_fields() {
        let value = json!({ "host": "a", "colour": "red" });
        assert!(lights_schema().check(&value).is_ok());
        let err = lights_schema().deny_unknown().check(&value).unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::UnknownField {
                field: "colour".into()
            }
        );
    }

    #[test]
    fn test_from_json_str() {
        let schema = ConfigSchema::from_json_str(
            r#"{ "fields": [ { "name": "host", "kind": "string", "required": true } ] }"#,
        )
        .unwrap();
        assert!(schema.allow_unknown);
        assert_eq!(schema.fields[0], FieldSchema::required("host", FieldKind::String));
    }
}
