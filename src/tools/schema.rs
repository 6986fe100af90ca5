//! Declarative argument schemas and the generic validator.
//!
//! Each tool declares an [`ArgumentSchema`]: an ordered list of typed fields.
//! The dispatcher validates the raw argument map against it before any
//! handler runs, so handlers only ever see well-formed input.

use crate::error::{ToolError, ToolResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;

/// Raw argument map as received from the client.
pub type JsonObject = Map<String, Value>;

/// Value type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    StringArray,
    Object,
}

impl FieldType {
    fn json_type(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::StringArray => "array",
            FieldType::Object => "object",
        }
    }

    /// Coerce a JSON value to this type, or describe why it cannot be.
    fn coerce(self, value: Value) -> Result<Value, String> {
        match (self, value) {
            (FieldType::String, Value::String(s)) => Ok(Value::String(s)),
            (FieldType::String, v @ (Value::Number(_) | Value::Bool(_))) => {
                Ok(Value::String(v.to_string()))
            }

            (FieldType::Integer, Value::Number(n)) => n
                .as_i64()
                .map(Value::from)
                .ok_or_else(|| format!("expected an integer, got {}", n)),
            (FieldType::Integer, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("expected an integer, got \"{}\"", s)),

            (FieldType::StringArray, Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(Value::String(s)),
                    v @ (Value::Number(_) | Value::Bool(_)) => Ok(Value::String(v.to_string())),
                    other => Err(format!("array items must be scalars, got {}", other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),

            (FieldType::Object, v @ Value::Object(_)) => Ok(v),

            (ty, other) => Err(format!("expected {}, got {}", ty.json_type(), type_name(&other))),
        }
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

/// One declared argument.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: &'static str,
}

impl FieldSpec {
    pub fn required(name: &'static str, field_type: FieldType, description: &'static str) -> Self {
        Self {
            name,
            field_type,
            required: true,
            default: None,
            description,
        }
    }

    pub fn optional(name: &'static str, field_type: FieldType, description: &'static str) -> Self {
        Self {
            name,
            field_type,
            required: false,
            default: None,
            description,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Ordered set of fields accepted by one tool.
#[derive(Debug, Clone, Default)]
pub struct ArgumentSchema {
    fields: Vec<FieldSpec>,
}

impl ArgumentSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Schema for a tool that takes no arguments.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validate and coerce a raw argument map.
    ///
    /// `null` counts as absent. Absent optional fields take their default, or
    /// are left out when there is none. Unknown arguments are dropped.
    pub fn validate(&self, mut arguments: JsonObject) -> ToolResult<ValidatedArgs> {
        let mut validated = JsonObject::new();

        for field in &self.fields {
            let value = arguments.remove(field.name).filter(|v| !v.is_null());
            match value {
                Some(value) => {
                    let coerced = field
                        .field_type
                        .coerce(value)
                        .map_err(|msg| ToolError::invalid_field(field.name, format!("{}: {}", field.name, msg)))?;
                    validated.insert(field.name.to_string(), coerced);
                }
                None if field.required => return Err(ToolError::missing_argument(field.name)),
                None => {
                    if let Some(default) = &field.default {
                        validated.insert(field.name.to_string(), default.clone());
                    }
                }
            }
        }

        if !arguments.is_empty() {
            let ignored: Vec<&String> = arguments.keys().collect();
            debug!(ignored = ?ignored, "Ignoring unknown arguments");
        }

        Ok(ValidatedArgs(validated))
    }

    /// Render as a JSON Schema object for `tools/list`.
    pub fn to_json_schema(&self) -> JsonObject {
        let mut properties = JsonObject::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut prop = JsonObject::new();
            prop.insert("type".into(), json!(field.field_type.json_type()));
            if field.field_type == FieldType::StringArray {
                prop.insert("items".into(), json!({ "type": "string" }));
            }
            prop.insert("description".into(), json!(field.description));
            if let Some(default) = &field.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(field.name.to_string(), Value::Object(prop));

            if field.required {
                required.push(json!(field.name));
            }
        }

        let mut schema = JsonObject::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        schema.insert("required".into(), Value::Array(required));
        schema
    }
}

/// Arguments that passed schema validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArgs(JsonObject);

impl ValidatedArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn as_map(&self) -> &JsonObject {
        &self.0
    }

    /// Destructure into a typed per-tool input.
    pub fn into_typed<T: DeserializeOwned>(self) -> ToolResult<T> {
        serde_json::from_value(Value::Object(self.0))
            .map_err(|e| ToolError::validation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement_schema() -> ArgumentSchema {
        ArgumentSchema::new(vec![
            FieldSpec::required("query", FieldType::String, "SQL"),
            FieldSpec::optional("params", FieldType::StringArray, "Parameters"),
        ])
    }

    fn args(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            _ => panic!("test arguments must be an object"),
        }
    }

    #[test]
    fn test_missing_required_argument() {
        let err = statement_schema().validate(JsonObject::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid arguments: Missing required argument: query"
        );
    }

    #[test]
    fn test_null_counts_as_absent() {
        let err = statement_schema()
            .validate(args(json!({ "query": null })))
            .unwrap_err();
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn test_string_array_coerces_scalars() {
        let validated = statement_schema()
            .validate(args(json!({ "query": "SELECT $1, $2", "params": [1, "two", true] })))
            .unwrap();
        assert_eq!(validated.get("params"), Some(&json!(["1", "two", "true"])));
    }

    #[test]
    fn test_string_array_rejects_nested() {
        let err = statement_schema()
            .validate(args(json!({ "query": "x", "params": [[1]] })))
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation { field: Some(ref f), .. } if f == "params"));
    }

    #[test]
    fn test_integer_coercion_and_default() {
        let schema = ArgumentSchema::new(vec![
            FieldSpec::optional("tail", FieldType::Integer, "Lines").with_default(json!(100)),
        ]);
        assert_eq!(
            schema.validate(JsonObject::new()).unwrap().get("tail"),
            Some(&json!(100))
        );
        assert_eq!(
            schema.validate(args(json!({ "tail": "25" }))).unwrap().get("tail"),
            Some(&json!(25))
        );
        assert!(schema.validate(args(json!({ "tail": 2.5 }))).is_err());
        assert!(schema.validate(args(json!({ "tail": "many" }))).is_err());
    }

    #[test]
    fn test_unknown_arguments_are_dropped() {
        let validated = statement_schema()
            .validate(args(json!({ "query": "SELECT 1", "limit": 5 })))
            .unwrap();
        assert!(validated.get("limit").is_none());
        assert_eq!(validated.as_map().len(), 1);
    }

    #[test]
    fn test_to_json_schema() {
        let schema = ArgumentSchema::new(vec![
            FieldSpec::required("query", FieldType::String, "SQL"),
            FieldSpec::optional("params", FieldType::StringArray, "Parameters"),
            FieldSpec::optional("path", FieldType::String, "Path").with_default(json!(".")),
        ])
        .to_json_schema();

        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["params"]["items"], json!({ "type": "string" }));
        assert_eq!(schema["properties"]["path"]["default"], json!("."));
    }

    #[test]
    fn test_empty_schema_renders_no_required() {
        let schema = ArgumentSchema::empty().to_json_schema();
        assert_eq!(schema["properties"], json!({}));
        assert_eq!(schema["required"], json!([]));
    }
}
