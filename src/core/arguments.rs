//! Tool descriptors, argument resolution and schema-driven argument filling.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl ToolDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    pub fn required_arguments(&self) -> Vec<&str> {
        self.input_schema
            .as_ref()
            .and_then(|schema| schema.get("required"))
            .and_then(Value::as_array)
            .map(|required| required.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn requires_arguments(&self) -> bool {
        !self.required_arguments().is_empty()
    }
}

/// Arguments as the operator supplied them.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ArgumentInput {
    #[default]
    Empty,
    Structured(Value),
    /// Free-form JSON typed into the raw editor.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Arguments are not valid JSON: {0}")]
    InvalidJson(String),
    #[error("Arguments must be a JSON object")]
    NotAnObject,
    #[error("Tool '{tool}' requires arguments: {}", required.join(", "))]
    MissingArguments { tool: String, required: Vec<String> },
    #[error("Arguments do not match the input schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),
    #[error("Tool input schema is invalid: {0}")]
    InvalidSchema(String),
}

/// Turns operator input into the `arguments` object sent with a call.
///
/// Returns `Ok(None)` when nothing was supplied and the tool does not need
/// arguments. Nothing here touches the network.
pub fn resolve_arguments(
    tool: &ToolDescriptor,
    input: &ArgumentInput,
) -> Result<Option<Map<String, Value>>, ValidationError> {
    let value = match input {
        ArgumentInput::Empty => None,
        ArgumentInput::Structured(value) => Some(value.clone()),
        ArgumentInput::Raw(text) if text.trim().is_empty() => None,
        ArgumentInput::Raw(text) => Some(
            serde_json::from_str::<Value>(text)
                .map_err(|err| ValidationError::InvalidJson(err.to_string()))?,
        ),
    };

    let arguments = match value {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => return Err(ValidationError::NotAnObject),
    };

    let Some(arguments) = arguments else {
        if tool.requires_arguments() {
            return Err(ValidationError::MissingArguments {
                tool: tool.name.clone(),
                required: tool
                    .required_arguments()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            });
        }
        return Ok(None);
    };

    if let Some(schema) = tool.input_schema.as_ref() {
        validate_against_schema(schema, &Value::Object(arguments.clone()))?;
    }
    Ok(Some(arguments))
}

pub fn validate_against_schema(schema: &Value, instance: &Value) -> Result<(), ValidationError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|err| ValidationError::InvalidSchema(err.to_string()))?;
    let violations: Vec<String> = validator
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::SchemaViolation(violations))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Declared defaults plus whatever is required.
    Defaults,
    /// A value for every declared property.
    Mock,
}

/// Builds a value that satisfies `schema` for the keywords the form
/// renderer understands. Deterministic, so filling twice yields the same
/// value.
pub fn fill_from_schema(schema: &Value, mode: FillMode) -> Value {
    fill_value(schema, mode, 0)
}

const MAX_FILL_DEPTH: usize = 8;

fn fill_value(schema: &Value, mode: FillMode, depth: usize) -> Value {
    let Some(object) = schema.as_object() else {
        return Value::Null;
    };
    if depth > MAX_FILL_DEPTH {
        return Value::Null;
    }

    if let Some(value) = object.get("const") {
        return value.clone();
    }
    if let Some(value) = object.get("default") {
        return value.clone();
    }
    if let Some(first) = object
        .get("enum")
        .and_then(Value::as_array)
        .and_then(|values| values.first())
    {
        return first.clone();
    }
    if let Some(first) = object
        .get("examples")
        .and_then(Value::as_array)
        .and_then(|values| values.first())
    {
        return first.clone();
    }
    for combinator in ["anyOf", "oneOf"] {
        if let Some(first) = object
            .get(combinator)
            .and_then(Value::as_array)
            .and_then(|variants| variants.first())
        {
            return fill_value(first, mode, depth + 1);
        }
    }
    if let Some(parts) = object.get("allOf").and_then(Value::as_array) {
        let mut merged = Map::new();
        for part in parts {
            if let Value::Object(filled) = fill_value(part, mode, depth + 1) {
                merged.extend(filled);
            }
        }
        return Value::Object(merged);
    }

    match schema_type(object).as_deref() {
        Some("object") => fill_object(object, mode, depth),
        Some("array") => fill_array(object, mode, depth),
        Some("string") => Value::String(fill_string(object)),
        Some("integer") => fill_number(object, true),
        Some("number") => fill_number(object, false),
        Some("boolean") => Value::Bool(false),
        Some("null") => Value::Null,
        _ if object.contains_key("properties") => fill_object(object, mode, depth),
        _ => Value::Null,
    }
}

fn schema_type(object: &Map<String, Value>) -> Option<String> {
    match object.get("type")? {
        Value::String(kind) => Some(kind.clone()),
        Value::Array(kinds) => kinds
            .iter()
            .filter_map(Value::as_str)
            .find(|kind| *kind != "null")
            .or_else(|| kinds.iter().filter_map(Value::as_str).next())
            .map(str::to_string),
        _ => None,
    }
}

fn fill_object(object: &Map<String, Value>, mode: FillMode, depth: usize) -> Value {
    let required: Vec<&str> = object
        .get("required")
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut filled = Map::new();
    if let Some(properties) = object.get("properties").and_then(Value::as_object) {
        for (name, property) in properties {
            let include = match mode {
                FillMode::Mock => true,
                FillMode::Defaults => {
                    required.contains(&name.as_str())
                        || property.get("default").is_some()
                        || property.get("const").is_some()
                }
            };
            if include {
                filled.insert(name.clone(), fill_value(property, mode, depth + 1));
            }
        }
    }
    Value::Object(filled)
}

fn fill_array(object: &Map<String, Value>, mode: FillMode, depth: usize) -> Value {
    let min_items = object.get("minItems").and_then(Value::as_u64).unwrap_or(0);
    let count = match mode {
        FillMode::Mock => min_items.max(1),
        FillMode::Defaults => min_items,
    };
    let Some(items) = object.get("items") else {
        return Value::Array(Vec::new());
    };
    let item = fill_value(items, mode, depth + 1);
    Value::Array((0..count).map(|_| item.clone()).collect())
}

fn fill_string(object: &Map<String, Value>) -> String {
    let by_format = object
        .get("format")
        .and_then(Value::as_str)
        .and_then(|format| match format {
            "date-time" => Some("1970-01-01T00:00:00Z"),
            "date" => Some("1970-01-01"),
            "time" => Some("00:00:00Z"),
            "email" => Some("user@example.com"),
            "uri" | "url" => Some("https://example.com"),
            "uuid" => Some("00000000-0000-0000-0000-000000000000"),
            "ipv4" => Some("127.0.0.1"),
            "hostname" => Some("localhost"),
            _ => None,
        });
    if let Some(value) = by_format {
        return value.to_string();
    }

    let min_length = object.get("minLength").and_then(Value::as_u64).unwrap_or(0) as usize;
    "x".repeat(min_length)
}

fn fill_number(object: &Map<String, Value>, integer: bool) -> Value {
    let minimum = object.get("minimum").and_then(Value::as_f64);
    let exclusive_minimum = object.get("exclusiveMinimum").and_then(Value::as_f64);
    let maximum = object.get("maximum").and_then(Value::as_f64);

    let mut candidate = match (minimum, exclusive_minimum) {
        (Some(min), _) => min,
        (None, Some(min)) if integer => min.floor() + 1.0,
        (None, Some(min)) => min + 1.0,
        (None, None) => 0.0,
    };
    if let Some(max) = maximum {
        if candidate > max {
            candidate = max;
        }
    }
    if integer {
        let rounded = candidate.ceil();
        if rounded >= 0.0 {
            Value::Number(Number::from(rounded as u64))
        } else {
            Value::Number(Number::from(rounded as i64))
        }
    } else {
        Number::from_f64(candidate)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_tool() -> ToolDescriptor {
        ToolDescriptor {
            name: "search".to_string(),
            description: Some("Full text search".to_string()),
            input_schema: Some(json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "minLength": 2},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 50, "default": 10},
                    "scope": {"type": "string", "enum": ["docs", "code"]},
                    "since": {"type": "string", "format": "date-time"},
                    "tags": {"type": "array", "items": {"type": "string"}, "minItems": 1},
                    "exact": {"type": ["boolean", "null"]},
                    "filters": {
                        "type": "object",
                        "properties": {
                            "owner": {"type": "string"},
                            "score": {"type": "number", "exclusiveMinimum": 0.5}
                        },
                        "required": ["owner"]
                    }
                },
                "required": ["query", "tags"]
            })),
        }
    }

    #[test]
    fn raw_arguments_must_be_json_objects() {
        let tool = ToolDescriptor::named("echo");
        assert!(matches!(
            resolve_arguments(&tool, &ArgumentInput::Raw("{not json".into())),
            Err(ValidationError::InvalidJson(_))
        ));
        assert_eq!(
            resolve_arguments(&tool, &ArgumentInput::Raw("[1, 2]".into())),
            Err(ValidationError::NotAnObject)
        );
        let resolved = resolve_arguments(&tool, &ArgumentInput::Raw(r#"{"text":"hi"}"#.into()))
            .expect("valid")
            .expect("some");
        assert_eq!(resolved.get("text"), Some(&json!("hi")));
    }

    #[test]
    fn blank_input_is_allowed_without_required_properties() {
        let tool = ToolDescriptor::named("ping");
        assert_eq!(resolve_arguments(&tool, &ArgumentInput::Empty), Ok(None));
        assert_eq!(
            resolve_arguments(&tool, &ArgumentInput::Raw("   ".into())),
            Ok(None)
        );
    }

    #[test]
    fn missing_required_arguments_are_rejected_locally() {
        let err = resolve_arguments(&search_tool(), &ArgumentInput::Empty).expect_err("missing");
        assert_eq!(
            err,
            ValidationError::MissingArguments {
                tool: "search".into(),
                required: vec!["query".into(), "tags".into()],
            }
        );
        assert_eq!(
            err.to_string(),
            "Tool 'search' requires arguments: query, tags"
        );
    }

    #[test]
    fn schema_violations_are_reported() {
        let input = ArgumentInput::Structured(json!({"query": "x", "tags": []}));
        match resolve_arguments(&search_tool(), &input) {
            Err(ValidationError::SchemaViolation(violations)) => {
                assert!(!violations.is_empty());
            }
            other => panic!("expected schema violation, got {other:?}"),
        }
    }

    #[test]
    fn defaults_fill_required_and_defaulted_properties_only() {
        let schema = search_tool().input_schema.expect("schema");
        let filled = fill_from_schema(&schema, FillMode::Defaults);
        assert_eq!(
            filled,
            json!({
                "query": "xx",
                "limit": 10,
                "tags": [""]
            })
        );
    }

    #[test]
    fn generated_arguments_satisfy_their_schema() {
        let schema = search_tool().input_schema.expect("schema");
        for mode in [FillMode::Defaults, FillMode::Mock] {
            let filled = fill_from_schema(&schema, mode);
            validate_against_schema(&schema, &filled)
                .unwrap_or_else(|err| panic!("{mode:?} output should validate: {err}"));

            let tool = search_tool();
            let resolved = resolve_arguments(&tool, &ArgumentInput::Structured(filled.clone()))
                .expect("resolves")
                .expect("present");
            let round_tripped = Value::Object(resolved);
            assert_eq!(round_tripped, filled);
            assert_eq!(fill_from_schema(&schema, mode), filled);
        }
    }

    #[test]
    fn mock_fill_covers_nested_objects_and_formats() {
        let schema = search_tool().input_schema.expect("schema");
        let filled = fill_from_schema(&schema, FillMode::Mock);
        assert_eq!(filled["scope"], json!("docs"));
        assert_eq!(filled["since"], json!("1970-01-01T00:00:00Z"));
        assert_eq!(filled["exact"], json!(false));
        assert_eq!(filled["filters"]["owner"], json!(""));
        assert_eq!(filled["filters"]["score"], json!(1.5));
    }

    #[test]
    fn descriptor_accepts_camel_case_schema_key() {
        let tool: ToolDescriptor = serde_json::from_value(json!({
            "name": "echo",
            "inputSchema": {"type": "object", "required": ["text"]}
        }))
        .expect("parse");
        assert_eq!(tool.required_arguments(), vec!["text"]);
    }
}
