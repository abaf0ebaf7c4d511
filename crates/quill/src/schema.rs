//! Validation of json values against the subset of json schema used for tool
//! parameters and structured output.
//!
//! Supported keywords: `type` (a name or a list of names), `nullable`, `enum`,
//! `properties`, `required`, `additionalProperties`, `items`, `minItems`,
//! `maxItems`, `minLength`, `maxLength`. Anything else, `description` included,
//! is ignored.
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{path}: {message}")]
pub struct SchemaError {
    /// Location of the offending value, `$` is the root
    pub path: String,
    pub message: String,
}

impl SchemaError {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// A json schema that values can be checked against
#[derive(Debug, Clone, PartialEq)]
pub struct Schema(Value);

impl Schema {
    pub fn new(schema: Value) -> Self {
        Self(schema)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Check `instance` against the schema, reporting the first violation found
    pub fn validate(&self, instance: &Value) -> Result<(), SchemaError> {
        validate_at(&self.0, instance, "$")
    }
}

impl From<Value> for Schema {
    fn from(value: Value) -> Self {
        Schema::new(value)
    }
}

fn validate_at(schema: &Value, instance: &Value, path: &str) -> Result<(), SchemaError> {
    let Some(schema) = schema.as_object() else {
        // `true`, `{}` and anything we can't read accept everything
        return Ok(());
    };

    if instance.is_null() && schema.get("nullable").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }

    if let Some(expected) = schema.get("type") {
        let names: Vec<&str> = match expected {
            Value::String(name) => vec![name.as_str()],
            Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !names.is_empty() && !names.iter().any(|name| has_type(instance, name)) {
            return Err(SchemaError::new(
                path,
                format!("expected {}, found {}", names.join(" or "), type_name(instance)),
            ));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(instance) {
            let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
            return Err(SchemaError::new(
                path,
                format!("{} is not one of {}", instance, options.join(", ")),
            ));
        }
    }

    match instance {
        Value::Object(fields) => {
            if let Some(required) = schema.get("required").and_then(Value::as_array) {
                for name in required.iter().filter_map(Value::as_str) {
                    if !fields.contains_key(name) {
                        return Err(SchemaError::new(
                            path,
                            format!("missing required property '{}'", name),
                        ));
                    }
                }
            }

            let properties = schema.get("properties").and_then(Value::as_object);
            for (name, value) in fields {
                let child = format!("{}.{}", path, name);
                match properties.and_then(|p| p.get(name)) {
                    Some(property) => validate_at(property, value, &child)?,
                    None => match schema.get("additionalProperties") {
                        Some(Value::Bool(false)) => {
                            return Err(SchemaError::new(
                                path,
                                format!("unexpected property '{}'", name),
                            ))
                        }
                        Some(extra @ Value::Object(_)) => validate_at(extra, value, &child)?,
                        _ => {}
                    },
                }
            }
        }
        Value::Array(items) => {
            if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
                if (items.len() as u64) < min {
                    return Err(SchemaError::new(
                        path,
                        format!("expected at least {} items, found {}", min, items.len()),
                    ));
                }
            }
            if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
                if (items.len() as u64) > max {
                    return Err(SchemaError::new(
                        path,
                        format!("expected at most {} items, found {}", max, items.len()),
                    ));
                }
            }
            if let Some(item_schema) = schema.get("items") {
                for (index, item) in items.iter().enumerate() {
                    validate_at(item_schema, item, &format!("{}[{}]", path, index))?;
                }
            }
        }
        Value::String(text) => {
            let length = text.chars().count() as u64;
            if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
                if length < min {
                    return Err(SchemaError::new(
                        path,
                        format!("expected at least {} characters", min),
                    ));
                }
            }
            if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
                if length > max {
                    return Err(SchemaError::new(
                        path,
                        format!("expected at most {} characters", max),
                    ));
                }
            }
        }
        _ => {}
    }

    Ok(())
}

fn has_type(instance: &Value, name: &str) -> bool {
    match name {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        "number" => instance.is_number(),
        "integer" => {
            instance.is_i64()
                || instance.is_u64()
                || instance.as_f64().is_some_and(|n| n.fract() == 0.0)
        }
        // unknown type names are not ours to reject
        _ => true,
    }
}

fn type_name(instance: &Value) -> &'static str {
    match instance {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
