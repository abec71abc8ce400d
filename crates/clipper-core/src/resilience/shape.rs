//! Declared data shapes, validation, and coercion.
//!
//! A shape maps field names to rules:
//!
//! ```json
//! { "title": { "type": "string", "required": true },
//!   "tags":  { "type": "array", "items": "string" } }
//! ```
//!
//! Supported types are `string`, `number`, `boolean`, `array` and `object`.

use serde_json::{Map, Value, json};

use crate::error::AppError;

/// Check `data` against `shape`. Violations become an
/// [`AppError::Validation`] carrying both, so the value can be repaired.
pub fn validate(data: &Value, shape: &Value) -> Result<(), AppError> {
    let problems = violations(data, shape);
    if problems.is_empty() {
        return Ok(());
    }
    Err(AppError::Validation {
        message: problems.join("; "),
        data: data.clone(),
        shape: shape.clone(),
    })
}

/// List every way `data` departs from `shape`.
pub fn violations(data: &Value, shape: &Value) -> Vec<String> {
    let Some(rules) = shape.as_object() else {
        return vec![];
    };
    let Some(fields) = data.as_object() else {
        return vec![format!("expected an object, got {}", type_name(data))];
    };

    let mut problems = Vec::new();
    for (field, rule) in rules {
        let expected = rule.get("type").and_then(Value::as_str);
        match fields.get(field) {
            None | Some(Value::Null) => {
                if is_required(rule) {
                    problems.push(format!("missing required field '{field}'"));
                }
            }
            Some(value) => {
                if let Some(expected) = expected
                    && !matches_type(value, expected)
                {
                    problems.push(format!(
                        "field '{field}' should be {expected}, got {}",
                        type_name(value)
                    ));
                }
            }
        }
    }
    problems
}

/// Repair `data` toward `shape`: fill missing required fields with the
/// default for their type and coerce mismatched values. Fields without a
/// rule are kept as they are.
pub fn coerce(data: &Value, shape: &Value) -> Value {
    let mut fixed: Map<String, Value> = data.as_object().cloned().unwrap_or_default();
    let Some(rules) = shape.as_object() else {
        return Value::Object(fixed);
    };

    for (field, rule) in rules {
        let Some(expected) = rule.get("type").and_then(Value::as_str) else {
            continue;
        };
        let current = fixed.get(field).filter(|v| !v.is_null()).cloned();
        match current {
            None if is_required(rule) => {
                fixed.insert(field.clone(), default_value(expected));
            }
            None => {}
            Some(value) => {
                let mut coerced = coerce_value(value, expected);
                if let (Some(items), Value::Array(list)) =
                    (rule.get("items").and_then(Value::as_str), &mut coerced)
                {
                    for item in list.iter_mut() {
                        *item = coerce_value(item.take(), items);
                    }
                }
                fixed.insert(field.clone(), coerced);
            }
        }
    }
    Value::Object(fixed)
}

/// Zero value for a type name.
pub fn default_value(kind: &str) -> Value {
    match kind {
        "string" => json!(""),
        "number" => json!(0),
        "boolean" => json!(false),
        "array" => json!([]),
        "object" => json!({}),
        _ => Value::Null,
    }
}

fn coerce_value(value: Value, kind: &str) -> Value {
    if matches_type(&value, kind) {
        return value;
    }
    match kind {
        "string" => match value {
            Value::Null => json!(""),
            Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        },
        "number" => match &value {
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| json!(0)),
            Value::Bool(b) => json!(u8::from(*b)),
            _ => json!(0),
        },
        "boolean" => json!(truthy(&value)),
        "array" => match value {
            Value::Null => json!([]),
            other => json!([other]),
        },
        "object" => json!({}),
        _ => value,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s.eq_ignore_ascii_case("false") || s == "0"),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn is_required(rule: &Value) -> bool {
    rule.get("required")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn matches_type(value: &Value, kind: &str) -> bool {
    match kind {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
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
