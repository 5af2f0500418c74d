//! Conversion between JSON test-case data and script values.

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::script::value::{format_float, Value, MAX_NESTING};

/// Converts JSON into a fresh script value. Integral numbers become ints.
pub fn from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::list(items.iter().map(from_json).collect()),
        Json::Object(map) => {
            let entries: IndexMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect();
            Value::dict(entries)
        }
    }
}

/// Converts a script value to JSON. Objects and callables become their
/// display string, as does a list or dict nested inside itself.
pub fn to_json(value: &Value) -> Json {
    to_json_nested(value, &mut Vec::new())
}

fn to_json_nested(value: &Value, seen: &mut Vec<*const ()>) -> Json {
    if let Some(ptr) = value.container_ptr() {
        if seen.contains(&ptr) || seen.len() >= MAX_NESTING {
            let elided = if matches!(value, Value::List(_)) { "[...]" } else { "{...}" };
            return Json::String(elided.into());
        }
        seen.push(ptr);
        let json = container_to_json(value, seen);
        seen.pop();
        return json;
    }
    match value {
        Value::Nil => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or_else(|| Json::String(format_float(*f))),
        Value::Str(s) => Json::String(s.clone()),
        other => Json::String(other.to_string()),
    }
}

fn container_to_json(value: &Value, seen: &mut Vec<*const ()>) -> Json {
    match value {
        Value::List(items) => Json::Array(
            items.borrow().iter().map(|v| to_json_nested(v, seen)).collect(),
        ),
        Value::Dict(map) => Json::Object(
            map.borrow()
                .iter()
                .map(|(k, v)| (k.clone(), to_json_nested(v, seen)))
                .collect(),
        ),
        other => Json::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integral_numbers_become_ints() {
        assert!(matches!(from_json(&json!(5)), Value::Int(5)));
        assert!(matches!(from_json(&json!(5.5)), Value::Float(f) if f == 5.5));
    }

    #[test]
    fn test_nested_structures_keep_order() {
        let value = from_json(&json!({"b": [1, "x"], "a": null}));
        assert_eq!(value.to_string(), r#"{"b": [1, "x"], "a": nil}"#);
        assert_eq!(to_json(&value), json!({"b": [1, "x"], "a": null}));
    }

    #[test]
    fn test_self_containing_dict_becomes_its_display_string() {
        let value = from_json(&json!({"k": 1}));
        if let Value::Dict(map) = &value {
            map.borrow_mut().insert("me".into(), value.clone());
        }
        assert_eq!(value.to_string(), r#"{"k": 1, "me": {...}}"#);
        assert_eq!(to_json(&value), json!({"k": 1, "me": "{...}"}));
    }
}
