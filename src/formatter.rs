//! Failure messages rendered from check templates.
//!
//! A template names outcome values with `{placeholder}`s: `{actual}`,
//! `{expected}`, `{stdout}`, `{stderr}`, `{exception}` and the check's own
//! `{check_id}`. Placeholders with
//! no value in the outcome are left exactly as written.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::{Check, Expectation};
use crate::outcome::Outcome;
use crate::script::convert::from_json;
use crate::script::value::{format_float, MAX_NESTING};
use crate::script::Value;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid"));

const MAX_LIST_ITEMS: usize = 5;
const LIST_PREVIEW: usize = 3;
const MAX_DICT_ITEMS: usize = 3;
const DICT_PREVIEW: usize = 2;

/// Renders the failure template of `check` with the values of one outcome.
pub fn render(check: &Check, outcome: &Outcome) -> String {
    let mut values = placeholder_values(outcome, &check.spec.expect);
    values.insert("check_id", check.check_id.to_string());
    PLACEHOLDER
        .replace_all(&check.reason_for_output, |caps: &Captures<'_>| match values.get(&caps[1]) {
            Some(text) => text.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn placeholder_values(outcome: &Outcome, expectation: &Expectation) -> IndexMap<&'static str, String> {
    let mut values = IndexMap::new();
    if let Some(actual) = outcome.return_value() {
        values.insert("actual", format_value(actual));
    }
    let expected = expectation
        .return_value
        .as_ref()
        .or_else(|| expectation.entries().first().map(|(_, spec)| *spec));
    if let Some(spec) = expected {
        values.insert("expected", format_value(&from_json(&spec.value)));
    }
    for (key, text) in [("stdout", &outcome.stdout), ("stderr", &outcome.stderr)] {
        if let Some(text) = text.as_ref().filter(|t| !t.is_empty()) {
            values.insert(key, format_value(&Value::Str(text.clone())));
        }
    }
    if let Some(raised) = outcome.exception() {
        values.insert("exception", format_value(&raised.exception));
    }
    values
}

/// Canonical text of a value inside a failure message.
pub fn format_value(value: &Value) -> String {
    format_nested(value, &mut Vec::new())
}

// `seen` holds the containers being formatted further up; meeting one again
// prints it elided.
fn format_nested(value: &Value, seen: &mut Vec<*const ()>) -> String {
    if let Some(ptr) = value.container_ptr() {
        if seen.contains(&ptr) || seen.len() >= MAX_NESTING {
            return if matches!(value, Value::List(_)) { "[...]" } else { "{...}" }.into();
        }
        seen.push(ptr);
        let text = format_container(value, seen);
        seen.pop();
        return text;
    }
    match value {
        Value::Nil => "nil".into(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        Value::Str(s) => format!("\"{}\"", s),
        Value::Instance(instance) if instance.class.is_exception() => {
            format!("{}: {}", instance.class.name, instance.message())
        }
        Value::Instance(instance) => format!("<{} object>", instance.class.name),
        other => other.to_string(),
    }
}

fn format_container(value: &Value, seen: &mut Vec<*const ()>) -> String {
    match value {
        Value::List(items) => {
            let items = items.borrow();
            let shown = if items.len() <= MAX_LIST_ITEMS { items.len() } else { LIST_PREVIEW };
            let rendered: Vec<String> = items.iter().take(shown).map(|v| format_nested(v, seen)).collect();
            if shown == items.len() {
                format!("[{}]", rendered.join(", "))
            } else {
                format!("[{}, ... ({} items total)]", rendered.join(", "), items.len())
            }
        }
        Value::Dict(map) => {
            let map = map.borrow();
            let shown = if map.len() <= MAX_DICT_ITEMS { map.len() } else { DICT_PREVIEW };
            let rendered: Vec<String> = map
                .iter()
                .take(shown)
                .map(|(k, v)| format!("\"{}\": {}", k, format_nested(v, seen)))
                .collect();
            if shown == map.len() {
                format!("{{{}}}", rendered.join(", "))
            } else {
                format!("{{{}, ... ({} items total)}}", rendered.join(", "), map.len())
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(template: &str, expect: serde_json::Value) -> Check {
        serde_json::from_value(json!({
            "check_id": 7,
            "name_for_output": "n",
            "reason_for_output": template,
            "explain_for_error": "e",
            "spec": {"perform": {"action": "call_function"}, "expect": expect}
        }))
        .unwrap()
    }

    #[test]
    fn test_actual_and_expected_are_rendered() {
        let outcome = Outcome::value(Value::Int(5));
        let expect = json!({"return_value": {"assertion": "equals", "value": 10}});
        let message = render(&check("expected {expected}, got {actual}", expect), &outcome);
        assert_eq!(message, "expected 10, got 5");
    }

    #[test]
    fn test_strings_are_quoted_and_unknown_placeholders_kept() {
        let outcome = Outcome::value(Value::str("hi"));
        let message = render(&check("{actual} vs {missing}", json!({})), &outcome);
        assert_eq!(message, "\"hi\" vs {missing}");
    }

    #[test]
    fn test_check_id_is_rendered() {
        let outcome = Outcome::value(Value::Nil);
        assert_eq!(render(&check("check {check_id} failed", json!({})), &outcome), "check 7 failed");
    }

    #[test]
    fn test_long_collections_are_truncated() {
        let list = Value::list((1..=7).map(Value::Int).collect());
        assert_eq!(format_value(&list), "[1, 2, 3, ... (7 items total)]");

        let dict = from_json(&json!({"a": 1, "b": 2, "c": 3, "d": 4}));
        assert_eq!(format_value(&dict), "{\"a\": 1, \"b\": 2, ... (4 items total)}");
    }

    #[test]
    fn test_self_containing_list_is_elided() {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert_eq!(format_value(&list), "[1, [...]]");
    }

    #[test]
    fn test_absent_stdout_leaves_placeholder() {
        let outcome = Outcome::value(Value::Nil);
        assert_eq!(render(&check("out: {stdout}", json!({})), &outcome), "out: {stdout}");
    }
}
