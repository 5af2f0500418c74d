//! Per-run store of named values shared between checks.
//!
//! Values are stored as handles, never copied: an object saved by one check
//! and mutated by the next is the same object to every later reader.

use indexmap::IndexMap;
use tracing::trace;

use crate::errors::{Result, VerdictError};
use crate::script::Value;

#[derive(Default)]
pub struct ExecutionContext {
    objects: IndexMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        trace!(name = %name, kind = %value.type_name(), "context save");
        self.objects.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.objects
            .get(name)
            .cloned()
            .ok_or_else(|| VerdictError::MissingReference {
                name: name.to_string(),
            })
    }

    pub fn has(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_name_is_a_harness_error() {
        let context = ExecutionContext::new();
        assert!(!context.has("calc"));
        assert!(matches!(
            context.get("calc"),
            Err(VerdictError::MissingReference { name }) if name == "calc"
        ));
    }

    #[test]
    fn test_saved_values_share_their_handle() {
        let mut context = ExecutionContext::new();
        let list = Value::list(vec![Value::Int(1)]);
        context.save("items", list.clone());
        if let Value::List(items) = &list {
            items.borrow_mut().push(Value::Int(2));
        }
        assert_eq!(context.get("items").unwrap().to_string(), "[1, 2]");
    }

    #[test]
    fn test_clear_discards_everything() {
        let mut context = ExecutionContext::new();
        context.save("a", Value::Int(1));
        context.save("b", Value::Nil);
        assert_eq!(context.names().collect::<Vec<_>>(), ["a", "b"]);
        context.clear();
        assert!(context.is_empty());
    }
}
