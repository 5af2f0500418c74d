//! Built-in exception classes and the `Raised` signal.
//!
//! A raised exception travels through the evaluator as the `Err` side of
//! `EvalResult`. It is data, not a Rust error: the environment hands it to
//! actions, and actions put it into the outcome.

use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

use crate::script::ast::Span;
use crate::script::value::{Class, Instance, Value};

/// `(name, parent)` pairs in definition order; parents always come first.
const HIERARCHY: &[(&str, Option<&str>)] = &[
    ("BaseException", None),
    ("Exception", Some("BaseException")),
    ("ArithmeticError", Some("Exception")),
    ("ZeroDivisionError", Some("ArithmeticError")),
    ("LookupError", Some("Exception")),
    ("KeyError", Some("LookupError")),
    ("IndexError", Some("LookupError")),
    ("ValueError", Some("Exception")),
    ("SyntaxError", Some("Exception")),
    ("TypeError", Some("Exception")),
    ("NameError", Some("Exception")),
    ("AttributeError", Some("Exception")),
    ("RuntimeError", Some("Exception")),
    ("RecursionError", Some("RuntimeError")),
    ("OSError", Some("Exception")),
    ("FileNotFoundError", Some("OSError")),
    ("ConnectionError", Some("OSError")),
    ("AssertionError", Some("Exception")),
];

/// Builds the built-in exception classes, keyed by name.
pub fn builtin_exception_classes() -> IndexMap<String, Rc<Class>> {
    let mut classes: IndexMap<String, Rc<Class>> = IndexMap::new();
    for (name, parent) in HIERARCHY {
        let base = parent.and_then(|p| classes.get(p).cloned());
        classes.insert((*name).to_string(), Rc::new(Class::new(*name, base)));
    }
    classes
}

/// Creates an exception instance of `class` carrying `message`.
pub fn new_exception(class: &Rc<Class>, message: impl Into<String>) -> Value {
    let message = message.into();
    let instance = Instance::new(class.clone());
    {
        let mut fields = instance.fields.borrow_mut();
        fields.insert("message".into(), Value::Str(message.clone()));
        fields.insert("args".into(), Value::list(vec![Value::Str(message)]));
    }
    Value::Instance(Rc::new(instance))
}

// ============================================================================
// RAISED
// ============================================================================

/// An exception in flight.
#[derive(Clone)]
pub struct Raised {
    pub exception: Value,
    pub span: Option<Span>,
}

impl Raised {
    pub fn new(exception: Value, span: Option<Span>) -> Self {
        Self { exception, span }
    }

    pub fn type_name(&self) -> String {
        self.exception.type_name()
    }

    pub fn message(&self) -> String {
        self.exception
            .as_exception()
            .map(|e| e.message())
            .unwrap_or_else(|| self.exception.to_string())
    }

    /// True if the exception is an instance of `class_name` or a subclass.
    pub fn is_a(&self, class_name: &str) -> bool {
        self.exception
            .type_lineage()
            .iter()
            .any(|name| name == class_name)
    }
}

impl fmt::Display for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name(), self.message())
    }
}

impl fmt::Debug for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Raised({})", self)
    }
}
