//! Runtime values of unit scripts.
//!
//! Scalars are plain data. Lists, dicts, instances, classes, functions and
//! modules are reference values: cloning a `Value` clones the handle, so a
//! mutation made through one handle is visible through every other.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use crate::script::ast::{AstNode, Span};
use crate::script::eval::CallContext;
use crate::script::exceptions::Raised;
use crate::script::scope::Scope;
use crate::script::unit::UnitRuntime;

pub type EvalResult = Result<Value, Raised>;

/// Signature shared by built-in atoms and installed mocks.
pub type NativeCallable = dyn Fn(&mut CallContext<'_>, Vec<Value>) -> EvalResult;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type DictRef = Rc<RefCell<IndexMap<String, Value>>>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(ListRef),
    Dict(DictRef),
    Function(Rc<Function>),
    Native(Rc<NativeFunction>),
    Method(Rc<BoundMethod>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    Module(Rc<Module>),
}

// ============================================================================
// CALLABLES AND OBJECTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<AstNode>,
}

pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<AstNode>,
    pub env: Rc<Scope>,
    pub unit: Rc<UnitRuntime>,
    pub span: Span,
}

pub struct NativeFunction {
    pub name: String,
    pub func: Box<NativeCallable>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&mut CallContext<'_>, Vec<Value>) -> EvalResult + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

pub struct BoundMethod {
    pub receiver: Value,
    pub function: Rc<Function>,
}

pub struct Class {
    pub name: String,
    pub base: Option<Rc<Class>>,
    pub attrs: RefCell<IndexMap<String, Value>>,
    /// The unit that defined this class; `None` for built-in classes.
    pub unit: Option<Rc<UnitRuntime>>,
}

impl Class {
    pub fn new(name: impl Into<String>, base: Option<Rc<Class>>) -> Self {
        Self {
            name: name.into(),
            base,
            attrs: RefCell::new(IndexMap::new()),
            unit: None,
        }
    }

    /// Looks an attribute up on this class, then on each ancestor in turn.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.attrs.borrow().get(name) {
            return Some(value.clone());
        }
        self.base.as_ref().and_then(|base| base.lookup(name))
    }

    /// Class names from this class up to the root.
    pub fn lineage(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        let mut current = self.base.clone();
        while let Some(class) = current {
            names.push(class.name.clone());
            current = class.base.clone();
        }
        names
    }

    pub fn is_subclass_of(&self, name: &str) -> bool {
        self.lineage().iter().any(|n| n == name)
    }

    pub fn is_exception(&self) -> bool {
        self.is_subclass_of("BaseException")
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    pub fields: RefCell<IndexMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(IndexMap::new()),
        }
    }

    /// Message of an exception instance, empty for other instances.
    pub fn message(&self) -> String {
        match self.fields.borrow().get("message") {
            Some(Value::Str(s)) => s.clone(),
            Some(Value::Nil) | None => String::new(),
            // Containers and objects may hold this exception; print them shallowly.
            Some(other) if other.container_ptr().is_some() || other.as_instance().is_some() => {
                format!("<{} object>", other.type_name())
            }
            Some(other) => other.to_string(),
        }
    }
}

/// A loaded unit: the result of executing one source file under one identity.
pub struct Module {
    pub identity: String,
    pub path: PathBuf,
    pub globals: Rc<Scope>,
    pub runtime: Rc<UnitRuntime>,
}

// ============================================================================
// VALUE API
// ============================================================================

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(entries: IndexMap<String, Value>) -> Value {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    /// Runtime type name, as reported by `type-name` and matched by
    /// `is_instance_of`.
    pub fn type_name(&self) -> String {
        match self {
            Value::Nil => "NoneType".into(),
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::Float(_) => "float".into(),
            Value::Str(_) => "str".into(),
            Value::List(_) => "list".into(),
            Value::Dict(_) => "dict".into(),
            Value::Function(_) => "function".into(),
            Value::Native(_) => "builtin_function".into(),
            Value::Method(_) => "method".into(),
            Value::Class(_) => "type".into(),
            Value::Instance(instance) => instance.class.name.clone(),
            Value::Module(_) => "module".into(),
        }
    }

    /// Type names of this value and everything it inherits from.
    pub fn type_lineage(&self) -> Vec<String> {
        match self {
            Value::Instance(instance) => instance.class.lineage(),
            other => vec![other.type_name()],
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Rc<Instance>> {
        match self {
            Value::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// The instance if this value is a raised-able exception object.
    pub fn as_exception(&self) -> Option<&Rc<Instance>> {
        self.as_instance().filter(|i| i.class.is_exception())
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Dict(map) => !map.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::Native(_) | Value::Method(_) | Value::Class(_)
        )
    }

    /// The unit whose streams capture output produced through this value.
    pub fn owning_unit(&self) -> Option<Rc<UnitRuntime>> {
        match self {
            Value::Function(f) => Some(f.unit.clone()),
            Value::Method(m) => Some(m.function.unit.clone()),
            Value::Class(c) => c.unit.clone(),
            Value::Instance(i) => i.class.unit.clone(),
            Value::Module(m) => Some(m.runtime.clone()),
            _ => None,
        }
    }

    /// Length of strings (in chars), lists and dicts.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.borrow().len()),
            Value::Dict(map) => Some(map.borrow().len()),
            _ => None,
        }
    }

    /// Structural equality for data, identity for objects. Collections that
    /// contain themselves compare equal when their shapes agree.
    pub fn equals(&self, other: &Value) -> bool {
        values_equal(self, other, &mut Vec::new())
    }

    /// Quoted rendering used inside collections.
    pub fn repr(&self) -> String {
        render(self, true, &mut Vec::new())
    }

    /// Address of a list or dict, the identity used for cycle detection.
    pub fn container_ptr(&self) -> Option<*const ()> {
        match self {
            Value::List(items) => Some(Rc::as_ptr(items) as *const ()),
            Value::Dict(map) => Some(Rc::as_ptr(map) as *const ()),
            _ => None,
        }
    }
}

/// Nesting past this depth compares by identity and renders elided.
pub const MAX_NESTING: usize = 256;

// Pairs of containers already being compared further up the stack.
type SeenPairs = Vec<(*const (), *const ())>;

fn values_equal(a: &Value, b: &Value, seen: &mut SeenPairs) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            a.as_number() == b.as_number()
        }
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && nested(a, b, seen, |seen| {
                    x.iter().zip(y.iter()).all(|(v, w)| values_equal(v, w, seen))
                })
        }
        (Value::Dict(x), Value::Dict(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && nested(a, b, seen, |seen| {
                    x.iter()
                        .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w, seen)))
                })
        }
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Native(x), Value::Native(y)) => Rc::ptr_eq(x, y),
        (Value::Method(x), Value::Method(y)) => {
            Rc::ptr_eq(&x.function, &y.function) && values_equal(&x.receiver, &y.receiver, seen)
        }
        (Value::Class(x), Value::Class(y)) => Rc::ptr_eq(x, y),
        (Value::Instance(x), Value::Instance(y)) => Rc::ptr_eq(x, y),
        (Value::Module(x), Value::Module(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

fn nested(a: &Value, b: &Value, seen: &mut SeenPairs, compare: impl FnOnce(&mut SeenPairs) -> bool) -> bool {
    let (Some(pa), Some(pb)) = (a.container_ptr(), b.container_ptr()) else {
        return false;
    };
    if seen.contains(&(pa, pb)) {
        return true;
    }
    if seen.len() >= MAX_NESTING {
        return false;
    }
    seen.push((pa, pb));
    let equal = compare(seen);
    seen.pop();
    equal
}

/// Renders `value`, quoting strings when `quoted`. A list or dict met again
/// inside itself prints as `[...]` or `{...}`.
fn render(value: &Value, quoted: bool, seen: &mut Vec<*const ()>) -> String {
    match value {
        Value::Str(s) if quoted => format!("{:?}", s),
        Value::List(items) => enter(value, "[...]", seen, |seen| {
            let items: Vec<String> = items.borrow().iter().map(|v| render(v, true, seen)).collect();
            format!("[{}]", items.join(", "))
        }),
        Value::Dict(map) => enter(value, "{...}", seen, |seen| {
            let entries: Vec<String> = map
                .borrow()
                .iter()
                .map(|(k, v)| format!("{:?}: {}", k, render(v, true, seen)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }),
        other => other.to_string(),
    }
}

fn enter(
    value: &Value,
    elided: &str,
    seen: &mut Vec<*const ()>,
    body: impl FnOnce(&mut Vec<*const ()>) -> String,
) -> String {
    match value.container_ptr() {
        Some(ptr) if !seen.contains(&ptr) && seen.len() < MAX_NESTING => {
            seen.push(ptr);
            let text = body(seen);
            seen.pop();
            text
        }
        _ => elided.to_string(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(_) | Value::Dict(_) => write!(f, "{}", render(self, false, &mut Vec::new())),
            Value::Function(func) => write!(f, "<function {}>", func.name),
            Value::Native(func) => write!(f, "<builtin {}>", func.name),
            Value::Method(m) => write!(f, "<bound method {}>", m.function.name),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) if instance.class.is_exception() => {
                let message = instance.message();
                if message.is_empty() {
                    write!(f, "{}", instance.class.name)
                } else {
                    write!(f, "{}: {}", instance.class.name, message)
                }
            }
            Value::Instance(instance) => write!(f, "<{} object>", instance.class.name),
            Value::Module(module) => write!(f, "<module {}>", module.identity),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}
