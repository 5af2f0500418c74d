//! # Built-in Atoms
//!
//! Atoms are the primitive operations every unit can call without defining
//! them. They are plain function pointers registered by name.
//!
//! ## Module Structure
//!
//! - **`helpers`**: Arity checks and typed argument extraction
//! - **`math`**: Arithmetic (`+`, `-`, `*`, `/`, `//`, `%`, `**`, ...)
//! - **`logic`**: Comparison and negation
//! - **`collections`**: Lists and dicts
//! - **`strings`**: Text operations
//! - **`io`**: Captured output, supplied input, files
//! - **`objects`**: Reflection over instances and classes
//! - **`random`**: Per-unit seeded randomness
//!
//! ## Design Principles
//!
//! - **Consistent Interface**: All atoms use the same `AtomFn` signature
//! - **Failures Are Exceptions**: Atoms raise script exceptions, never panic

use std::rc::Rc;

use crate::script::eval::CallContext;
use crate::script::exceptions::builtin_exception_classes;
use crate::script::value::{EvalResult, NativeFunction, Value};

pub mod collections;
pub mod helpers;
pub mod io;
pub mod logic;
pub mod math;
pub mod objects;
pub mod random;
pub mod strings;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Atom function type: receives the call context and evaluated arguments.
pub type AtomFn = fn(&mut CallContext<'_>, Vec<Value>) -> EvalResult;

/// Name → built-in value table, shared by every unit an environment loads.
///
/// Backed by a persistent map so each load takes an O(1) copy.
#[derive(Clone, Default)]
pub struct AtomRegistry {
    atoms: im::HashMap<String, Value>,
}

impl AtomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, func: AtomFn) {
        let native = NativeFunction::new(name, func);
        self.atoms
            .insert(name.to_string(), Value::Native(Rc::new(native)));
    }

    pub fn register_value(&mut self, name: &str, value: Value) {
        self.atoms.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.atoms.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.atoms.contains_key(name)
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.atoms.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn table(&self) -> im::HashMap<String, Value> {
        self.atoms.clone()
    }
}

// ============================================================================
// REGISTRATION
// ============================================================================

/// Registry with every standard atom and the built-in exception classes.
pub fn build_default_atom_registry() -> AtomRegistry {
    let mut registry = AtomRegistry::new();
    math::register_math_atoms(&mut registry);
    logic::register_logic_atoms(&mut registry);
    collections::register_collection_atoms(&mut registry);
    strings::register_string_atoms(&mut registry);
    io::register_io_atoms(&mut registry);
    objects::register_object_atoms(&mut registry);
    random::register_random_atoms(&mut registry);
    for (name, class) in builtin_exception_classes() {
        registry.register_value(&name, Value::Class(class));
    }
    registry
}
