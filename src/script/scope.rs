//! Lexical scopes.
//!
//! A unit's globals are the root scope; every call and `let` pushes a child.
//! Built-in atoms live outside the chain, in the unit's built-in table.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

use crate::script::value::Value;

#[derive(Default)]
pub struct Scope {
    vars: RefCell<IndexMap<String, Value>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn root() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn child(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(IndexMap::new()),
            parent: Some(parent.clone()),
        })
    }

    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.vars.borrow_mut().insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// Rebinds the nearest existing binding. Returns false if none exists.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.vars.borrow_mut().get_mut(name) {
            *slot = value;
            return true;
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => false,
        }
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.vars.borrow().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.vars.borrow_mut().shift_remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.vars.borrow().keys().cloned().collect()
    }

    /// Drops every binding. Breaks reference cycles between a module's
    /// globals and the closures defined in it.
    pub fn clear(&self) {
        let drained: Vec<Value> = self.vars.borrow_mut().drain(..).map(|(_, v)| v).collect();
        drop(drained);
    }
}
