//! Per-load runtime state of a unit.
//!
//! Every load gets its own `UnitRuntime`: its own identity, its own streams,
//! its own PRNG and call depth counter. Two loads of the same file share
//! nothing but the (immutable) built-in table.

use indexmap::IndexMap;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::script::ast::{AstNode, Span};
use crate::script::atoms::AtomRegistry;
use crate::script::error::SourceContext;
use crate::script::eval::{lookup_member, Interpreter};
use crate::script::exceptions::{new_exception, Raised};
use crate::script::scope::Scope;
use crate::script::value::{Class, EvalResult, Module, Value};

pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Knobs applied to every load made by one environment.
#[derive(Debug, Clone, Copy)]
pub struct UnitOptions {
    pub max_depth: usize,
    pub seed: Option<u64>,
}

impl Default for UnitOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            seed: None,
        }
    }
}

// ============================================================================
// OUTPUT SINKS
// ============================================================================

/// Destination for text written by `print`/`eprint`.
pub trait OutputSink {
    fn emit(&mut self, text: &str);
}

/// Collects output into a String for capture.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    pub buffer: String,
}

impl OutputBuffer {
    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

impl OutputSink for OutputBuffer {
    fn emit(&mut self, text: &str) {
        self.buffer.push_str(text);
    }
}

/// The three standard streams of one unit.
#[derive(Debug, Default)]
pub struct Streams {
    pub stdout: OutputBuffer,
    pub stderr: OutputBuffer,
    stdin: VecDeque<String>,
}

impl Streams {
    pub fn with_stdin(stdin: Option<&str>) -> Self {
        Self {
            stdin: stdin
                .map(|text| text.lines().map(String::from).collect())
                .unwrap_or_default(),
            ..Self::default()
        }
    }
}

/// Text captured while a stream redirect was active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Restores a unit's previous streams when finished or dropped.
pub struct StreamGuard {
    unit: Rc<UnitRuntime>,
    previous: Option<Streams>,
}

impl StreamGuard {
    pub fn finish(mut self) -> CapturedOutput {
        self.restore()
    }

    fn restore(&mut self) -> CapturedOutput {
        let Some(previous) = self.previous.take() else {
            return CapturedOutput::default();
        };
        let current = self.unit.streams.replace(previous);
        CapturedOutput {
            stdout: current.stdout.buffer,
            stderr: current.stderr.buffer,
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

// ============================================================================
// UNIT RUNTIME
// ============================================================================

pub struct UnitRuntime {
    pub identity: String,
    pub source: SourceContext,
    builtins: im::HashMap<String, Value>,
    streams: RefCell<Streams>,
    depth: Cell<usize>,
    max_depth: usize,
    rng: RefCell<Xoshiro256StarStar>,
}

impl UnitRuntime {
    pub fn new(
        identity: impl Into<String>,
        source: SourceContext,
        atoms: &AtomRegistry,
        options: &UnitOptions,
    ) -> Rc<Self> {
        let seed = options.seed.unwrap_or_else(rand::random);
        Rc::new(Self {
            identity: identity.into(),
            source,
            builtins: atoms.table(),
            streams: RefCell::new(Streams::default()),
            depth: Cell::new(0),
            max_depth: options.max_depth,
            rng: RefCell::new(Xoshiro256StarStar::seed_from_u64(seed)),
        })
    }

    pub fn builtin(&self, name: &str) -> Option<Value> {
        self.builtins.get(name).cloned()
    }

    /// A built-in class by name, falling back to `Exception`.
    pub fn exception_class(&self, name: &str) -> Option<Rc<Class>> {
        let class_of = |value: Option<&Value>| match value {
            Some(Value::Class(class)) => Some(class.clone()),
            _ => None,
        };
        class_of(self.builtins.get(name))
            .filter(|c| c.is_exception())
            .or_else(|| class_of(self.builtins.get("Exception")))
    }

    /// Builds a raised exception of a built-in class.
    pub fn raise(&self, class_name: &str, message: impl Into<String>, span: Span) -> Raised {
        match self.exception_class(class_name) {
            Some(class) => Raised::new(new_exception(&class, message), Some(span)),
            None => Raised::new(Value::Str(message.into()), Some(span)),
        }
    }

    // --- streams -------------------------------------------------------------

    /// Swaps in fresh streams fed with `stdin`. The guard restores the
    /// previous streams and yields everything written in between.
    pub fn redirect(self: &Rc<Self>, stdin: Option<&str>) -> StreamGuard {
        let previous = self.streams.replace(Streams::with_stdin(stdin));
        StreamGuard {
            unit: self.clone(),
            previous: Some(previous),
        }
    }

    pub fn write_stdout(&self, text: &str) {
        self.streams.borrow_mut().stdout.emit(text);
    }

    pub fn write_stderr(&self, text: &str) {
        self.streams.borrow_mut().stderr.emit(text);
    }

    pub fn read_line(&self) -> Option<String> {
        self.streams.borrow_mut().stdin.pop_front()
    }

    // --- call depth ----------------------------------------------------------

    /// Enters one call level. `None` means the depth limit was reached.
    pub fn enter_call(self: &Rc<Self>) -> Option<DepthGuard> {
        let depth = self.depth.get();
        if depth >= self.max_depth {
            return None;
        }
        self.depth.set(depth + 1);
        Some(DepthGuard { unit: self.clone() })
    }

    pub fn with_rng<R>(&self, f: impl FnOnce(&mut Xoshiro256StarStar) -> R) -> R {
        f(&mut self.rng.borrow_mut())
    }
}

pub struct DepthGuard {
    unit: Rc<UnitRuntime>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        let depth = self.unit.depth.get();
        self.unit.depth.set(depth.saturating_sub(1));
    }
}

// ============================================================================
// MODULE EXECUTION
// ============================================================================

/// Executes a parsed program as a fresh module.
///
/// The module handle is returned even when top-level code raised, so callers
/// can still inspect partially initialized state.
pub fn execute_module(
    runtime: &Rc<UnitRuntime>,
    path: &Path,
    program: &[AstNode],
) -> (Rc<Module>, Option<Raised>) {
    let globals = Scope::root();
    globals.define("__name__", Value::Str(runtime.identity.clone()));
    let module = Rc::new(Module {
        identity: runtime.identity.clone(),
        path: PathBuf::from(path),
        globals: globals.clone(),
        runtime: runtime.clone(),
    });
    let outcome = Interpreter::new(runtime.clone()).eval_block(program, &globals);
    (module, outcome.err())
}

// ============================================================================
// TARGET UNIT
// ============================================================================

/// What the harness can ask of a loaded unit.
pub trait TargetUnit {
    /// Calls the function bound to `name`. `None` if no such callable exists.
    fn invoke(&self, name: &str, args: Vec<Value>, kwargs: IndexMap<String, Value>)
        -> Option<EvalResult>;

    /// Instantiates the class bound to `name`. `None` if no such class exists.
    fn construct(&self, name: &str, args: Vec<Value>, kwargs: IndexMap<String, Value>)
        -> Option<EvalResult>;

    /// Reads `name` from `handle`. `None` if the attribute does not exist.
    fn get_attribute(&self, handle: &Value, name: &str) -> Option<Value>;
}

impl TargetUnit for Module {
    fn invoke(
        &self,
        name: &str,
        args: Vec<Value>,
        kwargs: IndexMap<String, Value>,
    ) -> Option<EvalResult> {
        let callee = self.globals.get_local(name)?;
        if !callee.is_callable() {
            return None;
        }
        let interp = Interpreter::new(self.runtime.clone());
        Some(interp.call_value(&callee, args, kwargs, Span::default()))
    }

    fn construct(
        &self,
        name: &str,
        args: Vec<Value>,
        kwargs: IndexMap<String, Value>,
    ) -> Option<EvalResult> {
        let class = match self.globals.get_local(name)? {
            Value::Class(class) => Value::Class(class),
            _ => return None,
        };
        let interp = Interpreter::new(self.runtime.clone());
        Some(interp.call_value(&class, args, kwargs, Span::default()))
    }

    fn get_attribute(&self, handle: &Value, name: &str) -> Option<Value> {
        lookup_member(handle, name)
    }
}

/// Calls `name` on `receiver`, evaluating in the receiver's own unit.
/// `None` if the receiver has no such callable member.
pub fn call_method(
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
    kwargs: IndexMap<String, Value>,
) -> Option<EvalResult> {
    let method = lookup_member(receiver, name)?;
    if !method.is_callable() {
        return None;
    }
    let unit = method.owning_unit().or_else(|| receiver.owning_unit())?;
    let interp = Interpreter::new(unit);
    Some(interp.call_value(&method, args, kwargs, Span::default()))
}
