//! # Unit Scripts
//!
//! The interpretable source units the engine loads and tests: a small
//! s-expression language with closures, classes and exceptions.
//!
//! ## Module Structure
//!
//! - **`grammar.pest`, `parser`, `ast`**: source text to spanned AST
//! - **`error`**: parse diagnostics (`miette`)
//! - **`value`, `scope`, `exceptions`**: the runtime data model
//! - **`eval`**: the evaluator
//! - **`atoms`**: built-in operations
//! - **`unit`**: per-load runtime state and the `TargetUnit` seam
//! - **`convert`**: JSON interop for test-case data

pub mod ast;
pub mod atoms;
pub mod convert;
pub mod error;
pub mod eval;
pub mod exceptions;
pub mod parser;
pub mod scope;
pub mod unit;
pub mod value;

pub use error::{ScriptError, SourceContext};
pub use exceptions::Raised;
pub use parser::parse;
pub use unit::{CapturedOutput, TargetUnit, UnitOptions, UnitRuntime};
pub use value::{EvalResult, Module, Value};
