//! # Verdict
//!
//! A declarative test-execution engine. A test case (JSON or YAML) names
//! actions to perform against a script unit and assertions to evaluate on
//! what each action produced. Every action loads the unit fresh, so no
//! state leaks between checks except through the execution context.
//!
//! ## Module Structure
//!
//! - **`config`**: test-case model, validation and application settings
//! - **`environment`**: isolated loading, stream capture and patching
//! - **`actions`, `assertions`**: named handlers in explicit registries
//! - **`mocking`**: behavior patches and call recording
//! - **`orchestrator`**: the setup/checks/teardown state machine
//! - **`formatter`**: failure messages from templates
//! - **`script`**: the hosted unit language
//! - **`cli`**: the `verdict` command

pub mod actions;
pub mod assertions;
pub mod cli;
pub mod config;
pub mod context;
pub mod environment;
pub mod errors;
pub mod formatter;
pub mod logging;
pub mod mocking;
pub mod orchestrator;
pub mod outcome;
pub mod script;

pub use crate::actions::{Action, ActionRegistry};
pub use crate::assertions::{Assertion, AssertionRegistry};
pub use crate::config::{AppConfig, TestCase};
pub use crate::context::ExecutionContext;
pub use crate::environment::ExecutionEnvironment;
pub use crate::errors::{Result, VerdictError};
pub use crate::orchestrator::{CheckResult, Orchestrator, RunOptions, RunPhase, RunReport};
pub use crate::outcome::{Completion, Outcome};
