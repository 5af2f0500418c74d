//! # Actions
//!
//! An action is one named operation performed against the unit under test.
//! Every action yields exactly one `Outcome`.
//!
//! ## Module Structure
//!
//! - **`core_actions`**: `run_script`, `call_function`, `create_object`,
//!   `call_method`, `get_attribute`, `read_file_content`
//!
//! ## Design Principles
//!
//! - **Compiled Up Front**: factories validate parameters when the run
//!   starts, so a bad test case fails before any code executes
//! - **Exceptions Are Data**: anything the tested code raises is captured
//!   into the outcome; only harness problems surface as `VerdictError`
//! - **Shareable Registry**: the registry holds plain function pointers and
//!   is safe to share across concurrent runs

use indexmap::IndexMap;
use tracing::debug;

use crate::config::PerformSpec;
use crate::context::ExecutionContext;
use crate::environment::ExecutionEnvironment;
use crate::errors::{Result, VerdictError};
use crate::outcome::Outcome;

pub mod core_actions;

// ============================================================================
// CORE TYPES
// ============================================================================

pub trait Action {
    fn name(&self) -> &'static str;

    fn execute(&self, env: &ExecutionEnvironment, context: &mut ExecutionContext) -> Result<Outcome>;
}

/// Builds an action from its declaration, validating its parameters.
pub type ActionFactory = fn(&PerformSpec) -> Result<Box<dyn Action>>;

/// An action ready to run, carrying the `save_as` of its declaration.
pub struct PreparedAction {
    action: Box<dyn Action>,
    save_as: Option<String>,
}

impl PreparedAction {
    pub fn name(&self) -> &'static str {
        self.action.name()
    }

    /// Executes the action and stores its usable value under `save_as`.
    ///
    /// Raised outcomes store nothing. Units loaded by the action stay loaded
    /// only when they own the saved value.
    pub fn run(&self, env: &ExecutionEnvironment, context: &mut ExecutionContext) -> Result<Outcome> {
        let result = self.action.execute(env, context);
        if let (Ok(outcome), Some(name)) = (&result, &self.save_as) {
            if outcome.exception().is_none() {
                if let Some(value) = outcome.saveable() {
                    env.retain_owner(&value);
                    context.save(name.clone(), value);
                }
            }
        }
        env.release_unretained();
        result
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Clone, Default)]
pub struct ActionRegistry {
    factories: IndexMap<String, ActionFactory>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the six core actions.
    pub fn with_core_actions() -> Self {
        let mut registry = Self::new();
        core_actions::register_core_actions(&mut registry);
        registry
    }

    pub fn register(&mut self, name: &str, factory: ActionFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create(&self, spec: &PerformSpec) -> Result<PreparedAction> {
        let name = spec.action.trim();
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| VerdictError::UnknownAction {
                name: name.to_string(),
            })?;
        debug!(action = name, "action compiled");
        Ok(PreparedAction {
            action: factory(spec)?,
            save_as: spec.save_as.clone(),
        })
    }
}
