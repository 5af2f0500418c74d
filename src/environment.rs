//! # Execution Environment
//!
//! Loads one source unit as a fresh, uniquely named runtime unit for the
//! duration of one action, with its standard streams redirected to private
//! buffers.
//!
//! ## Guarantees
//!
//! - **Fresh per load**: every `run_isolated` call executes the file again
//!   under a new identity, so module-level state never carries over.
//! - **Scoped identity**: the identity is registered only while the load is
//!   active; a drop guard removes it on every exit path.
//! - **Transparent patching**: staged mocks are applied to a loaded unit
//!   after its top-level code ran and removed before the load ends.

use indexmap::IndexSet;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::errors::{Result, VerdictError};
use crate::mocking::StagedMock;
use crate::script::atoms::{build_default_atom_registry, AtomRegistry};
use crate::script::scope::Scope;
use crate::script::value::Class;
use crate::script::unit::{execute_module, StreamGuard};
use crate::script::{parse, CapturedOutput, Module, Raised, SourceContext, UnitOptions};
use crate::script::{UnitRuntime, Value};

// ============================================================================
// UNIT REGISTRY
// ============================================================================

type UnitRegistry = Rc<RefCell<IndexSet<String>>>;

/// Holds one identity in the registry until dropped.
struct UnitRegistration {
    registry: UnitRegistry,
    identity: String,
}

impl UnitRegistration {
    fn register(registry: &UnitRegistry, identity: String) -> Self {
        registry.borrow_mut().insert(identity.clone());
        debug!(identity = %identity, "unit registered");
        Self {
            registry: registry.clone(),
            identity,
        }
    }
}

impl Drop for UnitRegistration {
    fn drop(&mut self) {
        self.registry.borrow_mut().shift_remove(&self.identity);
        debug!(identity = %self.identity, "unit unloaded");
    }
}

/// A unit that finished its top-level code, with its streams still redirected.
struct LoadedUnit {
    module: Rc<Module>,
    init_error: Option<Raised>,
    streams: StreamGuard,
    _registration: UnitRegistration,
}

/// Result of running a unit's top-level code as the action itself.
pub struct ScriptRun {
    pub module: Rc<Module>,
    pub exception: Option<Raised>,
    pub output: CapturedOutput,
}

// ============================================================================
// PATCHING
// ============================================================================

/// Restores patched globals of one module when dropped.
struct PatchGuard {
    globals: Rc<Scope>,
    saved: Vec<(String, Option<Value>)>,
}

impl Drop for PatchGuard {
    fn drop(&mut self) {
        for (name, previous) in self.saved.drain(..).rev() {
            match previous {
                Some(value) => self.globals.define(name, value),
                None => {
                    self.globals.remove(&name);
                }
            }
        }
    }
}

// ============================================================================
// EXECUTION ENVIRONMENT
// ============================================================================

pub struct ExecutionEnvironment {
    path: PathBuf,
    options: UnitOptions,
    atoms: AtomRegistry,
    units: UnitRegistry,
    /// Loads made since the last release.
    recent: RefCell<Vec<Rc<Module>>>,
    /// Loads that own a value saved in the execution context.
    retained: RefCell<Vec<Rc<Module>>>,
    mocks: RefCell<Vec<StagedMock>>,
}

impl ExecutionEnvironment {
    /// Binds an environment to one source location. Nothing is read yet.
    pub fn prepare(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(path = %path.display(), "environment prepared");
        Self {
            path,
            options: UnitOptions::default(),
            atoms: build_default_atom_registry(),
            units: Rc::new(RefCell::new(IndexSet::new())),
            recent: RefCell::new(Vec::new()),
            retained: RefCell::new(Vec::new()),
            mocks: RefCell::new(Vec::new()),
        }
    }

    pub fn with_options(mut self, options: UnitOptions) -> Self {
        self.options = options;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identities of the loads currently in progress.
    pub fn active_units(&self) -> Vec<String> {
        self.units.borrow().iter().cloned().collect()
    }

    /// Identities of the loads kept alive by saved values.
    pub fn retained_units(&self) -> Vec<String> {
        self.retained.borrow().iter().map(|m| m.identity.clone()).collect()
    }

    /// A built-in class such as an exception type, shared by every load.
    pub fn builtin_class(&self, name: &str) -> Option<Rc<Class>> {
        match self.atoms.get(name) {
            Some(Value::Class(class)) => Some(class.clone()),
            _ => None,
        }
    }

    /// Loads the unit, runs `body` against it and captures its output.
    ///
    /// An exception raised by the unit's top-level code is a load failure.
    pub fn run_isolated<R>(
        &self,
        stdin: Option<&str>,
        body: impl FnOnce(&Rc<Module>) -> R,
    ) -> Result<(R, CapturedOutput)> {
        let loaded = self.load(stdin)?;
        if let Some(raised) = loaded.init_error {
            let output = loaded.streams.finish();
            trace!(stdout = %output.stdout, "partial output before load failure");
            return Err(self.load_failure(format!("{} raised during initialization", raised)));
        }
        let result = {
            let _patches = self.apply_mocks(&loaded.module)?;
            body(&loaded.module)
        };
        let output = loaded.streams.finish();
        Ok((result, output))
    }

    /// Runs the unit's top-level code as the action. A raised exception is
    /// returned with whatever output was produced before it.
    pub fn run_script(&self, stdin: Option<&str>) -> Result<ScriptRun> {
        let loaded = self.load(stdin)?;
        let output = loaded.streams.finish();
        Ok(ScriptRun {
            module: loaded.module,
            exception: loaded.init_error,
            output,
        })
    }

    /// Runs `body` with the streams of the unit that owns `owner` captured.
    /// Values owned by no unit run uncaptured.
    pub fn capture_on<R>(&self, owner: &Value, body: impl FnOnce() -> R) -> Result<(R, CapturedOutput)> {
        let Some(unit) = owner.owning_unit() else {
            return Ok((body(), CapturedOutput::default()));
        };
        let streams = unit.redirect(None);
        let module = self
            .retained
            .borrow()
            .iter()
            .find(|module| Rc::ptr_eq(&module.runtime, &unit))
            .cloned();
        let result = {
            let _patches = match &module {
                Some(module) => Some(self.apply_mocks(module)?),
                None => None,
            };
            body()
        };
        Ok((result, streams.finish()))
    }

    // --- retention -----------------------------------------------------------

    /// Keeps the load that owns `value` alive for the rest of the run.
    pub fn retain_owner(&self, value: &Value) {
        let Some(unit) = value.owning_unit() else {
            return;
        };
        let mut recent = self.recent.borrow_mut();
        if let Some(index) = recent.iter().position(|m| Rc::ptr_eq(&m.runtime, &unit)) {
            let module = recent.swap_remove(index);
            trace!(identity = %module.identity, "retaining unit");
            self.retained.borrow_mut().push(module);
        }
    }

    /// Unloads every recent load nothing retained.
    pub fn release_unretained(&self) {
        for module in self.recent.borrow_mut().drain(..) {
            trace!(identity = %module.identity, "releasing unit");
            module.globals.clear();
        }
    }

    // --- mocks ---------------------------------------------------------------

    pub fn stage_mocks(&self, mocks: Vec<StagedMock>) {
        *self.mocks.borrow_mut() = mocks;
    }

    pub fn clear_mocks(&self) {
        self.mocks.borrow_mut().clear();
    }

    fn apply_mocks(&self, module: &Module) -> Result<PatchGuard> {
        let mut guard = PatchGuard {
            globals: module.globals.clone(),
            saved: Vec::new(),
        };
        for mock in self.mocks.borrow().iter() {
            let previous = module.globals.get_local(&mock.target);
            if previous.is_none() && module.runtime.builtin(&mock.target).is_none() {
                return Err(VerdictError::InvalidMock {
                    target: mock.target.clone(),
                    message: format!("'{}' is not defined in {}", mock.target, self.path.display()),
                });
            }
            trace!(target = %mock.target, unit = %module.identity, "patching");
            guard.saved.push((mock.target.clone(), previous));
            module
                .globals
                .define(mock.target.clone(), mock.instantiate(module));
        }
        Ok(guard)
    }

    // --- loading -------------------------------------------------------------

    fn next_identity(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().replace(|c: char| !c.is_alphanumeric(), "_"))
            .unwrap_or_else(|| "unit".to_string());
        format!("unit_{}_{}", stem, Uuid::new_v4().simple())
    }

    fn load_failure(&self, cause: impl Into<String>) -> VerdictError {
        VerdictError::LoadFailure {
            path: self.path.clone(),
            cause: cause.into(),
        }
    }

    fn load(&self, stdin: Option<&str>) -> Result<LoadedUnit> {
        if !self.path.is_file() {
            return Err(VerdictError::FileNotFound {
                path: self.path.clone(),
            });
        }
        let content = fs::read_to_string(&self.path).map_err(|e| VerdictError::io(&self.path, e))?;

        let identity = self.next_identity();
        let registration = UnitRegistration::register(&self.units, identity.clone());
        debug!(identity = %identity, path = %self.path.display(), "loading unit");

        let source = SourceContext::from_file(self.path.display().to_string(), content.as_str());
        let program = parse(&content, &source).map_err(|e| self.load_failure(e.to_string()))?;

        let runtime = UnitRuntime::new(identity, source, &self.atoms, &self.options);
        let streams = runtime.redirect(stdin);
        let (module, init_error) = execute_module(&runtime, &self.path, &program);
        if let Some(raised) = &init_error {
            debug!(identity = %module.identity, exception = %raised, "top-level code raised");
        }
        self.recent.borrow_mut().push(module.clone());

        Ok(LoadedUnit {
            module,
            init_error,
            streams,
            _registration: registration,
        })
    }
}

impl Drop for ExecutionEnvironment {
    fn drop(&mut self) {
        // Module globals and the closures defined in them reference each other.
        let recent = self.recent.get_mut().drain(..);
        for module in recent.chain(self.retained.get_mut().drain(..)) {
            module.globals.clear();
        }
    }
}
