//! # Core Actions
//!
//! ## Actions Provided
//!
//! - **Loading**: `run_script`
//! - **Invocation**: `call_function`, `create_object`, `call_method`
//! - **Inspection**: `get_attribute`, `read_file_content`

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use std::fs;
use std::io::ErrorKind;

use crate::actions::{Action, ActionRegistry};
use crate::config::PerformSpec;
use crate::context::ExecutionContext;
use crate::environment::ExecutionEnvironment;
use crate::errors::{Result, VerdictError};
use crate::outcome::{Completion, Outcome};
use crate::script::convert::from_json;
use crate::script::eval::lookup_member;
use crate::script::exceptions::{new_exception, Raised};
use crate::script::unit::call_method;
use crate::script::{TargetUnit, Value};

// ============================================================================
// PARAMETER HELPERS
// ============================================================================

fn required_target(spec: &PerformSpec, what: &str) -> Result<String> {
    spec.target_name()
        .map(str::to_string)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| VerdictError::invalid_params(&spec.action, format!("{} is required as `target`", what)))
}

fn optional_string(spec: &PerformSpec, key: &str) -> Result<Option<String>> {
    match spec.param(key) {
        None | Some(Json::Null) => Ok(None),
        Some(Json::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(VerdictError::invalid_params(
            &spec.action,
            format!("`{}` must be a string, got {}", key, other),
        )),
    }
}

/// Positional and keyword arguments from `params.args` / `params.kwargs`.
#[derive(Debug, Clone, Default)]
struct Arguments {
    args: Vec<Json>,
    kwargs: Map<String, Json>,
}

impl Arguments {
    fn from_spec(spec: &PerformSpec) -> Result<Self> {
        let args = match spec.param("args") {
            None | Some(Json::Null) => Vec::new(),
            Some(Json::Array(items)) => items.clone(),
            Some(other) => {
                return Err(VerdictError::invalid_params(
                    &spec.action,
                    format!("`args` must be a list, got {}", other),
                ))
            }
        };
        let kwargs = match spec.param("kwargs") {
            None | Some(Json::Null) => Map::new(),
            Some(Json::Object(map)) => map.clone(),
            Some(other) => {
                return Err(VerdictError::invalid_params(
                    &spec.action,
                    format!("`kwargs` must be an object, got {}", other),
                ))
            }
        };
        Ok(Self { args, kwargs })
    }

    /// Fresh script values for one call.
    fn to_values(&self) -> (Vec<Value>, IndexMap<String, Value>) {
        let args = self.args.iter().map(from_json).collect();
        let kwargs = self
            .kwargs
            .iter()
            .map(|(k, v)| (k.clone(), from_json(v)))
            .collect();
        (args, kwargs)
    }
}

fn object_ref(spec: &PerformSpec) -> Result<String> {
    spec.object_ref()
        .map(str::to_string)
        .ok_or_else(|| VerdictError::invalid_params(&spec.action, "`params.object_ref` is required"))
}

// ============================================================================
// RUN SCRIPT
// ============================================================================

/// Executes the unit's top-level code with optional `params.stdin`.
///
/// The one dual-channel action: an uncaught exception is captured together
/// with the output produced before it.
pub struct RunScript {
    stdin: Option<String>,
}

impl RunScript {
    pub fn create(spec: &PerformSpec) -> Result<Box<dyn Action>> {
        Ok(Box::new(Self {
            stdin: optional_string(spec, "stdin")?,
        }))
    }
}

impl Action for RunScript {
    fn name(&self) -> &'static str {
        "run_script"
    }

    fn execute(&self, env: &ExecutionEnvironment, _context: &mut ExecutionContext) -> Result<Outcome> {
        let run = env.run_script(self.stdin.as_deref())?;
        let completion = match run.exception {
            Some(raised) => Completion::Exception(raised),
            None => Completion::Empty,
        };
        Ok(Outcome {
            completion,
            unit: Some(Value::Module(run.module)),
            ..Outcome::default()
        }
        .with_output(run.output))
    }
}

// ============================================================================
// CALL FUNCTION / CREATE OBJECT
// ============================================================================

/// Calls a top-level function of a freshly loaded unit.
pub struct CallFunction {
    function: String,
    arguments: Arguments,
}

impl CallFunction {
    pub fn create(spec: &PerformSpec) -> Result<Box<dyn Action>> {
        Ok(Box::new(Self {
            function: required_target(spec, "function name")?,
            arguments: Arguments::from_spec(spec)?,
        }))
    }
}

impl Action for CallFunction {
    fn name(&self) -> &'static str {
        "call_function"
    }

    fn execute(&self, env: &ExecutionEnvironment, _context: &mut ExecutionContext) -> Result<Outcome> {
        let (args, kwargs) = self.arguments.to_values();
        let (result, output) =
            env.run_isolated(None, |module| module.invoke(&self.function, args, kwargs))?;
        let result = result.ok_or_else(|| VerdictError::MissingMember {
            kind: "function",
            name: self.function.clone(),
            owner: env.path().display().to_string(),
        })?;
        Ok(Outcome::from_result(result).with_output(output))
    }
}

/// Instantiates a class of a freshly loaded unit.
pub struct CreateObject {
    class: String,
    arguments: Arguments,
}

impl CreateObject {
    pub fn create(spec: &PerformSpec) -> Result<Box<dyn Action>> {
        Ok(Box::new(Self {
            class: required_target(spec, "class name")?,
            arguments: Arguments::from_spec(spec)?,
        }))
    }
}

impl Action for CreateObject {
    fn name(&self) -> &'static str {
        "create_object"
    }

    fn execute(&self, env: &ExecutionEnvironment, _context: &mut ExecutionContext) -> Result<Outcome> {
        let (args, kwargs) = self.arguments.to_values();
        let (result, output) =
            env.run_isolated(None, |module| module.construct(&self.class, args, kwargs))?;
        let result = result.ok_or_else(|| VerdictError::MissingMember {
            kind: "class",
            name: self.class.clone(),
            owner: env.path().display().to_string(),
        })?;
        Ok(Outcome::from_result(result).with_output(output))
    }
}

// ============================================================================
// CALL METHOD / GET ATTRIBUTE
// ============================================================================

/// Calls a method on an object saved in the execution context.
pub struct CallMethod {
    method: String,
    object_ref: String,
    arguments: Arguments,
}

impl CallMethod {
    pub fn create(spec: &PerformSpec) -> Result<Box<dyn Action>> {
        Ok(Box::new(Self {
            method: required_target(spec, "method name")?,
            object_ref: object_ref(spec)?,
            arguments: Arguments::from_spec(spec)?,
        }))
    }
}

impl Action for CallMethod {
    fn name(&self) -> &'static str {
        "call_method"
    }

    fn execute(&self, env: &ExecutionEnvironment, context: &mut ExecutionContext) -> Result<Outcome> {
        let receiver = context.get(&self.object_ref)?;
        let (args, kwargs) = self.arguments.to_values();
        let (result, output) =
            env.capture_on(&receiver, || call_method(&receiver, &self.method, args, kwargs))?;
        let result = result.ok_or_else(|| VerdictError::MissingMember {
            kind: "method",
            name: self.method.clone(),
            owner: format!("'{}' ({})", self.object_ref, receiver.type_name()),
        })?;
        Ok(Outcome::from_result(result).with_output(output))
    }
}

/// Reads an attribute of an object saved in the execution context.
pub struct GetAttribute {
    attribute: String,
    object_ref: String,
}

impl GetAttribute {
    pub fn create(spec: &PerformSpec) -> Result<Box<dyn Action>> {
        Ok(Box::new(Self {
            attribute: required_target(spec, "attribute name")?,
            object_ref: object_ref(spec)?,
        }))
    }
}

impl Action for GetAttribute {
    fn name(&self) -> &'static str {
        "get_attribute"
    }

    fn execute(&self, env: &ExecutionEnvironment, context: &mut ExecutionContext) -> Result<Outcome> {
        let receiver = context.get(&self.object_ref)?;
        let (value, output) = env.capture_on(&receiver, || match &receiver {
            Value::Module(module) => module.get_attribute(&receiver, &self.attribute),
            other => lookup_member(other, &self.attribute),
        })?;
        let value = value.ok_or_else(|| VerdictError::MissingMember {
            kind: "attribute",
            name: self.attribute.clone(),
            owner: format!("'{}' ({})", self.object_ref, receiver.type_name()),
        })?;
        Ok(Outcome::value(value).with_output(output))
    }
}

// ============================================================================
// READ FILE CONTENT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Utf8,
    Ascii,
    Latin1,
}

impl Encoding {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "ascii" | "us-ascii" => Some(Self::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Some(Self::Latin1),
            _ => None,
        }
    }

    fn decode(self, bytes: Vec<u8>) -> std::result::Result<String, String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes).map_err(|e| {
                let position = e.utf8_error().valid_up_to();
                format!("'utf-8' codec can't decode byte at position {}", position)
            }),
            Self::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(position) => Err(format!(
                    "'ascii' codec can't decode byte 0x{:02x} in position {}",
                    bytes[position], position
                )),
                None => Ok(bytes.into_iter().map(char::from).collect()),
            },
            Self::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

/// Reads a text file; read and decode errors are captured as exceptions.
pub struct ReadFileContent {
    path: String,
    encoding: Encoding,
}

impl ReadFileContent {
    pub fn create(spec: &PerformSpec) -> Result<Box<dyn Action>> {
        let path = match spec.target_name() {
            Some(path) => path.to_string(),
            None => optional_string(spec, "path")?.ok_or_else(|| {
                VerdictError::invalid_params(&spec.action, "a file path is required as `target`")
            })?,
        };
        let encoding_name = optional_string(spec, "encoding")?.unwrap_or_else(|| "utf-8".into());
        let encoding = Encoding::parse(&encoding_name).ok_or_else(|| {
            VerdictError::invalid_params(&spec.action, format!("unsupported encoding '{}'", encoding_name))
        })?;
        Ok(Box::new(Self { path, encoding }))
    }

    fn raise(env: &ExecutionEnvironment, class_name: &str, message: String) -> Raised {
        match env
            .builtin_class(class_name)
            .or_else(|| env.builtin_class("Exception"))
        {
            Some(class) => Raised::new(new_exception(&class, message), None),
            None => Raised::new(Value::Str(message), None),
        }
    }
}

impl Action for ReadFileContent {
    fn name(&self) -> &'static str {
        "read_file_content"
    }

    fn execute(&self, env: &ExecutionEnvironment, _context: &mut ExecutionContext) -> Result<Outcome> {
        let result = match fs::read(&self.path) {
            Ok(bytes) => self
                .encoding
                .decode(bytes)
                .map(Value::Str)
                .map_err(|message| Self::raise(env, "ValueError", message)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Self::raise(
                env,
                "FileNotFoundError",
                format!("[Errno 2] No such file or directory: '{}'", self.path),
            )),
            Err(e) => Err(Self::raise(env, "OSError", format!("{}: '{}'", e, self.path))),
        };
        Ok(Outcome::from_result(result))
    }
}

pub fn register_core_actions(registry: &mut ActionRegistry) {
    registry.register("run_script", RunScript::create);
    registry.register("call_function", CallFunction::create);
    registry.register("create_object", CreateObject::create);
    registry.register("call_method", CallMethod::create);
    registry.register("get_attribute", GetAttribute::create);
    registry.register("read_file_content", ReadFileContent::create);
}
