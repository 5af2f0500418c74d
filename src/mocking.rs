//! # Behavior Patching
//!
//! Replaces a global of the tested unit (a user function or a built-in atom)
//! with a recording stand-in for the duration of one check.
//!
//! A `MockPlan` is compiled once from the test case and holds only JSON, so
//! it can be shared freely. Staging a plan produces the per-check
//! `StagedMock`s handed to the environment, plus the `MockRecorder` the
//! outcome's `mock_calls` are read from.

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::trace;

use crate::config::MockSpec;
use crate::errors::{Result, VerdictError};
use crate::script::convert::from_json;
use crate::script::exceptions::{new_exception, Raised};
use crate::script::value::{Class, Instance, NativeFunction};
use crate::script::{EvalResult, Module, Value};

pub type MockCalls = IndexMap<String, Vec<Vec<Value>>>;

// ============================================================================
// BEHAVIORS
// ============================================================================

/// One response of a mock to one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Return(Json),
    Raise { type_name: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Every call returns the same value.
    Returns(Json),
    /// Calls walk the replies in order; the last one repeats.
    SideEffect(Vec<Reply>),
    /// Every call returns the same object with fixed attributes and mocked methods.
    ReturnsObject {
        attributes: IndexMap<String, Json>,
        methods: IndexMap<String, Vec<Reply>>,
    },
}

const BEHAVIOR_KEYS: [&str; 3] = ["return_value", "side_effect", "return_object"];

fn invalid(target: &str, message: impl Into<String>) -> VerdictError {
    VerdictError::invalid_params(&format!("mock '{}'", target), message)
}

impl MockBehavior {
    pub fn compile(target: &str, behavior: &Map<String, Json>) -> Result<Self> {
        let present: Vec<&str> = BEHAVIOR_KEYS
            .iter()
            .copied()
            .filter(|key| behavior.contains_key(*key))
            .collect();
        let [key] = present.as_slice() else {
            return Err(invalid(
                target,
                format!(
                    "behavior must contain exactly one of return_value, side_effect, return_object; found {:?}",
                    behavior.keys().collect::<Vec<_>>()
                ),
            ));
        };
        let body = &behavior[*key];
        match *key {
            "return_value" => Ok(Self::Returns(body.clone())),
            "side_effect" => Ok(Self::SideEffect(compile_side_effect(target, body)?)),
            _ => compile_return_object(target, body),
        }
    }
}

fn compile_raise(target: &str, spec: &Json) -> Result<Reply> {
    let Json::Object(spec) = spec else {
        return Err(invalid(target, "raises_exception must be an object"));
    };
    let field = |name: &str, default: &str| {
        spec.get(name)
            .and_then(Json::as_str)
            .unwrap_or(default)
            .to_string()
    };
    Ok(Reply::Raise {
        type_name: field("type", "Exception"),
        message: field("message", "Mock exception"),
    })
}

fn compile_reply(target: &str, item: &Json) -> Result<Reply> {
    match item {
        Json::Object(map) if map.contains_key("return_value") => {
            Ok(Reply::Return(map["return_value"].clone()))
        }
        Json::Object(map) if map.contains_key("raises_exception") => {
            compile_raise(target, &map["raises_exception"])
        }
        other => Err(invalid(target, format!("unsupported sequence item: {}", other))),
    }
}

fn compile_side_effect(target: &str, spec: &Json) -> Result<Vec<Reply>> {
    match spec {
        Json::Object(map) if map.contains_key("raises_exception") => {
            Ok(vec![compile_raise(target, &map["raises_exception"])?])
        }
        Json::Object(map) => match map.get("sequence") {
            Some(Json::Array(items)) if !items.is_empty() => items
                .iter()
                .map(|item| compile_reply(target, item))
                .collect(),
            Some(_) => Err(invalid(target, "sequence must be a non-empty list")),
            None => Err(invalid(target, format!("unsupported side_effect configuration: {}", spec))),
        },
        other => Err(invalid(target, format!("unsupported side_effect configuration: {}", other))),
    }
}

fn compile_return_object(target: &str, spec: &Json) -> Result<MockBehavior> {
    let Json::Object(spec) = spec else {
        return Err(invalid(target, "return_object must be an object"));
    };
    let attributes = match spec.get("attributes") {
        None => IndexMap::new(),
        Some(Json::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(_) => return Err(invalid(target, "return_object.attributes must be an object")),
    };
    let mut methods = IndexMap::new();
    match spec.get("methods") {
        None => {}
        Some(Json::Object(map)) => {
            for (name, config) in map {
                let replies = match config {
                    Json::Object(c) if c.contains_key("return_value") => {
                        vec![Reply::Return(c["return_value"].clone())]
                    }
                    Json::Object(c) if c.contains_key("side_effect") => {
                        compile_side_effect(target, &c["side_effect"])?
                    }
                    _ => {
                        return Err(invalid(
                            target,
                            format!("method '{}' needs return_value or side_effect", name),
                        ))
                    }
                };
                methods.insert(name.clone(), replies);
            }
        }
        Some(_) => return Err(invalid(target, "return_object.methods must be an object")),
    }
    Ok(MockBehavior::ReturnsObject {
        attributes,
        methods,
    })
}

// ============================================================================
// PLAN & RECORDER
// ============================================================================

#[derive(Debug, Clone)]
pub struct CompiledMock {
    pub target: String,
    /// Key under which calls are recorded: `save_as`, else the target.
    pub name: String,
    pub behavior: MockBehavior,
}

/// The mocks declared by one check.
#[derive(Debug, Clone, Default)]
pub struct MockPlan {
    mocks: Vec<CompiledMock>,
}

impl MockPlan {
    pub fn compile(specs: &[MockSpec]) -> Result<Self> {
        let mocks = specs
            .iter()
            .map(|spec| {
                Ok(CompiledMock {
                    target: spec.target.clone(),
                    name: spec.save_as.clone().unwrap_or_else(|| spec.target.clone()),
                    behavior: MockBehavior::compile(&spec.target, &spec.behavior)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { mocks })
    }

    pub fn is_empty(&self) -> bool {
        self.mocks.is_empty()
    }

    /// Fresh stand-ins for one check, all recording into one recorder.
    pub fn stage(&self) -> (Vec<StagedMock>, MockRecorder) {
        let recorder = MockRecorder::default();
        let staged = self
            .mocks
            .iter()
            .map(|mock| {
                recorder.track(&mock.name);
                if let MockBehavior::ReturnsObject { methods, .. } = &mock.behavior {
                    for method in methods.keys() {
                        recorder.track(&format!("{}.{}", mock.name, method));
                    }
                }
                StagedMock {
                    target: mock.target.clone(),
                    mock: mock.clone(),
                    recorder: recorder.clone(),
                }
            })
            .collect();
        (staged, recorder)
    }
}

/// Shared log of every call made to the staged mocks of one check.
#[derive(Clone, Default)]
pub struct MockRecorder {
    calls: Rc<RefCell<MockCalls>>,
}

impl MockRecorder {
    fn track(&self, name: &str) {
        self.calls.borrow_mut().entry(name.to_string()).or_default();
    }

    fn record(&self, name: &str, args: &[Value]) {
        trace!(mock = name, args = args.len(), "mock called");
        self.calls
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(args.to_vec());
    }

    pub fn snapshot(&self) -> MockCalls {
        self.calls.borrow().clone()
    }
}

// ============================================================================
// STAGED MOCKS
// ============================================================================

/// A mock ready to be patched into a loaded unit.
pub struct StagedMock {
    pub target: String,
    mock: CompiledMock,
    recorder: MockRecorder,
}

impl StagedMock {
    /// Builds the stand-in value patched over `target` in `module`.
    pub fn instantiate(&self, module: &Module) -> Value {
        let name = self.mock.name.clone();
        match &self.mock.behavior {
            MockBehavior::Returns(json) => {
                responder(&name, &self.recorder, module, vec![Reply::Return(json.clone())])
            }
            MockBehavior::SideEffect(replies) => {
                responder(&name, &self.recorder, module, replies.clone())
            }
            MockBehavior::ReturnsObject {
                attributes,
                methods,
            } => {
                let object = mock_object(&name, &self.recorder, module, attributes, methods);
                let recorder = self.recorder.clone();
                Value::Native(Rc::new(NativeFunction::new(name.clone(), move |_, args| {
                    recorder.record(&name, &args);
                    Ok(object.clone())
                })))
            }
        }
    }
}

fn mock_object(
    name: &str,
    recorder: &MockRecorder,
    module: &Module,
    attributes: &IndexMap<String, Json>,
    methods: &IndexMap<String, Vec<Reply>>,
) -> Value {
    let class = Rc::new(Class {
        unit: Some(module.runtime.clone()),
        ..Class::new("Mock", None)
    });
    let instance = Instance::new(class);
    {
        let mut fields = instance.fields.borrow_mut();
        for (key, value) in attributes {
            fields.insert(key.clone(), from_json(value));
        }
        for (method, replies) in methods {
            let key = format!("{}.{}", name, method);
            fields.insert(method.clone(), responder(&key, recorder, module, replies.clone()));
        }
    }
    Value::Instance(Rc::new(instance))
}

/// A native callable answering with `replies` in order, repeating the last.
fn responder(name: &str, recorder: &MockRecorder, module: &Module, replies: Vec<Reply>) -> Value {
    let key = name.to_string();
    let recorder = recorder.clone();
    let module_globals = module.globals.clone();
    let runtime = module.runtime.clone();
    let cursor = Cell::new(0usize);
    Value::Native(Rc::new(NativeFunction::new(name, move |ctx, args| -> EvalResult {
        recorder.record(&key, &args);
        let index = cursor.get();
        cursor.set(index + 1);
        let Some(reply) = replies.get(index.min(replies.len().saturating_sub(1))) else {
            return Ok(Value::Nil);
        };
        match reply {
            Reply::Return(json) => Ok(from_json(json)),
            Reply::Raise { type_name, message } => {
                let class = match module_globals.get_local(type_name) {
                    Some(Value::Class(class)) if class.is_exception() => Some(class),
                    _ => runtime.exception_class(type_name),
                };
                let exception = match class {
                    Some(class) => new_exception(&class, message.clone()),
                    None => Value::Str(message.clone()),
                };
                Err(Raised::new(exception, Some(ctx.span)))
            }
        }
    })))
}
