//! # Test-Case Model
//!
//! A test case is read from JSON (or YAML) straight into these structures,
//! then `validate` enforces the field-level constraints serde cannot express.
//! The engine never re-validates shape after this point.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::errors::{Result, VerdictError};

fn default_test_type() -> TestType {
    TestType::General
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    General,
    Api,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub test_id: i64,
    pub test_name: String,
    pub description: String,
    #[serde(default = "default_test_type")]
    pub test_type: TestType,
    #[serde(default)]
    pub setup_actions: Vec<PerformSpec>,
    pub checks: Vec<Check>,
    #[serde(default)]
    pub teardown_actions: Vec<PerformSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub check_id: i64,
    pub name_for_output: String,
    /// Failure message template with `{placeholder}`s.
    pub reason_for_output: String,
    pub explain_for_error: String,
    #[serde(default)]
    pub is_critical: bool,
    pub spec: CheckSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSpec {
    pub perform: PerformSpec,
    #[serde(default)]
    pub expect: Expectation,
    #[serde(default)]
    pub mocks: Vec<MockSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Name(String),
    Descriptor(Map<String, Json>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformSpec {
    pub action: String,
    #[serde(default)]
    pub target: Option<Target>,
    #[serde(default)]
    pub params: Option<Map<String, Json>>,
    #[serde(default)]
    pub save_as: Option<String>,
}

impl PerformSpec {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            target: None,
            params: None,
            save_as: None,
        }
    }

    pub fn param(&self, key: &str) -> Option<&Json> {
        self.params.as_ref().and_then(|params| params.get(key))
    }

    /// The target name: the string form, or a descriptor's `name`.
    pub fn target_name(&self) -> Option<&str> {
        match self.target.as_ref()? {
            Target::Name(name) => Some(name.as_str()),
            Target::Descriptor(map) => map.get("name").and_then(Json::as_str),
        }
    }

    /// `params.object_ref`, falling back to the target descriptor's.
    pub fn object_ref(&self) -> Option<&str> {
        self.param("object_ref").and_then(Json::as_str).or_else(|| {
            match self.target.as_ref()? {
                Target::Descriptor(map) => map.get("object_ref").and_then(Json::as_str),
                Target::Name(_) => None,
            }
        })
    }
}

/// Outcome field name to expectation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Expectation {
    #[serde(default)]
    pub return_value: Option<ExpectSpec>,
    #[serde(default)]
    pub stdout: Option<ExpectSpec>,
    #[serde(default)]
    pub stderr: Option<ExpectSpec>,
    #[serde(default)]
    pub exception: Option<ExpectSpec>,
    #[serde(default)]
    pub mock_calls: Option<Vec<ExpectSpec>>,
}

impl Expectation {
    /// Every declared expectation with the outcome field it targets, in
    /// evaluation order.
    pub fn entries(&self) -> Vec<(&'static str, &ExpectSpec)> {
        let singles = [
            ("return_value", &self.return_value),
            ("stdout", &self.stdout),
            ("stderr", &self.stderr),
            ("exception", &self.exception),
        ];
        let mut entries: Vec<_> = singles
            .into_iter()
            .filter_map(|(field, spec)| spec.as_ref().map(|spec| (field, spec)))
            .collect();
        for spec in self.mock_calls.iter().flatten() {
            entries.push(("mock_calls", spec));
        }
        entries
    }

    /// True if some expectation accepts a captured exception.
    pub fn expects_exception(&self) -> bool {
        self.entries()
            .iter()
            .any(|(_, spec)| spec.assertion == "raises_exception")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectSpec {
    pub assertion: String,
    #[serde(default)]
    pub value: Json,
    #[serde(default)]
    pub tolerance: Option<f64>,
    #[serde(default)]
    pub target_mock: Option<String>,
}

impl ExpectSpec {
    pub fn new(assertion: impl Into<String>, value: Json) -> Self {
        Self {
            assertion: assertion.into(),
            value,
            tolerance: None,
            target_mock: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockSpec {
    #[serde(alias = "target_path")]
    pub target: String,
    pub behavior: Map<String, Json>,
    #[serde(default)]
    pub save_as: Option<String>,
}

// ============================================================================
// LOADING
// ============================================================================

impl TestCase {
    /// Reads, parses and validates a test case. YAML is chosen by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| VerdictError::io(path, e))?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let malformed = |message: String| VerdictError::MalformedTestCase {
            path: path.to_path_buf(),
            message,
        };
        let test_case: TestCase = if is_yaml {
            serde_yaml::from_str(&text).map_err(|e| malformed(e.to_string()))?
        } else {
            serde_json::from_str(&text).map_err(|e| malformed(e.to_string()))?
        };
        test_case.validate()?;
        debug!(
            test_id = test_case.test_id,
            checks = test_case.checks.len(),
            "test case loaded"
        );
        Ok(test_case)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let test_case: TestCase =
            serde_json::from_str(text).map_err(|e| VerdictError::MalformedTestCase {
                path: "<inline>".into(),
                message: e.to_string(),
            })?;
        test_case.validate()?;
        Ok(test_case)
    }

    pub fn validate(&self) -> Result<()> {
        if self.test_id <= 0 {
            return invalid("test_id must be positive");
        }
        non_empty("test_name", &self.test_name)?;
        non_empty("description", &self.description)?;
        if self.checks.is_empty() {
            return invalid("at least one check is required");
        }

        let mut seen = HashSet::new();
        for check in &self.checks {
            if check.check_id <= 0 {
                return invalid(format!("check_id must be positive, got {}", check.check_id));
            }
            if !seen.insert(check.check_id) {
                return invalid(format!("duplicate check_id {}", check.check_id));
            }
            check.validate()?;
        }
        for action in self.setup_actions.iter().chain(&self.teardown_actions) {
            action.validate()?;
        }
        Ok(())
    }
}

impl Check {
    fn validate(&self) -> Result<()> {
        let field = |name: &str| format!("check {}: {}", self.check_id, name);
        non_empty(&field("name_for_output"), &self.name_for_output)?;
        non_empty(&field("reason_for_output"), &self.reason_for_output)?;
        non_empty(&field("explain_for_error"), &self.explain_for_error)?;
        self.spec.perform.validate()?;

        if matches!(&self.spec.expect.mock_calls, Some(calls) if calls.is_empty()) {
            return invalid(field("mock_calls list cannot be empty if provided"));
        }
        for (_, expect) in self.spec.expect.entries() {
            non_empty(&field("assertion"), &expect.assertion)?;
            if matches!(expect.tolerance, Some(t) if t < 0.0 || t.is_nan()) {
                return invalid(field("tolerance must be non-negative"));
            }
            if let Some(target) = &expect.target_mock {
                non_empty(&field("target_mock"), target)?;
            }
        }
        for mock in &self.spec.mocks {
            non_empty(&field("mock target"), &mock.target)?;
            if mock.behavior.is_empty() {
                return invalid(field("mock behavior cannot be empty"));
            }
            if let Some(name) = &mock.save_as {
                non_empty(&field("mock save_as"), name)?;
            }
        }
        Ok(())
    }
}

impl PerformSpec {
    fn validate(&self) -> Result<()> {
        non_empty("action", &self.action)?;
        if let Some(name) = &self.save_as {
            non_empty("save_as", name)?;
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Result<()> {
    Err(VerdictError::InvalidTestCase {
        message: message.into(),
    })
}

fn non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return invalid(format!("{} cannot be empty", field));
    }
    Ok(())
}
