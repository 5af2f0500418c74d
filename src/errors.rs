//! Verdict Error Handling
//!
//! One error type for the whole harness. Failures of *tested code* are never
//! represented here: they are script exceptions captured into an `Outcome`.
//! Everything in this module is a problem with the harness itself, its
//! configuration, or the files it was pointed at.
//!
//! ## Categories
//!
//! - **Configuration**: the test case is malformed or names unknown handlers
//! - **Load**: the target unit is missing or fails to initialize
//! - **Harness**: a check asked for something the loaded unit does not have
//! - **Io**: reading or writing a file the harness itself manages failed

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VerdictError>;

#[derive(Debug, Error, Diagnostic)]
pub enum VerdictError {
    #[error("file not found: {}", path.display())]
    #[diagnostic(code(verdict::load::file_not_found))]
    FileNotFound { path: PathBuf },

    #[error("malformed test case {}: {message}", path.display())]
    #[diagnostic(
        code(verdict::configuration::malformed_test_case),
        help("test cases are JSON (or YAML) objects with `test_id`, `test_name` and `checks`")
    )]
    MalformedTestCase { path: PathBuf, message: String },

    #[error("invalid test case: {message}")]
    #[diagnostic(code(verdict::configuration::invalid_test_case))]
    InvalidTestCase { message: String },

    #[error("unknown action '{name}'")]
    #[diagnostic(code(verdict::configuration::unknown_action))]
    UnknownAction { name: String },

    #[error("unknown assertion '{name}'")]
    #[diagnostic(code(verdict::configuration::unknown_assertion))]
    UnknownAssertion { name: String },

    #[error("invalid parameters for '{handler}': {message}")]
    #[diagnostic(code(verdict::configuration::invalid_params))]
    InvalidParams { handler: String, message: String },

    #[error("failed to load {}: {cause}", path.display())]
    #[diagnostic(code(verdict::load::load_failure))]
    LoadFailure { path: PathBuf, cause: String },

    #[error("object reference '{name}' not found in execution context")]
    #[diagnostic(
        code(verdict::harness::missing_reference),
        help("save the object in an earlier check with `save_as`")
    )]
    MissingReference { name: String },

    #[error("{kind} '{name}' not found in {owner}")]
    #[diagnostic(code(verdict::harness::missing_member))]
    MissingMember {
        kind: &'static str,
        name: String,
        owner: String,
    },

    #[error("cannot mock '{target}': {message}")]
    #[diagnostic(code(verdict::harness::invalid_mock))]
    InvalidMock { target: String, message: String },

    #[error("i/o error on {}: {source}", path.display())]
    #[diagnostic(code(verdict::io::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Broad classification used for exit codes and abort decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Load,
    Harness,
    Io,
}

impl VerdictError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedTestCase { .. }
            | Self::InvalidTestCase { .. }
            | Self::UnknownAction { .. }
            | Self::UnknownAssertion { .. }
            | Self::InvalidParams { .. } => ErrorCategory::Configuration,

            Self::FileNotFound { .. } | Self::LoadFailure { .. } => ErrorCategory::Load,

            Self::MissingReference { .. }
            | Self::MissingMember { .. }
            | Self::InvalidMock { .. } => ErrorCategory::Harness,

            Self::Io { .. } => ErrorCategory::Io,
        }
    }

    /// Errors that end a whole run no matter where they occur.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FileNotFound { .. })
            || self.category() == ErrorCategory::Configuration
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. } => 2,
            _ if self.category() == ErrorCategory::Configuration => 3,
            _ => 10,
        }
    }

    pub fn invalid_params(handler: &str, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            handler: handler.to_string(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::FileNotFound { path };
        }
        Self::Io { path, source }
    }
}

/// Prints an error as a full miette report on stderr.
pub fn print_error(error: VerdictError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_category() {
        let missing = VerdictError::FileNotFound {
            path: PathBuf::from("nope.vs"),
        };
        assert_eq!(missing.exit_code(), 2);
        assert_eq!(
            VerdictError::UnknownAction { name: "x".into() }.exit_code(),
            3
        );
        assert_eq!(
            VerdictError::MissingReference { name: "calc".into() }.exit_code(),
            10
        );
    }

    #[test]
    fn test_not_found_io_becomes_file_not_found() {
        let err = VerdictError::io(
            "a.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, VerdictError::FileNotFound { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_diagnostic_codes_are_namespaced() {
        let err = VerdictError::UnknownAssertion { name: "nope".into() };
        let code = err.code().map(|c| c.to_string());
        assert_eq!(
            code.as_deref(),
            Some("verdict::configuration::unknown_assertion")
        );
    }
}
