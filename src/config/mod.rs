//! Configuration: the typed test-case model and the application settings
//! assembled by the CLI.

pub mod app;
pub mod test_case;

pub use app::AppConfig;
pub use test_case::{
    Check, CheckSpec, ExpectSpec, Expectation, MockSpec, PerformSpec, Target, TestCase, TestType,
};
