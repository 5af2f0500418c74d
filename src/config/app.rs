//! Application settings for one `verdict run`.

use std::path::PathBuf;

use crate::logging::LogLevel;
use crate::orchestrator::RunOptions;
use crate::script::UnitOptions;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub solution_path: PathBuf,
    pub test_case_path: PathBuf,
    pub log_level: LogLevel,
    /// Suppress everything on stdout.
    pub quiet: bool,
    pub show_verdict: bool,
    pub stop_on_first_failure: bool,
    /// Cap on failure messages shown; 0 shows all.
    pub max_messages: usize,
    pub seed: Option<u64>,
}

impl AppConfig {
    pub fn new(solution_path: impl Into<PathBuf>, test_case_path: impl Into<PathBuf>) -> Self {
        Self {
            solution_path: solution_path.into(),
            test_case_path: test_case_path.into(),
            log_level: LogLevel::default(),
            quiet: false,
            show_verdict: true,
            stop_on_first_failure: false,
            max_messages: 0,
            seed: None,
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            stop_on_first_failure: self.stop_on_first_failure,
            unit: UnitOptions {
                seed: self.seed,
                ..UnitOptions::default()
            },
        }
    }
}
