//! Defines the command-line arguments and subcommands for the Verdict CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogLevel;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "verdict",
    version,
    about = "Runs declarative JSON test cases against script units in isolation."
)]
pub struct VerdictArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one test case against one solution.
    Run {
        /// The solution unit under test.
        #[arg(required = true)]
        solution: PathBuf,
        /// The test case (.json, .yaml or .yml).
        #[arg(required = true)]
        test_case: PathBuf,
        /// Log level written to stderr.
        #[arg(long, value_enum, default_value = "error")]
        log: LogLevel,
        /// Print nothing on stdout.
        #[arg(short, long)]
        quiet: bool,
        /// Do not print the verdict banner.
        #[arg(long)]
        no_verdict: bool,
        /// Show at most N failure messages (0 shows all).
        #[arg(short = 'm', long, default_value_t = 0)]
        max_messages: usize,
        /// Stop at the first failed check.
        #[arg(short = 'x', long)]
        stop_on_first_failure: bool,
        /// Seed for the units' random number generators.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Parse and validate a test case without running it.
    Validate {
        #[arg(required = true)]
        test_case: PathBuf,
    },
    /// Scaffold a new project with a sample solution and test case.
    Init {
        /// Name of the project directory to create.
        #[arg(required = true)]
        name: String,
        /// Directory to create the project in.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Run every test case found under a directory against one solution.
    Batch {
        #[arg(required = true)]
        solution: PathBuf,
        /// Directory searched recursively for test cases.
        #[arg(required = true)]
        dir: PathBuf,
        #[arg(long, value_enum, default_value = "error")]
        log: LogLevel,
        /// Maximum number of test cases run at once (0 uses all cores).
        #[arg(short, long, default_value_t = 0)]
        jobs: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
}
