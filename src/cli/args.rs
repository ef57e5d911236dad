//! Command-line arguments for `sutra-test`.
//!
//! Declared with clap's derive API; anything not given on the command line
//! falls back to `RunConfig::from_env()` and then to the built-in defaults.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::logging::LogLevel;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "sutra-test",
    version,
    about = "Run Sutra test files in isolated sandboxes, in parallel."
)]
pub struct TestArgs {
    /// A directory to search for `*.test.sutra` files, or a single test file.
    #[arg(default_value = "tests")]
    pub root: PathBuf,

    /// Only run files whose path relative to ROOT matches this regex.
    pub pattern: Option<String>,

    /// How many test files may run at once.
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Per-test time bound in milliseconds; 0 disables it.
    #[arg(long)]
    pub test_timeout_ms: Option<u64>,

    /// Per-file time bound in milliseconds; 0 disables it.
    #[arg(long)]
    pub file_timeout_ms: Option<u64>,

    /// Print the run summary as JSON instead of text.
    #[arg(long)]
    pub json: bool,

    #[arg(long, value_enum, default_value_t = LogLevelArg::Warn)]
    pub log_level: LogLevelArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevelArg {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevelArg> for LogLevel {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Trace => LogLevel::Trace,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Error => LogLevel::Error,
        }
    }
}
