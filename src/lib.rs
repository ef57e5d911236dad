//! Sandboxed, parallel test runner for Sutra scripts.
//!
//! A run takes a list of test files and hands each one to a fresh
//! [`sandbox::Sandbox`] with its own global frame, module cache, suite tree
//! and mock factory. The [`dispatch::Dispatcher`] keeps a bounded number of
//! sandboxes in flight and returns a [`report::RunSummary`] in input order.
//!
//! ```no_run
//! use sutra_test::{discovery::TestDiscoverer, dispatch::Dispatcher, RunConfig};
//!
//! let files = TestDiscoverer::discover_test_files("tests", None)?;
//! let summary = Dispatcher::new(RunConfig::default()).run(&files);
//! std::process::exit(summary.exit_code());
//! # Ok::<(), sutra_test::SutraError>(())
//! ```

pub mod atoms;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod dispatch;
pub mod logging;
pub mod matchers;
pub mod mock;
pub mod report;
pub mod runtime;
pub mod sandbox;
pub mod suite;
pub mod syntax;

pub use crate::config::RunConfig;
pub use crate::diagnostics::{ErrorContext, ErrorType, SutraError};
pub use crate::dispatch::{run_files, Dispatcher};
pub use crate::report::{FileResult, RunSummary, TestOutcome, TestStatus};
pub use crate::runtime::{CancellationToken, Value};

pub type Result<T> = std::result::Result<T, SutraError>;
