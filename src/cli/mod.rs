//! The `sutra-test` command-line host.
//!
//! Parses arguments, discovers files, hands them to the dispatcher and prints
//! the summary. The exit status is derived from the summary alone.

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};

use crate::cli::args::TestArgs;
use crate::config::{millis_to_limit, RunConfig};
use crate::discovery::TestDiscoverer;
use crate::dispatch::Dispatcher;
use crate::logging::init_logger;
use crate::SutraError;

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() -> ExitCode {
    let args = TestArgs::parse();
    init_logger(args.log_level.into());

    match execute(&args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %e, "test run could not start");
            eprintln!("{}", e.render());
            ExitCode::from(2)
        }
    }
}

/// Runs the tests described by `args` and prints the report.
pub fn execute(args: &TestArgs) -> Result<u8, SutraError> {
    let config = build_config(args)?;
    let files = TestDiscoverer::discover_test_files(&args.root, args.pattern.as_deref())?;
    debug!(root = %args.root.display(), files = files.len(), "discovered test files");

    if files.is_empty() && !args.json {
        println!("No test files found under {}", args.root.display());
    }

    let summary = Dispatcher::new(config).run(&files);
    if args.json {
        println!("{}", output::render_json(&summary)?);
    } else {
        print!("{}", output::render_text(&summary));
    }
    Ok(summary.exit_code() as u8)
}

/// Environment overrides first, then command-line flags.
pub fn build_config(args: &TestArgs) -> Result<RunConfig, SutraError> {
    let mut config = RunConfig::from_env()?;
    if let Some(jobs) = args.jobs {
        config = config.with_jobs(jobs);
    }
    if let Some(ms) = args.test_timeout_ms {
        config = config.with_test_timeout(millis_to_limit(ms));
    }
    if let Some(ms) = args.file_timeout_ms {
        config = config.with_file_timeout(millis_to_limit(ms));
    }
    Ok(config)
}
