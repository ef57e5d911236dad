//! Run configuration.
//!
//! Defaults suit an interactive run; every knob can be overridden with a
//! builder method or, through [`RunConfig::from_env`], an environment variable.

use std::env;
use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use crate::{err_msg, SutraError};

pub const ENV_JOBS: &str = "SUTRA_TEST_JOBS";
pub const ENV_TEST_TIMEOUT_MS: &str = "SUTRA_TEST_TIMEOUT_MS";
pub const ENV_FILE_TIMEOUT_MS: &str = "SUTRA_TEST_FILE_TIMEOUT_MS";
pub const ENV_MAX_DEPTH: &str = "SUTRA_TEST_MAX_DEPTH";

pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_FILE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_DEPTH: usize = 1_000;
/// Unoptimized evaluator frames are large; 32 MiB keeps `DEFAULT_MAX_DEPTH`
/// well inside the worker stack in debug builds.
pub const DEFAULT_WORKER_STACK_SIZE: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Maximum number of sandboxes in flight.
    pub jobs: usize,
    /// Deadline for each test body and hook; `None` disables it.
    pub test_timeout: Option<Duration>,
    /// Bound after which a running file is abandoned; `None` disables it.
    pub file_timeout: Option<Duration>,
    pub max_depth: usize,
    pub worker_stack_size: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            jobs: default_parallelism(),
            test_timeout: Some(DEFAULT_TEST_TIMEOUT),
            file_timeout: Some(DEFAULT_FILE_TIMEOUT),
            max_depth: DEFAULT_MAX_DEPTH,
            worker_stack_size: DEFAULT_WORKER_STACK_SIZE,
        }
    }
}

/// Available parallelism of the host, at least 1.
pub fn default_parallelism() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Milliseconds to an optional duration; zero means "no limit".
pub fn millis_to_limit(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl RunConfig {
    /// Defaults overridden by any `SUTRA_TEST_*` variables that are set.
    pub fn from_env() -> Result<Self, SutraError> {
        Self::default().with_overrides(|name| env::var(name).ok())
    }

    /// Applies overrides from a variable lookup; unset variables keep the current value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, SutraError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(jobs) = parse_var(&lookup, ENV_JOBS)? {
            self = self.with_jobs(jobs as usize);
        }
        if let Some(ms) = parse_var(&lookup, ENV_TEST_TIMEOUT_MS)? {
            self.test_timeout = millis_to_limit(ms);
        }
        if let Some(ms) = parse_var(&lookup, ENV_FILE_TIMEOUT_MS)? {
            self.file_timeout = millis_to_limit(ms);
        }
        if let Some(depth) = parse_var(&lookup, ENV_MAX_DEPTH)? {
            self.max_depth = depth as usize;
        }
        Ok(self)
    }

    /// Zero is treated as one.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_test_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.test_timeout = timeout;
        self
    }

    pub fn with_file_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.file_timeout = timeout;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_worker_stack_size(mut self, bytes: usize) -> Self {
        self.worker_stack_size = bytes;
        self
    }
}

fn parse_var<F>(lookup: &F, name: &str) -> Result<Option<u64>, SutraError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| err_msg!(Eval, "Invalid value for {}: '{}' (expected a whole number)", name, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn overrides_replace_defaults() {
        let config = RunConfig::default()
            .with_overrides(lookup(&[
                (ENV_JOBS, "3"),
                (ENV_TEST_TIMEOUT_MS, "0"),
                (ENV_FILE_TIMEOUT_MS, "250"),
            ]))
            .unwrap();
        assert_eq!(config.jobs, 3);
        assert_eq!(config.test_timeout, None);
        assert_eq!(config.file_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = RunConfig::default()
            .with_overrides(lookup(&[(ENV_JOBS, "many")]))
            .unwrap_err();
        assert!(err.message().contains("SUTRA_TEST_JOBS"));
    }

    #[test]
    fn zero_jobs_means_one() {
        assert_eq!(RunConfig::default().with_jobs(0).jobs, 1);
        assert!(default_parallelism() >= 1);
    }
}
