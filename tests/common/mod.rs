// Shared fixtures for integration tests: a throwaway directory tree of
// test files plus helpers to run it.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sutra_test::report::{FileResult, RunSummary, TestStatus};
use sutra_test::{Dispatcher, RunConfig};
use tempfile::TempDir;

pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dirs");
        }
        fs::write(&path, contents).expect("write fixture file");
        path
    }
}

/// `grow` doubles a list `n` times; `(spin n)` makes about 4^n cooperative calls.
pub const SPIN: &str = r#"
(define (grow acc n) (if (= n 0) acc (grow (append acc acc) (- n 1))))
(define (spin n)
  (define small (grow (list 1) n))
  (reduce (fn [acc x] (reduce (fn [a y] (+ a y)) acc small)) 0 small))
"#;

/// Two workers and short bounds.
pub fn test_config() -> RunConfig {
    RunConfig::default()
        .with_jobs(2)
        .with_test_timeout(Some(Duration::from_secs(5)))
        .with_file_timeout(Some(Duration::from_secs(30)))
}

pub fn run(files: &[PathBuf]) -> RunSummary {
    Dispatcher::new(test_config()).run(files)
}

pub fn run_one(path: PathBuf) -> FileResult {
    let mut summary = run(&[path]);
    summary.files.remove(0)
}

/// `(name, status)` pairs, in order.
pub fn statuses(file: &FileResult) -> Vec<(String, TestStatus)> {
    file.outcomes
        .iter()
        .map(|o| (o.name.clone(), o.status))
        .collect()
}

pub fn error_of<'a>(file: &'a FileResult, name: &str) -> &'a str {
    file.outcomes
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.error.as_deref())
        .unwrap_or_else(|| panic!("no failed outcome named {:?} in {:#?}", name, file.outcomes))
}
