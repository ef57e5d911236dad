//! Run results: per-test outcomes, per-file results and the run summary.
//!
//! These are the only values that cross a sandbox boundary. They own plain
//! data (strings, paths, numbers) and are `Send`, serializable and ordered.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Suite names and the case name joined by spaces, e.g. `"math adds"`.
    pub name: String,
    pub path: Vec<String>,
    pub status: TestStatus,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl TestOutcome {
    pub fn passed(path: Vec<String>, duration: Duration) -> Self {
        Self::with_status(path, TestStatus::Passed, None, duration)
    }

    pub fn failed(path: Vec<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self::with_status(path, TestStatus::Failed, Some(error.into()), duration)
    }

    pub fn pending(path: Vec<String>) -> Self {
        Self::with_status(path, TestStatus::Pending, None, Duration::ZERO)
    }

    fn with_status(
        path: Vec<String>,
        status: TestStatus,
        error: Option<String>,
        duration: Duration,
    ) -> Self {
        Self {
            name: path.join(" "),
            path,
            status,
            error,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == TestStatus::Failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileErrorKind {
    /// The root file or a required module failed to resolve, read, parse or run.
    Load,
    /// The sandbox panicked or exceeded the per-file bound.
    Dispatch,
    /// The run was cancelled before the file started.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileError {
    pub kind: FileErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResult {
    pub path: PathBuf,
    pub success: bool,
    pub outcomes: Vec<TestOutcome>,
    pub error: Option<FileError>,
    pub console: Vec<String>,
    pub duration_ms: u64,
}

impl FileResult {
    /// Succeeds when no outcome failed; a file without tests succeeds.
    pub fn from_outcomes(
        path: PathBuf,
        outcomes: Vec<TestOutcome>,
        console: Vec<String>,
        duration: Duration,
    ) -> Self {
        Self {
            path,
            success: !outcomes.iter().any(TestOutcome::is_failed),
            outcomes,
            error: None,
            console,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn with_error(
        path: PathBuf,
        kind: FileErrorKind,
        message: impl Into<String>,
        console: Vec<String>,
        duration: Duration,
    ) -> Self {
        Self {
            path,
            success: false,
            outcomes: Vec::new(),
            error: Some(FileError {
                kind,
                message: message.into(),
            }),
            console,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn load_error(path: PathBuf, message: impl Into<String>, console: Vec<String>, duration: Duration) -> Self {
        Self::with_error(path, FileErrorKind::Load, message, console, duration)
    }

    pub fn dispatch_failure(path: PathBuf, message: impl Into<String>, duration: Duration) -> Self {
        Self::with_error(path, FileErrorKind::Dispatch, message, Vec::new(), duration)
    }

    pub fn cancelled(path: PathBuf) -> Self {
        Self::with_error(
            path,
            FileErrorKind::Cancelled,
            "Run cancelled before this file started",
            Vec::new(),
            Duration::ZERO,
        )
    }

    pub fn count(&self, status: TestStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub passed: usize,
    pub failed: usize,
    pub pending: usize,
    pub failed_files: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// In the order the files were given, not the order they finished.
    pub files: Vec<FileResult>,
    pub success: bool,
    pub counts: RunCounts,
}

impl RunSummary {
    pub fn new(files: Vec<FileResult>) -> Self {
        let mut counts = RunCounts::default();
        for file in &files {
            counts.passed += file.count(TestStatus::Passed);
            counts.failed += file.count(TestStatus::Failed);
            counts.pending += file.count(TestStatus::Pending);
            if !file.success {
                counts.failed_files += 1;
            }
        }
        Self {
            success: files.iter().all(|f| f.success),
            files,
            counts,
        }
    }

    /// 0 iff every file succeeded.
    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_success_is_the_and_of_files() {
        let ok = FileResult::from_outcomes(
            "/a.test.sutra".into(),
            vec![
                TestOutcome::passed(vec!["math".into(), "adds".into()], Duration::ZERO),
                TestOutcome::pending(vec!["later".into()]),
            ],
            vec![],
            Duration::ZERO,
        );
        assert!(ok.success);
        assert_eq!(ok.outcomes[0].name, "math adds");

        let broken = FileResult::load_error("/b.test.sutra".into(), "boom", vec![], Duration::ZERO);
        let summary = RunSummary::new(vec![ok.clone(), broken]);
        assert!(!summary.success);
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.counts.failed_files, 1);
        assert_eq!(summary.counts.pending, 1);

        assert_eq!(RunSummary::new(vec![ok]).exit_code(), 0);
        assert_eq!(RunSummary::new(vec![]).exit_code(), 0);
    }

    #[test]
    fn results_serialize_with_lowercase_tags() {
        let file = FileResult::dispatch_failure("/c.test.sutra".into(), "panicked", Duration::ZERO);
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["error"]["kind"], "dispatch");
        assert_eq!(json["success"], false);
    }
}
