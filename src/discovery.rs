use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::{err_msg, SutraError};

pub const TEST_FILE_SUFFIX: &str = ".test.sutra";

/// A test file to run: absolute path plus the directory its relative
/// `require` specifiers resolve against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestFile {
    pub path: PathBuf,
    pub dir: PathBuf,
}

impl TestFile {
    /// Relative paths are anchored at the current directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&path))
                .unwrap_or(path)
        };
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self { path, dir }
    }
}

/// Finds test files on disk.
#[derive(Debug)]
pub struct TestDiscoverer;

impl TestDiscoverer {
    // =====================
    // Public API - File Discovery
    // =====================

    /// Recursively scans `root` for `*.test.sutra` files, optionally keeping only
    /// those whose root-relative path matches `pattern`.
    ///
    /// The returned list is sorted so runs are deterministic.
    pub fn discover_test_files<P: AsRef<Path>>(
        root: P,
        pattern: Option<&str>,
    ) -> Result<Vec<PathBuf>, SutraError> {
        let root = root.as_ref();
        let root = root.canonicalize().map_err(|e| {
            err_msg!(Load, "Cannot read test root '{}': {}", root.display(), e)
        })?;
        let filter = pattern
            .map(Regex::new)
            .transpose()
            .map_err(|e| err_msg!(Eval, "Invalid test path pattern: {}", e))?;

        if root.is_file() {
            return Ok(vec![root]);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = entry
                .map_err(|e| err_msg!(Internal, format!("Failed to walk directory: {}", e)))?;

            if !entry.file_type().is_file() || !Self::is_test_file(entry.path()) {
                continue;
            }

            let path = entry.path();
            if let Some(filter) = &filter {
                let relative = path.strip_prefix(&root).unwrap_or(path);
                if !filter.is_match(&relative.to_string_lossy()) {
                    continue;
                }
            }
            files.push(path.to_path_buf());
        }
        files.sort();
        Ok(files)
    }

    pub fn is_test_file(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(TEST_FILE_SUFFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_sorted_test_files_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.test.sutra"), "").unwrap();
        fs::write(dir.path().join("a.test.sutra"), "").unwrap();
        fs::write(dir.path().join("helper.sutra"), "").unwrap();
        fs::write(dir.path().join("nested/c.test.sutra"), "").unwrap();

        let all = TestDiscoverer::discover_test_files(dir.path(), None).unwrap();
        let names: Vec<_> = all
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.test.sutra", "b.test.sutra", "c.test.sutra"]);
        assert!(all.iter().all(|p| p.is_absolute()));

        let nested = TestDiscoverer::discover_test_files(dir.path(), Some("^nested/")).unwrap();
        assert_eq!(nested.len(), 1);
    }

    #[test]
    fn test_file_paths_are_absolute() {
        let file = TestFile::new("suite/a.test.sutra");
        assert!(file.path.is_absolute());
        assert!(file.path.ends_with("suite/a.test.sutra"));
        assert!(file.dir.ends_with("suite"));
    }
}
