//! Handles all user-facing output for the CLI.
//!
//! Rendering goes into a `String` first so it can be tested; the caller
//! decides where it is written. Output is plain text: no colors, no cursor
//! movement.

use std::fmt::Write;

use crate::report::{FileResult, RunSummary, TestStatus};
use crate::SutraError;

pub const FAILURE_FOOTER: &str = "Test run failed, please fix all the failing tests.";

// ============================================================================
// TEXT REPORT
// ============================================================================

/// Renders a summary as the human-readable report.
pub fn render_text(summary: &RunSummary) -> String {
    let mut out = String::new();

    for file in &summary.files {
        render_file(&mut out, file);
    }

    let failures: Vec<(&FileResult, String)> = summary
        .files
        .iter()
        .flat_map(failure_details)
        .collect();
    if !failures.is_empty() {
        out.push_str("\nFailures:\n");
        for (file, detail) in failures {
            let _ = writeln!(out, "\n  {}", file.path.display());
            out.push_str(&indent(&detail, 4));
            out.push('\n');
        }
    }

    let counts = &summary.counts;
    let total = counts.passed + counts.failed + counts.pending;
    let _ = writeln!(
        out,
        "\nTests: {} passed, {} failed, {} pending, {} total",
        counts.passed, counts.failed, counts.pending, total
    );
    let _ = writeln!(
        out,
        "Files: {} passed, {} failed, {} total",
        summary.files.len() - counts.failed_files,
        counts.failed_files,
        summary.files.len()
    );
    if !summary.success {
        let _ = writeln!(out, "\n{}", FAILURE_FOOTER);
    }
    out
}

/// Renders a summary as pretty-printed JSON.
pub fn render_json(summary: &RunSummary) -> Result<String, SutraError> {
    serde_json::to_string_pretty(summary)
        .map_err(|e| crate::err_msg!(Internal, "Failed to serialize run summary: {}", e))
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn render_file(out: &mut String, file: &FileResult) {
    let label = if file.success { "PASS" } else { "FAIL" };
    let _ = writeln!(out, "{} {} ({} ms)", label, file.path.display(), file.duration_ms);

    for outcome in &file.outcomes {
        let mark = match outcome.status {
            TestStatus::Passed => "ok",
            TestStatus::Failed => "FAILED",
            TestStatus::Pending => "skipped",
        };
        let _ = writeln!(out, "  {:<7} {}", mark, outcome.name);
    }
    if let Some(error) = &file.error {
        let first_line = error.message.lines().next().unwrap_or_default();
        let _ = writeln!(out, "  error   {}", first_line);
    }
    for line in &file.console {
        let _ = writeln!(out, "  console {}", line);
    }
}

fn failure_details(file: &FileResult) -> Vec<(&FileResult, String)> {
    let mut details = Vec::new();
    if let Some(error) = &file.error {
        details.push((file, error.message.clone()));
    }
    for outcome in file.outcomes.iter().filter(|o| o.is_failed()) {
        let message = outcome.error.as_deref().unwrap_or("(no message)");
        details.push((file, format!("{}\n\n{}", outcome.name, indent(message, 2))));
    }
    details
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
