// The `sutra-test` binary: discovery, report formats and exit status.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

mod common;

use assert_cmd::Command;
use common::Fixture;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

const PASSING: &str = r#"(describe "math" (fn [] (it "adds" (fn [] (expect (+ 1 1) :to-be 2)))))"#;
const FAILING: &str = r#"(describe "math" (fn [] (it "adds" (fn [] (expect (+ 1 1) :to-be 3)))))"#;

fn sutra_test() -> Command {
    let mut cmd = Command::cargo_bin("sutra-test").unwrap();
    cmd.env_remove("RUST_LOG").env_remove("SUTRA_TEST_JOBS");
    cmd
}

#[test]
fn passing_suite_exits_zero() {
    let fixture = Fixture::new();
    fixture.write("a.test.sutra", PASSING);
    fixture.write("nested/b.test.sutra", PASSING);
    fixture.write("helper.sutra", "(provide 1)");

    sutra_test()
        .arg(fixture.root())
        .assert()
        .success()
        .stdout(contains("PASS").and(contains("Tests: 2 passed, 0 failed, 0 pending, 2 total")));
}

#[test]
fn failing_suite_exits_non_zero_with_details() {
    let fixture = Fixture::new();
    fixture.write("a.test.sutra", PASSING);
    fixture.write("b.test.sutra", FAILING);

    sutra_test()
        .arg(fixture.root())
        .arg("--jobs")
        .arg("2")
        .assert()
        .code(1)
        .stdout(
            contains("FAIL")
                .and(contains("Expected: 3"))
                .and(contains("Received: 2"))
                .and(contains("Test run failed, please fix all the failing tests.")),
        );
}

#[test]
fn pattern_filters_files() {
    let fixture = Fixture::new();
    fixture.write("keep.test.sutra", PASSING);
    fixture.write("skip.test.sutra", FAILING);

    sutra_test()
        .arg(fixture.root())
        .arg("keep")
        .assert()
        .success()
        .stdout(contains("keep.test.sutra").and(contains("skip.test.sutra").not()));
}

#[test]
fn json_report_is_machine_readable() {
    let fixture = Fixture::new();
    fixture.write("b.test.sutra", FAILING);

    let output = sutra_test()
        .arg(fixture.root())
        .arg("--json")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["success"], false);
    assert_eq!(summary["files"][0]["outcomes"][0]["name"], "math adds");
    assert_eq!(summary["files"][0]["outcomes"][0]["status"], "failed");
}

#[test]
fn missing_root_is_reported_on_stderr() {
    let fixture = Fixture::new();

    sutra_test()
        .arg(fixture.root().join("does-not-exist"))
        .assert()
        .code(2)
        .stderr(contains("Cannot read test root"));
}
