// Sandbox isolation and per-sandbox module loading.

mod common;

use std::path::Path;

use common::{error_of, run, run_one, statuses, Fixture};
use sutra_test::discovery::TestFile;
use sutra_test::report::{FileErrorKind, TestStatus};
use sutra_test::runtime::CancellationToken;
use sutra_test::sandbox::{Sandbox, SandboxOptions};

fn sandbox_for(path: &Path) -> Sandbox {
    Sandbox::new(TestFile::new(path), &SandboxOptions::default(), CancellationToken::new())
}

const COUNTER_MODULE: &str = r#"
(print "loading counter")
(define count 0)
(define (bump) (set! count (+ count 1)) count)
(provide (dict :bump bump))
"#;

#[test]
fn module_runs_once_per_sandbox_and_is_shared_inside_it() {
    let fixture = Fixture::new();
    fixture.write("lib/counter.sutra", COUNTER_MODULE);
    fixture.write(
        "lib/user.sutra",
        r#"
(define counter (require "./counter"))
(provide (dict :bump-twice (fn [] ((get counter :bump)) ((get counter :bump)))))
"#,
    );
    let file = fixture.write(
        "shared.test.sutra",
        r#"
(define counter (require "./lib/counter"))
(define user (require "./lib/user.sutra"))
(it "sees one module instance" (fn []
  ((get counter :bump))
  (expect ((get user :bump-twice)) :to-be 3)))
"#,
    );

    let mut sandbox = sandbox_for(&file);
    let result = sandbox.run();
    assert!(result.success, "{:#?}", result);
    assert_eq!(result.console, vec!["loading counter"]);
    // Root, counter and user: three bodies executed, three cache entries.
    assert_eq!(sandbox.loader().executions(), 3);
    assert_eq!(sandbox.loader().cached_paths().len(), 3);
}

#[test]
fn each_file_gets_its_own_module_instances_and_globals() {
    let fixture = Fixture::new();
    fixture.write("counter.sutra", COUNTER_MODULE);
    let body = r#"
(define counter (require "./counter"))
(global/set! :touched (+ 1 (global/get :touched 0)))
(it "starts fresh" (fn []
  (expect ((get counter :bump)) :to-be 1)
  (expect (global/get :touched) :to-be 1)))
"#;
    let a = fixture.write("a.test.sutra", body);
    let b = fixture.write("b.test.sutra", body);

    let summary = run(&[a, b]);
    assert!(summary.success, "{:#?}", summary);
    for file in &summary.files {
        assert_eq!(file.console, vec!["loading counter"]);
    }
}

#[test]
fn same_specifier_in_different_directories_is_a_different_module() {
    let fixture = Fixture::new();
    fixture.write("x/helper.sutra", r#"(provide "from x")"#);
    fixture.write("y/helper.sutra", r#"(provide "from y")"#);
    let x = fixture.write(
        "x/x.test.sutra",
        r#"(it "loads x" (fn [] (expect (require "./helper") :to-be "from x")))"#,
    );
    let y = fixture.write(
        "y/y.test.sutra",
        r#"(it "loads y" (fn [] (expect (require "./helper") :to-be "from y")))"#,
    );

    let summary = run(&[x, y]);
    assert!(summary.success, "{:#?}", summary);
}

#[test]
fn mutation_in_one_file_is_invisible_to_another() {
    let fixture = Fixture::new();
    let writer = fixture.write(
        "writer.test.sutra",
        r#"
(define + (fn [a b] 0))
(global/set! :leak "from writer")
(it "clobbers locally" (fn [] (expect (+ 1 1) :to-be 0)))
"#,
    );
    let reader = fixture.write(
        "reader.test.sutra",
        r#"
(it "is untouched" (fn []
  (expect (+ 1 1) :to-be 2)
  (expect (global/get :leak) :to-be-nil)))
"#,
    );

    let summary = run(&[writer, reader]);
    assert!(summary.success, "{:#?}", summary);
}

#[test]
fn cyclic_requires_see_partial_exports() {
    let fixture = Fixture::new();
    fixture.write(
        "ping.sutra",
        r#"
(provide (dict :name "ping"))
(define pong (require "./pong"))
(provide (dict :name "ping" :peer (get pong :name)))
"#,
    );
    fixture.write(
        "pong.sutra",
        r#"
(define ping (require "./ping"))
(provide (dict :name "pong" :peer (get ping :name)))
"#,
    );
    let file = fixture.write(
        "cycle.test.sutra",
        r#"
(define ping (require "./ping"))
(define pong (require "./pong"))
(it "resolves both sides" (fn []
  (expect (get ping :peer) :to-be "pong")
  (expect (get pong :peer) :to-be "ping")))
"#,
    );

    let result = run_one(file);
    assert!(result.success, "{:#?}", result);
}

#[test]
fn missing_module_is_a_load_error_for_that_file_only() {
    let fixture = Fixture::new();
    let broken = fixture.write("broken.test.sutra", r#"(require "./nowhere")"#);
    let fine = fixture.write("fine.test.sutra", r#"(it "runs" (fn [] nil))"#);

    let summary = run(&[broken, fine]);
    let broken = &summary.files[0];
    assert!(!broken.success);
    let error = broken.error.as_ref().expect("load error");
    assert_eq!(error.kind, FileErrorKind::Load);
    assert!(error.message.contains("Cannot find module './nowhere'"), "{}", error.message);
    assert!(summary.files[1].success);
    assert_eq!(summary.counts.failed_files, 1);
}

#[test]
fn parse_error_reports_file_line_and_column() {
    let fixture = Fixture::new();
    let file = fixture.write("syntax.test.sutra", "(it \"ok\" (fn [] nil))\n(define x");

    let result = run_one(file);
    let error = result.error.expect("load error");
    assert_eq!(error.kind, FileErrorKind::Load);
    assert!(error.message.starts_with("Parse error"), "{}", error.message);
    assert!(error.message.contains("syntax.test.sutra:2:"), "{}", error.message);
}

#[test]
fn failing_module_is_retried_on_next_require() {
    let fixture = Fixture::new();
    fixture.write(
        "flaky.sutra",
        r#"
(global/set! :attempts (+ 1 (global/get :attempts 0)))
(if (= (global/get :attempts) 1) (error "first load fails"))
(provide (dict :ok true))
"#,
    );
    let file = fixture.write(
        "retry.test.sutra",
        r#"
(define first-try (fn [] (require "./flaky")))
(it "first require fails" (fn [] (expect first-try :to-throw "first load fails")))
(it "second require loads again" (fn [] (expect (get (require "./flaky") :ok) :to-be true)))
"#,
    );

    let result = run_one(file);
    assert_eq!(
        statuses(&result),
        vec![
            ("first require fails".to_string(), TestStatus::Passed),
            ("second require loads again".to_string(), TestStatus::Passed),
        ]
    );
}

#[test]
fn random_sequence_is_stable_per_file() {
    let fixture = Fixture::new();
    let file = fixture.write(
        "random.test.sutra",
        r#"
(define roll (random/int 1 1000))
(print roll)
(it "rolls within range" (fn []
  (expect (<= 1 roll 1000) :to-be true)))
"#,
    );

    let first = run_one(file.clone());
    let second = run_one(file);
    assert!(first.success, "{:#?}", first);
    assert_eq!(first.console, second.console);
}

#[test]
fn mock_ids_are_per_sandbox() {
    let fixture = Fixture::new();
    let body = r#"
(define m (mock/fn))
(it "prints its id" (fn [] (print m)))
"#;
    let a = fixture.write("a.test.sutra", body);
    let b = fixture.write("b.test.sutra", body);

    let summary = run(&[a, b]);
    assert!(summary.success, "{:#?}", summary);
    assert_eq!(summary.files[0].console, vec!["<mock mock.fn#1>"]);
    assert_eq!(summary.files[0].console, summary.files[1].console);
}

#[test]
fn mock_calls_are_recorded_and_checked() {
    let fixture = Fixture::new();
    let file = fixture.write(
        "mock.test.sutra",
        r#"
(define greet (mock/fn (fn [name] (str "hi " name)) "greet"))
(it "records calls" (fn []
  (expect (greet "ada") :to-be "hi ada")
  (expect greet :to-have-been-called-times 1)
  (expect greet :to-have-been-called-with "ada")
  (expect (len (mock/calls greet)) :to-be 1)))
(it "is checked against calls" (fn [] (expect greet :to-have-been-called-with "bob")))
"#,
    );

    let result = run_one(file);
    assert_eq!(result.outcomes[0].status, TestStatus::Passed, "{:#?}", result);
    let error = error_of(&result, "is checked against calls");
    assert!(error.contains("to-have-been-called-with"), "{}", error);
}
