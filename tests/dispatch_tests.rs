// Bounded-parallel dispatch: ordering, failure containment, time bounds and
// cancellation.

mod common;

use std::thread;
use std::time::Duration;

use common::{error_of, run, test_config, Fixture, SPIN};
use sutra_test::report::{FileErrorKind, TestStatus};
use sutra_test::{run_files, Dispatcher, RunConfig};

const PASSING: &str = r#"
(describe "math" (fn []
  (it "adds" (fn [] (expect (+ 1 1) :to-be 2)))))
"#;

const FAILING: &str = r#"
(describe "math" (fn []
  (it "adds" (fn [] (expect (+ 1 1) :to-be 3)))))
"#;

#[test]
fn one_failing_file_fails_the_run() {
    let fixture = Fixture::new();
    let a = fixture.write("a.test.sutra", PASSING);
    let b = fixture.write("b.test.sutra", FAILING);

    let summary = run(&[a.clone(), b.clone()]);

    assert!(!summary.success);
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(summary.files.len(), 2);
    assert!(summary.files[0].success);
    assert!(!summary.files[1].success);
    assert!(summary.files[0].path.ends_with("a.test.sutra"));
    assert!(summary.files[1].path.ends_with("b.test.sutra"));
    assert_eq!(summary.counts.passed, 1);
    assert_eq!(summary.counts.failed, 1);
    assert_eq!(summary.counts.failed_files, 1);

    let error = error_of(&summary.files[1], "math adds");
    assert!(error.contains("Expected: 3\nReceived: 2"), "{}", error);
}

#[test]
fn passing_run_exits_zero() {
    let fixture = Fixture::new();
    let a = fixture.write("a.test.sutra", PASSING);

    let summary = run_files(&[a], test_config());
    assert!(summary.success);
    assert_eq!(summary.exit_code(), 0);
}

#[test]
fn empty_input_is_a_successful_run() {
    let summary = run(&[]);
    assert!(summary.success);
    assert!(summary.files.is_empty());
}

#[test]
fn results_keep_input_order_when_completion_order_differs() {
    let fixture = Fixture::new();
    let files: Vec<_> = (0..6)
        .map(|i| {
            // Earlier files do more work, so they tend to finish last.
            let work = 8 - i;
            fixture.write(
                &format!("f{}.test.sutra", i),
                &format!(
                    r#"{spin}
(it "file {i}" (fn [] (spin {work}) (expect {i} :to-be {i})))"#,
                    spin = SPIN,
                    i = i,
                    work = work
                ),
            )
        })
        .collect();

    let summary = Dispatcher::new(test_config().with_jobs(4)).run(&files);

    assert!(summary.success, "{:#?}", summary);
    for (i, (file, path)) in summary.files.iter().zip(&files).enumerate() {
        assert_eq!(&file.path, path);
        assert_eq!(file.outcomes[0].name, format!("file {}", i));
    }
}

#[test]
fn single_worker_runs_files_one_at_a_time() {
    let fixture = Fixture::new();
    let files: Vec<_> = (0..3)
        .map(|i| fixture.write(&format!("s{}.test.sutra", i), PASSING))
        .collect();

    let summary = Dispatcher::new(test_config().with_jobs(1)).run(&files);
    assert!(summary.success);
    assert_eq!(summary.counts.passed, 3);
}

#[test]
fn cancelled_before_start_reports_every_file_as_cancelled() {
    let fixture = Fixture::new();
    let files: Vec<_> = (0..3)
        .map(|i| fixture.write(&format!("c{}.test.sutra", i), PASSING))
        .collect();

    let dispatcher = Dispatcher::new(test_config());
    dispatcher.cancellation_token().cancel();
    let summary = dispatcher.run(&files);

    assert!(!summary.success);
    assert_eq!(summary.files.len(), 3);
    for file in &summary.files {
        let error = file.error.as_ref().expect("cancelled");
        assert_eq!(error.kind, FileErrorKind::Cancelled);
    }
}

#[test]
fn cancelling_mid_run_interrupts_the_running_file_and_skips_the_rest() {
    let fixture = Fixture::new();
    let slow = fixture.write(
        "slow.test.sutra",
        &format!(r#"{}(it "slow" (fn [] (spin 12)))"#, SPIN),
    );
    let later = fixture.write("later.test.sutra", PASSING);

    let config = RunConfig::default()
        .with_jobs(1)
        .with_test_timeout(None)
        .with_file_timeout(None);
    let dispatcher = Dispatcher::new(config);
    let token = dispatcher.cancellation_token();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        token.cancel();
    });

    let summary = dispatcher.run(&[slow, later]);
    canceller.join().unwrap();

    let slow = &summary.files[0];
    assert_eq!(slow.outcomes[0].status, TestStatus::Failed);
    assert!(error_of(slow, "slow").contains("Execution cancelled"));
    let later = summary.files[1].error.as_ref().expect("cancelled");
    assert_eq!(later.kind, FileErrorKind::Cancelled);
}

#[test]
fn runaway_collection_nesting_fails_only_its_test() {
    let fixture = Fixture::new();
    let deep = fixture.write(
        "deep.test.sutra",
        &format!(
            r#"{}
(define big (grow (list 1) 12))
(it "nests too deep" (fn [] (reduce (fn [acc x] (list acc)) nil big)))
(it "still runs" (fn [] (expect (len big) :to-be 4096)))
"#,
            SPIN
        ),
    );
    let ok = fixture.write("ok.test.sutra", PASSING);

    let summary = run(&[deep, ok]);

    let deep = &summary.files[0];
    assert!(deep.error.is_none(), "{:#?}", deep);
    assert_eq!(deep.outcomes[0].status, TestStatus::Failed);
    assert!(error_of(deep, "nests too deep").contains("Nesting limit exceeded"));
    assert_eq!(deep.outcomes[1].status, TestStatus::Passed);
    assert!(summary.files[1].success);
}

#[test]
fn deeply_nested_values_are_compared_and_released_safely() {
    let fixture = Fixture::new();
    // Rest parameters wrap their arguments without the collection atoms' bound.
    let deep = fixture.write(
        "wrapped.test.sutra",
        &format!(
            r#"{}
(define (wrap ...items) items)
(define big (grow (list 1) 16))
(define a (reduce (fn [acc x] (wrap acc)) nil big))
(define b (reduce (fn [acc x] (wrap acc)) nil big))
(it "compares deep values" (fn [] (expect a :to-equal b)))
"#,
            SPIN
        ),
    );
    let ok = fixture.write("ok.test.sutra", PASSING);

    let config = test_config().with_test_timeout(None);
    let summary = Dispatcher::new(config).run(&[deep, ok]);

    assert_eq!(summary.files.len(), 2);
    assert!(summary.success, "{:#?}", summary);
}
