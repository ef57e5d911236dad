// Crash and hang containment, driven by the misbehaving `test/*` atoms.
// Requires the `test-atom` feature: cargo test --features test-atom

mod common;

use std::time::{Duration, Instant};

use common::{run, test_config, Fixture};
use sutra_test::report::FileErrorKind;
use sutra_test::Dispatcher;

const PASSING: &str = r#"(it "adds" (fn [] (expect (+ 1 1) :to-be 2)))"#;

#[test]
fn panicking_file_is_contained() {
    let fixture = Fixture::new();
    let boom = fixture.write(
        "boom.test.sutra",
        r#"(it "explodes" (fn [] (test/panic "kaboom")))"#,
    );
    let fine = fixture.write("fine.test.sutra", PASSING);

    let summary = run(&[boom, fine]);

    let boom = &summary.files[0];
    assert!(!boom.success);
    let error = boom.error.as_ref().expect("dispatch error");
    assert_eq!(error.kind, FileErrorKind::Dispatch);
    assert!(error.message.contains("Test file panicked: kaboom"), "{}", error.message);
    assert!(summary.files[1].success);
}

#[test]
fn hanging_file_is_abandoned_after_the_file_bound() {
    let fixture = Fixture::new();
    let hang = fixture.write("hang.test.sutra", "(test/sleep 3000)");
    let fine = fixture.write("fine.test.sutra", PASSING);

    let config = test_config().with_file_timeout(Some(Duration::from_millis(200)));
    let started = Instant::now();
    let summary = Dispatcher::new(config).run(&[hang, fine]);

    assert!(started.elapsed() < Duration::from_millis(2500));
    let error = summary.files[0].error.as_ref().expect("dispatch error");
    assert_eq!(error.kind, FileErrorKind::Dispatch);
    assert!(error.message.contains("did not finish within 200 ms"), "{}", error.message);
    assert!(summary.files[1].success);
}

#[test]
fn sleeping_body_still_honors_the_test_timeout() {
    let fixture = Fixture::new();
    let file = fixture.write(
        "sleepy.test.sutra",
        r#"
(define (count-down n) (if (= n 0) 0 (count-down (- n 1))))
(it "sleepy" (fn [] (test/sleep 80) (count-down 100)))
(it "awake" (fn [] nil))
"#,
    );

    let config = test_config().with_test_timeout(Some(Duration::from_millis(20)));
    let summary = Dispatcher::new(config).run(&[file]);
    let result = &summary.files[0];

    let error = result.outcomes[0].error.as_deref().expect("timed out");
    assert!(error.contains("Exceeded timeout of 20 ms"), "{}", error);
    assert!(result.outcomes[1].error.is_none());
}
