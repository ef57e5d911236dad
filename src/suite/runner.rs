//! Executes a registered suite tree depth-first, one test at a time.
//!
//! Every test body and hook runs under its own deadline; a deferred result is
//! driven to completion before the next test starts. Failures are caught per
//! test and never stop the traversal.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::report::{TestOutcome, TestStatus};
use crate::runtime::eval::Interpreter;
use crate::runtime::value::Value;
use crate::suite::{SuiteEntry, SuiteNode, TestCase};
use crate::syntax::Span;
use crate::SutraError;

pub struct Runner<'a> {
    interp: &'a mut Interpreter,
    test_timeout: Option<Duration>,
    outcomes: Vec<TestOutcome>,
}

impl<'a> Runner<'a> {
    pub fn new(interp: &'a mut Interpreter, test_timeout: Option<Duration>) -> Self {
        Self {
            interp,
            test_timeout,
            outcomes: Vec::new(),
        }
    }

    /// Runs every test under `root` and returns outcomes in declaration order.
    pub fn run(mut self, root: &SuiteNode) -> Vec<TestOutcome> {
        let mut chain = Vec::new();
        self.run_suite(root, &mut chain);
        self.outcomes
    }

    fn run_suite<'t>(&mut self, node: &'t SuiteNode, chain: &mut Vec<&'t SuiteNode>) {
        let runnable = node.has_runnable_tests();
        let first_outcome = self.outcomes.len();
        chain.push(node);

        let mut setup_error = None;
        if runnable {
            for hook in &node.hooks.before_all {
                if let Err(e) = self.run_callable(hook) {
                    debug!(suite = %node.name, "before-all hook failed");
                    setup_error = Some(e.located_message());
                    break;
                }
            }
        }

        for entry in &node.entries {
            match (entry, &setup_error) {
                (SuiteEntry::Suite(child), None) => self.run_suite(child, chain),
                (SuiteEntry::Suite(child), Some(error)) => self.fail_subtree(child, error),
                (SuiteEntry::Test(case), _) if case.skip => {
                    self.outcomes.push(TestOutcome::pending(case.path.clone()))
                }
                (SuiteEntry::Test(case), None) => self.run_test(case, chain),
                (SuiteEntry::Test(case), Some(error)) => self
                    .outcomes
                    .push(TestOutcome::failed(case.path.clone(), error.clone(), Duration::ZERO)),
            }
        }

        if runnable {
            for hook in &node.hooks.after_all {
                if let Err(e) = self.run_callable(hook) {
                    debug!(suite = %node.name, "after-all hook failed");
                    self.blame_last_passed(first_outcome, e.located_message());
                }
            }
        }

        chain.pop();
    }

    fn run_test(&mut self, case: &TestCase, chain: &[&SuiteNode]) {
        trace!(test = %case.name(), "running test");
        let started = Instant::now();
        let mut error: Option<SutraError> = None;

        'setup: for node in chain {
            for hook in &node.hooks.before_each {
                if let Err(e) = self.run_callable(hook) {
                    error = Some(e);
                    break 'setup;
                }
            }
        }

        if error.is_none() {
            if let Err(e) = self.run_callable(&case.body) {
                error = Some(e);
            }
        }

        for node in chain.iter().rev() {
            for hook in &node.hooks.after_each {
                if let Err(e) = self.run_callable(hook) {
                    error.get_or_insert(e);
                }
            }
        }

        // Deferred work left behind by this test never runs in the next one.
        if self.interp.pending_jobs() > 0 {
            trace!(test = %case.name(), pending = self.interp.pending_jobs(), "dropping unawaited deferred work");
            self.interp.clear_jobs();
        }

        let outcome = match error {
            None => TestOutcome::passed(case.path.clone(), started.elapsed()),
            Some(e) => TestOutcome::failed(case.path.clone(), e.located_message(), started.elapsed()),
        };
        self.outcomes.push(outcome);
    }

    /// Calls a zero-argument body or hook under a fresh deadline and settles
    /// a deferred result.
    fn run_callable(&mut self, callable: &Value) -> Result<Value, SutraError> {
        self.interp.set_timeout(self.test_timeout);
        let result = self
            .interp
            .call(callable, vec![], Span::default())
            .and_then(|value| self.interp.settle(value));
        self.interp.set_timeout(None);
        result
    }

    fn fail_subtree(&mut self, node: &SuiteNode, error: &str) {
        for entry in &node.entries {
            match entry {
                SuiteEntry::Suite(child) => self.fail_subtree(child, error),
                SuiteEntry::Test(case) if case.skip => {
                    self.outcomes.push(TestOutcome::pending(case.path.clone()))
                }
                SuiteEntry::Test(case) => self.outcomes.push(TestOutcome::failed(
                    case.path.clone(),
                    error.to_string(),
                    Duration::ZERO,
                )),
            }
        }
    }

    /// Records an `after-all` failure on the last test of the subtree that ran,
    /// if it had passed.
    fn blame_last_passed(&mut self, first_outcome: usize, error: String) {
        let last_run = self.outcomes[first_outcome..]
            .iter_mut()
            .rev()
            .find(|o| o.status != TestStatus::Pending);
        if let Some(outcome) = last_run {
            if outcome.status == TestStatus::Passed {
                outcome.status = TestStatus::Failed;
                outcome.error = Some(error);
            }
        }
    }
}
