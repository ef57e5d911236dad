//! The suite tree: what `describe`, `it` and the hook functions build while a
//! file's top-level code runs.
//!
//! A tree moves through three phases per file:
//!
//! - `Registering`: declarations push suites, tests and hooks. A `describe`
//!   body runs immediately; `it` bodies are stored, not run.
//! - `Executing`: the finished root is handed to the [`runner`]. Declaring
//!   anything now is an error.
//! - `Done`: terminal until [`SuiteTree::reset`] starts the next file.

pub mod runner;

use crate::runtime::value::Value;
use crate::{err_msg, SutraError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Registering,
    Executing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    BeforeAll,
    BeforeEach,
    AfterEach,
    AfterAll,
}

impl HookKind {
    pub fn binding_name(&self) -> &'static str {
        match self {
            HookKind::BeforeAll => "before-all",
            HookKind::BeforeEach => "before-each",
            HookKind::AfterEach => "after-each",
            HookKind::AfterAll => "after-all",
        }
    }
}

#[derive(Default)]
pub struct Hooks {
    pub before_all: Vec<Value>,
    pub before_each: Vec<Value>,
    pub after_each: Vec<Value>,
    pub after_all: Vec<Value>,
}

pub struct TestCase {
    /// Enclosing suite names followed by the test's own name.
    pub path: Vec<String>,
    pub body: Value,
    pub skip: bool,
}

impl TestCase {
    pub fn name(&self) -> String {
        self.path.join(" ")
    }
}

pub enum SuiteEntry {
    Suite(SuiteNode),
    Test(TestCase),
}

/// A `describe` block; the root node of a file has no name.
#[derive(Default)]
pub struct SuiteNode {
    pub name: String,
    pub entries: Vec<SuiteEntry>,
    pub hooks: Hooks,
}

impl SuiteNode {
    fn named(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Whether any test in this subtree will actually run.
    pub fn has_runnable_tests(&self) -> bool {
        self.entries.iter().any(|entry| match entry {
            SuiteEntry::Suite(child) => child.has_runnable_tests(),
            SuiteEntry::Test(case) => !case.skip,
        })
    }

    pub fn test_count(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| match entry {
                SuiteEntry::Suite(child) => child.test_count(),
                SuiteEntry::Test(_) => 1,
            })
            .sum()
    }
}

/// Registration state for one file.
pub struct SuiteTree {
    phase: Phase,
    /// Open suites, root first. Never empty while registering.
    stack: Vec<SuiteNode>,
}

impl Default for SuiteTree {
    fn default() -> Self {
        Self {
            phase: Phase::Registering,
            stack: vec![SuiteNode::default()],
        }
    }
}

impl SuiteTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops everything declared so far and reopens registration.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of open `describe` scopes, not counting the root.
    pub fn depth(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }

    fn ensure_registering(&self, what: &str) -> Result<(), SutraError> {
        if self.phase != Phase::Registering {
            return Err(err_msg!(
                Eval,
                "Cannot call {} while tests are running; declare it at the top level or inside describe",
                what
            ));
        }
        Ok(())
    }

    fn current(&mut self) -> &mut SuiteNode {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    pub fn begin_suite(&mut self, name: String) -> Result<(), SutraError> {
        self.ensure_registering("describe")?;
        self.stack.push(SuiteNode::named(name));
        Ok(())
    }

    pub fn end_suite(&mut self) -> Result<(), SutraError> {
        if self.stack.len() < 2 {
            return Err(err_msg!(Internal, "end_suite without a matching begin_suite"));
        }
        if let Some(node) = self.stack.pop() {
            self.current().entries.push(SuiteEntry::Suite(node));
        }
        Ok(())
    }

    pub fn add_test(&mut self, name: String, body: Value, skip: bool) -> Result<(), SutraError> {
        self.ensure_registering("it")?;
        let mut path: Vec<String> = self.stack[1..].iter().map(|s| s.name.clone()).collect();
        path.push(name);
        self.current()
            .entries
            .push(SuiteEntry::Test(TestCase { path, body, skip }));
        Ok(())
    }

    pub fn add_hook(&mut self, kind: HookKind, hook: Value) -> Result<(), SutraError> {
        self.ensure_registering(kind.binding_name())?;
        let hooks = &mut self.current().hooks;
        match kind {
            HookKind::BeforeAll => hooks.before_all.push(hook),
            HookKind::BeforeEach => hooks.before_each.push(hook),
            HookKind::AfterEach => hooks.after_each.push(hook),
            HookKind::AfterAll => hooks.after_all.push(hook),
        }
        Ok(())
    }

    /// Ends registration and hands out the finished root.
    pub fn begin_execution(&mut self) -> Result<SuiteNode, SutraError> {
        self.ensure_registering("begin_execution")?;
        if self.stack.len() != 1 {
            return Err(err_msg!(
                Internal,
                "registration ended with {} describe block(s) still open",
                self.stack.len() - 1
            ));
        }
        self.phase = Phase::Executing;
        Ok(std::mem::take(&mut self.stack[0]))
    }

    pub fn finish(&mut self) {
        self.phase = Phase::Done;
    }
}
