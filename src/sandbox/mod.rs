//! One isolated execution environment per test file.
//!
//! A [`Sandbox`] owns everything a file can touch: a fresh global frame, its
//! own module cache, suite tree, mock factory, console buffer, PRNG and
//! interpreter. None of it is shared with another sandbox, and a sandbox runs
//! exactly one file. Values here are `Rc`-based, so a sandbox is built and
//! dropped on the thread that runs it; only the resulting [`FileResult`]
//! leaves.

pub mod globals;
pub mod loader;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::atoms::AtomRegistry;
use crate::config::RunConfig;
use crate::discovery::TestFile;
use crate::matchers::MatcherRegistry;
use crate::mock::MockFactory;
use crate::report::FileResult;
use crate::runtime::env::Env;
use crate::runtime::eval::Interpreter;
use crate::runtime::interrupt::CancellationToken;
use crate::suite::runner::Runner;
use crate::suite::SuiteTree;

pub use loader::{FsResolver, ModuleLoader, ModuleRecord, ModuleResolver};

use globals::{Console, SharedTree};

/// Everything needed to build a sandbox; cheap to clone and `Send`.
#[derive(Clone)]
pub struct SandboxOptions {
    pub max_depth: usize,
    pub test_timeout: Option<Duration>,
    pub atoms: AtomRegistry,
    pub matchers: MatcherRegistry,
    pub resolver: Arc<dyn ModuleResolver>,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self::from_config(&RunConfig::default())
    }
}

impl SandboxOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            test_timeout: config.test_timeout,
            atoms: AtomRegistry::standard(),
            matchers: MatcherRegistry::standard(),
            resolver: Arc::new(FsResolver),
        }
    }
}

pub struct Sandbox {
    file: TestFile,
    test_timeout: Option<Duration>,
    interp: Interpreter,
    globals: Rc<Env>,
    loader: Rc<ModuleLoader>,
    tree: SharedTree,
    mocks: Rc<MockFactory>,
    console: Console,
}

impl Sandbox {
    pub fn new(file: TestFile, options: &SandboxOptions, token: CancellationToken) -> Self {
        let globals = Env::root(options.atoms.bindings());
        let tree: SharedTree = Rc::new(RefCell::new(SuiteTree::new()));
        let mocks = Rc::new(MockFactory::default());
        let console: Console = Rc::new(RefCell::new(Vec::new()));
        let rng = Rc::new(RefCell::new(Xoshiro256StarStar::seed_from_u64(seed_for(&file))));

        globals::install_suite_bindings(&globals, &tree);
        globals::install_expect(&globals, options.matchers.clone());
        globals::install_mock_bindings(&globals, &mocks);
        globals::install_console(&globals, &console);
        globals::install_random(&globals, rng);
        globals::install_global_access(&globals);

        let loader = ModuleLoader::new(Arc::clone(&options.resolver), Rc::clone(&globals));

        Self {
            file,
            test_timeout: options.test_timeout,
            interp: Interpreter::new(options.max_depth, token),
            globals,
            loader,
            tree,
            mocks,
            console,
        }
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }

    pub fn loader(&self) -> &Rc<ModuleLoader> {
        &self.loader
    }

    pub fn mocks_created(&self) -> u64 {
        self.mocks.created()
    }

    /// Loads the file (registration), then runs its suite tree.
    pub fn run(&mut self) -> FileResult {
        let started = Instant::now();
        let path = self.file.path.clone();
        info!(file = %path.display(), "running test file");

        self.tree.borrow_mut().reset();

        if let Err(e) = ModuleLoader::load_root(&self.loader, &mut self.interp, &self.file) {
            debug!(file = %path.display(), error = %e, "test file failed to load");
            return FileResult::load_error(
                path,
                e.located_message(),
                self.take_console(),
                started.elapsed(),
            );
        }

        let root = match self.tree.borrow_mut().begin_execution() {
            Ok(root) => root,
            Err(e) => {
                return FileResult::load_error(
                    path,
                    e.located_message(),
                    self.take_console(),
                    started.elapsed(),
                )
            }
        };

        let outcomes = Runner::new(&mut self.interp, self.test_timeout).run(&root);
        self.tree.borrow_mut().finish();
        drop(root);

        let result = FileResult::from_outcomes(path, outcomes, self.take_console(), started.elapsed());
        info!(
            file = %result.path.display(),
            success = result.success,
            tests = result.outcomes.len(),
            "finished test file"
        );
        result
    }

    fn take_console(&self) -> Vec<String> {
        std::mem::take(&mut *self.console.borrow_mut())
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        self.interp.clear_jobs();
        self.loader.teardown();
        self.globals.clear();
        self.tree.borrow_mut().reset();
    }
}

/// Builds, runs and drops a sandbox for one file.
pub fn run_file(file: TestFile, options: &SandboxOptions, token: CancellationToken) -> FileResult {
    Sandbox::new(file, options, token).run()
}

/// PRNG seed derived from the file path, so reruns see the same sequence.
fn seed_for(file: &TestFile) -> u64 {
    let digest = Sha256::digest(file.path.to_string_lossy().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
