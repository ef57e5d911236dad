//! Per-sandbox module loading.
//!
//! A [`ModuleLoader`] resolves `require` specifiers with a pluggable
//! [`ModuleResolver`], executes each module once in a child of the sandbox's
//! global frame, and caches the module record by resolved path. The cache is
//! owned by one sandbox and dies with it.
//!
//! Every module gets its own `require` (resolving against that module's
//! directory) and `provide` (setting that module's exports). A module required
//! again while it is still loading yields its exports as they stand.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::debug;

use crate::atoms::helpers::expect_arity;
use crate::diagnostics::to_error_source;
use crate::discovery::TestFile;
use crate::runtime::env::Env;
use crate::runtime::eval::Interpreter;
use crate::runtime::value::{NativeFn, Value};
use crate::syntax::parser::parse;
use crate::{err_msg, SutraError};

/// Maps a specifier to a file and reads it.
pub trait ModuleResolver: Send + Sync {
    /// Resolves `specifier` as seen from a module living in `from_dir`.
    fn resolve(&self, specifier: &str, from_dir: &Path) -> Result<PathBuf, SutraError>;

    fn read(&self, path: &Path) -> Result<String, SutraError>;
}

/// Resolves against the file system: relative to the requesting module's
/// directory, trying the specifier as written and then with `.sutra` appended.
/// Resolved paths are canonical, so two spellings of one file share a cache entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsResolver;

impl FsResolver {
    pub const EXTENSION: &'static str = "sutra";
}

impl ModuleResolver for FsResolver {
    fn resolve(&self, specifier: &str, from_dir: &Path) -> Result<PathBuf, SutraError> {
        let base = from_dir.join(specifier);
        let mut candidates = vec![base.clone()];
        if base.extension().and_then(|e| e.to_str()) != Some(Self::EXTENSION) {
            let mut with_ext = base.into_os_string();
            with_ext.push(".");
            with_ext.push(Self::EXTENSION);
            candidates.push(PathBuf::from(with_ext));
        }
        candidates
            .into_iter()
            .find(|candidate| candidate.is_file())
            .and_then(|found| found.canonicalize().ok())
            .ok_or_else(|| {
                err_msg!(
                    Load,
                    "Cannot find module '{}' from '{}'",
                    specifier,
                    from_dir.display()
                )
            })
    }

    fn read(&self, path: &Path) -> Result<String, SutraError> {
        std::fs::read_to_string(path)
            .map_err(|e| err_msg!(Load, "Failed to read module '{}': {}", path.display(), e))
    }
}

/// One loaded (or loading) module.
pub struct ModuleRecord {
    pub path: PathBuf,
    /// Where this module's own `require` calls resolve from.
    pub dir: PathBuf,
    exports: RefCell<Value>,
    loaded: Cell<bool>,
}

impl ModuleRecord {
    fn new(path: PathBuf, dir: PathBuf) -> Self {
        Self {
            path,
            dir,
            exports: RefCell::new(Value::empty_map()),
            loaded: Cell::new(false),
        }
    }

    pub fn exports(&self) -> Value {
        self.exports.borrow().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub struct ModuleLoader {
    resolver: Arc<dyn ModuleResolver>,
    globals: Rc<Env>,
    cache: RefCell<HashMap<PathBuf, Rc<ModuleRecord>>>,
    /// Module frames, kept so teardown can break closure cycles.
    frames: RefCell<Vec<Rc<Env>>>,
    executions: Cell<usize>,
}

impl ModuleLoader {
    pub fn new(resolver: Arc<dyn ModuleResolver>, globals: Rc<Env>) -> Rc<Self> {
        Rc::new(Self {
            resolver,
            globals,
            cache: RefCell::new(HashMap::new()),
            frames: RefCell::new(Vec::new()),
            executions: Cell::new(0),
        })
    }

    /// How many module bodies have been executed (cache misses).
    pub fn executions(&self) -> usize {
        self.executions.get()
    }

    pub fn cached_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.cache.borrow().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Executes the test file itself as the first module of the sandbox.
    pub fn load_root(
        this: &Rc<Self>,
        interp: &mut Interpreter,
        file: &TestFile,
    ) -> Result<Rc<ModuleRecord>, SutraError> {
        let path = file.path.canonicalize().unwrap_or_else(|_| file.path.clone());
        Self::load_path(this, interp, path, file.dir.clone())
    }

    /// `require`: resolves `specifier` from `from_dir` and returns the exports.
    pub fn require(
        this: &Rc<Self>,
        interp: &mut Interpreter,
        specifier: &str,
        from_dir: &Path,
    ) -> Result<Value, SutraError> {
        let path = this.resolver.resolve(specifier, from_dir)?;
        let dir = parent_dir(&path);
        let record = Self::load_path(this, interp, path, dir)?;
        Ok(record.exports())
    }

    fn load_path(
        this: &Rc<Self>,
        interp: &mut Interpreter,
        path: PathBuf,
        dir: PathBuf,
    ) -> Result<Rc<ModuleRecord>, SutraError> {
        if let Some(record) = this.cache.borrow().get(&path) {
            debug!(module = %path.display(), loaded = record.is_loaded(), "module cache hit");
            return Ok(Rc::clone(record));
        }

        let text = this.resolver.read(&path)?;
        let record = Rc::new(ModuleRecord::new(path.clone(), dir));
        this.cache
            .borrow_mut()
            .insert(path.clone(), Rc::clone(&record));

        debug!(module = %path.display(), "loading module");
        if let Err(e) = Self::execute(this, interp, &record, &text) {
            this.cache.borrow_mut().remove(&path);
            return Err(e);
        }
        record.loaded.set(true);
        Ok(record)
    }

    fn execute(
        this: &Rc<Self>,
        interp: &mut Interpreter,
        record: &Rc<ModuleRecord>,
        text: &str,
    ) -> Result<(), SutraError> {
        this.executions.set(this.executions.get() + 1);
        let source = to_error_source(record.path.display().to_string(), text);
        let nodes = parse(text, &source)?;

        let frame = Env::child(&this.globals);
        Self::bind_module_scope(this, &frame, record);
        this.frames.borrow_mut().push(Rc::clone(&frame));

        interp.eval_program(&nodes, &frame, &source)?;
        Ok(())
    }

    fn bind_module_scope(this: &Rc<Self>, frame: &Rc<Env>, record: &Rc<ModuleRecord>) {
        let loader: Weak<ModuleLoader> = Rc::downgrade(this);
        let dir = record.dir.clone();
        frame.define(
            "require",
            NativeFn::value("require", move |interp, args, _span| {
                expect_arity("require", &args, 1)?;
                let Some(specifier) = args[0].as_str() else {
                    return Err(err_msg!(
                        TypeError,
                        "require expects a string specifier, got {}",
                        args[0].type_name()
                    ));
                };
                let loader = loader
                    .upgrade()
                    .ok_or_else(|| err_msg!(Internal, "module loader used after its sandbox was dropped"))?;
                ModuleLoader::require(&loader, interp, specifier, &dir)
            }),
        );

        let target = Rc::downgrade(record);
        frame.define(
            "provide",
            NativeFn::value("provide", move |_interp, args, _span| {
                expect_arity("provide", &args, 1)?;
                if let Some(record) = target.upgrade() {
                    *record.exports.borrow_mut() = args[0].clone();
                }
                Ok(args[0].clone())
            }),
        );

        frame.define("module/path", Value::String(record.path.display().to_string()));
    }

    /// Drops cached modules and clears module frames.
    pub fn teardown(&self) {
        for frame in self.frames.borrow_mut().drain(..) {
            frame.clear();
        }
        self.cache.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn fs_resolver_tries_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("util.sutra"), "(provide 1)").unwrap();

        let bare = FsResolver.resolve("./util", dir.path()).unwrap();
        let explicit = FsResolver.resolve("util.sutra", dir.path()).unwrap();
        assert_eq!(bare, explicit);
        assert!(bare.is_absolute());
    }

    #[test]
    fn fs_resolver_reports_missing_modules() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsResolver.resolve("./gone", dir.path()).unwrap_err();
        assert_eq!(err.error_type(), crate::diagnostics::ErrorType::Load);
        assert!(err.message().starts_with("Cannot find module './gone' from '"));
    }
}
