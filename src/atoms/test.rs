//! Test-only atoms that misbehave on purpose, for exercising the
//! dispatcher's failure isolation. Compiled only into unit tests and builds
//! with the `test-atom` feature.
//!
//! ## Atoms Provided
//!
//! - **`test/panic`**: panics the worker thread running the file
//! - **`test/sleep`**: blocks the thread without cooperating with deadlines

use std::thread;
use std::time::Duration;

use crate::atoms::helpers::{expect_arity, expect_arity_range, number_arg};
use crate::atoms::{Atom, AtomRegistry, PureAtomFn};
use crate::runtime::value::Value;

/// Usage: (test/panic [message])
pub const ATOM_PANIC: PureAtomFn = |args| {
    expect_arity_range("test/panic", args, 0, 1)?;
    let message = args
        .first()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "test/panic".to_string());
    panic!("{}", message);
};

/// Usage: (test/sleep <ms>)
pub const ATOM_SLEEP: PureAtomFn = |args| {
    expect_arity("test/sleep", args, 1)?;
    let ms = number_arg("test/sleep", args, 0)?.max(0.0);
    thread::sleep(Duration::from_millis(ms as u64));
    Ok(Value::Nil)
};

pub fn register_test_atoms(registry: &mut AtomRegistry) {
    registry.register("test/panic", Atom::Pure(ATOM_PANIC));
    registry.register("test/sleep", Atom::Pure(ATOM_SLEEP));
}
