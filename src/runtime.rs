//! Runtime module for the Sutra test dialect
//!
//! Values, lexical environments, the evaluator, deferred work and the
//! cooperative interrupt used for timeouts and cancellation.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`). A sandbox builds its
//! own interpreter on the worker thread that runs it and drops it there.

pub mod env;
pub mod eval;
pub mod interrupt;
pub mod tasks;
pub mod value;

pub use env::Env;
pub use eval::Interpreter;
pub use interrupt::{CancellationToken, Interrupt};
pub use tasks::{Deferred, DeferredState};
pub use value::{Lambda, ListItems, MapEntries, NativeFn, Value, MAX_NESTING};
