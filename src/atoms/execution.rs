//! # Execution Control
//!
//! Atoms that call back into the interpreter.
//!
//! ## Atoms Provided
//!
//! - **Higher-Order**: `apply`, `map`, `filter`, `reduce`
//! - **Errors**: `error`
//! - **Deferred Work**: `defer`, `await`, `deferred?`

use crate::atoms::helpers::{
    callable_arg, expect_arity, expect_min_arity, list_arg,
};
use crate::atoms::{Atom, AtomRegistry, PureAtomFn, StatefulAtomFn};
use crate::err_msg;
use crate::runtime::value::Value;
use crate::syntax::Span;

// ============================================================================
// HIGHER-ORDER OPERATIONS
// ============================================================================

/// Calls a function with arguments, the last of which must be a list.
///
/// Usage: (apply <fn> <arg1> ... <list>)
///
/// Example:
///   (apply + 1 2 (list 3 4)) ; => 10
pub const ATOM_APPLY: StatefulAtomFn = |interp, args| {
    expect_min_arity("apply", args, 2)?;
    let func = callable_arg("apply", args, 0)?;
    let last = args.len() - 1;
    let mut call_args: Vec<Value> = args[1..last].to_vec();
    call_args.extend(list_arg("apply", args, last)?.iter().cloned());
    interp.call(func, call_args, Span::default())
};

/// Usage: (map <fn> <list>)
pub const ATOM_MAP: StatefulAtomFn = |interp, args| {
    expect_arity("map", args, 2)?;
    let func = callable_arg("map", args, 0)?;
    let items = list_arg("map", args, 1)?;
    let mut out = Vec::with_capacity(items.len());
    for item in items.iter() {
        out.push(interp.call(func, vec![item.clone()], Span::default())?);
    }
    Ok(Value::list(out))
};

/// Usage: (filter <pred> <list>)
pub const ATOM_FILTER: StatefulAtomFn = |interp, args| {
    expect_arity("filter", args, 2)?;
    let func = callable_arg("filter", args, 0)?;
    let items = list_arg("filter", args, 1)?;
    let mut out = Vec::new();
    for item in items.iter() {
        if interp.call(func, vec![item.clone()], Span::default())?.is_truthy() {
            out.push(item.clone());
        }
    }
    Ok(Value::list(out))
};

/// Left fold.
///
/// Usage: (reduce <fn> <init> <list>)
///
/// Example:
///   (reduce + 0 (list 1 2 3)) ; => 6
pub const ATOM_REDUCE: StatefulAtomFn = |interp, args| {
    expect_arity("reduce", args, 3)?;
    let func = callable_arg("reduce", args, 0)?;
    let items = list_arg("reduce", args, 2)?;
    let mut acc = args[1].clone();
    for item in items.iter() {
        acc = interp.call(func, vec![acc, item.clone()], Span::default())?;
    }
    Ok(acc)
};

// ============================================================================
// ERRORS
// ============================================================================

/// Raises an error whose message is the display form of the arguments.
///
/// Usage: (error <message> ...)
///
/// Example:
///   (error "bad input: " 3) ; Error: bad input: 3
pub const ATOM_ERROR: PureAtomFn = |args| {
    let message: String = args.iter().map(|arg| arg.to_string()).collect();
    Err(err_msg!(Eval, message))
};

// ============================================================================
// DEFERRED WORK
// ============================================================================

/// Schedules a zero-argument function and returns a deferred value.
///
/// Usage: (defer <thunk>)
pub const ATOM_DEFER: StatefulAtomFn = |interp, args| {
    expect_arity("defer", args, 1)?;
    let thunk = callable_arg("defer", args, 0)?;
    Ok(Value::Deferred(interp.defer(thunk.clone())))
};

/// Waits for a deferred value; other values are returned unchanged.
///
/// Usage: (await <value>)
pub const ATOM_AWAIT: StatefulAtomFn = |interp, args| {
    expect_arity("await", args, 1)?;
    interp.settle(args[0].clone())
};

pub const ATOM_IS_DEFERRED: PureAtomFn = |args| {
    expect_arity("deferred?", args, 1)?;
    Ok(Value::Bool(matches!(args[0], Value::Deferred(_))))
};

pub fn register_execution_atoms(registry: &mut AtomRegistry) {
    registry.register("apply", Atom::Stateful(ATOM_APPLY));
    registry.register("map", Atom::Stateful(ATOM_MAP));
    registry.register("filter", Atom::Stateful(ATOM_FILTER));
    registry.register("reduce", Atom::Stateful(ATOM_REDUCE));
    registry.register("error", Atom::Pure(ATOM_ERROR));
    registry.register("defer", Atom::Stateful(ATOM_DEFER));
    registry.register("await", Atom::Stateful(ATOM_AWAIT));
    registry.register("deferred?", Atom::Pure(ATOM_IS_DEFERRED));
}
