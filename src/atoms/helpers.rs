//! # Atom Helper Infrastructure
//!
//! Arity checks and typed argument extraction with one error format shared
//! by every atom.

use std::rc::Rc;

use crate::runtime::value::{format_number, ListItems, MapEntries, Value};
use crate::{err_msg, SutraError};

// ============================================================================
// ERROR CONSTRUCTION UTILITIES
// ============================================================================

pub fn arity_error(name: &str, expected: impl std::fmt::Display, actual: usize) -> SutraError {
    err_msg!(
        Eval,
        "Arity error: {} expects {} argument(s), got {}",
        name,
        expected,
        actual
    )
}

pub fn type_error(name: &str, index: usize, expected: &str, found: &Value) -> SutraError {
    err_msg!(
        TypeError,
        "{} expects {} as argument {}, got {}",
        name,
        expected,
        index + 1,
        found.type_name()
    )
}

// ============================================================================
// ARITY
// ============================================================================

pub fn expect_arity(name: &str, args: &[Value], expected: usize) -> Result<(), SutraError> {
    if args.len() != expected {
        return Err(arity_error(name, expected, args.len()));
    }
    Ok(())
}

pub fn expect_arity_range(
    name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), SutraError> {
    if args.len() < min || args.len() > max {
        return Err(arity_error(name, format!("{} to {}", min, max), args.len()));
    }
    Ok(())
}

pub fn expect_min_arity(name: &str, args: &[Value], min: usize) -> Result<(), SutraError> {
    if args.len() < min {
        return Err(arity_error(name, format!("at least {}", min), args.len()));
    }
    Ok(())
}

// ============================================================================
// TYPED EXTRACTION
// ============================================================================

pub fn number_arg(name: &str, args: &[Value], index: usize) -> Result<f64, SutraError> {
    match &args[index] {
        Value::Number(n) => Ok(*n),
        other => Err(type_error(name, index, "a number", other)),
    }
}

/// A non-negative integral number, as used for indices and counts.
pub fn index_arg(name: &str, args: &[Value], index: usize) -> Result<usize, SutraError> {
    match &args[index] {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as usize),
        other => Err(type_error(name, index, "a non-negative integer", other)),
    }
}

pub fn string_arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a str, SutraError> {
    match &args[index] {
        Value::String(s) => Ok(s),
        other => Err(type_error(name, index, "a string", other)),
    }
}

pub fn list_arg<'a>(
    name: &str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a Rc<ListItems>, SutraError> {
    match &args[index] {
        Value::List(items) => Ok(items),
        other => Err(type_error(name, index, "a list", other)),
    }
}

pub fn map_arg<'a>(
    name: &str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a Rc<MapEntries>, SutraError> {
    match &args[index] {
        Value::Map(map) => Ok(map),
        other => Err(type_error(name, index, "a map", other)),
    }
}

pub fn callable_arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a Value, SutraError> {
    let value = &args[index];
    if !value.is_callable() {
        return Err(type_error(name, index, "a function", value));
    }
    Ok(value)
}

/// Map keys: strings and keywords by name, numbers by their printed form.
pub fn map_key(name: &str, args: &[Value], index: usize) -> Result<String, SutraError> {
    match &args[index] {
        Value::String(s) | Value::Keyword(s) => Ok(s.clone()),
        Value::Number(n) => Ok(format_number(*n)),
        other => Err(type_error(name, index, "a string or keyword key", other)),
    }
}
