//! # Mathematical Operations
//!
//! All atoms in this module are pure and work on `Value::Number` (f64).
//!
//! ## Atoms Provided
//!
//! - **Arithmetic**: `+`, `-`, `*`, `/`, `mod`
//! - **Math Functions**: `abs`, `min`, `max`

use crate::atoms::helpers::{expect_arity, expect_min_arity, number_arg};
use crate::atoms::{Atom, AtomRegistry, PureAtomFn};
use crate::runtime::value::Value;
use crate::err_msg;

// ============================================================================
// ARITHMETIC OPERATIONS
// ============================================================================

/// Adds numbers.
///
/// Usage: (+ <a> <b> ...)
///
/// Example:
///   (+ 1 2 3) ; => 6
pub const ATOM_ADD: PureAtomFn = |args| {
    let mut sum = 0.0;
    for i in 0..args.len() {
        sum += number_arg("+", args, i)?;
    }
    Ok(Value::Number(sum))
};

/// Subtracts the remaining numbers from the first; negates a single number.
///
/// Usage: (- <a> <b> ...)
///
/// Example:
///   (- 5 2) ; => 3
///   (- 4)   ; => -4
pub const ATOM_SUB: PureAtomFn = |args| {
    expect_min_arity("-", args, 1)?;
    let first = number_arg("-", args, 0)?;
    if args.len() == 1 {
        return Ok(Value::Number(-first));
    }
    let mut result = first;
    for i in 1..args.len() {
        result -= number_arg("-", args, i)?;
    }
    Ok(Value::Number(result))
};

/// Multiplies numbers.
///
/// Usage: (* <a> <b> ...)
pub const ATOM_MUL: PureAtomFn = |args| {
    let mut product = 1.0;
    for i in 0..args.len() {
        product *= number_arg("*", args, i)?;
    }
    Ok(Value::Number(product))
};

/// Divides the first number by the rest.
///
/// Usage: (/ <a> <b> ...)
///
/// Example:
///   (/ 10 4) ; => 2.5
///   (/ 1 0)  ; error: Division by zero
pub const ATOM_DIV: PureAtomFn = |args| {
    expect_min_arity("/", args, 2)?;
    let mut result = number_arg("/", args, 0)?;
    for i in 1..args.len() {
        let divisor = number_arg("/", args, i)?;
        if divisor == 0.0 {
            return Err(err_msg!(Eval, "Division by zero"));
        }
        result /= divisor;
    }
    Ok(Value::Number(result))
};

/// Remainder with the sign of the dividend.
///
/// Usage: (mod <a> <b>)
pub const ATOM_MOD: PureAtomFn = |args| {
    expect_arity("mod", args, 2)?;
    let a = number_arg("mod", args, 0)?;
    let b = number_arg("mod", args, 1)?;
    if b == 0.0 {
        return Err(err_msg!(Eval, "Modulo by zero"));
    }
    Ok(Value::Number(a % b))
};

// ============================================================================
// MATH FUNCTIONS
// ============================================================================

pub const ATOM_ABS: PureAtomFn = |args| {
    expect_arity("abs", args, 1)?;
    Ok(Value::Number(number_arg("abs", args, 0)?.abs()))
};

pub const ATOM_MIN: PureAtomFn = |args| {
    expect_min_arity("min", args, 1)?;
    let mut result = number_arg("min", args, 0)?;
    for i in 1..args.len() {
        result = result.min(number_arg("min", args, i)?);
    }
    Ok(Value::Number(result))
};

pub const ATOM_MAX: PureAtomFn = |args| {
    expect_min_arity("max", args, 1)?;
    let mut result = number_arg("max", args, 0)?;
    for i in 1..args.len() {
        result = result.max(number_arg("max", args, i)?);
    }
    Ok(Value::Number(result))
};

pub fn register_math_atoms(registry: &mut AtomRegistry) {
    registry.register("+", Atom::Pure(ATOM_ADD));
    registry.register("-", Atom::Pure(ATOM_SUB));
    registry.register("*", Atom::Pure(ATOM_MUL));
    registry.register("/", Atom::Pure(ATOM_DIV));
    registry.register("mod", Atom::Pure(ATOM_MOD));
    registry.register("abs", Atom::Pure(ATOM_ABS));
    registry.register("min", Atom::Pure(ATOM_MIN));
    registry.register("max", Atom::Pure(ATOM_MAX));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(values: &[f64]) -> Vec<Value> {
        values.iter().copied().map(Value::Number).collect()
    }

    #[test]
    fn arithmetic_basics() {
        assert_eq!(ATOM_ADD(&nums(&[1.0, 2.0, 3.0])).unwrap().as_number(), Some(6.0));
        assert_eq!(ATOM_SUB(&nums(&[4.0])).unwrap().as_number(), Some(-4.0));
        assert_eq!(ATOM_DIV(&nums(&[10.0, 4.0])).unwrap().as_number(), Some(2.5));
        assert_eq!(ATOM_MOD(&nums(&[-7.0, 3.0])).unwrap().as_number(), Some(-1.0));
        assert_eq!(ATOM_MAX(&nums(&[1.0, 9.0, 3.0])).unwrap().as_number(), Some(9.0));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let err = ATOM_DIV(&nums(&[1.0, 0.0])).unwrap_err();
        assert_eq!(err.to_string(), "Error: Division by zero");
    }

    #[test]
    fn non_numbers_are_type_errors() {
        let err = ATOM_ADD(&[Value::Number(1.0), Value::from("2")]).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: + expects a number as argument 2, got string");
    }
}
