//! # Logic and Comparison
//!
//! ## Atoms Provided
//!
//! - **Equality**: `=`, `not=` (structural), `eq?` (identity)
//! - **Ordering**: `<`, `>`, `<=`, `>=` (numbers, chained)
//! - **Negation**: `not`
//! - **Predicates**: `nil?`, `number?`, `string?`, `bool?`, `keyword?`, `list?`, `map?`, `fn?`

use crate::atoms::helpers::{expect_arity, expect_min_arity, number_arg};
use crate::atoms::{Atom, AtomRegistry, PureAtomFn};
use crate::runtime::value::Value;

/// Structural equality of all arguments.
///
/// Usage: (= <a> <b> ...)
///
/// Example:
///   (= (list 1 2) (list 1 2)) ; => true
pub const ATOM_EQ: PureAtomFn = |args| {
    expect_min_arity("=", args, 2)?;
    Ok(Value::Bool(
        args.windows(2).all(|pair| pair[0].structural_eq(&pair[1])),
    ))
};

pub const ATOM_NEQ: PureAtomFn = |args| {
    Ok(Value::Bool(!ATOM_EQ(args)?.is_truthy()))
};

/// Identity: scalars by value, composites by reference.
///
/// Usage: (eq? <a> <b>)
pub const ATOM_IDENTICAL: PureAtomFn = |args| {
    expect_arity("eq?", args, 2)?;
    Ok(Value::Bool(args[0].same(&args[1])))
};

pub const ATOM_NOT: PureAtomFn = |args| {
    expect_arity("not", args, 1)?;
    Ok(Value::Bool(!args[0].is_truthy()))
};

fn compare_chain(name: &str, args: &[Value], holds: fn(f64, f64) -> bool) -> Result<Value, crate::SutraError> {
    expect_min_arity(name, args, 2)?;
    let mut prev = number_arg(name, args, 0)?;
    let mut result = true;
    for i in 1..args.len() {
        let next = number_arg(name, args, i)?;
        result = result && holds(prev, next);
        prev = next;
    }
    Ok(Value::Bool(result))
}

pub const ATOM_LT: PureAtomFn = |args| compare_chain("<", args, |a, b| a < b);
pub const ATOM_GT: PureAtomFn = |args| compare_chain(">", args, |a, b| a > b);
pub const ATOM_LTE: PureAtomFn = |args| compare_chain("<=", args, |a, b| a <= b);
pub const ATOM_GTE: PureAtomFn = |args| compare_chain(">=", args, |a, b| a >= b);

macro_rules! type_predicate {
    ($name:ident, $atom:literal, $pattern:pat) => {
        pub const $name: PureAtomFn = |args| {
            expect_arity($atom, args, 1)?;
            Ok(Value::Bool(matches!(args[0], $pattern)))
        };
    };
}

type_predicate!(ATOM_IS_NIL, "nil?", Value::Nil);
type_predicate!(ATOM_IS_NUMBER, "number?", Value::Number(_));
type_predicate!(ATOM_IS_STRING, "string?", Value::String(_));
type_predicate!(ATOM_IS_BOOL, "bool?", Value::Bool(_));
type_predicate!(ATOM_IS_KEYWORD, "keyword?", Value::Keyword(_));
type_predicate!(ATOM_IS_LIST, "list?", Value::List(_));
type_predicate!(ATOM_IS_MAP, "map?", Value::Map(_));
type_predicate!(
    ATOM_IS_FN,
    "fn?",
    Value::Lambda(_) | Value::Atom(_) | Value::Native(_) | Value::Mock(_)
);

pub fn register_logic_atoms(registry: &mut AtomRegistry) {
    registry.register("=", Atom::Pure(ATOM_EQ));
    registry.register("not=", Atom::Pure(ATOM_NEQ));
    registry.register("eq?", Atom::Pure(ATOM_IDENTICAL));
    registry.register("not", Atom::Pure(ATOM_NOT));
    registry.register("<", Atom::Pure(ATOM_LT));
    registry.register(">", Atom::Pure(ATOM_GT));
    registry.register("<=", Atom::Pure(ATOM_LTE));
    registry.register(">=", Atom::Pure(ATOM_GTE));
    registry.register("nil?", Atom::Pure(ATOM_IS_NIL));
    registry.register("number?", Atom::Pure(ATOM_IS_NUMBER));
    registry.register("string?", Atom::Pure(ATOM_IS_STRING));
    registry.register("bool?", Atom::Pure(ATOM_IS_BOOL));
    registry.register("keyword?", Atom::Pure(ATOM_IS_KEYWORD));
    registry.register("list?", Atom::Pure(ATOM_IS_LIST));
    registry.register("map?", Atom::Pure(ATOM_IS_MAP));
    registry.register("fn?", Atom::Pure(ATOM_IS_FN));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_structural_and_eq_is_identity() {
        let a = Value::list(vec![Value::Number(1.0)]);
        let b = Value::list(vec![Value::Number(1.0)]);
        assert!(ATOM_EQ(&[a.clone(), b.clone()]).unwrap().is_truthy());
        assert!(!ATOM_IDENTICAL(&[a.clone(), b]).unwrap().is_truthy());
        assert!(ATOM_IDENTICAL(&[a.clone(), a]).unwrap().is_truthy());
    }

    #[test]
    fn comparisons_chain() {
        let args: Vec<Value> = [1.0, 2.0, 2.0].iter().copied().map(Value::Number).collect();
        assert!(ATOM_LTE(&args).unwrap().is_truthy());
        assert!(!ATOM_LT(&args).unwrap().is_truthy());
    }
}
