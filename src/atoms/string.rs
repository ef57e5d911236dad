//! String atoms.

use crate::atoms::helpers::{expect_arity, string_arg};
use crate::atoms::{Atom, AtomRegistry, PureAtomFn};
use crate::runtime::value::Value;

/// Concatenates the display form of every argument.
///
/// Usage: (str <a> <b> ...)
///
/// Example:
///   (str "n=" 3) ; => "n=3"
pub const ATOM_STR: PureAtomFn = |args| {
    let mut out = String::new();
    for arg in args {
        out.push_str(&arg.to_string());
    }
    Ok(Value::String(out))
};

pub const ATOM_UPPER: PureAtomFn = |args| {
    expect_arity("str/upper", args, 1)?;
    Ok(Value::String(string_arg("str/upper", args, 0)?.to_uppercase()))
};

pub const ATOM_LOWER: PureAtomFn = |args| {
    expect_arity("str/lower", args, 1)?;
    Ok(Value::String(string_arg("str/lower", args, 0)?.to_lowercase()))
};

/// Usage: (str/split <string> <separator>)
pub const ATOM_SPLIT: PureAtomFn = |args| {
    expect_arity("str/split", args, 2)?;
    let s = string_arg("str/split", args, 0)?;
    let sep = string_arg("str/split", args, 1)?;
    let parts = if sep.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(sep).map(Value::from).collect()
    };
    Ok(Value::list(parts))
};

pub fn register_string_atoms(registry: &mut AtomRegistry) {
    registry.register("str", Atom::Pure(ATOM_STR));
    registry.register("str/upper", Atom::Pure(ATOM_UPPER));
    registry.register("str/lower", Atom::Pure(ATOM_LOWER));
    registry.register("str/split", Atom::Pure(ATOM_SPLIT));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_uses_display_form() {
        let v = ATOM_STR(&[Value::from("n="), Value::Number(3.0), Value::Nil]).unwrap();
        assert_eq!(v.as_str(), Some("n=3nil"));
    }

    #[test]
    fn split_on_empty_separator_yields_chars() {
        let v = ATOM_SPLIT(&[Value::from("ab"), Value::from("")]).unwrap();
        assert_eq!(v.to_string(), "(\"a\" \"b\")");
    }
}
