//! Collection operations: immutable lists and string-keyed maps.
//!
//! Every operation returns a new collection; the arguments are never
//! mutated, so a list shared between two bindings stays identical in both.

use std::collections::BTreeMap;

use crate::atoms::helpers::{
    expect_arity, expect_arity_range, index_arg, list_arg, map_arg, map_key, type_error,
};
use crate::atoms::{Atom, AtomRegistry, PureAtomFn};
use crate::err_msg;
use crate::runtime::value::Value;

// ============================================================================
// LISTS
// ============================================================================

/// Usage: (list <a> <b> ...)
pub const ATOM_LIST: PureAtomFn = |args| Value::nested_list(args.to_vec());

/// Length of a list, string (in characters) or map.
///
/// Usage: (len <collection>)
pub const ATOM_LEN: PureAtomFn = |args| {
    expect_arity("len", args, 1)?;
    let len = match &args[0] {
        Value::List(items) => items.len(),
        Value::String(s) => s.chars().count(),
        Value::Map(map) => map.len(),
        other => return Err(type_error("len", 0, "a list, string or map", other)),
    };
    Ok(Value::Number(len as f64))
};

/// First element, or nil for an empty list.
pub const ATOM_FIRST: PureAtomFn = |args| {
    expect_arity("first", args, 1)?;
    let items = list_arg("first", args, 0)?;
    Ok(items.first().cloned().unwrap_or_default())
};

/// Everything after the first element.
pub const ATOM_REST: PureAtomFn = |args| {
    expect_arity("rest", args, 1)?;
    let items = list_arg("rest", args, 0)?;
    Ok(Value::list(items.iter().skip(1).cloned().collect()))
};

/// Usage: (nth <list> <index>)
///
/// Out-of-range indices are an error.
pub const ATOM_NTH: PureAtomFn = |args| {
    expect_arity("nth", args, 2)?;
    let items = list_arg("nth", args, 0)?;
    let index = index_arg("nth", args, 1)?;
    items.get(index).cloned().ok_or_else(|| {
        err_msg!(
            Eval,
            "nth: index {} out of bounds for list of length {}",
            index,
            items.len()
        )
    })
};

/// Usage: (cons <item> <list>)
pub const ATOM_CONS: PureAtomFn = |args| {
    expect_arity("cons", args, 2)?;
    let items = list_arg("cons", args, 1)?;
    let mut out = Vec::with_capacity(items.len() + 1);
    out.push(args[0].clone());
    out.extend(items.iter().cloned());
    Value::nested_list(out)
};

/// Concatenates lists.
///
/// Usage: (append <list> <list> ...)
pub const ATOM_APPEND: PureAtomFn = |args| {
    let mut out = Vec::new();
    for i in 0..args.len() {
        out.extend(list_arg("append", args, i)?.iter().cloned());
    }
    Value::nested_list(out)
};

/// Membership: structural for lists, substring for strings, key for maps.
///
/// Usage: (contains? <collection> <item>)
pub const ATOM_CONTAINS: PureAtomFn = |args| {
    expect_arity("contains?", args, 2)?;
    let found = match &args[0] {
        Value::List(items) => items.iter().any(|item| item.structural_eq(&args[1])),
        Value::String(s) => match &args[1] {
            Value::String(needle) => s.contains(needle.as_str()),
            other => return Err(type_error("contains?", 1, "a string", other)),
        },
        Value::Map(map) => map.contains_key(&map_key("contains?", args, 1)?),
        other => return Err(type_error("contains?", 0, "a list, string or map", other)),
    };
    Ok(Value::Bool(found))
};

// ============================================================================
// MAPS
// ============================================================================

/// Builds a map from alternating keys and values.
///
/// Usage: (dict :a 1 :b 2)
pub const ATOM_DICT: PureAtomFn = |args| {
    if args.len() % 2 != 0 {
        return Err(err_msg!(
            Eval,
            "dict expects an even number of arguments, got {}",
            args.len()
        ));
    }
    let mut map = BTreeMap::new();
    for i in (0..args.len()).step_by(2) {
        map.insert(map_key("dict", args, i)?, args[i + 1].clone());
    }
    Value::nested_map(map)
};

/// Map lookup by key, or list lookup by index, with an optional default.
///
/// Usage: (get <map> <key> [default])
pub const ATOM_GET: PureAtomFn = |args| {
    expect_arity_range("get", args, 2, 3)?;
    let default = args.get(2).cloned().unwrap_or_default();
    let found = match &args[0] {
        Value::Map(map) => map.get(&map_key("get", args, 1)?).cloned(),
        Value::List(items) => items.get(index_arg("get", args, 1)?).cloned(),
        Value::Nil => None,
        other => return Err(type_error("get", 0, "a map or list", other)),
    };
    Ok(found.unwrap_or(default))
};

/// Usage: (assoc <map> <key> <value>)
pub const ATOM_ASSOC: PureAtomFn = |args| {
    expect_arity("assoc", args, 3)?;
    let map = map_arg("assoc", args, 0)?;
    let mut out: BTreeMap<String, Value> = map
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    out.insert(map_key("assoc", args, 1)?, args[2].clone());
    Value::nested_map(out)
};

/// Sorted keys as strings.
pub const ATOM_KEYS: PureAtomFn = |args| {
    expect_arity("keys", args, 1)?;
    let map = map_arg("keys", args, 0)?;
    Ok(Value::list(map.keys().cloned().map(Value::String).collect()))
};

pub const ATOM_HAS: PureAtomFn = |args| {
    expect_arity("has?", args, 2)?;
    let map = map_arg("has?", args, 0)?;
    Ok(Value::Bool(map.contains_key(&map_key("has?", args, 1)?)))
};

pub fn register_collection_atoms(registry: &mut AtomRegistry) {
    registry.register("list", Atom::Pure(ATOM_LIST));
    registry.register("len", Atom::Pure(ATOM_LEN));
    registry.register("first", Atom::Pure(ATOM_FIRST));
    registry.register("rest", Atom::Pure(ATOM_REST));
    registry.register("nth", Atom::Pure(ATOM_NTH));
    registry.register("cons", Atom::Pure(ATOM_CONS));
    registry.register("append", Atom::Pure(ATOM_APPEND));
    registry.register("contains?", Atom::Pure(ATOM_CONTAINS));
    registry.register("dict", Atom::Pure(ATOM_DICT));
    registry.register("get", Atom::Pure(ATOM_GET));
    registry.register("assoc", Atom::Pure(ATOM_ASSOC));
    registry.register("keys", Atom::Pure(ATOM_KEYS));
    registry.register("has?", Atom::Pure(ATOM_HAS));
}
