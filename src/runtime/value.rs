use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write};
use std::ops::Deref;
use std::rc::Rc;

use crate::atoms::AtomRef;
use crate::diagnostics::SourceArc;
use crate::mock::MockFn;
use crate::runtime::env::Env;
use crate::runtime::eval::Interpreter;
use crate::runtime::tasks::{Deferred, DeferredState};
use crate::syntax::{AstNode, Span};
use crate::{err_msg, SutraError};

/// Deepest list or map nesting the collection atoms will build.
pub const MAX_NESTING: usize = 1_000;

/// Canonical runtime value of the test dialect.
///
/// Composite values are reference counted so that `to-be` can tell two
/// structurally equal lists apart.
///
/// # Examples
///
/// ```rust
/// use sutra_test::runtime::Value;
/// let n = Value::Number(3.0);
/// assert_eq!(n.type_name(), "number");
/// assert_eq!(n.to_string(), "3");
/// assert!(Value::Nil.is_nil());
/// assert!(!Value::Nil.is_truthy());
/// ```
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Keyword(String),
    List(Rc<ListItems>),
    Map(Rc<MapEntries>),
    /// User-defined function (captures its defining environment).
    Lambda(Rc<Lambda>),
    /// Built-in atom from the registry.
    Atom(AtomRef),
    /// Sandbox binding closing over per-file state.
    Native(Rc<NativeFn>),
    Mock(Rc<MockFn>),
    Deferred(Rc<Deferred>),
}

/// Elements of a list value.
///
/// Dropping the last reference tears nested collections down iteratively, so
/// arbitrarily deep values never recurse on the native stack.
#[derive(Default)]
pub struct ListItems(Vec<Value>);

impl Deref for ListItems {
    type Target = Vec<Value>;

    fn deref(&self) -> &Vec<Value> {
        &self.0
    }
}

impl Drop for ListItems {
    fn drop(&mut self) {
        release(std::mem::take(&mut self.0));
    }
}

/// Entries of a map value, keyed by name.
#[derive(Default)]
pub struct MapEntries(BTreeMap<String, Value>);

impl Deref for MapEntries {
    type Target = BTreeMap<String, Value>;

    fn deref(&self) -> &BTreeMap<String, Value> {
        &self.0
    }
}

impl Drop for MapEntries {
    fn drop(&mut self) {
        release(std::mem::take(&mut self.0).into_values().collect());
    }
}

/// Drops values whose collections are uniquely owned without recursing into them.
fn release(mut pending: Vec<Value>) {
    while let Some(value) = pending.pop() {
        match value {
            Value::List(items) => {
                if let Ok(mut items) = Rc::try_unwrap(items) {
                    pending.append(&mut items.0);
                }
            }
            Value::Map(entries) => {
                if let Ok(mut entries) = Rc::try_unwrap(entries) {
                    pending.extend(std::mem::take(&mut entries.0).into_values());
                }
            }
            _ => {}
        }
    }
}

/// A user-defined function.
pub struct Lambda {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub rest: Option<String>,
    pub body: Vec<AstNode>,
    pub env: Rc<Env>,
    pub source: SourceArc,
}

pub type NativeBody = dyn Fn(&mut Interpreter, Vec<Value>, Span) -> Result<Value, SutraError>;

/// A host closure injected into a sandbox's global namespace.
pub struct NativeFn {
    pub name: String,
    pub func: Box<NativeBody>,
}

impl NativeFn {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Interpreter, Vec<Value>, Span) -> Result<Value, SutraError> + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    /// Wraps the closure into a callable value.
    pub fn value<F>(name: impl Into<String>, func: F) -> Value
    where
        F: Fn(&mut Interpreter, Vec<Value>, Span) -> Result<Value, SutraError> + 'static,
    {
        Value::Native(Rc::new(Self::new(name, func)))
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(ListItems(items)))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Rc::new(MapEntries(entries)))
    }

    /// A list, refused when it would nest deeper than [`MAX_NESTING`].
    pub fn nested_list(items: Vec<Value>) -> Result<Self, SutraError> {
        check_nesting(nesting_of(items.iter()))?;
        Ok(Value::list(items))
    }

    /// A map, refused when it would nest deeper than [`MAX_NESTING`].
    pub fn nested_map(entries: BTreeMap<String, Value>) -> Result<Self, SutraError> {
        check_nesting(nesting_of(entries.values()))?;
        Ok(Value::map(entries))
    }

    /// Levels of list or map nesting; scalars are 0.
    pub fn nesting(&self) -> usize {
        nesting_of(std::iter::once(self))
    }

    fn collection_key(&self) -> Option<*const ()> {
        match self {
            Value::List(items) => Some(Rc::as_ptr(items) as *const ()),
            Value::Map(entries) => Some(Rc::as_ptr(entries) as *const ()),
            _ => None,
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Value::List(items) => Box::new(items.iter()),
            Value::Map(entries) => Box::new(entries.values()),
            _ => Box::new(std::iter::empty()),
        }
    }

    pub fn empty_map() -> Self {
        Value::map(BTreeMap::new())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Keyword(_) => "keyword",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Lambda(_) | Value::Atom(_) | Value::Native(_) => "function",
            Value::Mock(_) => "mock",
            Value::Deferred(_) => "deferred",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Lambda(_) | Value::Atom(_) | Value::Native(_) | Value::Mock(_)
        )
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mock(&self) -> Option<&Rc<MockFn>> {
        match self {
            Value::Mock(m) => Some(m),
            _ => None,
        }
    }

    /// Identity comparison.
    ///
    /// Scalars compare by value (numbers with `Object.is` semantics: `NaN` is
    /// itself, `0` and `-0` differ); everything else compares by reference.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan())
                    || (a == b && a.is_sign_negative() == b.is_sign_negative())
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::Atom(a), Value::Atom(b)) => a.name == b.name,
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Mock(a), Value::Mock(b)) => Rc::ptr_eq(a, b),
            (Value::Deferred(a), Value::Deferred(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Deep structural comparison; floats compare exactly, `NaN` equals `NaN`.
    pub fn structural_eq(&self, other: &Value) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            match (a, b) {
                (Value::Number(x), Value::Number(y)) => {
                    if !(x == y || (x.is_nan() && y.is_nan())) {
                        return false;
                    }
                }
                (Value::List(x), Value::List(y)) => {
                    if Rc::ptr_eq(x, y) {
                        continue;
                    }
                    if x.len() != y.len() {
                        return false;
                    }
                    pending.extend(x.iter().zip(y.iter()));
                }
                (Value::Map(x), Value::Map(y)) => {
                    if Rc::ptr_eq(x, y) {
                        continue;
                    }
                    if x.len() != y.len() {
                        return false;
                    }
                    for ((ka, va), (kb, vb)) in x.iter().zip(y.iter()) {
                        if ka != kb {
                            return false;
                        }
                        pending.push((va, vb));
                    }
                }
                _ => {
                    if !a.same(b) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Source-like rendering where strings are quoted; used in assertion messages.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_flat(&mut out, true, 0);
        out
    }

    /// Multi-line rendering of composites, one element per line, for diffs.
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, 0);
        out
    }

    fn write_pretty(&self, out: &mut String, indent: usize) {
        if indent >= MAX_NESTING {
            out.push_str("...");
            return;
        }
        let pad = "  ".repeat(indent + 1);
        match self {
            Value::List(items) if !items.is_empty() => {
                out.push_str("(\n");
                for item in items.iter() {
                    out.push_str(&pad);
                    item.write_pretty(out, indent + 1);
                    out.push('\n');
                }
                out.push_str(&"  ".repeat(indent));
                out.push(')');
            }
            Value::Map(entries) if !entries.is_empty() => {
                out.push_str("{\n");
                for (key, value) in entries.iter() {
                    out.push_str(&pad);
                    out.push_str(&format!("{:?} ", key));
                    value.write_pretty(out, indent + 1);
                    out.push('\n');
                }
                out.push_str(&"  ".repeat(indent));
                out.push('}');
            }
            other => out.push_str(&other.repr()),
        }
    }

    /// Single-line rendering; nested strings are always quoted.
    fn write_flat(&self, out: &mut String, quoted: bool, depth: usize) {
        match self {
            Value::Nil => out.push_str("nil"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => out.push_str(&format_number(*n)),
            Value::String(s) if quoted => {
                let _ = write!(out, "{:?}", s);
            }
            Value::String(s) => out.push_str(s),
            Value::Keyword(k) => {
                let _ = write!(out, ":{}", k);
            }
            Value::List(_) | Value::Map(_) if depth >= MAX_NESTING => out.push_str("..."),
            Value::List(items) => {
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    item.write_flat(out, true, depth + 1);
                }
                out.push(')');
            }
            Value::Map(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{:?} ", key);
                    value.write_flat(out, true, depth + 1);
                }
                out.push('}');
            }
            Value::Lambda(l) => match &l.name {
                Some(name) => {
                    let _ = write!(out, "<fn {}>", name);
                }
                None => out.push_str("<fn>"),
            },
            Value::Atom(a) => {
                let _ = write!(out, "<atom {}>", a.name);
            }
            Value::Native(n) => {
                let _ = write!(out, "<native {}>", n.name);
            }
            Value::Mock(m) => {
                let _ = write!(out, "<mock {}#{}>", m.name(), m.id());
            }
            Value::Deferred(d) => out.push_str(match d.state() {
                DeferredState::Pending => "<deferred pending>",
                DeferredState::Fulfilled(_) => "<deferred fulfilled>",
                DeferredState::Rejected(_) => "<deferred rejected>",
            }),
        }
    }
}

/// Height of the deepest collection among `values`; shared sub-collections
/// are measured once.
fn nesting_of<'a>(values: impl Iterator<Item = &'a Value>) -> usize {
    let mut heights: HashMap<*const (), usize> = HashMap::new();
    let mut stack = Vec::new();
    let mut deepest = 0;
    for root in values {
        let Some(root_key) = root.collection_key() else {
            continue;
        };
        stack.push((root, false));
        while let Some((value, expanded)) = stack.pop() {
            let Some(key) = value.collection_key() else {
                continue;
            };
            if heights.contains_key(&key) {
                continue;
            }
            if expanded {
                let below = value
                    .children()
                    .filter_map(|child| child.collection_key())
                    .filter_map(|child| heights.get(&child).copied())
                    .max()
                    .unwrap_or(0);
                heights.insert(key, below + 1);
            } else {
                stack.push((value, true));
                stack.extend(
                    value
                        .children()
                        .filter(|child| child.collection_key().is_some())
                        .map(|child| (child, false)),
                );
            }
        }
        deepest = deepest.max(heights.get(&root_key).copied().unwrap_or(0));
    }
    deepest
}

fn check_nesting(inner: usize) -> Result<(), SutraError> {
    if inner >= MAX_NESTING {
        return Err(err_msg!(
            Eval,
            "Nesting limit exceeded: collections may nest at most {} levels",
            MAX_NESTING
        ));
    }
    Ok(())
}

/// Integral floats print without a fraction; infinities and NaN by name.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_flat(&mut out, false, 0);
        f.write_str(&out)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}
