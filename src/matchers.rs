//! The matcher library behind `expect`.
//!
//! A matcher compares a received value against its arguments and reports a
//! [`MatchOutcome`]. [`Expectation`] turns an outcome that disagrees with the
//! requested polarity into an `Assertion` error whose message names both
//! sides:
//!
//! ```text
//! expect(received).to-be(expected)
//!
//! Expected: 3
//! Received: 2
//! ```
//!
//! Matchers never mutate their inputs. The only one that runs code is
//! `to-throw`, which calls the received function.

use im::HashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use difference::{Changeset, Difference};

use crate::diagnostics::ErrorType;
use crate::runtime::eval::Interpreter;
use crate::runtime::value::{format_number, Value};
use crate::syntax::Span;
use crate::{err_msg, SutraError};

pub type MatcherFn =
    fn(interp: &mut Interpreter, received: &Value, args: &[Value]) -> Result<MatchOutcome, SutraError>;

/// What a matcher found.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub pass: bool,
    /// Rendered expectation; `None` for matchers that take no argument.
    pub expected: Option<String>,
    pub received: Option<String>,
    /// Extra lines appended after `Expected`/`Received`, such as a diff.
    pub notes: Vec<String>,
}

impl MatchOutcome {
    fn new(pass: bool, expected: Option<String>, received: Option<String>) -> Self {
        Self {
            pass,
            expected,
            received,
            notes: Vec::new(),
        }
    }

    fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

static BUILTIN_MATCHERS: Lazy<MatcherRegistry> = Lazy::new(|| {
    let mut registry = MatcherRegistry::default();
    register_builtin_matchers(&mut registry);
    registry
});

/// Named matchers available to `expect`. Cloning is cheap.
#[derive(Clone, Default)]
pub struct MatcherRegistry {
    matchers: HashMap<String, MatcherFn>,
}

impl MatcherRegistry {
    /// The built-in matcher set.
    pub fn standard() -> Self {
        BUILTIN_MATCHERS.clone()
    }

    pub fn register(&mut self, name: impl Into<String>, matcher: MatcherFn) {
        self.matchers.insert(name.into(), matcher);
    }

    pub fn get(&self, name: &str) -> Option<MatcherFn> {
        self.matchers.get(name).copied()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.matchers.keys().cloned().collect();
        names.sort();
        names
    }
}

fn register_builtin_matchers(registry: &mut MatcherRegistry) {
    registry.register("to-be", to_be);
    registry.register("to-equal", to_equal);
    registry.register("to-be-close-to", to_be_close_to);
    registry.register("to-be-truthy", to_be_truthy);
    registry.register("to-be-falsy", to_be_falsy);
    registry.register("to-be-nil", to_be_nil);
    registry.register("to-be-greater-than", to_be_greater_than);
    registry.register("to-be-less-than", to_be_less_than);
    registry.register("to-contain", to_contain);
    registry.register("to-have-length", to_have_length);
    registry.register("to-match", to_match);
    registry.register("to-throw", to_throw);
    registry.register("to-have-been-called", to_have_been_called);
    registry.register("to-have-been-called-times", to_have_been_called_times);
    registry.register("to-have-been-called-with", to_have_been_called_with);
    registry.register("to-have-been-last-called-with", to_have_been_last_called_with);
}

// ============================================================================
// EXPECTATION
// ============================================================================

/// `expect(received)`, optionally negated.
#[derive(Debug, Clone)]
pub struct Expectation {
    received: Value,
    negated: bool,
}

impl Expectation {
    pub fn new(received: Value) -> Self {
        Self {
            received,
            negated: false,
        }
    }

    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Builds an expectation from the arguments of `(expect actual [:not] :matcher args...)`
    /// and runs it.
    pub fn evaluate(
        interp: &mut Interpreter,
        registry: &MatcherRegistry,
        args: Vec<Value>,
    ) -> Result<(), SutraError> {
        let mut args = args.into_iter();
        let Some(received) = args.next() else {
            return Err(err_msg!(Eval, "expect needs a received value and a matcher"));
        };
        let mut rest: Vec<Value> = args.collect();
        let mut expectation = Expectation::new(received);
        if matches!(rest.first(), Some(Value::Keyword(k)) if k == "not") {
            rest.remove(0);
            expectation = expectation.not();
        }
        let Some((name, matcher_args)) = rest.split_first() else {
            return Err(err_msg!(Eval, "expect needs a matcher, as in (expect x :to-be 1)"));
        };
        let name = match name {
            Value::Keyword(k) | Value::String(k) => k.as_str(),
            other => {
                return Err(err_msg!(
                    TypeError,
                    "matcher name must be a keyword, got {}",
                    other.type_name()
                ))
            }
        };
        expectation.check(interp, registry, name, matcher_args)
    }

    /// Runs matcher `name`; fails with an `Assertion` error when the outcome
    /// disagrees with the expectation's polarity.
    pub fn check(
        &self,
        interp: &mut Interpreter,
        registry: &MatcherRegistry,
        name: &str,
        args: &[Value],
    ) -> Result<(), SutraError> {
        let Some(matcher) = registry.get(name) else {
            return Err(err_msg!(Eval, "Unknown matcher: :{}", name)
                .with_help(format!("available matchers: {}", registry.names().join(", "))));
        };
        let outcome = matcher(interp, &self.received, args)?;
        if outcome.pass != self.negated {
            return Ok(());
        }
        Err(err_msg!(Assertion, self.failure_message(name, &outcome)))
    }

    pub fn to_be(&self, interp: &mut Interpreter, expected: Value) -> Result<(), SutraError> {
        self.check(interp, &BUILTIN_MATCHERS, "to-be", &[expected])
    }

    pub fn to_equal(&self, interp: &mut Interpreter, expected: Value) -> Result<(), SutraError> {
        self.check(interp, &BUILTIN_MATCHERS, "to-equal", &[expected])
    }

    fn failure_message(&self, name: &str, outcome: &MatchOutcome) -> String {
        let not = if self.negated { "not." } else { "" };
        let arg = if outcome.expected.is_some() { "expected" } else { "" };
        let mut message = format!("expect(received).{}{}({})\n", not, name, arg);
        if let Some(expected) = &outcome.expected {
            let not = if self.negated { "not " } else { "" };
            message.push_str(&format!("\nExpected: {}{}", not, expected));
        }
        if let Some(received) = &outcome.received {
            message.push_str(&format!("\nReceived: {}", received));
        }
        for note in &outcome.notes {
            message.push_str("\n\n");
            message.push_str(note);
        }
        message
    }
}

// ============================================================================
// ARGUMENT HELPERS
// ============================================================================

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<(), SutraError> {
    if args.len() != count {
        return Err(err_msg!(
            Eval,
            ":{} expects {} argument(s), got {}",
            name,
            count,
            args.len()
        ));
    }
    Ok(())
}

fn number(name: &str, role: &str, value: &Value) -> Result<f64, SutraError> {
    value.as_number().ok_or_else(|| {
        err_msg!(
            TypeError,
            ":{} expects the {} value to be a number, got {}",
            name,
            role,
            value.type_name()
        )
    })
}

fn mock<'a>(name: &str, received: &'a Value) -> Result<&'a std::rc::Rc<crate::mock::MockFn>, SutraError> {
    received.as_mock().ok_or_else(|| {
        err_msg!(
            TypeError,
            ":{} expects the received value to be a mock function, got {}",
            name,
            received.type_name()
        )
    })
}

/// Line diff of two values' multi-line renderings.
fn line_diff(expected: &Value, received: &Value) -> String {
    let changeset = Changeset::new(&expected.pretty(), &received.pretty(), "\n");
    let mut out = String::from("- Expected\n+ Received\n");
    for diff in &changeset.diffs {
        let (prefix, text) = match diff {
            Difference::Same(text) => ("  ", text),
            Difference::Rem(text) => ("- ", text),
            Difference::Add(text) => ("+ ", text),
        };
        for line in text.split('\n') {
            out.push('\n');
            out.push_str(prefix);
            out.push_str(line);
        }
    }
    out
}

fn is_composite(value: &Value) -> bool {
    matches!(value, Value::List(_) | Value::Map(_))
}

// ============================================================================
// VALUE MATCHERS
// ============================================================================

fn to_be(_: &mut Interpreter, received: &Value, args: &[Value]) -> Result<MatchOutcome, SutraError> {
    expect_args("to-be", args, 1)?;
    let expected = &args[0];
    let outcome = MatchOutcome::new(
        received.same(expected),
        Some(expected.repr()),
        Some(received.repr()),
    );
    if !outcome.pass && received.structural_eq(expected) {
        return Ok(outcome.note(
            "If it should pass with deep equality, replace :to-be with :to-equal",
        ));
    }
    Ok(outcome)
}

fn to_equal(_: &mut Interpreter, received: &Value, args: &[Value]) -> Result<MatchOutcome, SutraError> {
    expect_args("to-equal", args, 1)?;
    let expected = &args[0];
    let outcome = MatchOutcome::new(
        received.structural_eq(expected),
        Some(expected.repr()),
        Some(received.repr()),
    );
    if !outcome.pass && is_composite(expected) && is_composite(received) {
        return Ok(outcome.note(line_diff(expected, received)));
    }
    Ok(outcome)
}

fn to_be_close_to(
    _: &mut Interpreter,
    received: &Value,
    args: &[Value],
) -> Result<MatchOutcome, SutraError> {
    if args.is_empty() || args.len() > 2 {
        return Err(err_msg!(
            Eval,
            ":to-be-close-to expects 1 or 2 argument(s), got {}",
            args.len()
        ));
    }
    let expected = number("to-be-close-to", "expected", &args[0])?;
    let actual = number("to-be-close-to", "received", received)?;
    let digits = match args.get(1) {
        Some(d) => number("to-be-close-to", "precision", d)?,
        None => 2.0,
    };
    let tolerance = 10f64.powf(-digits) / 2.0;
    let difference = (expected - actual).abs();
    let pass = if expected.is_infinite() || actual.is_infinite() {
        expected == actual
    } else {
        difference < tolerance
    };
    Ok(MatchOutcome::new(pass, Some(format_number(expected)), Some(format_number(actual)))
        .note(format!(
            "Expected difference: < {}\nReceived difference: {}",
            format_number(tolerance),
            format_number(difference)
        )))
}

fn to_be_truthy(_: &mut Interpreter, received: &Value, args: &[Value]) -> Result<MatchOutcome, SutraError> {
    expect_args("to-be-truthy", args, 0)?;
    Ok(MatchOutcome::new(received.is_truthy(), None, Some(received.repr())))
}

fn to_be_falsy(_: &mut Interpreter, received: &Value, args: &[Value]) -> Result<MatchOutcome, SutraError> {
    expect_args("to-be-falsy", args, 0)?;
    Ok(MatchOutcome::new(!received.is_truthy(), None, Some(received.repr())))
}

fn to_be_nil(_: &mut Interpreter, received: &Value, args: &[Value]) -> Result<MatchOutcome, SutraError> {
    expect_args("to-be-nil", args, 0)?;
    Ok(MatchOutcome::new(received.is_nil(), None, Some(received.repr())))
}

fn to_be_greater_than(
    _: &mut Interpreter,
    received: &Value,
    args: &[Value],
) -> Result<MatchOutcome, SutraError> {
    expect_args("to-be-greater-than", args, 1)?;
    let bound = number("to-be-greater-than", "expected", &args[0])?;
    let actual = number("to-be-greater-than", "received", received)?;
    Ok(MatchOutcome::new(
        actual > bound,
        Some(format!("> {}", format_number(bound))),
        Some(format_number(actual)),
    ))
}

fn to_be_less_than(
    _: &mut Interpreter,
    received: &Value,
    args: &[Value],
) -> Result<MatchOutcome, SutraError> {
    expect_args("to-be-less-than", args, 1)?;
    let bound = number("to-be-less-than", "expected", &args[0])?;
    let actual = number("to-be-less-than", "received", received)?;
    Ok(MatchOutcome::new(
        actual < bound,
        Some(format!("< {}", format_number(bound))),
        Some(format_number(actual)),
    ))
}

fn to_contain(_: &mut Interpreter, received: &Value, args: &[Value]) -> Result<MatchOutcome, SutraError> {
    expect_args("to-contain", args, 1)?;
    let item = &args[0];
    let pass = match (received, item) {
        (Value::List(items), _) => items.iter().any(|v| v.structural_eq(item)),
        (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
        (Value::Map(map), Value::String(key) | Value::Keyword(key)) => map.contains_key(key),
        _ => {
            return Err(err_msg!(
                TypeError,
                ":to-contain cannot look for a {} inside a {}",
                item.type_name(),
                received.type_name()
            ))
        }
    };
    Ok(MatchOutcome::new(pass, Some(item.repr()), Some(received.repr())))
}

fn to_have_length(
    _: &mut Interpreter,
    received: &Value,
    args: &[Value],
) -> Result<MatchOutcome, SutraError> {
    expect_args("to-have-length", args, 1)?;
    let expected = number("to-have-length", "expected", &args[0])?;
    let length = match received {
        Value::List(items) => items.len(),
        Value::String(s) => s.chars().count(),
        Value::Map(map) => map.len(),
        other => {
            return Err(err_msg!(
                TypeError,
                ":to-have-length expects a list, string or map, got {}",
                other.type_name()
            ))
        }
    };
    Ok(MatchOutcome::new(
        length as f64 == expected,
        Some(format_number(expected)),
        Some(length.to_string()),
    )
    .note(format!("Received value: {}", received.repr())))
}

fn to_match(_: &mut Interpreter, received: &Value, args: &[Value]) -> Result<MatchOutcome, SutraError> {
    expect_args("to-match", args, 1)?;
    let pattern = args[0].as_str().ok_or_else(|| {
        err_msg!(TypeError, ":to-match expects a pattern string, got {}", args[0].type_name())
    })?;
    let text = received.as_str().ok_or_else(|| {
        err_msg!(TypeError, ":to-match expects the received value to be a string, got {}", received.type_name())
    })?;
    let regex = Regex::new(pattern)
        .map_err(|e| err_msg!(Eval, ":to-match got an invalid pattern: {}", e))?;
    Ok(MatchOutcome::new(
        regex.is_match(text),
        Some(format!("/{}/", pattern)),
        Some(received.repr()),
    ))
}

/// Calls the received function; passes when it fails (and, given a
/// substring, when the failure message contains it).
fn to_throw(interp: &mut Interpreter, received: &Value, args: &[Value]) -> Result<MatchOutcome, SutraError> {
    if args.len() > 1 {
        return Err(err_msg!(Eval, ":to-throw expects 0 or 1 argument(s), got {}", args.len()));
    }
    if !received.is_callable() {
        return Err(err_msg!(
            TypeError,
            ":to-throw expects the received value to be a function, got {}",
            received.type_name()
        ));
    }
    let expected = match args.first() {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(other) => {
            return Err(err_msg!(TypeError, ":to-throw expects a message substring, got {}", other.type_name()))
        }
        None => None,
    };

    let outcome = interp
        .call(received, vec![], Span::default())
        .and_then(|value| interp.settle(value));
    let thrown = match outcome {
        Ok(_) => None,
        Err(e) if matches!(e.error_type(), ErrorType::Timeout | ErrorType::Cancelled) => return Err(e),
        Err(e) => Some(e.to_string()),
    };

    let pass = match (&thrown, expected) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(message), Some(substring)) => message.contains(substring),
    };
    let received = match &thrown {
        Some(message) => format!("{:?}", message),
        None => "function did not throw".to_string(),
    };
    Ok(MatchOutcome::new(
        pass,
        expected.map(|s| format!("{:?}", s)),
        Some(received),
    ))
}

// ============================================================================
// MOCK MATCHERS
// ============================================================================

fn to_have_been_called(
    _: &mut Interpreter,
    received: &Value,
    args: &[Value],
) -> Result<MatchOutcome, SutraError> {
    expect_args("to-have-been-called", args, 0)?;
    let mock = mock("to-have-been-called", received)?;
    let count = mock.call_count();
    Ok(MatchOutcome::new(count > 0, None, Some(format!("{} call(s)", count))))
}

fn to_have_been_called_times(
    _: &mut Interpreter,
    received: &Value,
    args: &[Value],
) -> Result<MatchOutcome, SutraError> {
    expect_args("to-have-been-called-times", args, 1)?;
    let mock = mock("to-have-been-called-times", received)?;
    let expected = number("to-have-been-called-times", "expected", &args[0])?;
    let count = mock.call_count();
    Ok(MatchOutcome::new(
        count as f64 == expected,
        Some(format!("{} call(s)", format_number(expected))),
        Some(format!("{} call(s)", count)),
    ))
}

fn to_have_been_called_with(
    _: &mut Interpreter,
    received: &Value,
    args: &[Value],
) -> Result<MatchOutcome, SutraError> {
    let mock = mock("to-have-been-called-with", received)?;
    let expected = Value::list(args.to_vec());
    let pass = mock
        .calls()
        .into_iter()
        .any(|call| Value::list(call).structural_eq(&expected));
    Ok(MatchOutcome::new(pass, Some(expected.repr()), Some(mock.calls_value().repr())))
}

fn to_have_been_last_called_with(
    _: &mut Interpreter,
    received: &Value,
    args: &[Value],
) -> Result<MatchOutcome, SutraError> {
    let mock = mock("to-have-been-last-called-with", received)?;
    let expected = Value::list(args.to_vec());
    let last = mock.last_call().map(Value::list);
    let pass = last.as_ref().is_some_and(|call| call.structural_eq(&expected));
    let received = match last {
        Some(call) => call.repr(),
        None => "no calls".to_string(),
    };
    Ok(MatchOutcome::new(pass, Some(expected.repr()), Some(received)))
}
