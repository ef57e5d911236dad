//! Ambient bindings installed into every sandbox's global frame.
//!
//! Each binding closes over state owned by that one sandbox (its suite tree,
//! mock factory, console, PRNG), so nothing here is process-global.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rand::Rng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::atoms::helpers::{expect_arity, expect_arity_range, number_arg, type_error};
use crate::matchers::{Expectation, MatcherRegistry};
use crate::mock::{MockFactory, MockFn};
use crate::runtime::env::Env;
use crate::runtime::value::{NativeFn, Value};
use crate::suite::{HookKind, SuiteTree};
use crate::{err_msg, SutraError};

pub type SharedTree = Rc<RefCell<SuiteTree>>;
pub type Console = Rc<RefCell<Vec<String>>>;

/// Test and suite names may be strings, keywords or anything printable.
fn name_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn callable(binding: &str, args: &[Value], index: usize) -> Result<Value, SutraError> {
    let value = &args[index];
    if !value.is_callable() {
        return Err(type_error(binding, index, "a function", value));
    }
    Ok(value.clone())
}

// ============================================================================
// SUITE REGISTRATION
// ============================================================================

pub fn install_suite_bindings(env: &Env, tree: &SharedTree) {
    let describe_tree = Rc::clone(tree);
    env.define(
        "describe",
        NativeFn::value("describe", move |interp, args, span| {
            expect_arity("describe", &args, 2)?;
            let body = callable("describe", &args, 1)?;
            describe_tree.borrow_mut().begin_suite(name_arg(&args[0]))?;
            let result = interp.call(&body, vec![], span);
            describe_tree.borrow_mut().end_suite()?;
            result.map(|_| Value::Nil)
        }),
    );

    for (binding, skip) in [("it", false), ("test", false), ("it/skip", true)] {
        let test_tree = Rc::clone(tree);
        env.define(
            binding,
            NativeFn::value(binding, move |_interp, args, _span| {
                let body = if skip {
                    expect_arity_range(binding, &args, 1, 2)?;
                    args.get(1).cloned().unwrap_or_default()
                } else {
                    expect_arity(binding, &args, 2)?;
                    callable(binding, &args, 1)?
                };
                test_tree
                    .borrow_mut()
                    .add_test(name_arg(&args[0]), body, skip)?;
                Ok(Value::Nil)
            }),
        );
    }

    for kind in [
        HookKind::BeforeAll,
        HookKind::BeforeEach,
        HookKind::AfterEach,
        HookKind::AfterAll,
    ] {
        let hook_tree = Rc::clone(tree);
        let binding = kind.binding_name();
        env.define(
            binding,
            NativeFn::value(binding, move |_interp, args, _span| {
                expect_arity(binding, &args, 1)?;
                let hook = callable(binding, &args, 0)?;
                hook_tree.borrow_mut().add_hook(kind, hook)?;
                Ok(Value::Nil)
            }),
        );
    }
}

// ============================================================================
// EXPECT AND MOCKS
// ============================================================================

pub fn install_expect(env: &Env, matchers: MatcherRegistry) {
    env.define(
        "expect",
        NativeFn::value("expect", move |interp, args, _span| {
            Expectation::evaluate(interp, &matchers, args)?;
            Ok(Value::Nil)
        }),
    );
}

fn mock_arg<'a>(binding: &str, args: &'a [Value]) -> Result<&'a Rc<MockFn>, SutraError> {
    expect_arity(binding, args, 1)?;
    args[0]
        .as_mock()
        .ok_or_else(|| type_error(binding, 0, "a mock function", &args[0]))
}

pub fn install_mock_bindings(env: &Env, factory: &Rc<MockFactory>) {
    let mock_factory = Rc::clone(factory);
    env.define(
        "mock/fn",
        NativeFn::value("mock/fn", move |_interp, args, _span| {
            expect_arity_range("mock/fn", &args, 0, 2)?;
            let implementation = match args.first() {
                None | Some(Value::Nil) => None,
                Some(_) => Some(callable("mock/fn", &args, 0)?),
            };
            let name = args.get(1).map(name_arg);
            Ok(Value::Mock(mock_factory.create(implementation, name)))
        }),
    );

    env.define(
        "mock/calls",
        NativeFn::value("mock/calls", |_interp, args, _span| {
            Ok(mock_arg("mock/calls", &args)?.calls_value())
        }),
    );
    env.define(
        "mock/call-count",
        NativeFn::value("mock/call-count", |_interp, args, _span| {
            Ok(Value::Number(mock_arg("mock/call-count", &args)?.call_count() as f64))
        }),
    );
    env.define(
        "mock/results",
        NativeFn::value("mock/results", |_interp, args, _span| {
            let mock = mock_arg("mock/results", &args)?;
            Ok(Value::list(mock.results().iter().map(|r| r.to_value()).collect()))
        }),
    );
    env.define(
        "mock/name",
        NativeFn::value("mock/name", |_interp, args, _span| {
            Ok(Value::from(mock_arg("mock/name", &args)?.name()))
        }),
    );
    env.define(
        "mock?",
        NativeFn::value("mock?", |_interp, args, _span| {
            expect_arity("mock?", &args, 1)?;
            Ok(Value::Bool(args[0].as_mock().is_some()))
        }),
    );
}

// ============================================================================
// CONSOLE, RANDOMNESS AND GLOBALS
// ============================================================================

pub fn install_console(env: &Env, console: &Console) {
    let lines = Rc::clone(console);
    env.define(
        "print",
        NativeFn::value("print", move |_interp, args, _span| {
            let line = args
                .iter()
                .map(|arg| arg.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            lines.borrow_mut().push(line);
            Ok(Value::Nil)
        }),
    );
}

pub fn install_random(env: &Env, rng: Rc<RefCell<Xoshiro256StarStar>>) {
    let float_rng = Rc::clone(&rng);
    env.define(
        "random",
        NativeFn::value("random", move |_interp, args, _span| {
            expect_arity("random", &args, 0)?;
            Ok(Value::Number(float_rng.borrow_mut().gen::<f64>()))
        }),
    );
    env.define(
        "random/int",
        NativeFn::value("random/int", move |_interp, args, _span| {
            expect_arity("random/int", &args, 2)?;
            let lo = number_arg("random/int", &args, 0)?.ceil() as i64;
            let hi = number_arg("random/int", &args, 1)?.floor() as i64;
            if lo > hi {
                return Err(err_msg!(Eval, "random/int: empty range {}..={}", lo, hi));
            }
            Ok(Value::Number(rng.borrow_mut().gen_range(lo..=hi) as f64))
        }),
    );
}

/// `global/set!` and `global/get` reach the sandbox's root frame from any module.
pub fn install_global_access(env: &Rc<Env>) {
    let setter_env: Weak<Env> = Rc::downgrade(env);
    env.define(
        "global/set!",
        NativeFn::value("global/set!", move |_interp, args, _span| {
            expect_arity("global/set!", &args, 2)?;
            let name = global_name("global/set!", &args)?;
            if let Some(globals) = setter_env.upgrade() {
                globals.define(name, args[1].clone());
            }
            Ok(args[1].clone())
        }),
    );

    let getter_env: Weak<Env> = Rc::downgrade(env);
    env.define(
        "global/get",
        NativeFn::value("global/get", move |_interp, args, _span| {
            expect_arity_range("global/get", &args, 1, 2)?;
            let name = global_name("global/get", &args)?;
            let found = getter_env.upgrade().and_then(|globals| globals.lookup(&name));
            Ok(found.or_else(|| args.get(1).cloned()).unwrap_or_default())
        }),
    );
}

fn global_name(binding: &str, args: &[Value]) -> Result<String, SutraError> {
    match &args[0] {
        Value::String(s) | Value::Keyword(s) => Ok(s.clone()),
        other => Err(type_error(binding, 0, "a string or keyword name", other)),
    }
}
