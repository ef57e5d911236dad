//! This module provides the evaluation engine for the Sutra test dialect,
//! translating AST nodes into runtime values inside a lexical environment.
//!
//! ## Calling Conventions
//!
//! Special forms (`quote`, `define`, `fn`/`lambda`, `if`, `do`, `let`, `set!`,
//! `and`, `or`) receive unevaluated nodes and control their own evaluation.
//! Every other call evaluates the head and all arguments eagerly, left to
//! right, then dispatches on the callee:
//!
//! - `Lambda`: user functions, evaluated in a child of their captured frame
//! - `Atom::Pure`: registry functions over values only
//! - `Atom::Stateful`: registry functions that call back into the interpreter
//! - `Native`: sandbox bindings closing over per-file state
//! - `Mock`: recorded, then forwarded to the wrapped implementation
//!
//! ## Error Handling
//!
//! Errors raised below a call without a location are pinned to that call's
//! span with [`SutraError::at`], so the innermost known location wins.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::atoms::Atom;
use crate::diagnostics::{ErrorType, SourceArc};
use crate::mock::MockFn;
use crate::runtime::env::Env;
use crate::runtime::interrupt::{CancellationToken, Interrupt};
use crate::runtime::tasks::{Deferred, DeferredState, Job, JobQueue};
use crate::runtime::value::{Lambda, Value};
use crate::syntax::{AstNode, Expr, Span};
use crate::{err_msg, err_src, SutraError};

/// Evaluation state of one sandbox. Never shared between sandboxes.
pub struct Interpreter {
    max_depth: usize,
    depth: usize,
    interrupt: Interrupt,
    jobs: JobQueue,
}

impl Interpreter {
    pub fn new(max_depth: usize, token: CancellationToken) -> Self {
        Self {
            max_depth,
            depth: 0,
            interrupt: Interrupt::new(token),
            jobs: JobQueue::default(),
        }
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.interrupt.set_timeout(timeout);
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Drops queued deferred work that nobody awaited.
    pub fn clear_jobs(&mut self) {
        self.jobs.clear();
    }

    // ========================================================================
    // EVALUATION
    // ========================================================================

    /// Evaluates top-level forms in order, returning the last value.
    pub fn eval_program(
        &mut self,
        nodes: &[AstNode],
        env: &Rc<Env>,
        source: &SourceArc,
    ) -> Result<Value, SutraError> {
        self.eval_body(nodes, env, source)
    }

    fn eval_body(
        &mut self,
        nodes: &[AstNode],
        env: &Rc<Env>,
        source: &SourceArc,
    ) -> Result<Value, SutraError> {
        let mut last = Value::Nil;
        for node in nodes {
            last = self.eval(node, env, source)?;
        }
        Ok(last)
    }

    pub fn eval(
        &mut self,
        node: &AstNode,
        env: &Rc<Env>,
        source: &SourceArc,
    ) -> Result<Value, SutraError> {
        self.interrupt.tick().map_err(|e| e.at(source, node.span))?;
        if self.depth >= self.max_depth {
            return Err(err_src!(Eval, "Recursion limit exceeded", source, node.span));
        }
        self.depth += 1;
        let result = self.eval_expr(node, env, source);
        self.depth -= 1;
        result
    }

    fn eval_expr(
        &mut self,
        node: &AstNode,
        env: &Rc<Env>,
        source: &SourceArc,
    ) -> Result<Value, SutraError> {
        match &*node.value {
            Expr::Nil => Ok(Value::Nil),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Keyword(k) => Ok(Value::Keyword(k.clone())),
            Expr::Quote(inner) => Ok(quote_value(inner)),
            Expr::Symbol(name) => env.lookup(name).ok_or_else(|| {
                err_src!(
                    Eval,
                    format!("Undefined symbol: '{}'", name),
                    source,
                    node.span
                )
            }),
            Expr::List(items) => self.eval_list(items, node.span, env, source),
        }
    }

    fn eval_list(
        &mut self,
        items: &[AstNode],
        span: Span,
        env: &Rc<Env>,
        source: &SourceArc,
    ) -> Result<Value, SutraError> {
        let Some((head, tail)) = items.split_first() else {
            return Ok(Value::list(vec![]));
        };

        if let Expr::Symbol(name) = &*head.value {
            if let Some(result) = self.eval_special_form(name, tail, span, env, source) {
                return result;
            }
        }

        let callee = self.eval(head, env, source)?;
        let mut args = Vec::with_capacity(tail.len());
        for arg in tail {
            args.push(self.eval(arg, env, source)?);
        }
        self.call(&callee, args, span).map_err(|e| e.at(source, span))
    }

    // ========================================================================
    // CALLS
    // ========================================================================

    /// Invokes any callable value with already-evaluated arguments.
    pub fn call(&mut self, callee: &Value, args: Vec<Value>, span: Span) -> Result<Value, SutraError> {
        match callee {
            Value::Lambda(lambda) => self.call_lambda(lambda, args),
            Value::Atom(atom) => match atom.atom {
                Atom::Pure(func) => func(&args),
                Atom::Stateful(func) => func(self, &args),
            },
            Value::Native(native) => (native.func)(self, args, span),
            Value::Mock(mock) => MockFn::invoke(mock, self, args, span),
            other => Err(err_msg!(TypeError, "{} is not a function", other.repr())),
        }
    }

    fn call_lambda(&mut self, lambda: &Rc<Lambda>, args: Vec<Value>) -> Result<Value, SutraError> {
        let required = lambda.params.len();
        let arity_ok = match lambda.rest {
            Some(_) => args.len() >= required,
            None => args.len() == required,
        };
        if !arity_ok {
            let name = lambda.name.as_deref().unwrap_or("anonymous function");
            let expected = match lambda.rest {
                Some(_) => format!("at least {}", required),
                None => required.to_string(),
            };
            return Err(err_msg!(
                Eval,
                "Arity error: {} expects {} argument(s), got {}",
                name,
                expected,
                args.len()
            ));
        }

        let frame = Env::child(&lambda.env);
        let mut args = args.into_iter();
        for param in &lambda.params {
            frame.define(param.clone(), args.next().unwrap_or_default());
        }
        if let Some(rest) = &lambda.rest {
            frame.define(rest.clone(), Value::list(args.collect()));
        }
        self.eval_body(&lambda.body, &frame, &lambda.source)
    }

    // ========================================================================
    // DEFERRED WORK
    // ========================================================================

    /// Schedules `thunk` and returns the deferred that its outcome settles.
    pub fn defer(&mut self, thunk: Value) -> Rc<Deferred> {
        let target = Deferred::pending();
        self.jobs.push(Job::Run {
            thunk,
            target: Rc::clone(&target),
        });
        target
    }

    /// Drives the job queue until `deferred` settles.
    pub fn await_deferred(&mut self, deferred: &Rc<Deferred>) -> Result<Value, SutraError> {
        let mut stalled = 0usize;
        loop {
            match deferred.state() {
                DeferredState::Fulfilled(value) => return Ok(value),
                DeferredState::Rejected(err) => return Err(err.duplicate()),
                DeferredState::Pending => {}
            }
            self.interrupt.check_now()?;
            let Some(job) = self.jobs.pop() else {
                return Err(err_msg!(
                    Eval,
                    "Deferred value never settled: no queued work is left to settle it"
                ));
            };
            if self.run_job(job)? {
                stalled = 0;
            } else {
                stalled += 1;
                if stalled > self.jobs.len() {
                    return Err(err_msg!(
                        Eval,
                        "Deferred value never settled: queued work is waiting on itself"
                    ));
                }
            }
        }
    }

    /// Awaits `value` when it is deferred; any other value passes through.
    pub fn settle(&mut self, value: Value) -> Result<Value, SutraError> {
        match value {
            Value::Deferred(deferred) => self.await_deferred(&deferred),
            other => Ok(other),
        }
    }

    /// Runs one job; returns whether anything settled or ran.
    fn run_job(&mut self, job: Job) -> Result<bool, SutraError> {
        match job {
            Job::Run { thunk, target } => {
                match self.call(&thunk, vec![], Span::default()) {
                    Ok(Value::Deferred(inner)) if Rc::ptr_eq(&inner, &target) => {
                        target.settle(DeferredState::Rejected(Rc::new(err_msg!(
                            TypeError,
                            "a deferred value cannot settle with itself"
                        ))));
                    }
                    Ok(Value::Deferred(inner)) => self.jobs.push(Job::Follow {
                        source: inner,
                        target,
                    }),
                    Ok(value) => target.settle(DeferredState::Fulfilled(value)),
                    Err(e) if matches!(e.error_type(), ErrorType::Timeout | ErrorType::Cancelled) => {
                        return Err(e)
                    }
                    Err(e) => target.settle(DeferredState::Rejected(Rc::new(e))),
                }
                Ok(true)
            }
            Job::Follow { source, target } => {
                if source.is_settled() {
                    target.settle(source.state());
                    return Ok(true);
                }
                self.jobs.push(Job::Follow { source, target });
                Ok(false)
            }
        }
    }

    // ========================================================================
    // SPECIAL FORMS
    // ========================================================================

    fn eval_special_form(
        &mut self,
        name: &str,
        tail: &[AstNode],
        span: Span,
        env: &Rc<Env>,
        source: &SourceArc,
    ) -> Option<Result<Value, SutraError>> {
        let result = match name {
            "quote" => match tail {
                [inner] => Ok(quote_value(inner)),
                _ => Err(err_src!(Eval, "quote expects exactly one form", source, span)),
            },
            "define" => self.eval_define(tail, span, env, source),
            "fn" | "lambda" => match tail.split_first() {
                Some((params, body)) => match &*params.value {
                    Expr::List(params) => make_lambda(None, params, body, env, source),
                    _ => Err(err_src!(
                        Eval,
                        format!("{} expects a parameter list", name),
                        source,
                        params.span
                    )),
                },
                None => Err(err_src!(
                    Eval,
                    format!("{} expects a parameter list", name),
                    source,
                    span
                )),
            },
            "if" => self.eval_if(tail, span, env, source),
            "do" => self.eval_body(tail, env, source),
            "let" => self.eval_let(tail, span, env, source),
            "set!" => self.eval_set(tail, span, env, source),
            "and" => {
                let mut last = Value::Bool(true);
                for node in tail {
                    last = match self.eval(node, env, source) {
                        Ok(v) => v,
                        Err(e) => return Some(Err(e)),
                    };
                    if !last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            "or" => {
                let mut last = Value::Nil;
                for node in tail {
                    last = match self.eval(node, env, source) {
                        Ok(v) => v,
                        Err(e) => return Some(Err(e)),
                    };
                    if last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            _ => return None,
        };
        Some(result)
    }

    fn eval_define(
        &mut self,
        tail: &[AstNode],
        span: Span,
        env: &Rc<Env>,
        source: &SourceArc,
    ) -> Result<Value, SutraError> {
        let Some((target, rest)) = tail.split_first() else {
            return Err(err_src!(Eval, "define expects a name and a value", source, span));
        };
        match &*target.value {
            Expr::Symbol(name) => {
                let [value_node] = rest else {
                    return Err(err_src!(
                        Eval,
                        "define expects exactly one value after the name",
                        source,
                        span
                    ));
                };
                let value = self.eval(value_node, env, source)?;
                env.define(name.clone(), value);
                Ok(Value::Nil)
            }
            Expr::List(signature) => {
                let Some((name_node, params)) = signature.split_first() else {
                    return Err(err_src!(Eval, "define expects (name params...)", source, target.span));
                };
                let Some(name) = name_node.value.as_symbol() else {
                    return Err(err_src!(
                        Eval,
                        "function name must be a symbol",
                        source,
                        name_node.span
                    ));
                };
                let lambda = make_lambda(Some(name.to_string()), params, rest, env, source)?;
                env.define(name.to_string(), lambda);
                Ok(Value::Nil)
            }
            _ => Err(err_src!(
                Eval,
                "define expects a symbol or (name params...)",
                source,
                target.span
            )),
        }
    }

    fn eval_if(
        &mut self,
        tail: &[AstNode],
        span: Span,
        env: &Rc<Env>,
        source: &SourceArc,
    ) -> Result<Value, SutraError> {
        let (condition, then_branch, else_branch) = match tail {
            [c, t] => (c, t, None),
            [c, t, e] => (c, t, Some(e)),
            _ => {
                return Err(err_src!(
                    Eval,
                    "if expects a condition, a then branch and an optional else branch",
                    source,
                    span
                ))
            }
        };
        if self.eval(condition, env, source)?.is_truthy() {
            self.eval(then_branch, env, source)
        } else {
            match else_branch {
                Some(e) => self.eval(e, env, source),
                None => Ok(Value::Nil),
            }
        }
    }

    fn eval_let(
        &mut self,
        tail: &[AstNode],
        span: Span,
        env: &Rc<Env>,
        source: &SourceArc,
    ) -> Result<Value, SutraError> {
        let Some((bindings, body)) = tail.split_first() else {
            return Err(err_src!(Eval, "let expects a binding list", source, span));
        };
        let Expr::List(bindings) = &*bindings.value else {
            return Err(err_src!(Eval, "let expects a binding list", source, bindings.span));
        };
        let frame = Env::child(env);
        for binding in bindings {
            let pair = match &*binding.value {
                Expr::List(pair) => pair.as_slice(),
                _ => &[],
            };
            let [name, value] = pair else {
                return Err(err_src!(Eval, "let binding must be (name value)", source, binding.span));
            };
            let Some(name) = name.value.as_symbol() else {
                return Err(err_src!(Eval, "let binding name must be a symbol", source, name.span));
            };
            let value = self.eval(value, &frame, source)?;
            frame.define(name.to_string(), value);
        }
        self.eval_body(body, &frame, source)
    }

    fn eval_set(
        &mut self,
        tail: &[AstNode],
        span: Span,
        env: &Rc<Env>,
        source: &SourceArc,
    ) -> Result<Value, SutraError> {
        let [name, value] = tail else {
            return Err(err_src!(Eval, "set! expects a name and a value", source, span));
        };
        let Some(name_str) = name.value.as_symbol() else {
            return Err(err_src!(Eval, "set! target must be a symbol", source, name.span));
        };
        let value = self.eval(value, env, source)?;
        if !env.assign(name_str, value.clone()) {
            return Err(err_src!(
                Eval,
                format!("Cannot set! undefined symbol '{}'", name_str),
                source,
                name.span,
                "declare it first with (define name value)"
            ));
        }
        Ok(value)
    }
}

fn make_lambda(
    name: Option<String>,
    params: &[AstNode],
    body: &[AstNode],
    env: &Rc<Env>,
    source: &SourceArc,
) -> Result<Value, SutraError> {
    let mut required = Vec::with_capacity(params.len());
    let mut rest = None;
    for param in params {
        let Some(symbol) = param.value.as_symbol() else {
            return Err(err_src!(Eval, "parameter must be a symbol", source, param.span));
        };
        if rest.is_some() {
            return Err(err_src!(Eval, "rest parameter must come last", source, param.span));
        }
        match symbol.strip_prefix("...") {
            Some("") => return Err(err_src!(Eval, "rest parameter needs a name", source, param.span)),
            Some(name) => rest = Some(name.to_string()),
            None => required.push(symbol.to_string()),
        }
    }
    Ok(Value::Lambda(Rc::new(Lambda {
        name,
        params: required,
        rest,
        body: body.to_vec(),
        env: Rc::clone(env),
        source: Arc::clone(source),
    })))
}

/// Converts a quoted form into data: symbols become strings.
fn quote_value(node: &AstNode) -> Value {
    match &*node.value {
        Expr::Nil => Value::Nil,
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Number(n) => Value::Number(*n),
        Expr::String(s) | Expr::Symbol(s) => Value::String(s.clone()),
        Expr::Keyword(k) => Value::Keyword(k.clone()),
        Expr::List(items) => Value::list(items.iter().map(quote_value).collect()),
        Expr::Quote(inner) => Value::list(vec![Value::from("quote"), quote_value(inner)]),
    }
}
