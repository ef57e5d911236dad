//! Mock functions.
//!
//! A mock records every call before forwarding to its implementation, then
//! records the outcome. Both lists are append-only for the mock's lifetime.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::runtime::eval::Interpreter;
use crate::runtime::value::Value;
use crate::syntax::Span;
use crate::SutraError;

pub const DEFAULT_MOCK_NAME: &str = "mock.fn";

/// Outcome of one mock invocation.
#[derive(Clone, Debug)]
pub enum MockResult {
    Return(Value),
    Throw(String),
}

impl MockResult {
    /// `{"type" "return", "value" v}` or `{"type" "throw", "value" message}`.
    pub fn to_value(&self) -> Value {
        let (kind, value) = match self {
            MockResult::Return(v) => ("return", v.clone()),
            MockResult::Throw(message) => ("throw", Value::String(message.clone())),
        };
        let mut map = BTreeMap::new();
        map.insert("type".to_string(), Value::from(kind));
        map.insert("value".to_string(), value);
        Value::map(map)
    }
}

pub struct MockFn {
    id: u64,
    name: String,
    implementation: Option<Value>,
    calls: RefCell<Vec<Vec<Value>>>,
    results: RefCell<Vec<MockResult>>,
}

impl MockFn {
    pub fn new(id: u64, name: Option<String>, implementation: Option<Value>) -> Self {
        Self {
            id,
            name: name.unwrap_or_else(|| DEFAULT_MOCK_NAME.to_string()),
            implementation,
            calls: RefCell::new(Vec::new()),
            results: RefCell::new(Vec::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calls(&self) -> Vec<Vec<Value>> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn last_call(&self) -> Option<Vec<Value>> {
        self.calls.borrow().last().cloned()
    }

    pub fn results(&self) -> Vec<MockResult> {
        self.results.borrow().clone()
    }

    /// Calls as a list of argument lists.
    pub fn calls_value(&self) -> Value {
        Value::list(self.calls.borrow().iter().cloned().map(Value::list).collect())
    }

    /// Records the call, runs the implementation (if any) and records its outcome.
    pub fn invoke(
        this: &Rc<MockFn>,
        interp: &mut Interpreter,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, SutraError> {
        this.calls.borrow_mut().push(args.clone());
        let outcome = match &this.implementation {
            Some(implementation) => interp.call(implementation, args, span),
            None => Ok(Value::Nil),
        };
        let recorded = match &outcome {
            Ok(value) => MockResult::Return(value.clone()),
            Err(err) => MockResult::Throw(err.to_string()),
        };
        this.results.borrow_mut().push(recorded);
        outcome
    }
}

/// Hands out sandbox-unique mock ids.
#[derive(Default)]
pub struct MockFactory {
    next_id: Cell<u64>,
}

impl MockFactory {
    pub fn create(&self, implementation: Option<Value>, name: Option<String>) -> Rc<MockFn> {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        Rc::new(MockFn::new(id, name, implementation))
    }

    pub fn created(&self) -> u64 {
        self.next_id.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::AtomRegistry;
    use crate::runtime::CancellationToken;

    #[test]
    fn calls_accumulate_in_order() {
        let factory = MockFactory::default();
        let mock = factory.create(None, None);
        let mut interp = Interpreter::new(50, CancellationToken::new());

        MockFn::invoke(&mock, &mut interp, vec!["A".into()], Span::default()).unwrap();
        MockFn::invoke(&mock, &mut interp, vec!["B".into()], Span::default()).unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0][0].as_str(), Some("A"));
        assert_eq!(calls[1][0].as_str(), Some("B"));
        assert_eq!(mock.name(), "mock.fn");
        assert_eq!(mock.id(), 1);
    }

    #[test]
    fn failing_implementation_is_still_recorded() {
        let registry = AtomRegistry::standard();
        let error = Value::Atom(*registry.get("error").unwrap());
        let factory = MockFactory::default();
        let mock = factory.create(Some(error), Some("boom".into()));
        let mut interp = Interpreter::new(50, CancellationToken::new());

        let err = MockFn::invoke(&mock, &mut interp, vec!["bad".into()], Span::default()).unwrap_err();
        assert_eq!(err.to_string(), "Error: bad");
        assert_eq!(mock.call_count(), 1);
        assert!(matches!(&mock.results()[0], MockResult::Throw(m) if m == "Error: bad"));
    }
}
