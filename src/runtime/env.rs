//! Lexical environments.
//!
//! Each frame is a persistent `im::HashMap`; child frames point at their
//! parent. A sandbox's global namespace is the root frame of every module it
//! loads and is never reachable from another sandbox.

use std::cell::RefCell;
use std::rc::Rc;

use im::HashMap;

use crate::runtime::value::Value;

pub type Bindings = HashMap<String, Value>;

pub struct Env {
    vars: RefCell<Bindings>,
    parent: Option<Rc<Env>>,
}

impl Env {
    pub fn root(bindings: Bindings) -> Rc<Env> {
        Rc::new(Env {
            vars: RefCell::new(bindings),
            parent: None,
        })
    }

    pub fn child(parent: &Rc<Env>) -> Rc<Env> {
        Rc::new(Env {
            vars: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Binds `name` in this frame, shadowing outer frames.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.vars.borrow_mut().insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        let mut frame = self.parent.as_ref();
        while let Some(env) = frame {
            if let Some(value) = env.vars.borrow().get(name) {
                return Some(value.clone());
            }
            frame = env.parent.as_ref();
        }
        None
    }

    /// Rebinds an existing name in the nearest frame that defines it.
    /// Returns false when the name is unbound.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        if self.vars.borrow().contains_key(name) {
            self.vars.borrow_mut().insert(name.to_string(), value);
            return true;
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => false,
        }
    }

    /// Drops every binding of this frame.
    ///
    /// Closures stored in a frame capture the frame itself; clearing it at
    /// sandbox teardown breaks those reference cycles.
    pub fn clear(&self) {
        self.vars.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_frames_shadow_and_assign_through() {
        let root = Env::root(Bindings::new());
        root.define("x", Value::Number(1.0));
        let child = Env::child(&root);
        child.define("y", Value::Number(2.0));

        assert_eq!(child.lookup("x").and_then(|v| v.as_number()), Some(1.0));
        assert!(root.lookup("y").is_none());

        assert!(child.assign("x", Value::Number(5.0)));
        assert_eq!(root.lookup("x").and_then(|v| v.as_number()), Some(5.0));
        assert!(!child.assign("missing", Value::Nil));
    }
}
