//! # Atom System
//!
//! Atoms are the primitive operations every sandbox starts with. They are
//! plain function pointers, so a registry can be cloned into each new
//! global namespace without sharing any state between sandboxes.
//!
//! ## Module Structure
//!
//! - **`helpers`**: Argument checking shared by all atoms
//! - **`math`**: Arithmetic (`+`, `-`, `*`, `/`, `mod`, `abs`, `min`, `max`)
//! - **`logic`**: Comparison, negation and type predicates
//! - **`collections`**: Lists and maps (`list`, `len`, `get`, `assoc`, ...)
//! - **`string`**: String building and case conversion
//! - **`execution`**: Higher-order calls, errors and deferred work
//! - **`test`**: Atoms that misbehave on purpose (`test-atom` feature)

use im::HashMap;

use crate::runtime::env::Bindings;
use crate::runtime::eval::Interpreter;
use crate::runtime::value::Value;
use crate::SutraError;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Pure atoms: operate only on values.
pub type PureAtomFn = fn(args: &[Value]) -> Result<Value, SutraError>;

/// Stateful atoms: call back into the interpreter (higher-order calls, deferred work).
pub type StatefulAtomFn = fn(interp: &mut Interpreter, args: &[Value]) -> Result<Value, SutraError>;

#[derive(Clone, Copy)]
pub enum Atom {
    Pure(PureAtomFn),
    Stateful(StatefulAtomFn),
}

/// A named atom as stored in an environment.
#[derive(Clone, Copy)]
pub struct AtomRef {
    pub name: &'static str,
    pub atom: Atom,
}

/// Registry for all atoms, inspectable at runtime.
#[derive(Default, Clone)]
pub struct AtomRegistry {
    atoms: HashMap<&'static str, AtomRef>,
}

impl AtomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every standard atom.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        register_all_atoms(&mut registry);
        registry
    }

    pub fn get(&self, name: &str) -> Option<&AtomRef> {
        self.atoms.get(name)
    }

    /// Sorted atom names.
    pub fn list(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.atoms.keys().copied().collect();
        names.sort_unstable();
        names
    }

    // API for extensibility.
    pub fn register(&mut self, name: &'static str, atom: Atom) {
        self.atoms.insert(name, AtomRef { name, atom });
    }

    pub fn has(&self, name: &str) -> bool {
        self.atoms.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Global bindings for a fresh namespace.
    pub fn bindings(&self) -> Bindings {
        self.atoms
            .values()
            .map(|atom| (atom.name.to_string(), Value::Atom(*atom)))
            .collect()
    }
}

// ============================================================================
// MODULAR ATOM IMPLEMENTATIONS
// ============================================================================

pub mod helpers;

pub mod collections;
pub mod execution;
pub mod logic;
pub mod math;
pub mod string;

// Misbehaving atoms for exercising the dispatcher; never in default builds.
#[cfg(any(test, feature = "test-atom"))]
pub mod test;

/// Registers all standard atoms from all modules with the given registry.
pub fn register_all_atoms(registry: &mut AtomRegistry) {
    math::register_math_atoms(registry);
    logic::register_logic_atoms(registry);
    collections::register_collection_atoms(registry);
    string::register_string_atoms(registry);
    execution::register_execution_atoms(registry);

    #[cfg(any(test, feature = "test-atom"))]
    test::register_test_atoms(registry);
}
