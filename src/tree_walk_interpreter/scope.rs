use std::collections::{hash_map::Entry, BTreeMap};

use rustc_hash::FxHashMap;

use crate::position::Position;

use super::{ExecutionErrorKind, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Binding {
    value: Value,
    assigned: bool,
}

/// The single global variable table of a run.
///
/// Declared variables hold integer zero until their first assignment, but
/// reading one before that is a name error.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    bindings: FxHashMap<String, Binding>,
}

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the name was already declared, leaving it as is.
    pub fn declare(&mut self, name: &str) -> bool {
        match self.bindings.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(Binding {
                    value: Value::Integer(0),
                    assigned: false,
                });
                true
            }
        }
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Overwrites a declared variable. Callers check [`Globals::is_declared`]
    /// first; assigning an undeclared name is a no-op.
    pub fn assign(&mut self, name: &str, value: Value) {
        debug_assert!(self.is_declared(name), "'{name}' assigned before declaration");
        if let Some(binding) = self.bindings.get_mut(name) {
            *binding = Binding {
                value,
                assigned: true,
            };
        }
    }

    pub fn get(&self, name: &str, position: Position) -> Result<Value, ExecutionErrorKind> {
        match self.bindings.get(name) {
            Some(Binding {
                value,
                assigned: true,
            }) => Ok(*value),
            Some(_) => Err(ExecutionErrorKind::UnassignedVariable {
                name: name.to_string(),
                position,
            }),
            None => Err(ExecutionErrorKind::UndefinedVariable {
                name: name.to_string(),
                position,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Current values sorted by name.
    pub fn values(&self) -> BTreeMap<String, Value> {
        self.bindings
            .iter()
            .map(|(name, binding)| (name.clone(), binding.value))
            .collect()
    }
}
