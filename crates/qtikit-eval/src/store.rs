//! The typed variable store.
//!
//! Variables come to life when a session is instantiated from its
//! declarations, are mutated only by rule execution or attempt submission,
//! and die with the owning session.

use crate::error::VariableError;
use crate::evaluator::VariableLookup;
use qtikit_types::testdef::{VariableDeclaration, VariableKind};
use qtikit_types::value::Value;
use std::collections::BTreeMap;

/// A declared variable and its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub declaration: VariableDeclaration,
    pub value: Value,
}

/// A mutable mapping from identifier to declared variable.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    variables: BTreeMap<String, Variable>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate a variable from its declaration, starting at the
    /// declared default.
    pub fn declare(&mut self, declaration: VariableDeclaration) {
        let value = declaration.default_value.clone();
        self.variables
            .insert(declaration.identifier.clone(), Variable { declaration, value });
    }

    pub fn declare_all<I>(&mut self, declarations: I)
    where
        I: IntoIterator<Item = VariableDeclaration>,
    {
        for declaration in declarations {
            self.declare(declaration);
        }
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.variables.contains_key(identifier)
    }

    pub fn variable(&self, identifier: &str) -> Option<&Variable> {
        self.variables.get(identifier)
    }

    pub fn declaration(&self, identifier: &str) -> Option<&VariableDeclaration> {
        self.variables.get(identifier).map(|v| &v.declaration)
    }

    /// Current value, or `None` when the variable is not declared.
    pub fn value(&self, identifier: &str) -> Option<&Value> {
        self.variables.get(identifier).map(|v| &v.value)
    }

    /// Assign a value, checking only that the variable is declared and the
    /// value matches the declared shape.
    pub fn set(&mut self, identifier: &str, value: Value) -> Result<(), VariableError> {
        let variable = self
            .variables
            .get_mut(identifier)
            .ok_or_else(|| VariableError::Undeclared(identifier.to_string()))?;
        check_shape(&variable.declaration, &value)?;
        variable.value = value;
        Ok(())
    }

    /// Assign to an outcome variable; non-outcome targets are rejected.
    pub fn set_outcome(&mut self, identifier: &str, value: Value) -> Result<(), VariableError> {
        self.set_of_kind(identifier, value, VariableKind::Outcome)
    }

    /// Assign to a response variable; non-response targets are rejected.
    pub fn set_response(&mut self, identifier: &str, value: Value) -> Result<(), VariableError> {
        self.set_of_kind(identifier, value, VariableKind::Response)
    }

    fn set_of_kind(
        &mut self,
        identifier: &str,
        value: Value,
        expected: VariableKind,
    ) -> Result<(), VariableError> {
        let kind = self
            .variables
            .get(identifier)
            .map(|v| v.declaration.kind)
            .ok_or_else(|| VariableError::Undeclared(identifier.to_string()))?;
        if kind != expected {
            return Err(VariableError::WrongKind {
                identifier: identifier.to_string(),
                expected,
            });
        }
        self.set(identifier, value)
    }

    /// Reset every variable to its declared default.
    pub fn reset_to_defaults(&mut self) {
        for variable in self.variables.values_mut() {
            variable.value = variable.declaration.default_value.clone();
        }
    }

    /// Capture all current values, keyed by identifier.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.variables
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }

    /// Restore previously captured values. Identifiers without a
    /// declaration are ignored.
    pub fn restore(&mut self, snapshot: BTreeMap<String, Value>) {
        for (identifier, value) in snapshot {
            if let Some(variable) = self.variables.get_mut(&identifier) {
                variable.value = value;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.variables.iter()
    }
}

/// A non-NULL value must agree with the declared cardinality, and with the
/// declared base type when one is declared.
fn check_shape(declaration: &VariableDeclaration, value: &Value) -> Result<(), VariableError> {
    if value.is_null() {
        return Ok(());
    }
    let mismatch = || VariableError::TypeMismatch {
        identifier: declaration.identifier.clone(),
    };
    if value.cardinality() != Some(declaration.cardinality) {
        return Err(mismatch());
    }
    if let (Some(declared), Some(found)) = (declaration.base_type, value.base_type()) {
        let ok = match value {
            Value::Single(s) => s.matches(declared),
            _ => found == declared || declared == qtikit_types::BaseType::IntOrIdentifier,
        };
        if !ok {
            return Err(mismatch());
        }
    }
    Ok(())
}

impl VariableLookup for VariableStore {
    fn value(&self, identifier: &str) -> Option<&Value> {
        VariableStore::value(self, identifier)
    }

    fn default_value(&self, identifier: &str) -> Option<&Value> {
        self.declaration(identifier).map(|d| &d.default_value)
    }
}
