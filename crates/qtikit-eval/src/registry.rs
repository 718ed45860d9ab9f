//! The custom-operator extension point.
//!
//! Custom operators are registered by name and honor the same contract
//! shape as built-ins: the evaluator enforces their declared operand
//! contract and the default NULL-propagation rule before calling
//! [`CustomOperator::apply`], so they compose transparently.

use crate::error::{EvalError, EvalResult};
use crate::operators::{CardinalityRequirement, OperandContract, OperandCount};
use qtikit_types::value::{BaseType, Scalar, Value};
use std::collections::BTreeMap;

/// An operator plugged into the registry.
pub trait CustomOperator: Send + Sync {
    /// The operand contract the evaluator enforces before [`apply`] runs.
    ///
    /// [`apply`]: CustomOperator::apply
    fn contract(&self) -> OperandContract;

    /// Apply the operator to contract-checked, non-NULL operands.
    fn apply(&self, operands: &[Value]) -> EvalResult<Value>;
}

/// Name-indexed registry of custom operators.
pub struct OperatorRegistry {
    operators: BTreeMap<String, Box<dyn CustomOperator>>,
}

impl OperatorRegistry {
    /// An empty registry with no custom operators.
    pub fn empty() -> Self {
        Self {
            operators: BTreeMap::new(),
        }
    }

    /// The stock registry: `explode`, `csvToMultiple`, `csvToOrdered`.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("explode", Box::new(Explode));
        registry.register("csvToMultiple", Box::new(CsvToContainer { ordered: false }));
        registry.register("csvToOrdered", Box::new(CsvToContainer { ordered: true }));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, operator: Box<dyn CustomOperator>) {
        self.operators.insert(name.into(), operator);
    }

    pub fn get(&self, name: &str) -> Option<&dyn CustomOperator> {
        self.operators.get(name).map(|b| b.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

// ── Stock custom operators ───────────────────────────────────────────────

/// Splits a string on a delimiter into an ordered string container.
///
/// Operands: (delimiter, string). A string without the delimiter yields a
/// one-element container holding the input unchanged.
struct Explode;

impl CustomOperator for Explode {
    fn contract(&self) -> OperandContract {
        OperandContract::new(OperandCount::Exact(2), CardinalityRequirement::ExclusivelySingle)
            .with_base_types(vec![BaseType::String])
    }

    fn apply(&self, operands: &[Value]) -> EvalResult<Value> {
        let (delimiter, subject) = string_pair("explode", operands)?;
        let elements = subject
            .split(delimiter.as_str())
            .map(|part| Scalar::String(part.to_string()))
            .collect();
        Ok(Value::ordered(BaseType::String, elements)?)
    }
}

/// Splits a comma-separated string into a string container.
struct CsvToContainer {
    ordered: bool,
}

impl CustomOperator for CsvToContainer {
    fn contract(&self) -> OperandContract {
        OperandContract::new(OperandCount::Exact(1), CardinalityRequirement::ExclusivelySingle)
            .with_base_types(vec![BaseType::String])
    }

    fn apply(&self, operands: &[Value]) -> EvalResult<Value> {
        let name = if self.ordered { "csvToOrdered" } else { "csvToMultiple" };
        let subject = match operands[0].as_single() {
            Some(Scalar::String(s)) => s,
            _ => {
                return Err(EvalError::InvalidOperand {
                    operator: name.to_string(),
                    message: "expected a string operand".to_string(),
                })
            }
        };
        let elements: Vec<Scalar> = subject
            .split(',')
            .map(|part| Scalar::String(part.to_string()))
            .collect();
        let value = if self.ordered {
            Value::ordered(BaseType::String, elements)
        } else {
            Value::multiple(BaseType::String, elements)
        };
        Ok(value?)
    }
}

fn string_pair<'a>(operator: &str, operands: &'a [Value]) -> EvalResult<(&'a String, &'a String)> {
    match (operands[0].as_single(), operands[1].as_single()) {
        (Some(Scalar::String(a)), Some(Scalar::String(b))) => Ok((a, b)),
        _ => Err(EvalError::InvalidOperand {
            operator: operator.to_string(),
            message: "expected string operands".to_string(),
        }),
    }
}
