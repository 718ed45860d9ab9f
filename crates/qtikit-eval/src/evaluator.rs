//! The expression interpreter.
//!
//! Operands are evaluated depth-first, left to right, and all operands are
//! evaluated before any checking; no operator short-circuits. Per-operator
//! checking order: operand count, NULL handling, cardinality, base type,
//! application.

use crate::error::{EvalError, EvalResult};
use crate::operators::{self, CardinalityRequirement, OperandContract};
use crate::registry::OperatorRegistry;
use qtikit_types::expression::{Expr, OperatorKind};
use qtikit_types::value::Value;

/// Read access to the variable state an expression evaluates against.
pub trait VariableLookup {
    /// Current value of a declared variable.
    fn value(&self, identifier: &str) -> Option<&Value>;

    /// Declared default value of a variable.
    fn default_value(&self, identifier: &str) -> Option<&Value>;
}

/// A lookup that consults a primary source first and falls back to a
/// secondary one. Used by sessions to resolve dotted item references
/// during test-level outcome processing.
pub struct ChainedLookup<'a> {
    primary: &'a dyn VariableLookup,
    fallback: &'a dyn VariableLookup,
}

impl<'a> ChainedLookup<'a> {
    pub fn new(primary: &'a dyn VariableLookup, fallback: &'a dyn VariableLookup) -> Self {
        Self { primary, fallback }
    }
}

impl VariableLookup for ChainedLookup<'_> {
    fn value(&self, identifier: &str) -> Option<&Value> {
        self.primary
            .value(identifier)
            .or_else(|| self.fallback.value(identifier))
    }

    fn default_value(&self, identifier: &str) -> Option<&Value> {
        self.primary
            .default_value(identifier)
            .or_else(|| self.fallback.default_value(identifier))
    }
}

/// Evaluates expression trees into values.
pub struct Evaluator<'a> {
    lookup: &'a dyn VariableLookup,
    registry: &'a OperatorRegistry,
}

impl<'a> Evaluator<'a> {
    pub fn new(lookup: &'a dyn VariableLookup, registry: &'a OperatorRegistry) -> Self {
        Self { lookup, registry }
    }

    /// Evaluate an expression to a value, failing with a typed processing
    /// error when an operand contract is violated.
    pub fn evaluate(&self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::BaseValue(value) => Ok(value.clone()),
            Expr::Variable(identifier) => self
                .lookup
                .value(identifier)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedVariable(identifier.clone())),
            Expr::Default(identifier) => self
                .lookup
                .default_value(identifier)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedVariable(identifier.clone())),
            Expr::Operator { kind, operands } => self.evaluate_operator(kind, operands),
            Expr::Custom { name, operands } => self.evaluate_custom(name, operands),
        }
    }

    fn evaluate_operator(&self, kind: &OperatorKind, operands: &[Expr]) -> EvalResult<Value> {
        let values = self.evaluate_operands(operands)?;
        let contract = operators::contract(kind);
        check_count(&kind.to_string(), &contract, &values)?;
        // NULL propagation comes before cardinality/base-type validation;
        // comparison and arithmetic operators never raise on NULL operands.
        if operators::propagates_null(kind) && values.iter().any(Value::is_null) {
            return Ok(Value::Null);
        }
        check_shapes(&kind.to_string(), &contract, &values)?;
        operators::apply(kind, &values)
    }

    fn evaluate_custom(&self, name: &str, operands: &[Expr]) -> EvalResult<Value> {
        let operator = self
            .registry
            .get(name)
            .ok_or_else(|| EvalError::UnknownOperator(name.to_string()))?;
        let values = self.evaluate_operands(operands)?;
        let contract = operator.contract();
        check_count(name, &contract, &values)?;
        if values.iter().any(Value::is_null) {
            return Ok(Value::Null);
        }
        check_shapes(name, &contract, &values)?;
        operator.apply(&values)
    }

    fn evaluate_operands(&self, operands: &[Expr]) -> EvalResult<Vec<Value>> {
        operands.iter().map(|o| self.evaluate(o)).collect()
    }
}

fn check_count(operator: &str, contract: &OperandContract, values: &[Value]) -> EvalResult<()> {
    if !contract.count.accepts(values.len()) {
        return Err(EvalError::NotEnoughOperands {
            operator: operator.to_string(),
            required: contract.count.required(),
            given: values.len(),
        });
    }
    Ok(())
}

/// Enforce the cardinality and base-type parts of a contract.
///
/// NULL operands are skipped; they have neither a cardinality nor a base
/// type, and operators that see them have already handled them.
fn check_shapes(operator: &str, contract: &OperandContract, values: &[Value]) -> EvalResult<()> {
    for value in values.iter().filter(|v| !v.is_null()) {
        let cardinality_ok = match contract.cardinality {
            CardinalityRequirement::ExclusivelySingle => {
                matches!(value, Value::Single(_))
            }
            CardinalityRequirement::ExclusivelyContainer => {
                matches!(value, Value::Multiple(_) | Value::Ordered(_))
            }
            CardinalityRequirement::Any => true,
        };
        if !cardinality_ok {
            return Err(EvalError::WrongCardinality {
                operator: operator.to_string(),
                found: operators::describe_cardinality(value),
            });
        }
        if let Some(allowed) = &contract.base_types {
            let base_type_ok = match value.base_type() {
                Some(found) => allowed.contains(&found),
                // A record has no base type; reject it when the operator
                // restricts base types at all.
                None => false,
            };
            if !base_type_ok {
                return Err(EvalError::WrongBaseType {
                    operator: operator.to_string(),
                    found: operators::describe_base_type(value),
                });
            }
        }
    }
    Ok(())
}
