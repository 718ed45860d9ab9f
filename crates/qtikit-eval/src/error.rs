//! Error types for expression evaluation and rule execution.

use qtikit_types::value::ValueError;
use qtikit_types::testdef::VariableKind;
use thiserror::Error;

/// A typed processing error raised by the expression interpreter.
///
/// Each variant carries the name of the faulting operator or expression
/// for diagnostics.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    /// An operand has a cardinality the operator does not accept.
    #[error("the {operator} operator does not accept {found} cardinality operands")]
    WrongCardinality { operator: String, found: String },

    /// An operand has a base type outside the operator's accepted set.
    #[error("the {operator} operator does not accept {found} base type operands")]
    WrongBaseType { operator: String, found: String },

    /// Fewer operands than the operator requires.
    #[error("the {operator} operator takes {required} operand(s), {given} given")]
    NotEnoughOperands {
        operator: String,
        required: usize,
        given: usize,
    },

    /// An operand passed type checks but is out of the operator's domain.
    #[error("invalid operand for {operator}: {message}")]
    InvalidOperand { operator: String, message: String },

    /// A variable reference that no declaration backs.
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// A custom operator name the registry does not know.
    #[error("unknown custom operator: {0}")]
    UnknownOperator(String),

    /// An ill-formed value produced during evaluation.
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Result alias for interpreter operations.
pub type EvalResult<T> = Result<T, EvalError>;

/// Errors raised by the variable store.
#[derive(Debug, Clone, Error)]
pub enum VariableError {
    #[error("variable '{0}' is not declared")]
    Undeclared(String),

    #[error("variable '{identifier}' is not a {expected:?} variable")]
    WrongKind {
        identifier: String,
        expected: VariableKind,
    },

    /// The assigned value does not match the declared shape.
    #[error("value does not match the declaration of variable '{identifier}'")]
    TypeMismatch { identifier: String },

    /// `lookupOutcomeValue` on a declaration with no table.
    #[error("variable '{0}' declares no lookup table")]
    NoLookupTable(String),
}

/// Errors raised while executing a processing-rule list.
#[derive(Debug, Clone, Error)]
pub enum RuleError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Variable(#[from] VariableError),
}
