//! Expression trees evaluated by the interpreter.
//!
//! The operator set is closed; anything outside it goes through the custom
//! operator registry by name.

use crate::value::Value;
use std::fmt;

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    BaseValue(Value),
    /// The current value of a declared variable.
    Variable(String),
    /// The declared default value of a variable.
    Default(String),
    /// A built-in operator applied to sub-expressions.
    Operator {
        kind: OperatorKind,
        operands: Vec<Expr>,
    },
    /// A registered custom operator, addressed by name.
    Custom { name: String, operands: Vec<Expr> },
}

impl Expr {
    pub fn operator(kind: OperatorKind, operands: Vec<Expr>) -> Self {
        Self::Operator { kind, operands }
    }

    pub fn custom(name: impl Into<String>, operands: Vec<Expr>) -> Self {
        Self::Custom {
            name: name.into(),
            operands,
        }
    }

    pub fn variable(identifier: impl Into<String>) -> Self {
        Self::Variable(identifier.into())
    }

    /// A short human-readable tag for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::BaseValue(v) => format!("baseValue({v})"),
            Self::Variable(id) => format!("variable({id})"),
            Self::Default(id) => format!("default({id})"),
            Self::Operator { kind, .. } => kind.to_string(),
            Self::Custom { name, .. } => format!("customOperator({name})"),
        }
    }
}

/// The closed set of built-in operators.
///
/// Operators that the source format parameterizes through attributes carry
/// that payload here (`Index`, `FieldValue`, string case sensitivity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorKind {
    // logic
    And,
    Or,
    Not,
    IsNull,
    // comparison
    Match,
    Gt,
    Gte,
    Lt,
    Lte,
    // arithmetic
    Sum,
    Subtract,
    Product,
    Divide,
    IntegerDivide,
    IntegerModulus,
    Round,
    Truncate,
    // containers
    Multiple,
    Ordered,
    ContainerSize,
    Member,
    /// The n-th element (1-based) of an ordered container.
    Index { n: u64 },
    /// A named field of a record.
    FieldValue { field: String },
    // strings
    StringMatch { case_sensitive: bool },
    /// Whether the first string occurs within the second.
    Substring { case_sensitive: bool },
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::IsNull => "isNull",
            Self::Match => "match",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Sum => "sum",
            Self::Subtract => "subtract",
            Self::Product => "product",
            Self::Divide => "divide",
            Self::IntegerDivide => "integerDivide",
            Self::IntegerModulus => "integerModulus",
            Self::Round => "round",
            Self::Truncate => "truncate",
            Self::Multiple => "multiple",
            Self::Ordered => "ordered",
            Self::ContainerSize => "containerSize",
            Self::Member => "member",
            Self::Index { .. } => "index",
            Self::FieldValue { .. } => "fieldValue",
            Self::StringMatch { .. } => "stringMatch",
            Self::Substring { .. } => "substring",
        };
        write!(f, "{name}")
    }
}
