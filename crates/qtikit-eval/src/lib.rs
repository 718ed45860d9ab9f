//! Expression interpreter and processing-rule executor.
//!
//! Expressions evaluate against a [`VariableLookup`] into typed values,
//! with per-operator operand contracts and NULL propagation. Processing
//! rules interpret imperative rule lists against a mutable
//! [`VariableStore`].

pub mod error;
pub mod evaluator;
pub mod operators;
pub mod registry;
pub mod rules;
pub mod store;

pub use error::{EvalError, EvalResult, RuleError, VariableError};
pub use evaluator::{ChainedLookup, Evaluator, VariableLookup};
pub use operators::{CardinalityRequirement, OperandContract, OperandCount};
pub use registry::{CustomOperator, OperatorRegistry};
pub use rules::{run_rules, RuleFlow};
pub use store::{Variable, VariableStore};
