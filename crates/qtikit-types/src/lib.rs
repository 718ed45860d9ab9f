//! Shared types for the qtikit assessment runtime.
//!
//! This crate defines the typed value/container model, expression trees,
//! processing rules, and the read-only test definition tree consumed by the
//! evaluator and session crates.

pub mod expression;
pub mod rules;
pub mod testdef;
pub mod value;

pub use expression::{Expr, OperatorKind};
pub use value::{BaseType, Cardinality, Scalar, Value, ValueError};
