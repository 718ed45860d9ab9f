//! The processing-rule executor.
//!
//! Interprets response/outcome processing rule lists against a mutable
//! variable store. Mutations are visible to subsequent rules immediately;
//! an error aborts the remaining rules and keeps prior mutations.

use crate::error::{EvalError, RuleError, VariableError};
use crate::evaluator::{ChainedLookup, Evaluator, VariableLookup};
use crate::registry::OperatorRegistry;
use crate::store::VariableStore;
use qtikit_types::rules::{LookupTable, ProcessingRule};
use qtikit_types::value::{Scalar, Value};

/// How a rule run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFlow {
    /// Every rule ran.
    Completed,
    /// An `exitResponse` rule aborted the run.
    ExitedResponse,
    /// An `exitTest` rule aborted the run; the caller ends the test.
    ExitedTest,
}

/// Execute a rule list against a store.
///
/// `extra` supplies additional read-only variables (a session passes its
/// item stores here so test-level rules can read dotted item references).
pub fn run_rules(
    rules: &[ProcessingRule],
    store: &mut VariableStore,
    registry: &OperatorRegistry,
    extra: Option<&dyn VariableLookup>,
) -> Result<RuleFlow, RuleError> {
    for rule in rules {
        match run_rule(rule, store, registry, extra)? {
            RuleFlow::Completed => {}
            exited => return Ok(exited),
        }
    }
    Ok(RuleFlow::Completed)
}

fn run_rule(
    rule: &ProcessingRule,
    store: &mut VariableStore,
    registry: &OperatorRegistry,
    extra: Option<&dyn VariableLookup>,
) -> Result<RuleFlow, RuleError> {
    match rule {
        ProcessingRule::SetOutcomeValue {
            identifier,
            expression,
        } => {
            let value = evaluate(expression, store, registry, extra)?;
            store.set_outcome(identifier, value)?;
            Ok(RuleFlow::Completed)
        }
        ProcessingRule::SetResponseValue {
            identifier,
            expression,
        } => {
            let value = evaluate(expression, store, registry, extra)?;
            store.set_response(identifier, value)?;
            Ok(RuleFlow::Completed)
        }
        ProcessingRule::Condition {
            branches,
            otherwise,
        } => {
            for branch in branches {
                let condition = evaluate(&branch.condition, store, registry, extra)?;
                // NULL or a non-boolean single counts as false.
                if condition.as_boolean() == Some(true) {
                    return run_rules(&branch.rules, store, registry, extra);
                }
            }
            run_rules(otherwise, store, registry, extra)
        }
        ProcessingRule::ExitResponse => Ok(RuleFlow::ExitedResponse),
        ProcessingRule::ExitTest => Ok(RuleFlow::ExitedTest),
        ProcessingRule::LookupOutcomeValue {
            identifier,
            expression,
        } => {
            let value = evaluate(expression, store, registry, extra)?;
            let table = store
                .declaration(identifier)
                .ok_or_else(|| VariableError::Undeclared(identifier.to_string()))?
                .lookup_table
                .clone()
                .ok_or_else(|| VariableError::NoLookupTable(identifier.to_string()))?;
            let target = lookup(&table, &value)?;
            store.set_outcome(identifier, target)?;
            Ok(RuleFlow::Completed)
        }
    }
}

fn evaluate(
    expression: &qtikit_types::expression::Expr,
    store: &VariableStore,
    registry: &OperatorRegistry,
    extra: Option<&dyn VariableLookup>,
) -> Result<Value, RuleError> {
    let value = match extra {
        Some(extra) => {
            let lookup = ChainedLookup::new(store, extra);
            Evaluator::new(&lookup, registry).evaluate(expression)?
        }
        None => Evaluator::new(store, registry).evaluate(expression)?,
    };
    Ok(value)
}

/// Map a looked-up value through a table. A NULL source maps to NULL.
fn lookup(table: &LookupTable, value: &Value) -> Result<Value, RuleError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match table {
        LookupTable::Match { entries, default } => {
            let scalar = value.as_single().ok_or_else(|| wrong_source("match table"))?;
            let target = entries
                .iter()
                .find(|(source, _)| source == scalar)
                .map(|(_, target)| target)
                .or(default.as_ref());
            Ok(target.map(|s| Value::Single(s.clone())).unwrap_or(Value::Null))
        }
        LookupTable::Interpolation { entries, default } => {
            let numeric = value
                .as_single()
                .and_then(Scalar::as_f64)
                .ok_or_else(|| wrong_source("interpolation table"))?;
            let target = entries
                .iter()
                .find(|entry| entry.matches(numeric))
                .map(|entry| &entry.target)
                .or(default.as_ref());
            Ok(target.map(|s| Value::Single(s.clone())).unwrap_or(Value::Null))
        }
    }
}

fn wrong_source(table: &str) -> RuleError {
    RuleError::Eval(EvalError::InvalidOperand {
        operator: "lookupOutcomeValue".to_string(),
        message: format!("source value cannot be mapped through a {table}"),
    })
}
