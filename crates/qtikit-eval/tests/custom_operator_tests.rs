//! Integration tests for the custom-operator registry.
//!
//! The explode matrix covers operand-count and contract violations, NULL
//! operands, and delimiter splitting.

use qtikit_eval::{
    CardinalityRequirement, CustomOperator, EvalError, EvalResult, Evaluator, OperandContract,
    OperandCount, OperatorRegistry, VariableStore,
};
use qtikit_types::expression::Expr;
use qtikit_types::value::{BaseType, Scalar, Value};
use std::collections::BTreeMap;

fn eval(expr: &Expr) -> Result<Value, EvalError> {
    let store = VariableStore::new();
    let registry = OperatorRegistry::standard();
    Evaluator::new(&store, &registry).evaluate(expr)
}

fn lit(value: Value) -> Expr {
    Expr::BaseValue(value)
}

fn explode(operands: Vec<Expr>) -> Expr {
    Expr::custom("explode", operands)
}

fn ordered_strings(parts: &[&str]) -> Value {
    Value::ordered(
        BaseType::String,
        parts.iter().map(|p| Scalar::String((*p).to_string())).collect(),
    )
    .unwrap()
}

// ══════════════════════════════════════════════════════════════════════════════
// explode
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn explode_not_enough_operands_zero() {
    let err = eval(&explode(vec![])).unwrap_err();
    assert!(matches!(
        err,
        EvalError::NotEnoughOperands {
            required: 2,
            given: 0,
            ..
        }
    ));
}

#[test]
fn explode_not_enough_operands_one() {
    let err = eval(&explode(vec![lit(Value::string("Hello-World!"))])).unwrap_err();
    assert!(matches!(
        err,
        EvalError::NotEnoughOperands {
            required: 2,
            given: 1,
            ..
        }
    ));
}

#[test]
fn explode_wrong_base_type() {
    let err = eval(&explode(vec![
        lit(Value::integer(2)),
        lit(Value::Single(Scalar::Point(0, 0))),
    ]))
    .unwrap_err();
    assert!(matches!(err, EvalError::WrongBaseType { .. }));
}

#[test]
fn explode_wrong_cardinality() {
    let mut fields = BTreeMap::new();
    fields.insert("a".to_string(), Scalar::String("String!".into()));
    let err = eval(&explode(vec![
        lit(Value::record(fields)),
        lit(Value::string("Hey!")),
    ]))
    .unwrap_err();
    assert!(matches!(err, EvalError::WrongCardinality { .. }));
}

#[test]
fn explode_null_operands_yield_null() {
    // Empty containers count as NULL.
    let empty = Value::multiple(BaseType::Float, vec![]).unwrap();
    let result = eval(&explode(vec![lit(empty.clone()), lit(empty)])).unwrap();
    assert_eq!(result, Value::Null);
}

#[test]
fn explode_splits_on_delimiter() {
    let result = eval(&explode(vec![
        lit(Value::string("-")),
        lit(Value::string("Hello-World-This-Is-Me")),
    ]))
    .unwrap();
    assert_eq!(result, ordered_strings(&["Hello", "World", "This", "Is", "Me"]));
}

#[test]
fn explode_without_delimiter_occurrence() {
    let result = eval(&explode(vec![
        lit(Value::string("-")),
        lit(Value::string("Hello World!")),
    ]))
    .unwrap();
    assert_eq!(result, ordered_strings(&["Hello World!"]));
}

#[test]
fn explode_on_space() {
    let result = eval(&explode(vec![
        lit(Value::string(" ")),
        lit(Value::string("Hello World!")),
    ]))
    .unwrap();
    assert_eq!(result, ordered_strings(&["Hello", "World!"]));
}

// ══════════════════════════════════════════════════════════════════════════════
// csv operators
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn csv_to_multiple_splits_on_commas() {
    let result = eval(&Expr::custom(
        "csvToMultiple",
        vec![lit(Value::string("a,b,c"))],
    ))
    .unwrap();
    let expected = Value::multiple(
        BaseType::String,
        vec![
            Scalar::String("a".into()),
            Scalar::String("b".into()),
            Scalar::String("c".into()),
        ],
    )
    .unwrap();
    assert_eq!(result, expected);
}

#[test]
fn csv_to_ordered_preserves_order() {
    let result = eval(&Expr::custom(
        "csvToOrdered",
        vec![lit(Value::string("z,a"))],
    ))
    .unwrap();
    assert_eq!(result, ordered_strings(&["z", "a"]));
}

// ══════════════════════════════════════════════════════════════════════════════
// Registry
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn unknown_operator_is_a_typed_error() {
    let err = eval(&Expr::custom("frobnicate", vec![])).unwrap_err();
    assert!(matches!(err, EvalError::UnknownOperator(name) if name == "frobnicate"));
}

/// A user-registered operator composes with built-ins: the evaluator
/// enforces its contract and NULL propagation before `apply` runs.
struct Negate;

impl CustomOperator for Negate {
    fn contract(&self) -> OperandContract {
        OperandContract::new(OperandCount::Exact(1), CardinalityRequirement::ExclusivelySingle)
            .with_base_types(vec![BaseType::Integer])
    }

    fn apply(&self, operands: &[Value]) -> EvalResult<Value> {
        match operands[0].as_single() {
            Some(Scalar::Integer(i)) => Ok(Value::integer(-i)),
            _ => unreachable!("contract guarantees an integer operand"),
        }
    }
}

#[test]
fn registered_operator_honors_the_contract_shape() {
    let mut registry = OperatorRegistry::empty();
    registry.register("negate", Box::new(Negate));
    let store = VariableStore::new();
    let evaluator = Evaluator::new(&store, &registry);

    let ok = evaluator
        .evaluate(&Expr::custom("negate", vec![lit(Value::integer(4))]))
        .unwrap();
    assert_eq!(ok, Value::integer(-4));

    let null = evaluator
        .evaluate(&Expr::custom("negate", vec![lit(Value::Null)]))
        .unwrap();
    assert_eq!(null, Value::Null);

    let err = evaluator
        .evaluate(&Expr::custom("negate", vec![lit(Value::string("4"))]))
        .unwrap_err();
    assert!(matches!(err, EvalError::WrongBaseType { .. }));
}
