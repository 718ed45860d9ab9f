//! Integration tests for the processing-rule executor.

use qtikit_eval::{run_rules, OperatorRegistry, RuleError, RuleFlow, VariableError, VariableStore};
use qtikit_types::expression::{Expr, OperatorKind};
use qtikit_types::rules::{ConditionBranch, InterpolationEntry, LookupTable, ProcessingRule};
use qtikit_types::testdef::VariableDeclaration;
use qtikit_types::value::{BaseType, Cardinality, Scalar, Value};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn store_with_score() -> VariableStore {
    let mut store = VariableStore::new();
    store.declare(
        VariableDeclaration::outcome("SCORE", Cardinality::Single, BaseType::Float)
            .with_default(Value::float(0.0)),
    );
    store.declare(VariableDeclaration::response(
        "RESPONSE",
        Cardinality::Single,
        BaseType::Identifier,
    ));
    store
}

fn run(rules: &[ProcessingRule], store: &mut VariableStore) -> Result<RuleFlow, RuleError> {
    let registry = OperatorRegistry::standard();
    run_rules(rules, store, &registry, None)
}

fn set_outcome(identifier: &str, value: Value) -> ProcessingRule {
    ProcessingRule::SetOutcomeValue {
        identifier: identifier.to_string(),
        expression: Expr::BaseValue(value),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Assignment
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn set_outcome_value_mutates_the_store() {
    let mut store = store_with_score();
    run(&[set_outcome("SCORE", Value::float(1.0))], &mut store).unwrap();
    assert_eq!(store.value("SCORE"), Some(&Value::float(1.0)));
}

#[test]
fn set_undeclared_variable_fails() {
    let mut store = store_with_score();
    let err = run(&[set_outcome("MISSING", Value::float(1.0))], &mut store).unwrap_err();
    assert!(matches!(
        err,
        RuleError::Variable(VariableError::Undeclared(name)) if name == "MISSING"
    ));
}

#[test]
fn set_outcome_on_a_response_variable_fails() {
    let mut store = store_with_score();
    let err = run(&[set_outcome("RESPONSE", Value::identifier("A"))], &mut store).unwrap_err();
    assert!(matches!(
        err,
        RuleError::Variable(VariableError::WrongKind { .. })
    ));
}

#[test]
fn set_response_value_mutates_a_response() {
    let mut store = store_with_score();
    let rules = [ProcessingRule::SetResponseValue {
        identifier: "RESPONSE".to_string(),
        expression: Expr::BaseValue(Value::identifier("ChoiceA")),
    }];
    run(&rules, &mut store).unwrap();
    assert_eq!(store.value("RESPONSE"), Some(&Value::identifier("ChoiceA")));
}

#[test]
fn mutations_are_visible_to_later_rules() {
    let mut store = store_with_score();
    let rules = [
        set_outcome("SCORE", Value::float(2.0)),
        ProcessingRule::SetOutcomeValue {
            identifier: "SCORE".to_string(),
            expression: Expr::operator(
                OperatorKind::Sum,
                vec![Expr::variable("SCORE"), Expr::BaseValue(Value::float(1.0))],
            ),
        },
    ];
    run(&rules, &mut store).unwrap();
    assert_eq!(store.value("SCORE"), Some(&Value::float(3.0)));
}

// ══════════════════════════════════════════════════════════════════════════════
// Conditions
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn first_true_branch_runs() {
    let mut store = store_with_score();
    let rules = [ProcessingRule::Condition {
        branches: vec![
            ConditionBranch::new(
                Expr::BaseValue(Value::boolean(false)),
                vec![set_outcome("SCORE", Value::float(1.0))],
            ),
            ConditionBranch::new(
                Expr::BaseValue(Value::boolean(true)),
                vec![set_outcome("SCORE", Value::float(2.0))],
            ),
            ConditionBranch::new(
                Expr::BaseValue(Value::boolean(true)),
                vec![set_outcome("SCORE", Value::float(3.0))],
            ),
        ],
        otherwise: vec![set_outcome("SCORE", Value::float(9.0))],
    }];
    run(&rules, &mut store).unwrap();
    assert_eq!(store.value("SCORE"), Some(&Value::float(2.0)));
}

#[test]
fn null_condition_counts_as_false() {
    let mut store = store_with_score();
    let rules = [ProcessingRule::Condition {
        branches: vec![ConditionBranch::new(
            Expr::BaseValue(Value::Null),
            vec![set_outcome("SCORE", Value::float(1.0))],
        )],
        otherwise: vec![set_outcome("SCORE", Value::float(5.0))],
    }];
    run(&rules, &mut store).unwrap();
    assert_eq!(store.value("SCORE"), Some(&Value::float(5.0)));
}

#[test]
fn non_boolean_condition_counts_as_false() {
    let mut store = store_with_score();
    let rules = [ProcessingRule::Condition {
        branches: vec![ConditionBranch::new(
            Expr::BaseValue(Value::integer(1)),
            vec![set_outcome("SCORE", Value::float(1.0))],
        )],
        otherwise: vec![],
    }];
    run(&rules, &mut store).unwrap();
    assert_eq!(store.value("SCORE"), Some(&Value::float(0.0)));
}

// ══════════════════════════════════════════════════════════════════════════════
// Exits
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn exit_response_aborts_remaining_rules() {
    let mut store = store_with_score();
    let rules = [
        set_outcome("SCORE", Value::float(1.0)),
        ProcessingRule::ExitResponse,
        set_outcome("SCORE", Value::float(9.0)),
    ];
    let flow = run(&rules, &mut store).unwrap();
    assert_eq!(flow, RuleFlow::ExitedResponse);
    assert_eq!(store.value("SCORE"), Some(&Value::float(1.0)));
}

#[test]
fn exit_test_propagates_from_nested_branches() {
    let mut store = store_with_score();
    let rules = [
        ProcessingRule::Condition {
            branches: vec![ConditionBranch::new(
                Expr::BaseValue(Value::boolean(true)),
                vec![ProcessingRule::ExitTest],
            )],
            otherwise: vec![],
        },
        set_outcome("SCORE", Value::float(9.0)),
    ];
    let flow = run(&rules, &mut store).unwrap();
    assert_eq!(flow, RuleFlow::ExitedTest);
    assert_eq!(store.value("SCORE"), Some(&Value::float(0.0)));
}

#[test]
fn error_aborts_remaining_rules_but_keeps_prior_mutations() {
    let mut store = store_with_score();
    let rules = [
        set_outcome("SCORE", Value::float(4.0)),
        set_outcome("MISSING", Value::float(1.0)),
        set_outcome("SCORE", Value::float(9.0)),
    ];
    assert!(run(&rules, &mut store).is_err());
    assert_eq!(store.value("SCORE"), Some(&Value::float(4.0)));
}

// ══════════════════════════════════════════════════════════════════════════════
// lookupOutcomeValue
// ══════════════════════════════════════════════════════════════════════════════

fn graded_store() -> VariableStore {
    let mut store = store_with_score();
    store.declare(
        VariableDeclaration::outcome("GRADE", Cardinality::Single, BaseType::Identifier)
            .with_lookup_table(LookupTable::Interpolation {
                entries: vec![
                    InterpolationEntry::new(0.8, true, Scalar::Identifier("A".into())),
                    InterpolationEntry::new(0.5, true, Scalar::Identifier("B".into())),
                ],
                default: Some(Scalar::Identifier("F".into())),
            }),
    );
    store
}

fn lookup_grade(value: Value) -> ProcessingRule {
    ProcessingRule::LookupOutcomeValue {
        identifier: "GRADE".to_string(),
        expression: Expr::BaseValue(value),
    }
}

#[test]
fn interpolation_table_picks_first_passed_boundary() {
    let mut store = graded_store();
    run(&[lookup_grade(Value::float(0.9))], &mut store).unwrap();
    assert_eq!(store.value("GRADE"), Some(&Value::identifier("A")));

    run(&[lookup_grade(Value::float(0.5))], &mut store).unwrap();
    assert_eq!(store.value("GRADE"), Some(&Value::identifier("B")));

    run(&[lookup_grade(Value::float(0.2))], &mut store).unwrap();
    assert_eq!(store.value("GRADE"), Some(&Value::identifier("F")));
}

#[test]
fn lookup_of_null_stores_null() {
    let mut store = graded_store();
    run(&[lookup_grade(Value::Null)], &mut store).unwrap();
    assert_eq!(store.value("GRADE"), Some(&Value::Null));
}

#[test]
fn lookup_without_table_fails() {
    let mut store = graded_store();
    let rules = [ProcessingRule::LookupOutcomeValue {
        identifier: "SCORE".to_string(),
        expression: Expr::BaseValue(Value::float(0.5)),
    }];
    let err = run(&rules, &mut store).unwrap_err();
    assert!(matches!(
        err,
        RuleError::Variable(VariableError::NoLookupTable(name)) if name == "SCORE"
    ));
}

#[test]
fn match_table_maps_exact_scalars() {
    let mut store = VariableStore::new();
    store.declare(
        VariableDeclaration::outcome("LABEL", Cardinality::Single, BaseType::String)
            .with_lookup_table(LookupTable::Match {
                entries: vec![
                    (Scalar::Integer(1), Scalar::String("one".into())),
                    (Scalar::Integer(2), Scalar::String("two".into())),
                ],
                default: None,
            }),
    );
    let rules = [ProcessingRule::LookupOutcomeValue {
        identifier: "LABEL".to_string(),
        expression: Expr::BaseValue(Value::integer(2)),
    }];
    run(&rules, &mut store).unwrap();
    assert_eq!(store.value("LABEL"), Some(&Value::string("two")));

    let miss = [ProcessingRule::LookupOutcomeValue {
        identifier: "LABEL".to_string(),
        expression: Expr::BaseValue(Value::integer(7)),
    }];
    run(&miss, &mut store).unwrap();
    assert_eq!(store.value("LABEL"), Some(&Value::Null));
}
