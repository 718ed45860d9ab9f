//! Integration tests for static path enumeration.

use qtikit_session::{longest_paths, possible_paths, shortest_paths, BranchTargetError};
use qtikit_types::expression::Expr;
use qtikit_types::testdef::{
    AssessmentItemRef, AssessmentSection, AssessmentTest, BranchRule, BranchTarget, PreCondition,
    SectionPart, TestPart,
};
use qtikit_types::value::Value;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn item(identifier: &str) -> AssessmentItemRef {
    AssessmentItemRef::new(identifier)
}

fn section(identifier: &str, parts: Vec<SectionPart>) -> AssessmentSection {
    let mut section = AssessmentSection::new(identifier, identifier);
    section.parts = parts;
    section
}

fn items(identifiers: &[&str]) -> Vec<SectionPart> {
    identifiers
        .iter()
        .map(|id| SectionPart::ItemRef(item(id)))
        .collect()
}

fn single_part_test(sections: Vec<AssessmentSection>) -> AssessmentTest {
    let mut part = TestPart::new("P01");
    part.sections = sections;
    let mut test = AssessmentTest::new("T01", "test");
    test.test_parts = vec![part];
    test
}

fn branch(target: BranchTarget) -> BranchRule {
    // Path enumeration treats every branch as takeable; the condition
    // only matters at runtime.
    BranchRule::new(target, Some(Expr::BaseValue(Value::boolean(true))))
}

fn path(identifiers: &[&str]) -> Vec<String> {
    identifiers.iter().map(|s| s.to_string()).collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// Enumeration
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn no_rules_yield_the_single_full_path() {
    let test = single_part_test(vec![section("S01", items(&["Q01", "Q02", "Q03"]))]);
    let paths = possible_paths(&test).unwrap();
    assert_eq!(paths, vec![path(&["Q01", "Q02", "Q03"])]);
}

#[test]
fn forward_branch_excises_the_intervening_items() {
    let mut source = item("Q01");
    source
        .branch_rules
        .push(branch(BranchTarget::Identifier("Q03".into())));
    let test = single_part_test(vec![section(
        "S01",
        vec![
            SectionPart::ItemRef(source),
            SectionPart::ItemRef(item("Q02")),
            SectionPart::ItemRef(item("Q03")),
            SectionPart::ItemRef(item("Q04")),
        ],
    )]);
    let paths = possible_paths(&test).unwrap();
    assert_eq!(paths.len(), 2);
    assert!(paths.contains(&path(&["Q01", "Q02", "Q03", "Q04"])));
    assert!(paths.contains(&path(&["Q01", "Q03", "Q04"])));
}

#[test]
fn exit_test_truncates_the_path() {
    let mut source = item("Q02");
    source.branch_rules.push(branch(BranchTarget::ExitTest));
    let test = single_part_test(vec![section(
        "S01",
        vec![
            SectionPart::ItemRef(item("Q01")),
            SectionPart::ItemRef(source),
            SectionPart::ItemRef(item("Q03")),
        ],
    )]);
    let paths = possible_paths(&test).unwrap();
    assert!(paths.contains(&path(&["Q01", "Q02", "Q03"])));
    assert!(paths.contains(&path(&["Q01", "Q02"])));
}

#[test]
fn exit_section_jumps_past_the_enclosing_section() {
    let mut source = item("Q01");
    source.branch_rules.push(branch(BranchTarget::ExitSection));
    let test = single_part_test(vec![
        section(
            "S01",
            vec![SectionPart::ItemRef(source), SectionPart::ItemRef(item("Q02"))],
        ),
        section("S02", items(&["Q03"])),
    ]);
    let paths = possible_paths(&test).unwrap();
    assert!(paths.contains(&path(&["Q01", "Q02", "Q03"])));
    assert!(paths.contains(&path(&["Q01", "Q03"])));
}

#[test]
fn exit_test_part_jumps_to_the_next_part() {
    let mut source = item("Q01");
    source.branch_rules.push(branch(BranchTarget::ExitTestPart));
    let mut first = TestPart::new("P01");
    first.sections = vec![section(
        "S01",
        vec![SectionPart::ItemRef(source), SectionPart::ItemRef(item("Q02"))],
    )];
    let mut second = TestPart::new("P02");
    second.sections = vec![section("S02", items(&["Q03"]))];
    let mut test = AssessmentTest::new("T01", "test");
    test.test_parts = vec![first, second];

    let paths = possible_paths(&test).unwrap();
    assert!(paths.contains(&path(&["Q01", "Q02", "Q03"])));
    assert!(paths.contains(&path(&["Q01", "Q03"])));
}

// ══════════════════════════════════════════════════════════════════════════════
// Hard errors
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn backward_branch_is_a_hard_error() {
    let mut source = item("Q03");
    source
        .branch_rules
        .push(branch(BranchTarget::Identifier("Q01".into())));
    let test = single_part_test(vec![section(
        "S01",
        vec![
            SectionPart::ItemRef(item("Q01")),
            SectionPart::ItemRef(item("Q02")),
            SectionPart::ItemRef(source),
        ],
    )]);
    assert!(matches!(
        possible_paths(&test).unwrap_err(),
        BranchTargetError::BackwardBranch { .. }
    ));
}

#[test]
fn recursive_branch_is_a_hard_error() {
    let mut source = item("Q02");
    source
        .branch_rules
        .push(branch(BranchTarget::Identifier("Q02".into())));
    let test = single_part_test(vec![section("S01", {
        let mut parts = items(&["Q01"]);
        parts.push(SectionPart::ItemRef(source));
        parts.extend(items(&["Q03"]));
        parts
    })]);
    assert!(matches!(
        possible_paths(&test).unwrap_err(),
        BranchTargetError::RecursiveBranch(id) if id == "Q02"
    ));
}

#[test]
fn unknown_branch_target_is_a_hard_error() {
    let mut source = item("Q01");
    source
        .branch_rules
        .push(branch(BranchTarget::Identifier("NOWHERE".into())));
    let test = single_part_test(vec![section("S01", {
        let mut parts = vec![SectionPart::ItemRef(source)];
        parts.extend(items(&["Q02"]));
        parts
    })]);
    assert!(matches!(
        possible_paths(&test).unwrap_err(),
        BranchTargetError::UnknownTarget(id) if id == "NOWHERE"
    ));
}

// ══════════════════════════════════════════════════════════════════════════════
// Preconditions and reductions
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn precondition_duplicates_paths_without_the_guarded_item() {
    let mut guarded = item("Q02");
    guarded
        .preconditions
        .push(PreCondition::new(Expr::variable("SHOW_Q02")));
    let test = single_part_test(vec![section("S01", {
        let mut parts = items(&["Q01"]);
        parts.push(SectionPart::ItemRef(guarded));
        parts.extend(items(&["Q03"]));
        parts
    })]);
    let paths = possible_paths(&test).unwrap();
    assert_eq!(paths.len(), 2);
    assert!(paths.contains(&path(&["Q01", "Q02", "Q03"])));
    assert!(paths.contains(&path(&["Q01", "Q03"])));
}

#[test]
fn section_precondition_removes_the_whole_subtree() {
    let mut guarded = section("S02", items(&["Q02", "Q03"]));
    guarded
        .preconditions
        .push(PreCondition::new(Expr::variable("SHOW_S02")));
    let test = single_part_test(vec![
        section("S01", items(&["Q01"])),
        guarded,
        section("S03", items(&["Q04"])),
    ]);
    let paths = possible_paths(&test).unwrap();
    assert!(paths.contains(&path(&["Q01", "Q02", "Q03", "Q04"])));
    assert!(paths.contains(&path(&["Q01", "Q04"])));
    assert_eq!(paths.len(), 2);
}

#[test]
fn structurally_equal_paths_are_deduplicated() {
    let mut source = item("Q01");
    source
        .branch_rules
        .push(branch(BranchTarget::Identifier("Q03".into())));
    source
        .branch_rules
        .push(branch(BranchTarget::Identifier("Q03".into())));
    let test = single_part_test(vec![section("S01", {
        let mut parts = vec![SectionPart::ItemRef(source)];
        parts.extend(items(&["Q02", "Q03"]));
        parts
    })]);
    let paths = possible_paths(&test).unwrap();
    assert_eq!(paths.len(), 2);
}

#[test]
fn shortest_and_longest_reduce_over_the_set() {
    let mut source = item("Q01");
    source.branch_rules.push(branch(BranchTarget::ExitTest));
    let test = single_part_test(vec![section("S01", {
        let mut parts = vec![SectionPart::ItemRef(source)];
        parts.extend(items(&["Q02", "Q03"]));
        parts
    })]);
    assert_eq!(shortest_paths(&test).unwrap(), vec![path(&["Q01"])]);
    assert_eq!(
        longest_paths(&test).unwrap(),
        vec![path(&["Q01", "Q02", "Q03"])]
    );
}
