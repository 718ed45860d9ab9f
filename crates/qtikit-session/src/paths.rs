//! Static path enumeration.
//!
//! Enumerates the item sequences a candidate could traverse, deriving
//! alternatives from the full document-order list: branch rules excise
//! the items between their source and target, preconditions duplicate
//! paths with the guarded items removed. Forward-only is a hard
//! invariant; a backward, recursive, or unknown target is an error,
//! never silently dropped.

use crate::error::BranchTargetError;
use qtikit_types::testdef::{
    AssessmentItemRef, AssessmentSection, AssessmentTest, BranchTarget, Component, SectionPart,
};
use std::collections::BTreeMap;

/// One possible traversal, as item identifiers in visit order.
pub type Path = Vec<String>;

/// Every structurally possible path through a test, the full
/// document-order path first.
pub fn possible_paths(test: &AssessmentTest) -> Result<Vec<Path>, BranchTargetError> {
    let items = visible_items(test);
    let order: BTreeMap<&str, usize> = items
        .iter()
        .enumerate()
        .map(|(index, item)| (item.identifier.as_str(), index))
        .collect();

    let base: Path = items.iter().map(|i| i.identifier.clone()).collect();
    let mut paths = vec![base];

    // Branch rules, owners in document order: parts, sections, items.
    for component in owners(test) {
        for rule in component.branch_rules() {
            let jump = resolve(test, component, &rule.target, &items, &order)?;
            derive_excised(&mut paths, &jump, &order);
        }
    }

    // Preconditions duplicate paths minus the guarded subtree.
    for component in owners(test) {
        if component.preconditions().is_empty() {
            continue;
        }
        let guarded: Vec<&str> = component
            .item_refs()
            .iter()
            .map(|i| i.identifier.as_str())
            .collect();
        let snapshot = paths.clone();
        for path in snapshot {
            let reduced: Path = path
                .iter()
                .filter(|id| !guarded.contains(&id.as_str()))
                .cloned()
                .collect();
            if !paths.contains(&reduced) {
                paths.push(reduced);
            }
        }
    }

    Ok(paths)
}

/// The enumerated paths of minimal length.
pub fn shortest_paths(test: &AssessmentTest) -> Result<Vec<Path>, BranchTargetError> {
    let paths = possible_paths(test)?;
    let min = paths.iter().map(Vec::len).min().unwrap_or(0);
    Ok(paths.into_iter().filter(|p| p.len() == min).collect())
}

/// The enumerated paths of maximal length.
pub fn longest_paths(test: &AssessmentTest) -> Result<Vec<Path>, BranchTargetError> {
    let paths = possible_paths(test)?;
    let max = paths.iter().map(Vec::len).max().unwrap_or(0);
    Ok(paths.into_iter().filter(|p| p.len() == max).collect())
}

/// A resolved branch: the source item it jumps from and the item it
/// lands on (`None` ends the test).
struct Jump {
    source: usize,
    target: Option<usize>,
}

fn resolve(
    test: &AssessmentTest,
    owner: Component<'_>,
    target: &BranchTarget,
    items: &[&AssessmentItemRef],
    order: &BTreeMap<&str, usize>,
) -> Result<Jump, BranchTargetError> {
    let source_item = match test.last_item_under(owner) {
        Some(item) => item,
        // An owner with no items contributes nothing.
        None => {
            return Ok(Jump {
                source: 0,
                target: Some(0),
            })
        }
    };
    let source = match order.get(source_item.identifier.as_str()) {
        Some(&index) => index,
        None => {
            return Ok(Jump {
                source: 0,
                target: Some(0),
            })
        }
    };

    let target = match target {
        BranchTarget::ExitTest => None,
        BranchTarget::ExitTestPart => {
            let part = match owner {
                Component::TestPart(p) => p,
                _ => test
                    .part_of_item(&source_item.identifier)
                    .ok_or_else(|| BranchTargetError::UnknownTarget(owner.identifier().into()))?,
            };
            boundary_successor(test, Component::TestPart(part), items.len(), order)
        }
        BranchTarget::ExitSection => {
            let section = match owner {
                Component::Section(s) => s,
                _ => innermost_section(test, owner.identifier())
                    .ok_or_else(|| BranchTargetError::UnknownTarget(owner.identifier().into()))?,
            };
            boundary_successor(test, Component::Section(section), items.len(), order)
        }
        BranchTarget::Identifier(identifier) => {
            if identifier == owner.identifier() {
                return Err(BranchTargetError::RecursiveBranch(identifier.clone()));
            }
            let component = test
                .by_identifier(identifier)
                .ok_or_else(|| BranchTargetError::UnknownTarget(identifier.clone()))?;
            let first = test
                .first_item_under(component)
                .ok_or_else(|| BranchTargetError::UnknownTarget(identifier.clone()))?;
            let index = *order
                .get(first.identifier.as_str())
                .ok_or_else(|| BranchTargetError::UnknownTarget(identifier.clone()))?;
            if index <= source {
                return Err(BranchTargetError::BackwardBranch {
                    from: owner.identifier().to_string(),
                    target: identifier.clone(),
                });
            }
            Some(index)
        }
    };

    Ok(Jump { source, target })
}

/// The first item after a component's subtree, in flat order.
fn boundary_successor(
    test: &AssessmentTest,
    component: Component<'_>,
    len: usize,
    order: &BTreeMap<&str, usize>,
) -> Option<usize> {
    let last = test.last_item_under(component)?;
    let index = *order.get(last.identifier.as_str())?;
    let next = index + 1;
    (next < len).then_some(next)
}

/// For each path holding the jump's source, add the variant with the
/// items between source and target excised. Structural duplicates are
/// discarded.
fn derive_excised(paths: &mut Vec<Path>, jump: &Jump, order: &BTreeMap<&str, usize>) {
    let snapshot = paths.clone();
    for path in snapshot {
        let Some(cut) = path
            .iter()
            .position(|id| order.get(id.as_str()) == Some(&jump.source))
        else {
            continue;
        };
        let mut derived: Path = path[..=cut].to_vec();
        if let Some(target) = jump.target {
            derived.extend(
                path[cut + 1..]
                    .iter()
                    .filter(|id| order.get(id.as_str()).is_some_and(|&i| i >= target))
                    .cloned(),
            );
        }
        if !paths.contains(&derived) {
            paths.push(derived);
        }
    }
}

/// All items under visible sections, document order.
fn visible_items(test: &AssessmentTest) -> Vec<&AssessmentItemRef> {
    fn walk<'a>(section: &'a AssessmentSection, out: &mut Vec<&'a AssessmentItemRef>) {
        if !section.visible {
            return;
        }
        for part in &section.parts {
            match part {
                SectionPart::ItemRef(item) => out.push(item),
                SectionPart::Section(sub) => walk(sub, out),
            }
        }
    }
    let mut out = Vec::new();
    for part in &test.test_parts {
        for section in &part.sections {
            walk(section, &mut out);
        }
    }
    out
}

/// Parts, then sections, then items, each in document order.
fn owners(test: &AssessmentTest) -> Vec<Component<'_>> {
    let mut out: Vec<Component<'_>> = test.test_parts.iter().map(Component::TestPart).collect();
    out.extend(test.sections().into_iter().map(Component::Section));
    out.extend(test.item_refs().into_iter().map(Component::ItemRef));
    out
}

/// The innermost section containing an item. Ancestor sections precede
/// their descendants in document order, so the last containing section
/// is the innermost.
fn innermost_section<'a>(
    test: &'a AssessmentTest,
    item_identifier: &str,
) -> Option<&'a AssessmentSection> {
    test.sections()
        .into_iter()
        .filter(|s| s.item_refs().iter().any(|i| i.identifier == item_identifier))
        .last()
}
