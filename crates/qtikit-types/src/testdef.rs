//! The read-only test definition tree.
//!
//! This is the fully-resolved, in-memory shape a marshalling collaborator
//! produces from a test document. The runtime only traverses it; it never
//! parses or serializes anything.

use crate::expression::Expr;
use crate::rules::{LookupTable, ProcessingRule};
use crate::value::{BaseType, Cardinality, Value};
use std::time::Duration;

// ══════════════════════════════════════════════════════════════════════════════
// Variable declarations
// ══════════════════════════════════════════════════════════════════════════════

/// Whether a variable records a candidate response or a computed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Response,
    Outcome,
}

/// A declared variable, instantiated into a store when a session begins.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub identifier: String,
    pub kind: VariableKind,
    pub cardinality: Cardinality,
    /// Absent for record variables.
    pub base_type: Option<BaseType>,
    pub default_value: Value,
    /// Normalization/interpretation hint carried for outcome variables.
    /// Not processed by the runtime.
    pub interpretation: Option<String>,
    /// Lookup table consulted by `lookupOutcomeValue` (outcomes only).
    pub lookup_table: Option<LookupTable>,
}

impl VariableDeclaration {
    pub fn response(
        identifier: impl Into<String>,
        cardinality: Cardinality,
        base_type: BaseType,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            kind: VariableKind::Response,
            cardinality,
            base_type: Some(base_type),
            default_value: Value::Null,
            interpretation: None,
            lookup_table: None,
        }
    }

    pub fn outcome(
        identifier: impl Into<String>,
        cardinality: Cardinality,
        base_type: BaseType,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            kind: VariableKind::Outcome,
            cardinality,
            base_type: Some(base_type),
            default_value: Value::Null,
            interpretation: None,
            lookup_table: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = value;
        self
    }

    pub fn with_lookup_table(mut self, table: LookupTable) -> Self {
        self.lookup_table = Some(table);
        self
    }

    pub fn with_interpretation(mut self, hint: impl Into<String>) -> Self {
        self.interpretation = Some(hint.into());
        self
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Rules attached to structural nodes
// ══════════════════════════════════════════════════════════════════════════════

/// Where a branch rule jumps when its condition holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchTarget {
    ExitTest,
    ExitTestPart,
    ExitSection,
    /// An item, section, or test-part identifier.
    Identifier(String),
}

/// A conditional jump attached to an item, section, or test part,
/// evaluated when the owner is left.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchRule {
    pub target: BranchTarget,
    /// Absent means the branch is unconditional.
    pub condition: Option<Expr>,
}

impl BranchRule {
    pub fn new(target: BranchTarget, condition: Option<Expr>) -> Self {
        Self { target, condition }
    }
}

/// A guard evaluated when its owner is reached; false skips the owner and
/// its subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct PreCondition {
    pub condition: Expr,
}

impl PreCondition {
    pub fn new(condition: Expr) -> Self {
        Self { condition }
    }
}

/// Minimum/maximum durations for a structural scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeLimits {
    pub min_time: Option<Duration>,
    pub max_time: Option<Duration>,
    /// Whether a submission past the maximum is still accepted.
    pub allow_late_submission: bool,
}

impl TimeLimits {
    pub fn max(max_time: Duration) -> Self {
        Self {
            min_time: None,
            max_time: Some(max_time),
            allow_late_submission: false,
        }
    }

    pub fn min(min_time: Duration) -> Self {
        Self {
            min_time: Some(min_time),
            max_time: None,
            allow_late_submission: false,
        }
    }
}

/// Attempt and interaction policy, inherited downward unless overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSessionControl {
    /// 0 means unlimited.
    pub max_attempts: u32,
    pub show_feedback: bool,
    pub allow_comment: bool,
    pub allow_skipping: bool,
    pub validate_responses: bool,
}

impl Default for ItemSessionControl {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            show_feedback: false,
            allow_comment: true,
            allow_skipping: true,
            validate_responses: false,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Feedback
// ══════════════════════════════════════════════════════════════════════════════

/// When a test feedback may interrupt the item flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackAccess {
    /// After any attempt, before advancing.
    During,
    /// Only once the end of the test is reached.
    AtEnd,
}

/// Whether a matching outcome shows or hides the feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowHide {
    Show,
    Hide,
}

/// Test-level feedback, attached to the test or a test part.
///
/// The feedback is triggered when the named outcome's value matches the
/// feedback identifier (or does not match, for [`ShowHide::Hide`]).
#[derive(Debug, Clone, PartialEq)]
pub struct TestFeedback {
    pub identifier: String,
    pub outcome_identifier: String,
    pub access: FeedbackAccess,
    pub show_hide: ShowHide,
}

// ══════════════════════════════════════════════════════════════════════════════
// Structural nodes
// ══════════════════════════════════════════════════════════════════════════════

/// How a candidate may move between items within a test part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    Linear,
    Nonlinear,
}

/// When responses are submitted for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    /// Each attempt submission triggers outcome processing.
    Individual,
    /// Responses are processed together at the end of the part.
    Simultaneous,
}

/// Rules for picking `select` children out of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub select: usize,
    pub with_replacement: bool,
}

/// Child ordering of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ordering {
    pub shuffle: bool,
}

/// A reference to one assessment item, with the rules that govern it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentItemRef {
    pub identifier: String,
    /// A fixed child keeps its slot when the parent section shuffles.
    pub fixed: bool,
    pub preconditions: Vec<PreCondition>,
    pub branch_rules: Vec<BranchRule>,
    pub item_session_control: Option<ItemSessionControl>,
    pub time_limits: Option<TimeLimits>,
    pub response_declarations: Vec<VariableDeclaration>,
    pub outcome_declarations: Vec<VariableDeclaration>,
    pub response_processing: Vec<ProcessingRule>,
}

impl AssessmentItemRef {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            fixed: false,
            preconditions: Vec::new(),
            branch_rules: Vec::new(),
            item_session_control: None,
            time_limits: None,
            response_declarations: Vec::new(),
            outcome_declarations: Vec::new(),
            response_processing: Vec::new(),
        }
    }
}

/// Either a nested section or an item reference.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionPart {
    Section(AssessmentSection),
    ItemRef(AssessmentItemRef),
}

/// A grouping of items and sub-sections.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentSection {
    pub identifier: String,
    pub title: String,
    /// Hidden sections are excluded from the route statically.
    pub visible: bool,
    pub selection: Option<Selection>,
    pub ordering: Option<Ordering>,
    pub preconditions: Vec<PreCondition>,
    pub branch_rules: Vec<BranchRule>,
    pub item_session_control: Option<ItemSessionControl>,
    pub time_limits: Option<TimeLimits>,
    pub parts: Vec<SectionPart>,
}

impl AssessmentSection {
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            visible: true,
            selection: None,
            ordering: None,
            preconditions: Vec::new(),
            branch_rules: Vec::new(),
            item_session_control: None,
            time_limits: None,
            parts: Vec::new(),
        }
    }

    /// Item references in document order, descending into sub-sections.
    pub fn item_refs(&self) -> Vec<&AssessmentItemRef> {
        let mut out = Vec::new();
        for part in &self.parts {
            match part {
                SectionPart::ItemRef(item) => out.push(item),
                SectionPart::Section(section) => out.extend(section.item_refs()),
            }
        }
        out
    }

    /// All sections under this one (inclusive), document order.
    pub fn sections(&self) -> Vec<&AssessmentSection> {
        let mut out = vec![self];
        for part in &self.parts {
            if let SectionPart::Section(section) = part {
                out.extend(section.sections());
            }
        }
        out
    }
}

/// A major division of the test, with its own navigation and submission
/// modes.
#[derive(Debug, Clone, PartialEq)]
pub struct TestPart {
    pub identifier: String,
    pub navigation_mode: NavigationMode,
    pub submission_mode: SubmissionMode,
    pub preconditions: Vec<PreCondition>,
    pub branch_rules: Vec<BranchRule>,
    pub item_session_control: Option<ItemSessionControl>,
    pub time_limits: Option<TimeLimits>,
    pub sections: Vec<AssessmentSection>,
    pub feedbacks: Vec<TestFeedback>,
}

impl TestPart {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            navigation_mode: NavigationMode::Linear,
            submission_mode: SubmissionMode::Individual,
            preconditions: Vec::new(),
            branch_rules: Vec::new(),
            item_session_control: None,
            time_limits: None,
            sections: Vec::new(),
            feedbacks: Vec::new(),
        }
    }

    pub fn item_refs(&self) -> Vec<&AssessmentItemRef> {
        self.sections.iter().flat_map(|s| s.item_refs()).collect()
    }
}

/// The root of the test definition tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentTest {
    pub identifier: String,
    pub title: String,
    pub outcome_declarations: Vec<VariableDeclaration>,
    pub time_limits: Option<TimeLimits>,
    pub test_parts: Vec<TestPart>,
    pub outcome_processing: Vec<ProcessingRule>,
    pub feedbacks: Vec<TestFeedback>,
}

/// A structural node, as seen by identifier-based traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Component<'a> {
    TestPart(&'a TestPart),
    Section(&'a AssessmentSection),
    ItemRef(&'a AssessmentItemRef),
}

impl<'a> Component<'a> {
    pub fn identifier(&self) -> &'a str {
        match self {
            Self::TestPart(p) => &p.identifier,
            Self::Section(s) => &s.identifier,
            Self::ItemRef(i) => &i.identifier,
        }
    }

    pub fn branch_rules(&self) -> &'a [BranchRule] {
        match self {
            Self::TestPart(p) => &p.branch_rules,
            Self::Section(s) => &s.branch_rules,
            Self::ItemRef(i) => &i.branch_rules,
        }
    }

    pub fn preconditions(&self) -> &'a [PreCondition] {
        match self {
            Self::TestPart(p) => &p.preconditions,
            Self::Section(s) => &s.preconditions,
            Self::ItemRef(i) => &i.preconditions,
        }
    }

    /// Item references under this component, document order.
    pub fn item_refs(&self) -> Vec<&'a AssessmentItemRef> {
        match self {
            Self::TestPart(p) => p.item_refs(),
            Self::Section(s) => s.item_refs(),
            Self::ItemRef(i) => vec![i],
        }
    }
}

impl AssessmentTest {
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            outcome_declarations: Vec::new(),
            time_limits: None,
            test_parts: Vec::new(),
            outcome_processing: Vec::new(),
            feedbacks: Vec::new(),
        }
    }

    /// All item references in document order.
    pub fn item_refs(&self) -> Vec<&AssessmentItemRef> {
        self.test_parts.iter().flat_map(|p| p.item_refs()).collect()
    }

    /// All sections in document order.
    pub fn sections(&self) -> Vec<&AssessmentSection> {
        self.test_parts
            .iter()
            .flat_map(|p| p.sections.iter().flat_map(|s| s.sections()))
            .collect()
    }

    /// Find any structural component by identifier.
    pub fn by_identifier(&self, identifier: &str) -> Option<Component<'_>> {
        for part in &self.test_parts {
            if part.identifier == identifier {
                return Some(Component::TestPart(part));
            }
            for section in part.sections.iter().flat_map(|s| s.sections()) {
                if section.identifier == identifier {
                    return Some(Component::Section(section));
                }
            }
            for item in part.item_refs() {
                if item.identifier == identifier {
                    return Some(Component::ItemRef(item));
                }
            }
        }
        None
    }

    /// The first item reachable under a component. For components with no
    /// items of their own, this is the first item of the next sibling
    /// component of the same class, if any.
    pub fn first_item_under<'a>(
        &'a self,
        component: Component<'a>,
    ) -> Option<&'a AssessmentItemRef> {
        if let Some(item) = component.item_refs().first().copied() {
            return Some(item);
        }
        self.next_sibling_first_item(component)
    }

    /// The last item contained in a component, looking at the previous
    /// sibling of the same class when the component itself is empty.
    pub fn last_item_under<'a>(
        &'a self,
        component: Component<'a>,
    ) -> Option<&'a AssessmentItemRef> {
        if let Some(item) = component.item_refs().last().copied() {
            return Some(item);
        }
        match component {
            Component::ItemRef(item) => Some(item),
            Component::Section(section) => {
                let sections = self.sections();
                let idx = sections
                    .iter()
                    .position(|s| s.identifier == section.identifier)?;
                let prev = sections.get(idx.checked_sub(1)?)?;
                self.last_item_under(Component::Section(prev))
            }
            Component::TestPart(part) => {
                let idx = self
                    .test_parts
                    .iter()
                    .position(|p| p.identifier == part.identifier)?;
                let prev = self.test_parts.get(idx.checked_sub(1)?)?;
                self.last_item_under(Component::TestPart(prev))
            }
        }
    }

    fn next_sibling_first_item<'a>(
        &'a self,
        component: Component<'a>,
    ) -> Option<&'a AssessmentItemRef> {
        match component {
            Component::ItemRef(_) => None,
            Component::Section(section) => {
                let sections = self.sections();
                let idx = sections
                    .iter()
                    .position(|s| s.identifier == section.identifier)?;
                let next = sections.get(idx + 1)?;
                self.first_item_under(Component::Section(next))
            }
            Component::TestPart(part) => {
                let idx = self
                    .test_parts
                    .iter()
                    .position(|p| p.identifier == part.identifier)?;
                let next = self.test_parts.get(idx + 1)?;
                self.first_item_under(Component::TestPart(next))
            }
        }
    }

    /// The test part containing a given item identifier.
    pub fn part_of_item(&self, item_identifier: &str) -> Option<&TestPart> {
        self.test_parts
            .iter()
            .find(|p| p.item_refs().iter().any(|i| i.identifier == item_identifier))
    }
}
