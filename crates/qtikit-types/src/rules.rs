//! Response and outcome processing rules.
//!
//! Rules are a straight-line or branching walk over the variable store.
//! There is no looping construct; any iteration is explicit in the rule
//! list supplied by the test definition.

use crate::expression::Expr;
use crate::value::Scalar;

/// One imperative processing rule.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingRule {
    /// Assign an evaluated expression to a declared outcome variable.
    SetOutcomeValue { identifier: String, expression: Expr },
    /// Assign an evaluated expression to a declared response variable.
    SetResponseValue { identifier: String, expression: Expr },
    /// Ordered if / else-if / else. The first branch whose condition
    /// evaluates to single boolean true is executed; a NULL or non-boolean
    /// condition counts as false.
    Condition {
        branches: Vec<ConditionBranch>,
        otherwise: Vec<ProcessingRule>,
    },
    /// Abort the current response-processing run.
    ExitResponse,
    /// Abort rule execution and signal the caller to end the test.
    ExitTest,
    /// Map a numeric outcome through the variable's declared lookup table.
    LookupOutcomeValue { identifier: String, expression: Expr },
}

/// A guarded rule body inside a [`ProcessingRule::Condition`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionBranch {
    pub condition: Expr,
    pub rules: Vec<ProcessingRule>,
}

impl ConditionBranch {
    pub fn new(condition: Expr, rules: Vec<ProcessingRule>) -> Self {
        Self { condition, rules }
    }
}

/// A lookup table attached to an outcome declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupTable {
    /// Exact scalar-to-scalar mapping.
    Match {
        entries: Vec<(Scalar, Scalar)>,
        default: Option<Scalar>,
    },
    /// Boundary table: entries are consulted in declared order, the first
    /// entry whose source boundary the value passes wins.
    Interpolation {
        entries: Vec<InterpolationEntry>,
        default: Option<Scalar>,
    },
}

/// One row of an interpolation table.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationEntry {
    pub source_value: f64,
    /// Whether a value exactly on the boundary matches this entry.
    pub include_boundary: bool,
    pub target: Scalar,
}

impl InterpolationEntry {
    pub fn new(source_value: f64, include_boundary: bool, target: Scalar) -> Self {
        Self {
            source_value,
            include_boundary,
            target,
        }
    }

    /// Whether `value` passes this entry's boundary.
    pub fn matches(&self, value: f64) -> bool {
        if self.include_boundary {
            value >= self.source_value
        } else {
            value > self.source_value
        }
    }
}
