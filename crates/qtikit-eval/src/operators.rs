//! Built-in operator contracts and application.
//!
//! Each operator declares the operand count, cardinality class, and base
//! type set it accepts; the evaluator enforces the contract (after NULL
//! handling) and then calls [`apply`].

use crate::error::{EvalError, EvalResult};
use qtikit_types::expression::OperatorKind;
use qtikit_types::value::{BaseType, Cardinality, Scalar, Value};
use std::collections::BTreeMap;

/// How many operands an operator requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandCount {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl OperandCount {
    /// The minimum acceptable operand count, used in diagnostics.
    pub fn required(&self) -> usize {
        match self {
            Self::Exact(n) | Self::AtLeast(n) => *n,
            Self::Any => 0,
        }
    }

    pub fn accepts(&self, given: usize) -> bool {
        match self {
            Self::Exact(n) => given == *n,
            Self::AtLeast(n) => given >= *n,
            Self::Any => true,
        }
    }
}

/// The cardinality class an operator accepts for its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardinalityRequirement {
    ExclusivelySingle,
    /// Multiple or ordered containers only.
    ExclusivelyContainer,
    Any,
}

/// The operand contract declared by an operator.
#[derive(Debug, Clone)]
pub struct OperandContract {
    pub count: OperandCount,
    pub cardinality: CardinalityRequirement,
    /// `None` accepts every base type.
    pub base_types: Option<Vec<BaseType>>,
}

impl OperandContract {
    pub fn new(count: OperandCount, cardinality: CardinalityRequirement) -> Self {
        Self {
            count,
            cardinality,
            base_types: None,
        }
    }

    pub fn with_base_types(mut self, base_types: Vec<BaseType>) -> Self {
        self.base_types = Some(base_types);
        self
    }
}

const NUMERIC: [BaseType; 2] = [BaseType::Integer, BaseType::Float];

/// The contract of a built-in operator.
pub fn contract(kind: &OperatorKind) -> OperandContract {
    use CardinalityRequirement::{Any, ExclusivelyContainer, ExclusivelySingle};
    use OperandCount::{AtLeast, Exact};
    match kind {
        OperatorKind::And | OperatorKind::Or => {
            OperandContract::new(AtLeast(1), ExclusivelySingle)
                .with_base_types(vec![BaseType::Boolean])
        }
        OperatorKind::Not => OperandContract::new(Exact(1), ExclusivelySingle)
            .with_base_types(vec![BaseType::Boolean]),
        OperatorKind::IsNull => OperandContract::new(Exact(1), Any),
        OperatorKind::Match => OperandContract::new(Exact(2), Any),
        OperatorKind::Gt | OperatorKind::Gte | OperatorKind::Lt | OperatorKind::Lte => {
            OperandContract::new(Exact(2), ExclusivelySingle).with_base_types(NUMERIC.to_vec())
        }
        OperatorKind::Sum | OperatorKind::Product => {
            OperandContract::new(AtLeast(1), ExclusivelySingle).with_base_types(NUMERIC.to_vec())
        }
        OperatorKind::Subtract | OperatorKind::Divide => {
            OperandContract::new(Exact(2), ExclusivelySingle).with_base_types(NUMERIC.to_vec())
        }
        OperatorKind::IntegerDivide | OperatorKind::IntegerModulus => {
            OperandContract::new(Exact(2), ExclusivelySingle)
                .with_base_types(vec![BaseType::Integer])
        }
        OperatorKind::Round | OperatorKind::Truncate => {
            OperandContract::new(Exact(1), ExclusivelySingle).with_base_types(NUMERIC.to_vec())
        }
        // Per-operand shape of multiple/ordered/member/index/fieldValue is
        // validated during application.
        OperatorKind::Multiple | OperatorKind::Ordered => {
            OperandContract::new(OperandCount::Any, Any)
        }
        OperatorKind::ContainerSize => OperandContract::new(Exact(1), ExclusivelyContainer),
        OperatorKind::Member => OperandContract::new(Exact(2), Any),
        OperatorKind::Index { .. } => OperandContract::new(Exact(1), Any),
        OperatorKind::FieldValue { .. } => OperandContract::new(Exact(1), Any),
        OperatorKind::StringMatch { .. } | OperatorKind::Substring { .. } => {
            OperandContract::new(Exact(2), ExclusivelySingle)
                .with_base_types(vec![BaseType::String])
        }
    }
}

/// Whether the default NULL-propagation rule applies to this operator.
///
/// `isNull`, `and`/`or`, and the container builders define their own NULL
/// handling inside [`apply`].
pub fn propagates_null(kind: &OperatorKind) -> bool {
    !matches!(
        kind,
        OperatorKind::IsNull
            | OperatorKind::And
            | OperatorKind::Or
            | OperatorKind::Multiple
            | OperatorKind::Ordered
    )
}

/// Apply a built-in operator to contract-checked operands.
pub fn apply(kind: &OperatorKind, operands: &[Value]) -> EvalResult<Value> {
    match kind {
        OperatorKind::IsNull => Ok(Value::boolean(operands[0].is_null())),
        OperatorKind::And => apply_and(operands),
        OperatorKind::Or => apply_or(operands),
        OperatorKind::Not => {
            let b = boolean_operand(kind, &operands[0])?;
            Ok(Value::boolean(!b))
        }
        OperatorKind::Match => apply_match(kind, operands),
        OperatorKind::Gt => apply_comparison(operands, |a, b| a > b),
        OperatorKind::Gte => apply_comparison(operands, |a, b| a >= b),
        OperatorKind::Lt => apply_comparison(operands, |a, b| a < b),
        OperatorKind::Lte => apply_comparison(operands, |a, b| a <= b),
        OperatorKind::Sum => apply_fold(operands, 0, |acc, x| acc.checked_add(x), |acc, x| acc + x),
        OperatorKind::Product => {
            apply_fold(operands, 1, |acc, x| acc.checked_mul(x), |acc, x| acc * x)
        }
        OperatorKind::Subtract => apply_subtract(operands),
        OperatorKind::Divide => apply_divide(operands),
        OperatorKind::IntegerDivide => apply_integer_divide(operands, false),
        OperatorKind::IntegerModulus => apply_integer_divide(operands, true),
        OperatorKind::Round => apply_round(operands, round_half_up),
        OperatorKind::Truncate => apply_round(operands, f64::trunc),
        OperatorKind::Multiple => build_container(kind, operands, false),
        OperatorKind::Ordered => build_container(kind, operands, true),
        OperatorKind::ContainerSize => apply_container_size(operands),
        OperatorKind::Member => apply_member(kind, operands),
        OperatorKind::Index { n } => apply_index(kind, operands, *n),
        OperatorKind::FieldValue { field } => apply_field_value(kind, operands, field),
        OperatorKind::StringMatch { case_sensitive } => {
            apply_string_pair(kind, operands, |a, b| {
                if *case_sensitive {
                    a == b
                } else {
                    a.eq_ignore_ascii_case(b)
                }
            })
        }
        OperatorKind::Substring { case_sensitive } => {
            apply_string_pair(kind, operands, |needle, haystack| {
                if *case_sensitive {
                    haystack.contains(needle)
                } else {
                    haystack.to_lowercase().contains(&needle.to_lowercase())
                }
            })
        }
    }
}

// ── Logic ────────────────────────────────────────────────────────────────

/// False wins over NULL; all-true is required for true.
fn apply_and(operands: &[Value]) -> EvalResult<Value> {
    let mut saw_null = false;
    for operand in operands {
        if operand.is_null() {
            saw_null = true;
        } else if operand.as_boolean() == Some(false) {
            return Ok(Value::boolean(false));
        }
    }
    if saw_null {
        Ok(Value::Null)
    } else {
        Ok(Value::boolean(true))
    }
}

/// True wins over NULL; all-false is required for false.
fn apply_or(operands: &[Value]) -> EvalResult<Value> {
    let mut saw_null = false;
    for operand in operands {
        if operand.is_null() {
            saw_null = true;
        } else if operand.as_boolean() == Some(true) {
            return Ok(Value::boolean(true));
        }
    }
    if saw_null {
        Ok(Value::Null)
    } else {
        Ok(Value::boolean(false))
    }
}

fn boolean_operand(kind: &OperatorKind, operand: &Value) -> EvalResult<bool> {
    operand.as_boolean().ok_or_else(|| EvalError::WrongBaseType {
        operator: kind.to_string(),
        found: operand
            .base_type()
            .map(|b| b.to_string())
            .unwrap_or_else(|| "record".to_string()),
    })
}

// ── Comparison ───────────────────────────────────────────────────────────

/// Structural equality over two operands of identical shape.
fn apply_match(kind: &OperatorKind, operands: &[Value]) -> EvalResult<Value> {
    let (a, b) = (&operands[0], &operands[1]);
    if a.cardinality() != b.cardinality() {
        return Err(EvalError::WrongCardinality {
            operator: kind.to_string(),
            found: describe_cardinality(b),
        });
    }
    if a.base_type() != b.base_type() {
        return Err(EvalError::WrongBaseType {
            operator: kind.to_string(),
            found: describe_base_type(b),
        });
    }
    Ok(Value::boolean(a == b))
}

fn apply_comparison(operands: &[Value], cmp: fn(f64, f64) -> bool) -> EvalResult<Value> {
    let a = numeric(&operands[0]);
    let b = numeric(&operands[1]);
    Ok(Value::boolean(cmp(a, b)))
}

// ── Arithmetic ───────────────────────────────────────────────────────────

/// Integer folds stay integer until a float operand or an overflow
/// promotes the accumulator.
fn apply_fold(
    operands: &[Value],
    init: i64,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult<Value> {
    let mut int_acc = Some(init);
    let mut float_acc = init as f64;
    for operand in operands {
        match operand.as_single() {
            Some(Scalar::Integer(i)) => {
                int_acc = int_acc.and_then(|acc| int_op(acc, *i));
                float_acc = float_op(float_acc, *i as f64);
            }
            _ => {
                int_acc = None;
                float_acc = float_op(float_acc, numeric(operand));
            }
        }
    }
    Ok(match int_acc {
        Some(i) => Value::integer(i),
        None => Value::float(float_acc),
    })
}

fn apply_subtract(operands: &[Value]) -> EvalResult<Value> {
    if let (Some(Scalar::Integer(a)), Some(Scalar::Integer(b))) =
        (operands[0].as_single(), operands[1].as_single())
    {
        if let Some(result) = a.checked_sub(*b) {
            return Ok(Value::integer(result));
        }
    }
    Ok(Value::float(numeric(&operands[0]) - numeric(&operands[1])))
}

/// Division by zero yields NULL rather than an error.
fn apply_divide(operands: &[Value]) -> EvalResult<Value> {
    let denominator = numeric(&operands[1]);
    if denominator == 0.0 {
        return Ok(Value::Null);
    }
    let result = numeric(&operands[0]) / denominator;
    if result.is_finite() {
        Ok(Value::float(result))
    } else {
        Ok(Value::Null)
    }
}

fn apply_integer_divide(operands: &[Value], modulus: bool) -> EvalResult<Value> {
    let (a, b) = match (operands[0].as_single(), operands[1].as_single()) {
        (Some(Scalar::Integer(a)), Some(Scalar::Integer(b))) => (*a, *b),
        _ => unreachable!("contract guarantees integer operands"),
    };
    if b == 0 {
        return Ok(Value::Null);
    }
    Ok(Value::integer(if modulus { a % b } else { a / b }))
}

/// Halves round toward positive infinity: round(-2.5) is -2.
fn round_half_up(f: f64) -> f64 {
    (f + 0.5).floor()
}

/// Rounding of a non-finite float yields NULL.
fn apply_round(operands: &[Value], round: fn(f64) -> f64) -> EvalResult<Value> {
    match operands[0].as_single() {
        Some(Scalar::Integer(i)) => Ok(Value::integer(*i)),
        Some(Scalar::Float(f)) if f.is_finite() => Ok(Value::integer(round(*f) as i64)),
        _ => Ok(Value::Null),
    }
}

// ── Containers ───────────────────────────────────────────────────────────

/// Builds a multiple/ordered container from single and same-shaped
/// container operands, ignoring NULL operands.
fn build_container(kind: &OperatorKind, operands: &[Value], ordered: bool) -> EvalResult<Value> {
    let mut elements: Vec<Scalar> = Vec::new();
    let mut base_type = None;
    for operand in operands {
        match operand {
            Value::Null => continue,
            Value::Single(s) => {
                base_type.get_or_insert(s.base_type());
                elements.push(s.clone());
            }
            Value::Multiple(c) if !ordered => {
                base_type.get_or_insert(c.base_type());
                elements.extend(c.elements().iter().cloned());
            }
            Value::Ordered(c) if ordered => {
                base_type.get_or_insert(c.base_type());
                elements.extend(c.elements().iter().cloned());
            }
            other => {
                return Err(EvalError::WrongCardinality {
                    operator: kind.to_string(),
                    found: describe_cardinality(other),
                })
            }
        }
    }
    let Some(base_type) = base_type else {
        return Ok(Value::Null);
    };
    let value = if ordered {
        Value::ordered(base_type, elements)
    } else {
        Value::multiple(base_type, elements)
    };
    value.map_err(|e| EvalError::WrongBaseType {
        operator: kind.to_string(),
        found: e.to_string(),
    })
}

fn apply_container_size(operands: &[Value]) -> EvalResult<Value> {
    let len = match &operands[0] {
        Value::Multiple(c) | Value::Ordered(c) => c.len(),
        _ => unreachable!("contract guarantees a container operand"),
    };
    Ok(Value::integer(len as i64))
}

fn apply_member(kind: &OperatorKind, operands: &[Value]) -> EvalResult<Value> {
    let needle = operands[0].as_single().ok_or_else(|| EvalError::WrongCardinality {
        operator: kind.to_string(),
        found: describe_cardinality(&operands[0]),
    })?;
    let container = match &operands[1] {
        Value::Multiple(c) | Value::Ordered(c) => c,
        other => {
            return Err(EvalError::WrongCardinality {
                operator: kind.to_string(),
                found: describe_cardinality(other),
            })
        }
    };
    if needle.base_type() != container.base_type() {
        return Err(EvalError::WrongBaseType {
            operator: kind.to_string(),
            found: needle.base_type().to_string(),
        });
    }
    Ok(Value::boolean(container.contains(needle)))
}

/// 1-based indexing; out of range yields NULL, a zero index is a domain
/// error.
fn apply_index(kind: &OperatorKind, operands: &[Value], n: u64) -> EvalResult<Value> {
    if n == 0 {
        return Err(EvalError::InvalidOperand {
            operator: kind.to_string(),
            message: "index is 1-based".to_string(),
        });
    }
    let container = match &operands[0] {
        Value::Ordered(c) => c,
        other => {
            return Err(EvalError::WrongCardinality {
                operator: kind.to_string(),
                found: describe_cardinality(other),
            })
        }
    };
    Ok(container
        .elements()
        .get((n - 1) as usize)
        .map(|s| Value::Single(s.clone()))
        .unwrap_or(Value::Null))
}

/// A missing record field yields NULL.
fn apply_field_value(kind: &OperatorKind, operands: &[Value], field: &str) -> EvalResult<Value> {
    let fields: &BTreeMap<String, Scalar> = match &operands[0] {
        Value::Record(fields) => fields,
        other => {
            return Err(EvalError::WrongCardinality {
                operator: kind.to_string(),
                found: describe_cardinality(other),
            })
        }
    };
    Ok(fields
        .get(field)
        .map(|s| Value::Single(s.clone()))
        .unwrap_or(Value::Null))
}

// ── Strings ──────────────────────────────────────────────────────────────

fn apply_string_pair(
    kind: &OperatorKind,
    operands: &[Value],
    test: impl Fn(&str, &str) -> bool,
) -> EvalResult<Value> {
    let (a, b) = match (operands[0].as_single(), operands[1].as_single()) {
        (Some(Scalar::String(a)), Some(Scalar::String(b))) => (a, b),
        _ => {
            return Err(EvalError::WrongBaseType {
                operator: kind.to_string(),
                found: describe_base_type(&operands[0]),
            })
        }
    };
    Ok(Value::boolean(test(a, b)))
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn numeric(value: &Value) -> f64 {
    value
        .as_single()
        .and_then(Scalar::as_f64)
        .unwrap_or_else(|| unreachable!("contract guarantees numeric operands"))
}

pub(crate) fn describe_cardinality(value: &Value) -> String {
    value
        .cardinality()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "null".to_string())
}

pub(crate) fn describe_base_type(value: &Value) -> String {
    value
        .base_type()
        .map(|b| b.to_string())
        .unwrap_or_else(|| {
            if value.cardinality() == Some(Cardinality::Record) {
                "record".to_string()
            } else {
                "null".to_string()
            }
        })
}
