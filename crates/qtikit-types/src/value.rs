//! Typed values and containers.
//!
//! Every runtime value is either NULL, a single scalar, a homogeneous
//! multiple/ordered container, or a record of named scalars. An empty
//! container is canonically NULL.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The scalar type of a value's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseType {
    Boolean,
    Integer,
    Float,
    String,
    Identifier,
    Duration,
    Point,
    Pair,
    Uri,
    IntOrIdentifier,
    File,
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Identifier => "identifier",
            Self::Duration => "duration",
            Self::Point => "point",
            Self::Pair => "pair",
            Self::Uri => "uri",
            Self::IntOrIdentifier => "intOrIdentifier",
            Self::File => "file",
        };
        write!(f, "{name}")
    }
}

/// The container shape of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    Single,
    Multiple,
    Ordered,
    Record,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Single => "single",
            Self::Multiple => "multiple",
            Self::Ordered => "ordered",
            Self::Record => "record",
        };
        write!(f, "{name}")
    }
}

/// A concrete scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Identifier(String),
    Duration(Duration),
    /// A point in a 2-dimensional coordinate space.
    Point(i64, i64),
    /// An unordered pair of identifiers.
    Pair(String, String),
    Uri(String),
    /// An opaque reference to an uploaded file.
    File(String),
}

impl Scalar {
    /// The runtime base type tag of this scalar.
    pub fn base_type(&self) -> BaseType {
        match self {
            Self::Boolean(_) => BaseType::Boolean,
            Self::Integer(_) => BaseType::Integer,
            Self::Float(_) => BaseType::Float,
            Self::String(_) => BaseType::String,
            Self::Identifier(_) => BaseType::Identifier,
            Self::Duration(_) => BaseType::Duration,
            Self::Point(_, _) => BaseType::Point,
            Self::Pair(_, _) => BaseType::Pair,
            Self::Uri(_) => BaseType::Uri,
            Self::File(_) => BaseType::File,
        }
    }

    /// Whether this scalar is acceptable for a declared base type.
    ///
    /// `intOrIdentifier` accepts both integer and identifier scalars;
    /// everything else requires an exact tag match.
    pub fn matches(&self, declared: BaseType) -> bool {
        match declared {
            BaseType::IntOrIdentifier => matches!(self, Self::Integer(_) | Self::Identifier(_)),
            other => self.base_type() == other,
        }
    }

    /// Whether this scalar has a numeric base type (integer or float).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    /// The numeric value as a float, if numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) | Self::Identifier(s) | Self::Uri(s) | Self::File(s) => {
                write!(f, "{s}")
            }
            Self::Duration(d) => write!(f, "{}s", d.as_secs_f64()),
            Self::Point(x, y) => write!(f, "{x} {y}"),
            Self::Pair(a, b) => write!(f, "{a} {b}"),
        }
    }
}

/// A homogeneous collection of scalars.
///
/// The base type is kept even when the element list is empty so that an
/// empty container still knows what it would hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    base_type: BaseType,
    elements: Vec<Scalar>,
}

impl Container {
    pub fn base_type(&self) -> BaseType {
        self.base_type
    }

    pub fn elements(&self) -> &[Scalar] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, scalar: &Scalar) -> bool {
        self.elements.contains(scalar)
    }
}

/// Error raised when constructing an ill-formed value.
#[derive(Debug, Clone, Error)]
pub enum ValueError {
    /// A container element does not match the declared base type.
    #[error("container of base type {expected} cannot hold a {found} element")]
    MixedBaseTypes { expected: BaseType, found: BaseType },
}

/// A runtime value: NULL, a scalar, a container, or a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Single(Scalar),
    Multiple(Container),
    Ordered(Container),
    Record(BTreeMap<String, Scalar>),
}

impl Value {
    /// Build a multiple (unordered) container, validating homogeneity.
    ///
    /// Zero elements normalize to [`Value::Null`].
    pub fn multiple(base_type: BaseType, elements: Vec<Scalar>) -> Result<Self, ValueError> {
        Self::container(base_type, elements).map(|c| match c {
            Some(c) => Self::Multiple(c),
            None => Self::Null,
        })
    }

    /// Build an ordered container, validating homogeneity.
    ///
    /// Zero elements normalize to [`Value::Null`].
    pub fn ordered(base_type: BaseType, elements: Vec<Scalar>) -> Result<Self, ValueError> {
        Self::container(base_type, elements).map(|c| match c {
            Some(c) => Self::Ordered(c),
            None => Self::Null,
        })
    }

    fn container(
        base_type: BaseType,
        elements: Vec<Scalar>,
    ) -> Result<Option<Container>, ValueError> {
        if elements.is_empty() {
            return Ok(None);
        }
        for element in &elements {
            if !element.matches(base_type) {
                return Err(ValueError::MixedBaseTypes {
                    expected: base_type,
                    found: element.base_type(),
                });
            }
        }
        Ok(Some(Container {
            base_type,
            elements,
        }))
    }

    /// Build a record value. An empty map normalizes to [`Value::Null`].
    pub fn record(fields: BTreeMap<String, Scalar>) -> Self {
        if fields.is_empty() {
            Self::Null
        } else {
            Self::Record(fields)
        }
    }

    /// Convenience constructor for a single scalar.
    pub fn single(scalar: Scalar) -> Self {
        Self::Single(scalar)
    }

    pub fn boolean(b: bool) -> Self {
        Self::Single(Scalar::Boolean(b))
    }

    pub fn integer(i: i64) -> Self {
        Self::Single(Scalar::Integer(i))
    }

    pub fn float(f: f64) -> Self {
        Self::Single(Scalar::Float(f))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::Single(Scalar::String(s.into()))
    }

    pub fn identifier(s: impl Into<String>) -> Self {
        Self::Single(Scalar::Identifier(s.into()))
    }

    /// NULL is true for the Null variant and for empty containers.
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Single(_) => false,
            Self::Multiple(c) | Self::Ordered(c) => c.is_empty(),
            Self::Record(fields) => fields.is_empty(),
        }
    }

    /// The cardinality of this value, if it is not NULL.
    pub fn cardinality(&self) -> Option<Cardinality> {
        match self {
            Self::Null => None,
            Self::Single(_) => Some(Cardinality::Single),
            Self::Multiple(_) => Some(Cardinality::Multiple),
            Self::Ordered(_) => Some(Cardinality::Ordered),
            Self::Record(_) => Some(Cardinality::Record),
        }
    }

    /// The base type of this value's elements, if any.
    ///
    /// Records have no single base type and report `None`.
    pub fn base_type(&self) -> Option<BaseType> {
        match self {
            Self::Null | Self::Record(_) => None,
            Self::Single(s) => Some(s.base_type()),
            Self::Multiple(c) | Self::Ordered(c) => Some(c.base_type()),
        }
    }

    /// The inner scalar of a single-cardinality value.
    pub fn as_single(&self) -> Option<&Scalar> {
        match self {
            Self::Single(s) => Some(s),
            _ => None,
        }
    }

    /// The inner boolean of a single boolean value.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Single(Scalar::Boolean(b)) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Deterministic string projection used by operators and assertions.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Single(s) => write!(f, "{s}"),
            Self::Multiple(c) => {
                let parts: Vec<String> = c.elements().iter().map(|s| s.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Ordered(c) => {
                let parts: Vec<String> = c.elements().iter().map(|s| s.to_string()).collect();
                write!(f, "<{}>", parts.join(", "))
            }
            Self::Record(fields) => {
                let parts: Vec<String> =
                    fields.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}
