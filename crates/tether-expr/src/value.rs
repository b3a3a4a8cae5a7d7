#![forbid(unsafe_code)]

//! Dynamic values flowing through bindings.
//!
//! [`Value`] is the common currency of the engine: constants in binding
//! expressions evaluate to values, data contexts are value trees, and
//! properties read and write values. Maps keep insertion order so that
//! serialized data contexts are stable.
//!
//! # Key path access
//!
//! [`Value::lookup`] walks nested maps. A missing key or a non-map
//! intermediate yields `None`. The `@count` segment evaluates to the length
//! of an array, map, or string.
//!
//! [`Value::assign`] creates intermediate maps in place of `Null` but refuses
//! to overwrite a scalar intermediate.

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;

use crate::key_path::KeyPath;

/// RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Color {
    #[must_use]
    pub const fn rgba(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Font reference. `name: None` means the platform's default face.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub name: Option<String>,
    pub size: f64,
}

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Color(Color),
    Point(Point),
    Size(Size),
    Rect(Rect),
    Font(Font),
    /// A type name, written `<Name>`.
    Class(String),
    /// A member of a registered enumeration type.
    Enum {
        type_name: Option<String>,
        value: String,
    },
    /// A set of flags of a registered option type.
    Options {
        type_name: String,
        flags: Vec<String>,
    },
    Array(Vec<Value>),
    Map(IndexMap<String, Value>),
}

/// Failure to write through a key path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignError {
    #[error("cannot assign through '{segment}': intermediate value is a {found}")]
    NotAMap { segment: String, found: &'static str },
    #[error("'{0}' is a read-only collection operator")]
    ReadOnlySegment(String),
}

impl Value {
    /// Name of the value's type, as used by type patterns.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Color(_) => "color",
            Self::Point(_) => "point",
            Self::Size(_) => "size",
            Self::Rect(_) => "rect",
            Self::Font(_) => "font",
            Self::Class(_) => "class",
            Self::Enum { .. } => "enum",
            Self::Options { .. } => "options",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of integers and doubles.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Truthiness used by predicates: null, false, zero, and empty
    /// strings/collections are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Double(d) => *d != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Array(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
            Self::Options { flags, .. } => !flags.is_empty(),
            _ => true,
        }
    }

    /// Ordering between comparable values. Numbers compare across integer
    /// and double; strings compare lexicographically.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            _ => {
                let (a, b) = (self.as_f64()?, other.as_f64()?);
                a.partial_cmp(&b)
            }
        }
    }

    /// Equality used by predicates; numbers compare by value.
    #[must_use]
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Resolve `path` below this value.
    #[must_use]
    pub fn lookup(&self, path: &KeyPath) -> Option<Value> {
        let mut current = self;
        let segments = path.segments();
        for (i, segment) in segments.iter().enumerate() {
            if segment == "@count" {
                // Collection operators terminate the walk.
                if i + 1 != segments.len() {
                    return None;
                }
                let count = match current {
                    Self::Array(items) => items.len(),
                    Self::Map(map) => map.len(),
                    Self::String(s) => s.chars().count(),
                    _ => return None,
                };
                return Some(Self::Integer(count as i64));
            }
            current = current.as_map()?.get(segment)?;
        }
        Some(current.clone())
    }

    /// Write `value` at `path`, creating intermediate maps where the tree
    /// holds `Null`. An empty path replaces `self`.
    pub fn assign(&mut self, path: &KeyPath, value: Value) -> Result<(), AssignError> {
        let Some((last, parents)) = path.segments().split_last() else {
            *self = value;
            return Ok(());
        };
        let mut current = self;
        for segment in parents.iter().chain(std::iter::once(last)) {
            if segment.starts_with('@') {
                return Err(AssignError::ReadOnlySegment(segment.clone()));
            }
            if current.is_null() {
                *current = Self::Map(IndexMap::new());
            }
            let found = current.type_name();
            let Self::Map(map) = current else {
                return Err(AssignError::NotAMap {
                    segment: segment.clone(),
                    found,
                });
            };
            current = map.entry(segment.clone()).or_insert(Self::Null);
        }
        *current = value;
        Ok(())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Color> for Value {
    fn from(value: Color) -> Self {
        Self::Color(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::String(s) => f.write_str(s),
            Self::Color(c) => write!(
                f,
                "rgba({}, {}, {}, {})",
                c.red, c.green, c.blue, c.alpha
            ),
            Self::Point(p) => write!(f, "({}, {})", p.x, p.y),
            Self::Size(s) => write!(f, "{}x{}", s.width, s.height),
            Self::Rect(r) => write!(f, "({}, {}, {}x{})", r.x, r.y, r.width, r.height),
            Self::Font(font) => match &font.name {
                Some(name) => write!(f, "{name} {}pt", font.size),
                None => write!(f, "system {}pt", font.size),
            },
            Self::Class(name) => write!(f, "<{name}>"),
            Self::Enum { type_name, value } => match type_name {
                Some(type_name) => write!(f, "{type_name}.{value}"),
                None => f.write_str(value),
            },
            Self::Options { type_name, flags } => {
                write!(f, "{type_name}{{{}}}", flags.join(", "))
            }
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}
