#![forbid(unsafe_code)]

//! Dotted key paths and the scope they are resolved in.

use std::fmt;

use crate::types::ExpressionType;

/// Where a key path starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPathScope {
    /// A bare path; resolved against the data context.
    Unqualified,
    /// `$data.…`: the data context of the binding.
    DataContext,
    /// `$root.…`: the root data context of the control tree.
    RootDataContext,
    /// `$control.…`: the control owning the binding.
    Control,
}

impl KeyPathScope {
    /// Source prefix, without the trailing dot.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Unqualified => "",
            Self::DataContext => "$data",
            Self::RootDataContext => "$root",
            Self::Control => "$control",
        }
    }

    /// Scope for a `$name` variable, if `name` is one.
    #[must_use]
    pub fn from_variable(name: &str) -> Option<Self> {
        match name {
            "data" => Some(Self::DataContext),
            "root" => Some(Self::RootDataContext),
            "control" => Some(Self::Control),
            _ => None,
        }
    }

    #[must_use]
    pub const fn expression_type(self) -> ExpressionType {
        match self {
            Self::Unqualified => ExpressionType::UNQUALIFIED_KEY_PATH,
            Self::DataContext => ExpressionType::DATA_CONTEXT_KEY_PATH,
            Self::RootDataContext => ExpressionType::ROOT_DATA_CONTEXT_KEY_PATH,
            Self::Control => ExpressionType::CONTROL_KEY_PATH,
        }
    }
}

/// A sequence of property names, e.g. `person.address.city`.
///
/// An empty path designates the scope object itself. Segments starting with
/// `@` are collection operators (`@count`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// The empty path.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Split a dotted path. Empty segments are dropped.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    #[must_use]
    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Builder: append one segment.
    #[must_use]
    pub fn child(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Whether `segment` is a valid path segment (`[A-Za-z_@][A-Za-z0-9_]*`).
    #[must_use]
    pub fn is_valid_segment(segment: &str) -> bool {
        let mut chars = segment.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '@' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}
