#![forbid(unsafe_code)]

//! Error types for expression parsing and schema validation.
//!
//! Parsing is split into two phases and each phase has its own error:
//!
//! | Phase | Error | Carries |
//! |-------|-------|---------|
//! | syntactic | [`ParseError`] | byte offset into the source text |
//! | semantic | [`SchemaValidationError`] | [`AttributePath`] of the offending node |
//!
//! [`ExpressionError`] unifies both for callers that run the phases back to back.

use std::fmt;

use crate::types::ExpressionType;

/// What went wrong while turning text (or a structured value) into an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },
    #[error("unknown scope or constant '${0}'")]
    UnknownVariable(String),
    #[error("duplicate attribute '{0}'")]
    DuplicateAttribute(String),
    #[error("invalid {constant} constant: {reason}")]
    InvalidConstant {
        constant: &'static str,
        reason: String,
    },
    #[error("expression nesting exceeds {0} levels")]
    TooDeep(usize),
    #[error("unsupported structured value: {0}")]
    UnsupportedValue(String),
}

/// Syntactic failure: the input cannot be read as any expression shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at offset {offset}: {kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Byte offset into the source text (0 for structured input).
    pub offset: usize,
}

impl ParseError {
    #[must_use]
    pub fn new(kind: ParseErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

/// One step in an [`AttributePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Attribute(String),
    Index(usize),
}

/// Location of a node inside a nested binding expression, e.g. `format.locale`
/// or `[2].color`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePath {
    segments: Vec<PathSegment>,
}

impl AttributePath {
    /// The path of the top-level expression.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Builder: append an attribute step.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Attribute(name.into()));
        self
    }

    /// Builder: append an array index step.
    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    /// This path as seen from the expression that holds it as attribute `name`.
    #[must_use]
    pub fn under_attribute(mut self, name: impl Into<String>) -> Self {
        self.segments.insert(0, PathSegment::Attribute(name.into()));
        self
    }

    pub(crate) fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    pub(crate) fn pop(&mut self) {
        self.segments.pop();
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Attribute(name) if i == 0 => f.write_str(name)?,
                PathSegment::Attribute(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Why an expression does not conform to its specification.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaErrorKind {
    #[error("attribute '{0}' is not declared by the specification")]
    UnknownAttribute(String),
    #[error("required attribute '{0}' is missing")]
    MissingRequiredAttribute(String),
    #[error("primary expression of type {found:?} is not one of {allowed:?}")]
    PrimaryTypeMismatch {
        found: ExpressionType,
        allowed: ExpressionType,
    },
    #[error("a primary expression is required")]
    MissingPrimary,
    #[error("unknown enumeration or option type '{0}'")]
    UnknownEnumerationType(String),
    #[error("'{value}' is not a member of '{type_name}'")]
    UnknownEnumerationValue { type_name: String, value: String },
}

/// Semantic failure: the expression parsed but does not match its specification.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("schema validation failed at {path}: {kind}")]
pub struct SchemaValidationError {
    pub path: AttributePath,
    pub kind: SchemaErrorKind,
}

impl SchemaValidationError {
    #[must_use]
    pub fn new(path: AttributePath, kind: SchemaErrorKind) -> Self {
        Self { path, kind }
    }

    /// Re-root the error at attribute `name` of an enclosing expression.
    #[must_use]
    pub fn under_attribute(self, name: impl Into<String>) -> Self {
        Self {
            path: self.path.under_attribute(name),
            kind: self.kind,
        }
    }

    /// The attribute name this error is about, if it names one.
    #[must_use]
    pub fn attribute_name(&self) -> Option<&str> {
        match &self.kind {
            SchemaErrorKind::UnknownAttribute(name)
            | SchemaErrorKind::MissingRequiredAttribute(name) => Some(name),
            _ => None,
        }
    }
}

/// Either phase of expression processing failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),
}
