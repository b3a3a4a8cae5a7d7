#![forbid(unsafe_code)]

//! Runtime error types.
//!
//! | Error | Raised by | Surfaced through |
//! |-------|-----------|------------------|
//! | [`ConversionError`] | `BindingBehavior::convert_*` during sync | delegate + `warn!` |
//! | [`ValidationError`] | `BindingBehavior::validate_*` during sync | delegate + `warn!` |
//! | [`PropertyError`] | writing a property during sync | delegate + `warn!` |
//! | [`ConstructionError`] | providers | `Result` |
//! | [`BindingError`] | registry / conditional bindings | `Result` (+ delegate for conditionals) |
//!
//! Errors raised during live synchronization abort only the failing
//! direction's update; the previous value stays in place.

use tether_expr::{AssignError, ExpressionError, ParseError, SchemaValidationError, Value};

/// A value could not be converted between source and target representation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot convert {value} to {target_type}: {reason}")]
pub struct ConversionError {
    pub value: Value,
    pub target_type: String,
    pub reason: String,
}

impl ConversionError {
    #[must_use]
    pub fn new(value: Value, target_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            value,
            target_type: target_type.into(),
            reason: reason.into(),
        }
    }
}

/// A converted value was rejected by domain validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("rejected value {value}: {reason}")]
pub struct ValidationError {
    pub value: Value,
    pub reason: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(value: Value, reason: impl Into<String>) -> Self {
        Self {
            value,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropertyError {
    #[error("property '{0}' is read-only")]
    ReadOnly(String),
    #[error(transparent)]
    Assign(#[from] AssignError),
}

/// A provider could not instantiate a binding for a valid expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstructionError {
    #[error("no provider registered for binding type '{0}'")]
    UnknownBindingType(String),
    #[error("binding type '{binding_type}' cannot target '{target_type}'")]
    TargetMismatch {
        binding_type: String,
        target_type: String,
    },
    #[error("binding requires a primary expression")]
    MissingPrimary,
    /// A nested expression does not match the specification of the provider it names.
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),
    #[error("attribute '{name}': {source}")]
    Attribute {
        name: String,
        #[source]
        source: Box<ConstructionError>,
    },
    #[error("{0}")]
    Provider(String),
}

impl ConstructionError {
    /// The schema error behind this failure, looking through attribute wrappers.
    #[must_use]
    pub fn as_schema_error(&self) -> Option<&SchemaValidationError> {
        match self {
            Self::Schema(err) => Some(err),
            Self::Attribute { source, .. } => source.as_schema_error(),
            _ => None,
        }
    }
}

/// Failure to set up a binding from a declaration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindingError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

impl From<ParseError> for BindingError {
    fn from(err: ParseError) -> Self {
        Self::Expression(err.into())
    }
}

impl From<SchemaValidationError> for BindingError {
    fn from(err: SchemaValidationError) -> Self {
        Self::Expression(err.into())
    }
}

impl BindingError {
    /// The schema error, if this is one.
    #[must_use]
    pub fn as_schema_error(&self) -> Option<&SchemaValidationError> {
        match self {
            Self::Expression(ExpressionError::Schema(err)) => Some(err),
            Self::Construction(err) => err.as_schema_error(),
            Self::Expression(_) => None,
        }
    }
}
