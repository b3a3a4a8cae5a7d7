#![forbid(unsafe_code)]

//! Binding expression language for tether.
//!
//! This crate provides:
//! - [`BindingExpression`]: parsed declarations (`$data.amount { format: <Currency> }`)
//!   with a canonical text form
//! - [`BindingExpressionSpecification`] and friends: the schema a binding type
//!   declares, loadable from JSON tables
//! - [`Validator`]: the semantic phase checking an expression against its schema
//! - [`Value`]: dynamic values for constants and data contexts
//! - [`Predicate`]: clause conditions for conditional bindings
//!
//! # Phases
//!
//! ```text
//! text / JSON ──parse──▶ BindingExpression ──validate(spec)──▶ normalized BindingExpression
//!               ParseError                   SchemaValidationError
//! ```

pub mod error;
pub mod expression;
pub mod key_path;
pub mod lexer;
pub mod parser;
pub mod predicate;
pub mod registry;
pub mod spec;
pub mod structured;
pub mod types;
pub mod validate;
pub mod value;

pub use error::{
    AttributePath, ExpressionError, ParseError, ParseErrorKind, PathSegment, SchemaErrorKind,
    SchemaValidationError,
};
pub use expression::{BindingExpression, PrimaryExpression};
pub use key_path::{KeyPath, KeyPathScope};
pub use predicate::{CompareOp, KeyPathResolver, Operand, Predicate};
pub use registry::TypeRegistry;
pub use spec::{
    AttributeUse, BindingAttributeSpecification, BindingExpressionSpecification,
    BindingSpecification, BindingTargetSpecification, TargetKind, TypePattern,
};
pub use types::ExpressionType;
pub use validate::{ValidationOptions, Validator};
pub use value::{AssignError, Color, Font, Point, Rect, Size, Value};
