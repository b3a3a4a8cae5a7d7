#![forbid(unsafe_code)]

//! Declarative two-way data binding for form-style user interfaces.
//!
//! This crate re-exports the workspace crates behind one dependency and adds
//! engine configuration and logging setup.
//!
//! | Crate | Role |
//! |-------|------|
//! | [`expr`] | expression grammar, values, specifications, validation |
//! | [`runtime`] | observables, bindings, providers, conditional bindings |
//! | [`controls`] | composite control trees and activation order |
//!
//! # Example
//!
//! ```
//! use tether::prelude::*;
//!
//! let config = EngineConfig::default();
//! let mut registry = config.registry();
//! registry.register(PropertyBindingProvider::new(
//!     BindingSpecification::new(
//!         "text",
//!         BindingExpressionSpecification::new(ExpressionType::DATA_CONTEXT_KEY_PATH).requiring_primary(),
//!     ),
//! ));
//!
//! let model = Observable::new(Value::from(serde_json::json!({ "user": { "name": "Ann" } })));
//! let view = Observable::new(Value::Null);
//! let target = BindingTarget::new(ObservableProperty::shared(view.clone(), "name"), TargetKind::new("TextField"));
//! let _binding = registry
//!     .bind("text", "user.name", target, &BindingContext::new(model), None)
//!     .unwrap();
//! assert_eq!(view.get(), Value::from("Ann"));
//! ```

pub mod config;
pub mod logging;

pub use tether_controls as controls;
pub use tether_expr as expr;
pub use tether_runtime as runtime;

pub use config::{ActivationConfig, ConfigError, EngineConfig, LoggingConfig, ValidationConfig};
pub use logging::LoggingError;

pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use tether_controls::{
        ActivationPolicy, CompositeControl, Control, ControlDelegate, ControlError, ControlId, OutletCollection,
        StaticTableView, ViewNode,
    };
    pub use tether_expr::{
        AttributeUse, BindingAttributeSpecification, BindingExpression, BindingExpressionSpecification,
        BindingSpecification, ExpressionType, KeyPath, Predicate, TargetKind, TypePattern, Value,
    };
    pub use tether_runtime::{
        Binding, BindingBehavior, BindingContext, BindingDelegate, BindingError, BindingId,
        BindingProvider, BindingProviderRegistry, BindingTarget, ConditionalBinding, ConditionalClause,
        ConversionError, Direction, Observable, ObservableProperty, PropertyBindingProvider,
        ValidationError,
    };
}
