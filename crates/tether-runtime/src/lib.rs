#![forbid(unsafe_code)]

//! Two-way binding runtime for tether.
//!
//! # Role in tether
//!
//! `tether-expr` turns declarations into validated expressions; this crate
//! turns those expressions into live [`Binding`]s between a model-side
//! source property and a view-side target property.
//!
//! # Primary responsibilities
//!
//! - **Observation**: [`Observable`] values with old/new change callbacks.
//! - **Properties**: the [`Property`] capability bindings read, write and
//!   observe through.
//! - **Synchronization**: the [`Binding`] state machine with echo
//!   suppression, conversion, validation and delegate reporting.
//! - **Providers**: [`BindingProviderRegistry`] dispatching validated
//!   expressions to [`BindingProvider`]s.
//! - **Conditional bindings**: [`ConditionalBinding`] switching between
//!   clause bindings by predicate.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`); change
//! notifications are delivered synchronously on the calling thread.

pub mod binding;
pub mod conditional;
pub mod configuration;
pub mod context;
pub mod delegate;
pub mod error;
pub mod observable;
pub mod property;
pub mod provider;

pub use binding::{Binding, BindingBehavior, BindingBuilder, IdentityBehavior, SyncState};
pub use conditional::{ConditionalBinding, ConditionalClause};
pub use configuration::{
    AppliedAttributes, BindingConfiguration, CONFIGURATION_SLOT_TYPE, ConfigurationValue, apply_attributes,
};
pub use context::BindingContext;
pub use delegate::{BindingDelegate, BindingId, Direction};
pub use error::{BindingError, ConstructionError, ConversionError, PropertyError, ValidationError};
pub use observable::{Observable, Subscription};
pub use property::{ChangeCallback, ConstantProperty, KeyPathProperty, ObservableProperty, Property};
pub use provider::{
    BehaviorFactory, BindingProvider, BindingProviderRegistry, BindingRequest, BindingTarget,
    PropertyBindingProvider,
};
