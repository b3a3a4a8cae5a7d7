#![forbid(unsafe_code)]

//! The two-way binding state machine.
//!
//! A [`Binding`] connects a source [`Property`] (model side) to a target
//! [`Property`] (view side). Each observed change runs through a fixed
//! pipeline before it reaches the other side:
//!
//! ```text
//! source change ──▶ convert_source_to_target ──▶ validate_target_value ──▶ should_update_target ──▶ target.set
//! target change ──▶ convert_target_to_source ──▶ validate_source_value ──▶ should_update_source ──▶ source.set
//! ```
//!
//! # States
//!
//! | State | `updating_target` | `updating_source` |
//! |-------|-------------------|-------------------|
//! | [`SyncState::Idle`] | false | false |
//! | [`SyncState::UpdatingTarget`] | true | false |
//! | [`SyncState::UpdatingSource`] | false | true |
//!
//! # Invariants
//!
//! 1. A source change observed while updating the source is an echo of the
//!    binding's own write and is ignored (and symmetrically for the target).
//! 2. The two update flags are never both set.
//! 3. The base should-update policy refuses an update while the opposite
//!    direction is in flight; behavior and delegate hooks can only narrow it.
//! 4. `start_observing_changes` / `stop_observing_changes` are idempotent.
//!    After `stop_observing_changes` returns no change callback runs.
//!
//! # Failure Modes
//!
//! | Failure | Effect | Reported via |
//! |---------|--------|--------------|
//! | conversion error | this update aborted | `warn!` + delegate `*_conversion_failed` |
//! | validation error | this update aborted | `warn!` + delegate `*_validation_failed` |
//! | property write error | this update aborted | `warn!` + delegate `update_failed` |
//!
//! The opposite direction keeps working after any of these.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tether_expr::{BindingExpression, Value};
use tracing::{debug, debug_span, trace, warn};

use crate::configuration::BindingConfiguration;
use crate::delegate::{BindingDelegate, BindingId, Direction};
use crate::error::{ConversionError, ValidationError};
use crate::observable::Subscription;
use crate::property::Property;

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Per-binding-type conversion and validation hooks.
///
/// Every hook is a function of its arguments only and must not write to
/// either property. The defaults pass values through unchanged.
#[allow(unused_variables)]
pub trait BindingBehavior {
    /// Convert a new source value into the target's representation.
    fn convert_source_to_target(&self, old: &Value, new: &Value) -> Result<Value, ConversionError> {
        Ok(new.clone())
    }

    /// Convert a new target value into the source's representation.
    fn convert_target_to_source(&self, old: &Value, new: &Value) -> Result<Value, ConversionError> {
        Ok(new.clone())
    }

    /// Accept, correct or reject a value about to be written to the target.
    fn validate_target_value(&self, current: &Value, candidate: Value) -> Result<Value, ValidationError> {
        Ok(candidate)
    }

    /// Accept, correct or reject a value about to be written to the source.
    fn validate_source_value(&self, current: &Value, candidate: Value) -> Result<Value, ValidationError> {
        Ok(candidate)
    }

    fn should_update_target(&self, current: &Value, new: &Value) -> bool {
        true
    }

    fn should_update_source(&self, current: &Value, new: &Value) -> bool {
        true
    }
}

/// Pass-through behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityBehavior;

impl BindingBehavior for IdentityBehavior {}

// ---------------------------------------------------------------------------
// Sync state
// ---------------------------------------------------------------------------

/// Which direction, if any, a binding is currently propagating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Idle,
    UpdatingTarget,
    UpdatingSource,
}

/// Raises a flag for the guard's lifetime and restores the previous value.
struct FlagGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> FlagGuard<'a> {
    fn raise(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        Self { flag, previous }
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

struct BindingInner {
    id: BindingId,
    binding_type: String,
    source: Rc<dyn Property>,
    target: Rc<dyn Property>,
    behavior: Box<dyn BindingBehavior>,
    delegate: RefCell<Option<Weak<dyn BindingDelegate>>>,
    updating_source: Cell<bool>,
    updating_target: Cell<bool>,
    observing: Cell<bool>,
    subscriptions: RefCell<Vec<Subscription>>,
    configuration: BindingConfiguration,
    attribute_bindings: Vec<Binding>,
    expression: Option<BindingExpression>,
}

/// A live two-way connection between a source and a target property.
///
/// Cloning yields another handle to the same binding. Dropping the last
/// handle detaches all observers.
#[derive(Clone)]
pub struct Binding {
    inner: Rc<BindingInner>,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.inner.id)
            .field("type", &self.inner.binding_type)
            .field("source", &self.inner.source.describe())
            .field("target", &self.inner.target.describe())
            .field("state", &self.sync_state())
            .field("observing", &self.inner.observing.get())
            .finish_non_exhaustive()
    }
}

impl Binding {
    /// Start building a binding between `source` and `target`.
    #[must_use]
    pub fn builder(source: Rc<dyn Property>, target: Rc<dyn Property>) -> BindingBuilder {
        BindingBuilder {
            binding_type: String::from("property"),
            source,
            target,
            behavior: Box::new(IdentityBehavior),
            delegate: None,
            configuration: BindingConfiguration::default(),
            attribute_bindings: Vec::new(),
            expression: None,
        }
    }

    /// Pass-through binding with no delegate.
    #[must_use]
    pub fn new(source: Rc<dyn Property>, target: Rc<dyn Property>) -> Self {
        Self::builder(source, target).build()
    }

    #[must_use]
    pub fn id(&self) -> BindingId {
        self.inner.id
    }

    #[must_use]
    pub fn binding_type(&self) -> &str {
        &self.inner.binding_type
    }

    #[must_use]
    pub fn source(&self) -> &Rc<dyn Property> {
        &self.inner.source
    }

    #[must_use]
    pub fn target(&self) -> &Rc<dyn Property> {
        &self.inner.target
    }

    /// The validated expression this binding was built from, if any.
    #[must_use]
    pub fn expression(&self) -> Option<&BindingExpression> {
        self.inner.expression.as_ref()
    }

    #[must_use]
    pub fn configuration(&self) -> &BindingConfiguration {
        &self.inner.configuration
    }

    /// Nested bindings created for `BindToProperty` attributes.
    #[must_use]
    pub fn attribute_bindings(&self) -> &[Binding] {
        &self.inner.attribute_bindings
    }

    /// Replace the delegate. The binding keeps only a weak reference.
    pub fn set_delegate(&self, delegate: Option<Weak<dyn BindingDelegate>>) {
        *self.inner.delegate.borrow_mut() = delegate;
    }

    /// The current delegate reference, live or not.
    #[must_use]
    pub fn delegate(&self) -> Option<Weak<dyn BindingDelegate>> {
        self.inner.delegate.borrow().clone()
    }

    #[must_use]
    pub fn has_delegate(&self) -> bool {
        self.inner.delegate().is_some()
    }

    #[must_use]
    pub fn sync_state(&self) -> SyncState {
        match (self.inner.updating_target.get(), self.inner.updating_source.get()) {
            (true, _) => SyncState::UpdatingTarget,
            (false, true) => SyncState::UpdatingSource,
            (false, false) => SyncState::Idle,
        }
    }

    #[must_use]
    pub fn is_updating_source(&self) -> bool {
        self.inner.updating_source.get()
    }

    #[must_use]
    pub fn is_updating_target(&self) -> bool {
        self.inner.updating_target.get()
    }

    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.inner.observing.get()
    }

    /// Number of live change subscriptions held by this binding itself.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner
            .subscriptions
            .borrow()
            .iter()
            .filter(|sub| sub.is_active())
            .count()
    }

    // -- Observation ----------------------------------------------------------

    /// Subscribe to both properties and push the source value to the target.
    ///
    /// Attribute bindings start first so their configuration slots are
    /// current before the initial conversion runs. Calling this while
    /// already observing does nothing.
    pub fn start_observing_changes(&self) {
        if self.inner.observing.replace(true) {
            return;
        }
        for nested in &self.inner.attribute_bindings {
            nested.start_observing_changes();
        }

        let mut subscriptions = Vec::with_capacity(2);
        let weak = Rc::downgrade(&self.inner);
        if let Some(sub) = self.inner.source.observe(Box::new(move |old, new| {
            if let Some(inner) = weak.upgrade() {
                inner.on_source_changed(old, new);
            }
        })) {
            subscriptions.push(sub);
        }
        let weak = Rc::downgrade(&self.inner);
        if let Some(sub) = self.inner.target.observe(Box::new(move |old, new| {
            if let Some(inner) = weak.upgrade() {
                inner.on_target_changed(old, new);
            }
        })) {
            subscriptions.push(sub);
        }
        *self.inner.subscriptions.borrow_mut() = subscriptions;

        debug!(
            binding = %self.inner.id,
            binding_type = %self.inner.binding_type,
            source = %self.inner.source.describe(),
            target = %self.inner.target.describe(),
            "started observing changes"
        );
        self.update_target_from_source();
    }

    /// Drop every subscription. Safe to call repeatedly or mid-update.
    pub fn stop_observing_changes(&self) {
        if !self.inner.observing.replace(false) {
            return;
        }
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.borrow_mut());
        drop(subscriptions);
        for nested in &self.inner.attribute_bindings {
            nested.stop_observing_changes();
        }
        debug!(binding = %self.inner.id, "stopped observing changes");
    }

    // -- Manual sync ------------------------------------------------------------

    /// Run the source-to-target pipeline with the current source value.
    ///
    /// Returns whether the target was written.
    pub fn update_target_from_source(&self) -> bool {
        let value = self.inner.source.get();
        self.inner.update_target(&value, &value)
    }

    /// Run the target-to-source pipeline with the current target value.
    ///
    /// Returns whether the source was written.
    pub fn update_source_from_target(&self) -> bool {
        let value = self.inner.target.get();
        self.inner.update_source(&value, &value)
    }

    // -- Responder ----------------------------------------------------------

    pub fn will_activate(&self) {
        self.inner.notify(|d, id| d.responder_will_activate(id));
    }

    pub fn did_activate(&self) {
        self.inner.notify(|d, id| d.responder_did_activate(id));
    }

    pub fn will_deactivate(&self) {
        self.inner.notify(|d, id| d.responder_will_deactivate(id));
    }

    pub fn did_deactivate(&self) {
        self.inner.notify(|d, id| d.responder_did_deactivate(id));
    }

    /// Whether focus may move on to the next responder. `true` without a delegate.
    #[must_use]
    pub fn should_activate_next_responder(&self) -> bool {
        self.inner
            .delegate()
            .is_none_or(|d| d.should_activate_next_responder(self.inner.id))
    }

    /// Whether both handles refer to the same binding.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl BindingInner {
    fn delegate(&self) -> Option<Rc<dyn BindingDelegate>> {
        self.delegate.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn notify(&self, f: impl FnOnce(&dyn BindingDelegate, BindingId)) {
        if let Some(delegate) = self.delegate() {
            f(delegate.as_ref(), self.id);
        }
    }

    fn on_source_changed(&self, old: &Value, new: &Value) {
        if self.updating_source.get() {
            trace!(binding = %self.id, "ignoring source echo");
            return;
        }
        self.update_target(old, new);
    }

    fn on_target_changed(&self, old: &Value, new: &Value) {
        if self.updating_target.get() {
            trace!(binding = %self.id, "ignoring target echo");
            return;
        }
        self.update_source(old, new);
    }

    fn should_update_target(&self, current: &Value, new: &Value) -> bool {
        !self.updating_source.get()
            && self.behavior.should_update_target(current, new)
            && self
                .delegate()
                .is_none_or(|d| d.should_update_target(self.id, current, new))
    }

    fn should_update_source(&self, current: &Value, new: &Value) -> bool {
        !self.updating_target.get()
            && self.behavior.should_update_source(current, new)
            && self
                .delegate()
                .is_none_or(|d| d.should_update_source(self.id, current, new))
    }

    fn update_target(&self, old: &Value, new: &Value) -> bool {
        if self.updating_source.get() {
            return false;
        }
        let _flag = FlagGuard::raise(&self.updating_target);
        let span = debug_span!(
            "binding_sync",
            binding = self.id.get(),
            direction = Direction::SourceToTarget.as_str()
        );
        let _enter = span.enter();

        let converted = match self.behavior.convert_source_to_target(old, new) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "source value conversion failed");
                self.notify(|d, id| d.source_conversion_failed(id, &err));
                return false;
            }
        };
        let current = self.target.get();
        let value = match self.behavior.validate_target_value(&current, converted) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "target value validation failed");
                self.notify(|d, id| d.target_validation_failed(id, &err));
                return false;
            }
        };
        if !self.should_update_target(&current, &value) {
            debug!(value = %value, "target update declined");
            return false;
        }

        self.notify(|d, id| d.will_update_target(id, &current, &value));
        if let Err(err) = self.target.set(value.clone()) {
            warn!(error = %err, target = %self.target.describe(), "target update failed");
            self.notify(|d, id| d.update_failed(id, Direction::SourceToTarget, &err));
            return false;
        }
        self.notify(|d, id| d.did_update_target(id, &current, &value));
        trace!(value = %value, "target updated");
        true
    }

    fn update_source(&self, old: &Value, new: &Value) -> bool {
        if self.updating_target.get() {
            return false;
        }
        let _flag = FlagGuard::raise(&self.updating_source);
        let span = debug_span!(
            "binding_sync",
            binding = self.id.get(),
            direction = Direction::TargetToSource.as_str()
        );
        let _enter = span.enter();

        let converted = match self.behavior.convert_target_to_source(old, new) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "target value conversion failed");
                self.notify(|d, id| d.target_conversion_failed(id, &err));
                return false;
            }
        };
        let current = self.source.get();
        let value = match self.behavior.validate_source_value(&current, converted) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "source value validation failed");
                self.notify(|d, id| d.source_validation_failed(id, &err));
                return false;
            }
        };
        if !self.should_update_source(&current, &value) {
            debug!(value = %value, "source update declined");
            return false;
        }

        self.notify(|d, id| d.will_update_source(id, &current, &value));
        if let Err(err) = self.source.set(value.clone()) {
            warn!(error = %err, source = %self.source.describe(), "source update failed");
            self.notify(|d, id| d.update_failed(id, Direction::TargetToSource, &err));
            return false;
        }
        self.notify(|d, id| d.did_update_source(id, &current, &value));
        trace!(value = %value, "source updated");
        true
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`Binding`]. Nothing is observed until
/// [`Binding::start_observing_changes`].
#[must_use]
pub struct BindingBuilder {
    binding_type: String,
    source: Rc<dyn Property>,
    target: Rc<dyn Property>,
    behavior: Box<dyn BindingBehavior>,
    delegate: Option<Weak<dyn BindingDelegate>>,
    configuration: BindingConfiguration,
    attribute_bindings: Vec<Binding>,
    expression: Option<BindingExpression>,
}

impl BindingBuilder {
    pub fn binding_type(mut self, binding_type: impl Into<String>) -> Self {
        self.binding_type = binding_type.into();
        self
    }

    pub fn behavior(mut self, behavior: impl BindingBehavior + 'static) -> Self {
        self.behavior = Box::new(behavior);
        self
    }

    pub fn boxed_behavior(mut self, behavior: Box<dyn BindingBehavior>) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn delegate(mut self, delegate: Option<Weak<dyn BindingDelegate>>) -> Self {
        self.delegate = delegate;
        self
    }

    pub fn configuration(mut self, configuration: BindingConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn attribute_bindings(mut self, bindings: Vec<Binding>) -> Self {
        self.attribute_bindings = bindings;
        self
    }

    pub fn expression(mut self, expression: BindingExpression) -> Self {
        self.expression = Some(expression);
        self
    }

    #[must_use]
    pub fn build(self) -> Binding {
        Binding {
            inner: Rc::new(BindingInner {
                id: BindingId::next(),
                binding_type: self.binding_type,
                source: self.source,
                target: self.target,
                behavior: self.behavior,
                delegate: RefCell::new(self.delegate),
                updating_source: Cell::new(false),
                updating_target: Cell::new(false),
                observing: Cell::new(false),
                subscriptions: RefCell::new(Vec::new()),
                configuration: self.configuration,
                attribute_bindings: self.attribute_bindings,
                expression: self.expression,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
