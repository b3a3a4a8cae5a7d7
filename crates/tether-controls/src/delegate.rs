#![forbid(unsafe_code)]

//! Delegate propagation from control bindings to the composite.
//!
//! Every binding attached to a control gets a [`ControlBindingDelegate`]
//! adapter. The adapter forwards each callback to the delegate the binding
//! had before it was attached, then to the single [`ControlDelegate`]
//! registered on the composite, tagged with the originating control.
//!
//! For the `should_*` queries both delegates must agree.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tether_expr::Value;
use tether_runtime::{
    BindingDelegate, BindingError, BindingId, ConversionError, Direction, PropertyError,
    ValidationError,
};

use crate::control::ControlId;

/// Composite-level callbacks, tagged with the control whose binding raised them.
///
/// Every method defaults to doing nothing or allowing.
#[allow(unused_variables)]
pub trait ControlDelegate {
    fn conversion_failed(&self, control: ControlId, binding: BindingId, direction: Direction, error: &ConversionError) {}

    fn validation_failed(&self, control: ControlId, binding: BindingId, direction: Direction, error: &ValidationError) {}

    fn update_failed(&self, control: ControlId, binding: BindingId, direction: Direction, error: &PropertyError) {}

    fn should_update(
        &self,
        control: ControlId,
        binding: BindingId,
        direction: Direction,
        old: &Value,
        new: &Value,
    ) -> bool {
        true
    }

    fn will_update(&self, control: ControlId, binding: BindingId, direction: Direction, old: &Value, new: &Value) {}

    fn did_update(&self, control: ControlId, binding: BindingId, direction: Direction, old: &Value, new: &Value) {}

    fn responder_will_activate(&self, control: ControlId, binding: BindingId) {}

    fn responder_did_activate(&self, control: ControlId, binding: BindingId) {}

    fn responder_will_deactivate(&self, control: ControlId, binding: BindingId) {}

    fn responder_did_deactivate(&self, control: ControlId, binding: BindingId) {}

    fn should_activate_next_responder(&self, control: ControlId, binding: BindingId) -> bool {
        true
    }

    fn construction_failed(&self, control: ControlId, binding: BindingId, error: &BindingError) {}
}

pub(crate) type DelegateSlot = RefCell<Option<Weak<dyn ControlDelegate>>>;

pub(crate) struct ControlBindingDelegate {
    control: ControlId,
    composite: Rc<DelegateSlot>,
    inner: Option<Weak<dyn BindingDelegate>>,
}

impl ControlBindingDelegate {
    pub(crate) fn new(
        control: ControlId,
        composite: Rc<DelegateSlot>,
        inner: Option<Weak<dyn BindingDelegate>>,
    ) -> Self {
        Self {
            control,
            composite,
            inner,
        }
    }

    /// The delegate the binding had before it joined the composite.
    pub(crate) fn inner(&self) -> Option<Weak<dyn BindingDelegate>> {
        self.inner.clone()
    }

    /// Weak handle to install on the binding.
    pub(crate) fn handle(self: &Rc<Self>) -> Weak<dyn BindingDelegate> {
        let weak: Weak<Self> = Rc::downgrade(self);
        weak
    }

    fn forward(&self, inner: impl FnOnce(&dyn BindingDelegate), outer: impl FnOnce(&dyn ControlDelegate, ControlId)) {
        if let Some(delegate) = self.inner.as_ref().and_then(Weak::upgrade) {
            inner(delegate.as_ref());
        }
        let composite = self.composite.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(delegate) = composite {
            outer(delegate.as_ref(), self.control);
        }
    }

    fn agree(&self, inner: impl FnOnce(&dyn BindingDelegate) -> bool, outer: impl FnOnce(&dyn ControlDelegate, ControlId) -> bool) -> bool {
        let inner_ok = self
            .inner
            .as_ref()
            .and_then(Weak::upgrade)
            .is_none_or(|d| inner(d.as_ref()));
        let composite = self.composite.borrow().as_ref().and_then(Weak::upgrade);
        inner_ok && composite.is_none_or(|d| outer(d.as_ref(), self.control))
    }
}

impl BindingDelegate for ControlBindingDelegate {
    fn source_conversion_failed(&self, binding: BindingId, error: &ConversionError) {
        self.forward(
            |d| d.source_conversion_failed(binding, error),
            |d, c| d.conversion_failed(c, binding, Direction::SourceToTarget, error),
        );
    }

    fn target_conversion_failed(&self, binding: BindingId, error: &ConversionError) {
        self.forward(
            |d| d.target_conversion_failed(binding, error),
            |d, c| d.conversion_failed(c, binding, Direction::TargetToSource, error),
        );
    }

    fn target_validation_failed(&self, binding: BindingId, error: &ValidationError) {
        self.forward(
            |d| d.target_validation_failed(binding, error),
            |d, c| d.validation_failed(c, binding, Direction::SourceToTarget, error),
        );
    }

    fn source_validation_failed(&self, binding: BindingId, error: &ValidationError) {
        self.forward(
            |d| d.source_validation_failed(binding, error),
            |d, c| d.validation_failed(c, binding, Direction::TargetToSource, error),
        );
    }

    fn update_failed(&self, binding: BindingId, direction: Direction, error: &PropertyError) {
        self.forward(
            |d| d.update_failed(binding, direction, error),
            |d, c| d.update_failed(c, binding, direction, error),
        );
    }

    fn should_update_target(&self, binding: BindingId, old: &Value, new: &Value) -> bool {
        self.agree(
            |d| d.should_update_target(binding, old, new),
            |d, c| d.should_update(c, binding, Direction::SourceToTarget, old, new),
        )
    }

    fn will_update_target(&self, binding: BindingId, old: &Value, new: &Value) {
        self.forward(
            |d| d.will_update_target(binding, old, new),
            |d, c| d.will_update(c, binding, Direction::SourceToTarget, old, new),
        );
    }

    fn did_update_target(&self, binding: BindingId, old: &Value, new: &Value) {
        self.forward(
            |d| d.did_update_target(binding, old, new),
            |d, c| d.did_update(c, binding, Direction::SourceToTarget, old, new),
        );
    }

    fn should_update_source(&self, binding: BindingId, old: &Value, new: &Value) -> bool {
        self.agree(
            |d| d.should_update_source(binding, old, new),
            |d, c| d.should_update(c, binding, Direction::TargetToSource, old, new),
        )
    }

    fn will_update_source(&self, binding: BindingId, old: &Value, new: &Value) {
        self.forward(
            |d| d.will_update_source(binding, old, new),
            |d, c| d.will_update(c, binding, Direction::TargetToSource, old, new),
        );
    }

    fn did_update_source(&self, binding: BindingId, old: &Value, new: &Value) {
        self.forward(
            |d| d.did_update_source(binding, old, new),
            |d, c| d.did_update(c, binding, Direction::TargetToSource, old, new),
        );
    }

    fn responder_will_activate(&self, binding: BindingId) {
        self.forward(
            |d| d.responder_will_activate(binding),
            |d, c| d.responder_will_activate(c, binding),
        );
    }

    fn responder_did_activate(&self, binding: BindingId) {
        self.forward(
            |d| d.responder_did_activate(binding),
            |d, c| d.responder_did_activate(c, binding),
        );
    }

    fn responder_will_deactivate(&self, binding: BindingId) {
        self.forward(
            |d| d.responder_will_deactivate(binding),
            |d, c| d.responder_will_deactivate(c, binding),
        );
    }

    fn responder_did_deactivate(&self, binding: BindingId) {
        self.forward(
            |d| d.responder_did_deactivate(binding),
            |d, c| d.responder_did_deactivate(c, binding),
        );
    }

    fn should_activate_next_responder(&self, binding: BindingId) -> bool {
        self.agree(
            |d| d.should_activate_next_responder(binding),
            |d, c| d.should_activate_next_responder(c, binding),
        )
    }

    fn construction_failed(&self, binding: BindingId, error: &BindingError) {
        self.forward(
            |d| d.construction_failed(binding, error),
            |d, c| d.construction_failed(c, binding, error),
        );
    }
}
