#![forbid(unsafe_code)]

//! Optional callbacks a binding reports to.
//!
//! Every method has a neutral default (do nothing, or allow), so a delegate
//! implements only what it cares about. Bindings hold their delegate as a
//! `Weak` reference; a dropped delegate is equivalent to none.

use std::sync::atomic::{AtomicU64, Ordering};

use tether_expr::Value;

use crate::error::{BindingError, ConversionError, PropertyError, ValidationError};

static NEXT_BINDING_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a binding instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    pub(crate) fn next() -> Self {
        Self(NEXT_BINDING_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "binding#{}", self.0)
    }
}

/// Synchronization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    SourceToTarget,
    TargetToSource,
}

impl Direction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceToTarget => "source_to_target",
            Self::TargetToSource => "target_to_source",
        }
    }
}

#[allow(unused_variables)]
pub trait BindingDelegate {
    // -- Update failures ----------------------------------------------------

    /// Converting a source value for the target failed.
    fn source_conversion_failed(&self, binding: BindingId, error: &ConversionError) {}

    /// Converting a target value for the source failed.
    fn target_conversion_failed(&self, binding: BindingId, error: &ConversionError) {}

    /// A converted value was rejected before it reached the target.
    fn target_validation_failed(&self, binding: BindingId, error: &ValidationError) {}

    /// A converted value was rejected before it reached the source.
    fn source_validation_failed(&self, binding: BindingId, error: &ValidationError) {}

    /// Writing the converted value failed.
    fn update_failed(&self, binding: BindingId, direction: Direction, error: &PropertyError) {}

    // -- Updates ------------------------------------------------------------

    fn should_update_target(&self, binding: BindingId, old: &Value, new: &Value) -> bool {
        true
    }

    fn will_update_target(&self, binding: BindingId, old: &Value, new: &Value) {}

    fn did_update_target(&self, binding: BindingId, old: &Value, new: &Value) {}

    fn should_update_source(&self, binding: BindingId, old: &Value, new: &Value) -> bool {
        true
    }

    fn will_update_source(&self, binding: BindingId, old: &Value, new: &Value) {}

    fn did_update_source(&self, binding: BindingId, old: &Value, new: &Value) {}

    // -- Responder ----------------------------------------------------------

    fn responder_will_activate(&self, binding: BindingId) {}

    fn responder_did_activate(&self, binding: BindingId) {}

    fn responder_will_deactivate(&self, binding: BindingId) {}

    fn responder_did_deactivate(&self, binding: BindingId) {}

    /// Whether the binding may pass focus to the next responder.
    fn should_activate_next_responder(&self, binding: BindingId) -> bool {
        true
    }

    // -- Construction -------------------------------------------------------

    /// A binding (e.g. a conditional clause) could not be built.
    fn construction_failed(&self, binding: BindingId, error: &BindingError) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;
    impl BindingDelegate for Silent {}

    #[test]
    fn defaults_are_neutral() {
        let delegate = Silent;
        let id = BindingId::next();
        assert!(delegate.should_update_target(id, &Value::Null, &Value::Null));
        assert!(delegate.should_update_source(id, &Value::Null, &Value::Null));
        assert!(delegate.should_activate_next_responder(id));
    }

    #[test]
    fn ids_are_unique() {
        let a = BindingId::next();
        let b = BindingId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
