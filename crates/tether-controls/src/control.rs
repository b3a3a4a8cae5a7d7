#![forbid(unsafe_code)]

//! Control handles, declarations and arena nodes.

use std::fmt;
use std::rc::Rc;

use tether_runtime::Binding;

use crate::delegate::ControlBindingDelegate;

/// Handle of a control inside one [`CompositeControl`](crate::CompositeControl).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(pub(crate) u64);

impl ControlId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "control#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Leaf,
    Composite,
}

/// How the activation sequence behaves at its end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationPolicy {
    /// Continue from the start after the last control.
    pub wrap: bool,
}

impl ActivationPolicy {
    #[must_use]
    pub const fn wrapping() -> Self {
        Self { wrap: true }
    }
}

/// Activation change recorded by the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationEvent {
    Activated { id: ControlId },
    Deactivated { id: ControlId },
    Moved { from: ControlId, to: ControlId },
}

/// Declaration of a control to add to a composite.
#[derive(Debug, Clone)]
#[must_use]
pub struct Control {
    pub(crate) name: String,
    pub(crate) kind: ControlKind,
    pub(crate) binding: Option<Binding>,
    pub(crate) activatable: bool,
    pub(crate) enabled: bool,
}

impl Control {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self::new(name, ControlKind::Leaf)
    }

    pub fn composite(name: impl Into<String>) -> Self {
        Self::new(name, ControlKind::Composite)
    }

    fn new(name: impl Into<String>, kind: ControlKind) -> Self {
        Self {
            name: name.into(),
            kind,
            binding: None,
            activatable: true,
            enabled: true,
        }
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn with_activatable(mut self, activatable: bool) -> Self {
        self.activatable = activatable;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A control stored in the arena.
pub struct ControlNode {
    pub(crate) id: ControlId,
    pub(crate) name: String,
    pub(crate) kind: ControlKind,
    pub(crate) parent: Option<ControlId>,
    pub(crate) children: Vec<ControlId>,
    pub(crate) binding: Option<Binding>,
    /// Keeps the binding's delegate adapter alive; the binding holds it weakly.
    pub(crate) adapter: Option<Rc<ControlBindingDelegate>>,
    pub(crate) activatable: bool,
    pub(crate) enabled: bool,
}

impl fmt::Debug for ControlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("binding", &self.binding.as_ref().map(Binding::id))
            .field("activatable", &self.activatable)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl ControlNode {
    #[must_use]
    pub fn id(&self) -> ControlId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.kind == ControlKind::Composite
    }

    #[must_use]
    pub fn parent(&self) -> Option<ControlId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[ControlId] {
        &self.children
    }

    #[must_use]
    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    #[must_use]
    pub fn is_activatable(&self) -> bool {
        self.activatable
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
