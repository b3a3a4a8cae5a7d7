#![forbid(unsafe_code)]

//! Composite control tree with activation ordering.
//!
//! Controls live in an arena owned by [`CompositeControl`] and refer to each
//! other by [`ControlId`]. Parents own their children through the arena; the
//! parent link of a child is only an id.
//!
//! # Invariants
//!
//! 1. Every id in a `children` list names a live node whose `parent` is the
//!    list owner.
//! 2. The activation sequence is the pre-order of the tree restricted to
//!    enabled, activatable leaves carrying a binding. A disabled or
//!    non-activatable composite hides its whole subtree.
//! 3. The active control, when set, is a live, responder-capable node.
//! 4. Removing a control removes its subtree and stops every binding in it.
//!
//! # Complexity
//!
//! | Operation | Time |
//! |-----------|------|
//! | add / insert | O(siblings) |
//! | remove | O(subtree + siblings) |
//! | activation_sequence | O(n) |
//! | next_control_in_activation_sequence_after | O(n) |

use std::rc::{Rc, Weak};

use ahash::{AHashMap, AHashSet};
use tether_expr::BindingExpression;
use tether_runtime::{Binding, BindingContext, BindingDelegate, BindingError, BindingProviderRegistry, BindingTarget};
use tracing::{debug, trace};

use crate::control::{ActivationEvent, ActivationPolicy, Control, ControlId, ControlKind, ControlNode};
use crate::delegate::{ControlBindingDelegate, ControlDelegate, DelegateSlot};
use crate::error::ControlError;

/// A tree of controls with a single delegate and an activation order.
pub struct CompositeControl {
    nodes: AHashMap<ControlId, ControlNode>,
    root: ControlId,
    next_id: u64,
    active: Option<ControlId>,
    policy: ActivationPolicy,
    delegate: Rc<DelegateSlot>,
    last_event: Option<ActivationEvent>,
}

impl std::fmt::Debug for CompositeControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeControl")
            .field("root", &self.root)
            .field("controls", &self.nodes.len())
            .field("active", &self.active)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for CompositeControl {
    fn default() -> Self {
        Self::new("root")
    }
}

impl CompositeControl {
    /// Create a composite whose root is an empty composite control.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let root = ControlId(1);
        let mut nodes = AHashMap::new();
        nodes.insert(
            root,
            ControlNode {
                id: root,
                name: name.into(),
                kind: ControlKind::Composite,
                parent: None,
                children: Vec::new(),
                binding: None,
                adapter: None,
                activatable: true,
                enabled: true,
            },
        );
        Self {
            nodes,
            root,
            next_id: 2,
            active: None,
            policy: ActivationPolicy::default(),
            delegate: Rc::new(DelegateSlot::default()),
            last_event: None,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ActivationPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn root(&self) -> ControlId {
        self.root
    }

    #[must_use]
    pub fn policy(&self) -> ActivationPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: ActivationPolicy) {
        self.policy = policy;
    }

    /// Register the delegate receiving every binding event in the tree.
    pub fn set_delegate(&mut self, delegate: Option<Weak<dyn ControlDelegate>>) {
        *self.delegate.borrow_mut() = delegate;
    }

    #[must_use]
    pub fn control(&self, id: ControlId) -> Option<&ControlNode> {
        self.nodes.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: ControlId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of controls including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether only the root exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// First control named `name`, in pre-order.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<ControlId> {
        self.preorder()
            .into_iter()
            .find(|id| self.nodes.get(id).is_some_and(|n| n.name == name))
    }

    #[must_use]
    pub fn last_event(&self) -> Option<ActivationEvent> {
        self.last_event
    }

    fn node(&self, id: ControlId) -> Result<&ControlNode, ControlError> {
        self.nodes.get(&id).ok_or(ControlError::UnknownControl(id))
    }

    fn node_mut(&mut self, id: ControlId) -> Result<&mut ControlNode, ControlError> {
        self.nodes.get_mut(&id).ok_or(ControlError::UnknownControl(id))
    }

    fn composite(&self, id: ControlId) -> Result<&ControlNode, ControlError> {
        let node = self.node(id)?;
        if node.is_composite() {
            Ok(node)
        } else {
            Err(ControlError::NotComposite(id))
        }
    }

    // -- Membership -----------------------------------------------------------

    /// Children of a composite, in order.
    pub fn controls(&self, parent: ControlId) -> Result<&[ControlId], ControlError> {
        Ok(&self.composite(parent)?.children)
    }

    /// Append a control to `parent`.
    pub fn add_control(&mut self, parent: ControlId, control: Control) -> Result<ControlId, ControlError> {
        let index = self.composite(parent)?.children.len();
        self.insert_control(parent, index, control)
    }

    /// Insert a control into `parent` at `index` (`index == len` appends).
    pub fn insert_control(&mut self, parent: ControlId, index: usize, control: Control) -> Result<ControlId, ControlError> {
        let len = self.composite(parent)?.children.len();
        if index > len {
            return Err(ControlError::IndexOutOfRange { parent, index, len });
        }
        let id = ControlId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            ControlNode {
                id,
                name: control.name,
                kind: control.kind,
                parent: Some(parent),
                children: Vec::new(),
                binding: None,
                adapter: None,
                activatable: control.activatable,
                enabled: control.enabled,
            },
        );
        self.node_mut(parent)?.children.insert(index, id);
        if let Some(binding) = control.binding {
            self.attach_binding(id, binding)?;
        }
        debug!(control = %id, %parent, index, "added control");
        Ok(id)
    }

    /// Remove a control and its subtree. Returns the number of controls removed.
    pub fn remove_control(&mut self, id: ControlId) -> Result<usize, ControlError> {
        if id == self.root {
            return Err(ControlError::RootControl);
        }
        let parent = self.node(id)?.parent;
        let mut subtree = Vec::new();
        self.collect_preorder(id, &mut subtree);
        if self.active.is_some_and(|active| subtree.contains(&active)) {
            self.deactivate();
        }
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|child| *child != id);
        }
        for removed in &subtree {
            if let Some(binding) = self.nodes.remove(removed).and_then(|node| node.binding) {
                binding.stop_observing_changes();
            }
        }
        debug!(control = %id, removed = subtree.len(), "removed control");
        Ok(subtree.len())
    }

    /// Remove the child of `parent` at `index`, returning its id.
    pub fn remove_control_at(&mut self, parent: ControlId, index: usize) -> Result<ControlId, ControlError> {
        let children = self.controls(parent)?;
        let id = *children.get(index).ok_or(ControlError::IndexOutOfRange {
            parent,
            index,
            len: children.len(),
        })?;
        self.remove_control(id)?;
        Ok(id)
    }

    pub fn set_enabled(&mut self, id: ControlId, enabled: bool) -> Result<(), ControlError> {
        self.node_mut(id)?.enabled = enabled;
        if !enabled && self.active.is_some_and(|active| !self.is_responder(active)) {
            self.deactivate();
        }
        Ok(())
    }

    pub fn set_activatable(&mut self, id: ControlId, activatable: bool) -> Result<(), ControlError> {
        self.node_mut(id)?.activatable = activatable;
        if !activatable && self.active.is_some_and(|active| !self.is_responder(active)) {
            self.deactivate();
        }
        Ok(())
    }

    // -- Bindings -------------------------------------------------------------

    fn adapter_for(&self, id: ControlId, inner: Option<Weak<dyn BindingDelegate>>) -> Rc<ControlBindingDelegate> {
        Rc::new(ControlBindingDelegate::new(id, Rc::clone(&self.delegate), inner))
    }

    fn install(&mut self, id: ControlId, binding: Binding, adapter: Rc<ControlBindingDelegate>) -> Result<Option<Binding>, ControlError> {
        let node = self.node_mut(id)?;
        let previous_adapter = node.adapter.replace(adapter);
        let previous = node.binding.replace(binding);
        if let Some(previous) = &previous {
            previous.stop_observing_changes();
            previous.set_delegate(previous_adapter.and_then(|adapter| adapter.inner()));
        }
        Ok(previous)
    }

    /// Attach a binding to a control, replacing (and stopping) any previous one.
    ///
    /// The binding's events are routed to the composite delegate; its former
    /// delegate keeps receiving them first. A replaced binding gets its
    /// former delegate back.
    pub fn attach_binding(&mut self, id: ControlId, binding: Binding) -> Result<Option<Binding>, ControlError> {
        self.node(id)?;
        let adapter = self.adapter_for(id, binding.delegate());
        binding.set_delegate(Some(adapter.handle()));
        self.install(id, binding, adapter)
    }

    /// Detach and stop a control's binding, restoring its former delegate.
    pub fn detach_binding(&mut self, id: ControlId) -> Result<Option<Binding>, ControlError> {
        let node = self.node_mut(id)?;
        let adapter = node.adapter.take();
        let binding = node.binding.take();
        if let Some(binding) = &binding {
            binding.stop_observing_changes();
            binding.set_delegate(adapter.and_then(|adapter| adapter.inner()));
        }
        Ok(binding)
    }

    /// Build a binding through `registry`, attach it to `id` and start it.
    ///
    /// The composite delegate is in place before the initial synchronization.
    pub fn bind_control(
        &mut self,
        id: ControlId,
        registry: &BindingProviderRegistry,
        binding_type: &str,
        expression: &str,
        target: BindingTarget,
        context: &BindingContext,
    ) -> Result<Binding, ControlError> {
        let name = self.node(id)?.name.clone();
        let adapter = self.adapter_for(id, None);
        let binding = BindingExpression::parse(expression)
            .map_err(BindingError::from)
            .and_then(|expr| registry.create(binding_type, &expr, target, context, Some(adapter.handle())))
            .map_err(|source| ControlError::Binding { control: name, source })?;
        self.install(id, binding.clone(), adapter)?;
        binding.start_observing_changes();
        Ok(binding)
    }

    // -- Activation sequence --------------------------------------------------

    fn collect_preorder(&self, id: ControlId, out: &mut Vec<ControlId>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        out.push(id);
        for child in &node.children {
            self.collect_preorder(*child, out);
        }
    }

    fn preorder(&self) -> Vec<ControlId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.collect_preorder(self.root, &mut out);
        out
    }

    fn collect_sequence(&self, id: ControlId, out: &mut Vec<ControlId>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if !node.enabled || !node.activatable {
            return;
        }
        match node.kind {
            ControlKind::Leaf => {
                if node.binding.is_some() {
                    out.push(id);
                }
            }
            ControlKind::Composite => {
                for child in &node.children {
                    self.collect_sequence(*child, out);
                }
            }
        }
    }

    /// Keyboard activation order of the whole tree.
    #[must_use]
    pub fn activation_sequence(&self) -> Vec<ControlId> {
        self.activation_sequence_of(self.root)
    }

    /// Activation order restricted to the subtree at `id`.
    #[must_use]
    pub fn activation_sequence_of(&self, id: ControlId) -> Vec<ControlId> {
        let mut out = Vec::new();
        self.collect_sequence(id, &mut out);
        trace!(root = %id, len = out.len(), "computed activation sequence");
        out
    }

    /// Next activatable control in pre-order after `id`.
    ///
    /// At the end of the sequence this returns `None` unless the policy wraps.
    /// `id` itself need not be activatable.
    #[must_use]
    pub fn next_control_in_activation_sequence_after(&self, id: ControlId) -> Option<ControlId> {
        self.step(id, true)
    }

    /// Previous activatable control in pre-order before `id`.
    #[must_use]
    pub fn previous_control_in_activation_sequence_before(&self, id: ControlId) -> Option<ControlId> {
        self.step(id, false)
    }

    fn step(&self, id: ControlId, forward: bool) -> Option<ControlId> {
        let order = self.preorder();
        let position = order.iter().position(|candidate| *candidate == id)?;
        let sequence: AHashSet<ControlId> = self.activation_sequence().into_iter().collect();
        let eligible = |candidate: &&ControlId| sequence.contains(*candidate);
        let (before, after) = (&order[..position], &order[position + 1..]);
        let found = if forward {
            after.iter().find(eligible)
        } else {
            before.iter().rev().find(eligible)
        };
        match found {
            Some(next) => Some(*next),
            None if self.policy.wrap && forward => before.iter().find(eligible).copied(),
            None if self.policy.wrap => after.iter().rev().find(eligible).copied(),
            None => None,
        }
    }

    // -- Responder ------------------------------------------------------------

    /// Whether `id` can become the active control.
    #[must_use]
    pub fn is_responder(&self, id: ControlId) -> bool {
        let mut current = Some(id);
        while let Some(cursor) = current {
            let Some(node) = self.nodes.get(&cursor) else {
                return false;
            };
            if !node.enabled || !node.activatable {
                return false;
            }
            current = node.parent;
        }
        true
    }

    /// Most recently activated control.
    #[must_use]
    pub fn active_control(&self) -> Option<ControlId> {
        self.active
    }

    /// Deepest activatable control under the active one.
    ///
    /// For an active composite this is the first control of its own
    /// activation sequence, or the composite itself when it has none.
    #[must_use]
    pub fn active_leaf_control(&self) -> Option<ControlId> {
        self.active.map(|active| self.leaf_of(active))
    }

    fn leaf_of(&self, id: ControlId) -> ControlId {
        match self.nodes.get(&id) {
            Some(node) if node.is_composite() => self.activation_sequence_of(id).first().copied().unwrap_or(id),
            _ => id,
        }
    }

    fn responder_binding(&self, id: ControlId) -> Option<Binding> {
        let leaf = self.leaf_of(id);
        self.nodes
            .get(&leaf)
            .and_then(|node| node.binding.clone())
            .or_else(|| self.nodes.get(&id).and_then(|node| node.binding.clone()))
    }

    /// Make `id` the active control.
    ///
    /// Returns `false` if the control cannot be activated. The previous
    /// control's binding is told about its deactivation first.
    pub fn activate(&mut self, id: ControlId) -> Result<bool, ControlError> {
        self.node(id)?;
        if !self.is_responder(id) {
            debug!(control = %id, "control is not activatable");
            return Ok(false);
        }
        if self.active == Some(id) {
            return Ok(true);
        }
        let previous = self.active;
        let outgoing = previous.and_then(|prev| self.responder_binding(prev));
        let incoming = self.responder_binding(id);

        if let Some(binding) = &outgoing {
            binding.will_deactivate();
        }
        if let Some(binding) = &incoming {
            binding.will_activate();
        }
        self.active = Some(id);
        if let Some(binding) = &outgoing {
            binding.did_deactivate();
        }
        if let Some(binding) = &incoming {
            binding.did_activate();
        }
        self.last_event = Some(match previous {
            Some(from) => ActivationEvent::Moved { from, to: id },
            None => ActivationEvent::Activated { id },
        });
        debug!(control = %id, previous = ?previous, "activated control");
        Ok(true)
    }

    /// Clear the active control, returning it.
    pub fn deactivate(&mut self) -> Option<ControlId> {
        let id = self.active?;
        let binding = self.responder_binding(id);
        if let Some(binding) = &binding {
            binding.will_deactivate();
        }
        self.active = None;
        if let Some(binding) = &binding {
            binding.did_deactivate();
        }
        self.last_event = Some(ActivationEvent::Deactivated { id });
        debug!(control = %id, "deactivated control");
        Some(id)
    }

    /// Move activation from `from` to the next control in the sequence.
    ///
    /// `from`'s binding (and through it the delegates) may veto the move.
    /// At the end of a non-wrapping sequence the active control is cleared.
    /// Returns the newly active control.
    pub fn request_activate_next(&mut self, from: ControlId) -> Result<Option<ControlId>, ControlError> {
        self.node(from)?;
        let vetoed = self
            .responder_binding(from)
            .is_some_and(|binding| !binding.should_activate_next_responder());
        if vetoed {
            debug!(control = %from, "activation of next responder declined");
            return Ok(self.active);
        }
        match self.next_control_in_activation_sequence_after(from) {
            Some(next) => {
                self.activate(next)?;
                Ok(Some(next))
            }
            None => {
                if self.active == Some(from) {
                    self.deactivate();
                }
                Ok(None)
            }
        }
    }
}
