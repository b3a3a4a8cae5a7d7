#![forbid(unsafe_code)]

//! Bulk population of a composite from view sources.
//!
//! A [`BindingTargetEnumerator`] reports candidate views (views carrying a
//! binding declaration) in traversal order. The composite turns each
//! candidate into a leaf control bound through the provider registry.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Candidate binding fails to build | enumeration stops, controls inserted by the call are removed, error returned |
//! | Invalid parent or index | error returned before enumeration |

use tether_expr::{TargetKind, Value};
use tether_runtime::{BindingContext, BindingProviderRegistry, BindingTarget, Observable, ObservableProperty};
use tracing::{debug, warn};

use crate::composite::CompositeControl;
use crate::control::{Control, ControlId};
use crate::error::ControlError;

/// The binding a view declares for itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDeclaration {
    pub binding_type: String,
    pub expression: String,
}

impl BindingDeclaration {
    #[must_use]
    pub fn new(binding_type: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            binding_type: binding_type.into(),
            expression: expression.into(),
        }
    }
}

/// A view in a hierarchy, exposing its value as an observable.
#[derive(Debug, Clone)]
pub struct ViewNode {
    pub name: String,
    pub kind: TargetKind,
    pub value: Observable<Value>,
    pub binding: Option<BindingDeclaration>,
    pub activatable: bool,
    pub children: Vec<ViewNode>,
}

impl ViewNode {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value: Observable::new(Value::Null),
            binding: None,
            activatable: true,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_binding(mut self, binding_type: impl Into<String>, expression: impl Into<String>) -> Self {
        self.binding = Some(BindingDeclaration::new(binding_type, expression));
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Observable::new(value);
        self
    }

    #[must_use]
    pub fn with_activatable(mut self, activatable: bool) -> Self {
        self.activatable = activatable;
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: ViewNode) -> Self {
        self.children.push(child);
        self
    }

    /// Returns `false` once the visitor has raised the stop flag.
    fn walk(&self, visit: &mut dyn FnMut(&ViewNode, &mut bool)) -> bool {
        if self.binding.is_some() {
            let mut stop = false;
            visit(self, &mut stop);
            return !stop;
        }
        self.children.iter().all(|child| child.walk(&mut *visit))
    }
}

/// Source of candidate binding targets.
///
/// The visitor receives each candidate together with a stop flag; setting
/// the flag ends the enumeration.
pub trait BindingTargetEnumerator {
    fn enumerate_binding_targets(&self, visit: &mut dyn FnMut(&ViewNode, &mut bool));
}

/// Pre-order; a view carrying a binding is a candidate and its subviews are not visited.
impl BindingTargetEnumerator for ViewNode {
    fn enumerate_binding_targets(&self, visit: &mut dyn FnMut(&ViewNode, &mut bool)) {
        self.walk(visit);
    }
}

/// A flat list of views wired up individually. Items are not descended into.
#[derive(Debug, Clone, Default)]
pub struct OutletCollection(pub Vec<ViewNode>);

impl BindingTargetEnumerator for OutletCollection {
    fn enumerate_binding_targets(&self, visit: &mut dyn FnMut(&ViewNode, &mut bool)) {
        for view in self.0.iter().filter(|view| view.binding.is_some()) {
            let mut stop = false;
            visit(view, &mut stop);
            if stop {
                return;
            }
        }
    }
}

impl BindingTargetEnumerator for Vec<OutletCollection> {
    fn enumerate_binding_targets(&self, visit: &mut dyn FnMut(&ViewNode, &mut bool)) {
        let mut stopped = false;
        for collection in self {
            collection.enumerate_binding_targets(&mut |view, stop| {
                visit(view, stop);
                stopped |= *stop;
            });
            if stopped {
                return;
            }
        }
    }
}

/// Statically laid-out table: sections of rows, each row a cell view hierarchy.
#[derive(Debug, Clone, Default)]
pub struct StaticTableView {
    pub sections: Vec<Vec<ViewNode>>,
}

impl StaticTableView {
    #[must_use]
    pub fn with_section(mut self, rows: Vec<ViewNode>) -> Self {
        self.sections.push(rows);
        self
    }
}

impl BindingTargetEnumerator for StaticTableView {
    fn enumerate_binding_targets(&self, visit: &mut dyn FnMut(&ViewNode, &mut bool)) {
        for cell in self.sections.iter().flatten() {
            if !cell.walk(&mut *visit) {
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

impl CompositeControl {
    /// Append one bound control per candidate view to `parent`.
    pub fn add_controls_from(
        &mut self,
        parent: ControlId,
        source: &dyn BindingTargetEnumerator,
        registry: &BindingProviderRegistry,
        context: &BindingContext,
    ) -> Result<usize, ControlError> {
        let index = self.controls(parent)?.len();
        self.insert_controls_from(parent, index, source, registry, context)
    }

    /// Insert one bound control per candidate view into `parent` starting at `index`.
    ///
    /// Returns the number of controls inserted. On failure no control from
    /// this call remains in the tree.
    pub fn insert_controls_from(
        &mut self,
        parent: ControlId,
        index: usize,
        source: &dyn BindingTargetEnumerator,
        registry: &BindingProviderRegistry,
        context: &BindingContext,
    ) -> Result<usize, ControlError> {
        let len = self.controls(parent)?.len();
        if index > len {
            return Err(ControlError::IndexOutOfRange { parent, index, len });
        }

        let mut inserted = Vec::new();
        let mut failure = None;
        source.enumerate_binding_targets(&mut |view, stop| {
            if let Err(err) = self.insert_view(parent, index + inserted.len(), view, registry, context, &mut inserted) {
                failure = Some(err);
                *stop = true;
            }
        });

        if let Some(err) = failure {
            warn!(%parent, error = %err, "populating controls failed; rolling back");
            for id in inserted {
                self.remove_control(id)?;
            }
            return Err(err);
        }
        debug!(%parent, count = inserted.len(), "populated controls");
        Ok(inserted.len())
    }

    fn insert_view(
        &mut self,
        parent: ControlId,
        index: usize,
        view: &ViewNode,
        registry: &BindingProviderRegistry,
        context: &BindingContext,
        inserted: &mut Vec<ControlId>,
    ) -> Result<(), ControlError> {
        let Some(declaration) = &view.binding else {
            return Ok(());
        };
        let id = self.insert_control(
            parent,
            index,
            Control::leaf(view.name.clone()).with_activatable(view.activatable),
        )?;
        inserted.push(id);
        let target = BindingTarget::new(
            ObservableProperty::shared(view.value.clone(), view.name.clone()),
            view.kind.clone(),
        );
        self.bind_control(id, registry, &declaration.binding_type, &declaration.expression, target, context)?;
        Ok(())
    }
}
