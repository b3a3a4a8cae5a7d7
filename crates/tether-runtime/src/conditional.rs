#![forbid(unsafe_code)]

//! Conditional bindings: one of several clause bindings, chosen by predicate.
//!
//! Clauses are checked in declaration order against the current data
//! context; the first whose predicate holds is selected. A clause without a
//! predicate always holds and acts as the `else` branch. When nothing
//! matches, the active binding is torn down and the target keeps its last
//! value.
//!
//! # Invariants
//!
//! 1. At most one clause binding exists and observes at any time.
//! 2. Re-selecting the active clause does nothing.
//! 3. The previous clause binding stops observing before the next one is
//!    constructed.
//! 4. The clause binding observes only while the conditional observes. A
//!    stopped conditional still re-selects on `reevaluate` and pushes the
//!    new clause's value once.
//!
//! # Failure Modes
//!
//! | Failure | State afterwards | Reported via |
//! |---------|------------------|--------------|
//! | selected clause fails schema validation | previous clause stays active | `Err` + delegate + `warn!` |
//! | provider fails to construct | previous clause kept (restarted if observing), or none | `Err` + delegate + `warn!` |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tether_expr::{BindingExpression, Predicate};
use tracing::{debug, trace, warn};

use crate::binding::Binding;
use crate::context::BindingContext;
use crate::delegate::{BindingDelegate, BindingId};
use crate::error::BindingError;
use crate::observable::Subscription;
use crate::provider::{BindingProviderRegistry, BindingTarget};

/// Re-evaluations triggered from within a re-evaluation are folded into at
/// most this many extra passes.
const MAX_PASSES: usize = 8;

/// A predicate paired with the expression to bind when it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalClause {
    predicate: Option<Predicate>,
    expression: BindingExpression,
}

impl ConditionalClause {
    #[must_use]
    pub fn new(predicate: Predicate, expression: BindingExpression) -> Self {
        Self {
            predicate: Some(predicate),
            expression,
        }
    }

    /// Clause that always matches.
    #[must_use]
    pub fn otherwise(expression: BindingExpression) -> Self {
        Self {
            predicate: None,
            expression,
        }
    }

    /// Parse a clause from predicate and expression text.
    pub fn parse(predicate: Option<&str>, expression: &str) -> Result<Self, BindingError> {
        Ok(Self {
            predicate: predicate.map(Predicate::parse).transpose()?,
            expression: BindingExpression::parse(expression)?,
        })
    }

    #[must_use]
    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    #[must_use]
    pub fn expression(&self) -> &BindingExpression {
        &self.expression
    }

    #[must_use]
    pub fn matches(&self, context: &BindingContext) -> bool {
        self.predicate.as_ref().is_none_or(|p| p.evaluate(context))
    }
}

struct ActiveClause {
    index: usize,
    binding: Binding,
}

struct ConditionalInner {
    id: BindingId,
    binding_type: String,
    clauses: Vec<ConditionalClause>,
    registry: Rc<BindingProviderRegistry>,
    target: BindingTarget,
    context: BindingContext,
    delegate: RefCell<Option<Weak<dyn BindingDelegate>>>,
    active: RefCell<Option<ActiveClause>>,
    subscriptions: RefCell<Vec<Subscription>>,
    observing: Cell<bool>,
    reevaluating: Cell<bool>,
    pending: Cell<bool>,
    constructions: Cell<u64>,
}

/// Switches a target between clause bindings as the context changes.
#[derive(Clone)]
pub struct ConditionalBinding {
    inner: Rc<ConditionalInner>,
}

impl fmt::Debug for ConditionalBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalBinding")
            .field("id", &self.inner.id)
            .field("binding_type", &self.inner.binding_type)
            .field("clauses", &self.inner.clauses.len())
            .field("active_clause", &self.active_clause())
            .field("observing", &self.inner.observing.get())
            .finish_non_exhaustive()
    }
}

impl ConditionalBinding {
    #[must_use]
    pub fn new(
        binding_type: impl Into<String>,
        clauses: Vec<ConditionalClause>,
        registry: Rc<BindingProviderRegistry>,
        target: BindingTarget,
        context: BindingContext,
    ) -> Self {
        Self {
            inner: Rc::new(ConditionalInner {
                id: BindingId::next(),
                binding_type: binding_type.into(),
                clauses,
                registry,
                target,
                context,
                delegate: RefCell::new(None),
                active: RefCell::new(None),
                subscriptions: RefCell::new(Vec::new()),
                observing: Cell::new(false),
                reevaluating: Cell::new(false),
                pending: Cell::new(false),
                constructions: Cell::new(0),
            }),
        }
    }

    /// Set the delegate shared by this binding and every clause binding.
    #[must_use]
    pub fn with_delegate(self, delegate: Weak<dyn BindingDelegate>) -> Self {
        *self.inner.delegate.borrow_mut() = Some(delegate);
        self
    }

    #[must_use]
    pub fn id(&self) -> BindingId {
        self.inner.id
    }

    #[must_use]
    pub fn clauses(&self) -> &[ConditionalClause] {
        &self.inner.clauses
    }

    #[must_use]
    pub fn context(&self) -> &BindingContext {
        &self.inner.context
    }

    #[must_use]
    pub fn active_clause(&self) -> Option<usize> {
        self.inner.active.borrow().as_ref().map(|a| a.index)
    }

    #[must_use]
    pub fn active_binding(&self) -> Option<Binding> {
        self.inner.active.borrow().as_ref().map(|a| a.binding.clone())
    }

    /// Number of clause bindings constructed so far.
    #[must_use]
    pub fn construction_count(&self) -> u64 {
        self.inner.constructions.get()
    }

    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.inner.observing.get()
    }

    /// Index of the clause the current context selects.
    #[must_use]
    pub fn selected_clause(&self) -> Option<usize> {
        self.inner.select()
    }

    /// Select and activate the matching clause.
    ///
    /// Returns the active clause index afterwards. Calling this again without
    /// a context change does nothing.
    pub fn reevaluate(&self) -> Result<Option<usize>, BindingError> {
        self.inner.reevaluate()
    }

    /// Re-evaluate on every change of the context's trees.
    pub fn start_observing_changes(&self) -> Result<Option<usize>, BindingError> {
        if self.inner.observing.replace(true) {
            return Ok(self.active_clause());
        }
        let weak = Rc::downgrade(&self.inner);
        let subscriptions = self.inner.context.observe_all(move || {
            if let Some(inner) = weak.upgrade() {
                // Failures were already reported to the delegate.
                let _ = inner.reevaluate();
            }
        });
        *self.inner.subscriptions.borrow_mut() = subscriptions;
        if let Some(binding) = self.active_binding() {
            binding.start_observing_changes();
        }
        debug!(binding = %self.inner.id, clauses = self.inner.clauses.len(), "conditional binding observing");
        self.reevaluate()
    }

    /// Stop re-evaluating and stop the active clause binding.
    pub fn stop_observing_changes(&self) {
        if !self.inner.observing.replace(false) {
            return;
        }
        drop(std::mem::take(&mut *self.inner.subscriptions.borrow_mut()));
        if let Some(binding) = self.active_binding() {
            binding.stop_observing_changes();
        }
        debug!(binding = %self.inner.id, "conditional binding stopped");
    }
}

impl ConditionalInner {
    fn delegate(&self) -> Option<Weak<dyn BindingDelegate>> {
        self.delegate.borrow().clone()
    }

    fn select(&self) -> Option<usize> {
        self.clauses
            .iter()
            .position(|clause| clause.matches(&self.context))
    }

    fn active_index(&self) -> Option<usize> {
        self.active.borrow().as_ref().map(|a| a.index)
    }

    fn reevaluate(&self) -> Result<Option<usize>, BindingError> {
        if self.reevaluating.get() {
            self.pending.set(true);
            return Ok(self.active_index());
        }
        self.reevaluating.set(true);
        let mut result = Ok(self.active_index());
        for _ in 0..MAX_PASSES {
            self.pending.set(false);
            result = self.switch();
            if result.is_err() || !self.pending.get() {
                break;
            }
        }
        if self.pending.replace(false) {
            warn!(binding = %self.id, "clause selection did not settle");
        }
        self.reevaluating.set(false);
        result
    }

    fn switch(&self) -> Result<Option<usize>, BindingError> {
        let selected = self.select();
        let current = self.active_index();
        if selected == current {
            trace!(binding = %self.id, clause = ?selected, "clause unchanged");
            return Ok(current);
        }

        let Some(index) = selected else {
            let previous = self.active.borrow_mut().take();
            if let Some(previous) = previous {
                previous.binding.stop_observing_changes();
            }
            debug!(binding = %self.id, previous = ?current, "no clause matches");
            return Ok(None);
        };

        let expression = &self.clauses[index].expression;
        // Schema failures leave the previous clause running untouched.
        if let Err(err) = self.registry.validate(&self.binding_type, expression) {
            return Err(self.report(index, err));
        }

        let previous = self.active.borrow_mut().take();
        if let Some(previous) = &previous {
            previous.binding.stop_observing_changes();
        }
        let created = self.registry.create(
            &self.binding_type,
            expression,
            self.target.clone(),
            &self.context,
            self.delegate(),
        );
        match created {
            Ok(binding) => {
                drop(previous);
                // A stopped conditional syncs the new clause once without observing.
                if self.observing.get() {
                    binding.start_observing_changes();
                } else {
                    binding.update_target_from_source();
                }
                self.constructions.set(self.constructions.get() + 1);
                debug!(
                    binding = %self.id,
                    clause = index,
                    previous = ?current,
                    clause_binding = %binding.id(),
                    "activated clause"
                );
                *self.active.borrow_mut() = Some(ActiveClause { index, binding });
                Ok(Some(index))
            }
            Err(err) => {
                if let Some(previous) = previous {
                    if self.observing.get() {
                        previous.binding.start_observing_changes();
                    }
                    *self.active.borrow_mut() = Some(previous);
                }
                Err(self.report(index, err))
            }
        }
    }

    fn report(&self, clause: usize, err: BindingError) -> BindingError {
        warn!(binding = %self.id, clause, error = %err, "clause binding construction failed");
        if let Some(delegate) = self.delegate().and_then(|weak| weak.upgrade()) {
            delegate.construction_failed(self.id, &err);
        }
        err
    }
}
