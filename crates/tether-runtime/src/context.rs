#![forbid(unsafe_code)]

//! Data contexts bindings resolve key paths against.

use std::rc::Rc;

use tether_expr::{
    BindingExpression, KeyPath, KeyPathResolver, KeyPathScope, PrimaryExpression, Value,
};

use crate::error::ConstructionError;
use crate::observable::{Observable, Subscription};
use crate::property::{ConstantProperty, KeyPathProperty, Property};

/// The three value trees a binding can reach.
///
/// | Scope | Tree |
/// |-------|------|
/// | unqualified, `$data` | `data` |
/// | `$root` | `root` (defaults to `data`) |
/// | `$control` | `control` |
///
/// Cloning shares the underlying observables.
#[derive(Debug, Clone)]
pub struct BindingContext {
    data: Observable<Value>,
    root: Observable<Value>,
    control: Observable<Value>,
}

impl BindingContext {
    /// Context whose root is the data context itself.
    #[must_use]
    pub fn new(data: Observable<Value>) -> Self {
        Self {
            root: data.clone(),
            data,
            control: Observable::new(Value::Null),
        }
    }

    #[must_use]
    pub fn with_root(mut self, root: Observable<Value>) -> Self {
        self.root = root;
        self
    }

    #[must_use]
    pub fn with_control(mut self, control: Observable<Value>) -> Self {
        self.control = control;
        self
    }

    /// A child context sharing root and control but with its own data.
    #[must_use]
    pub fn child(&self, data: Observable<Value>) -> Self {
        Self {
            data,
            root: self.root.clone(),
            control: self.control.clone(),
        }
    }

    #[must_use]
    pub fn data(&self) -> &Observable<Value> {
        &self.data
    }

    #[must_use]
    pub fn root(&self) -> &Observable<Value> {
        &self.root
    }

    #[must_use]
    pub fn control(&self) -> &Observable<Value> {
        &self.control
    }

    fn tree(&self, scope: KeyPathScope) -> &Observable<Value> {
        match scope {
            KeyPathScope::Unqualified | KeyPathScope::DataContext => &self.data,
            KeyPathScope::RootDataContext => &self.root,
            KeyPathScope::Control => &self.control,
        }
    }

    /// Property reference for a primary expression.
    ///
    /// Key paths yield live [`KeyPathProperty`] handles; constants and arrays
    /// yield read-only snapshots.
    pub fn property_for(&self, primary: &PrimaryExpression) -> Result<Rc<dyn Property>, ConstructionError> {
        match primary {
            PrimaryExpression::KeyPath { scope, path } => Ok(Rc::new(KeyPathProperty::new(
                self.tree(*scope).clone(),
                path.clone(),
                match scope {
                    KeyPathScope::Unqualified | KeyPathScope::DataContext => "$data",
                    other => other.prefix(),
                },
            ))),
            other => Ok(Rc::new(ConstantProperty::new(self.evaluate_primary(other)))),
        }
    }

    /// Source property for a whole expression; fails without a primary.
    pub fn source_property(&self, expr: &BindingExpression) -> Result<Rc<dyn Property>, ConstructionError> {
        let primary = expr.primary().ok_or(ConstructionError::MissingPrimary)?;
        self.property_for(primary)
    }

    /// Current value of a primary expression. Unresolved paths are `Null`.
    #[must_use]
    pub fn evaluate_primary(&self, primary: &PrimaryExpression) -> Value {
        match primary {
            PrimaryExpression::KeyPath { scope, path } => self.resolve(*scope, path).unwrap_or_default(),
            PrimaryExpression::Constant(value) => value.clone(),
            PrimaryExpression::Array(items) => Value::Array(items.iter().map(|item| self.evaluate(item)).collect()),
        }
    }

    /// Current value of an expression's primary; `Null` if it has none.
    #[must_use]
    pub fn evaluate(&self, expr: &BindingExpression) -> Value {
        expr.primary()
            .map(|primary| self.evaluate_primary(primary))
            .unwrap_or_default()
    }

    /// Observe any change to any of the three trees.
    ///
    /// Trees shared between scopes are observed once.
    pub fn observe_all(&self, callback: impl Fn() + 'static) -> Vec<Subscription> {
        let callback: Rc<dyn Fn()> = Rc::new(callback);
        let mut trees: Vec<&Observable<Value>> = Vec::with_capacity(3);
        for tree in [&self.data, &self.root, &self.control] {
            if !trees.iter().any(|seen| seen.ptr_eq(tree)) {
                trees.push(tree);
            }
        }
        trees
            .into_iter()
            .map(|tree| {
                let callback = Rc::clone(&callback);
                tree.subscribe(move |_, _| callback())
            })
            .collect()
    }
}

impl KeyPathResolver for BindingContext {
    fn resolve(&self, scope: KeyPathScope, path: &KeyPath) -> Option<Value> {
        self.tree(scope).with(|tree| tree.lookup(path))
    }
}
