#![forbid(unsafe_code)]

//! Bidirectional property references.
//!
//! A binding never touches model or view objects directly: both its source
//! and its target are [`Property`] handles offering get, set and change
//! observation. Observation is optional; a property that cannot report
//! changes returns `None` from [`Property::observe`].

use std::fmt;
use std::rc::Rc;

use tether_expr::{KeyPath, Value};

use crate::error::PropertyError;
use crate::observable::{Observable, Subscription};

/// Change callback receiving `(old, new)`.
pub type ChangeCallback = Box<dyn Fn(&Value, &Value)>;

/// Get/set access to a value plus change observation.
pub trait Property {
    fn get(&self) -> Value;

    fn set(&self, value: Value) -> Result<(), PropertyError>;

    /// Observe changes, or `None` if this property cannot report them.
    fn observe(&self, callback: ChangeCallback) -> Option<Subscription>;

    fn is_writable(&self) -> bool {
        true
    }

    /// Short description for logs.
    fn describe(&self) -> String;
}

impl fmt::Debug for dyn Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Property({})", self.describe())
    }
}

// ---------------------------------------------------------------------------
// Observable
// ---------------------------------------------------------------------------

/// The whole value of an [`Observable`].
#[derive(Debug, Clone)]
pub struct ObservableProperty {
    observable: Observable<Value>,
    name: String,
}

impl ObservableProperty {
    #[must_use]
    pub fn new(observable: Observable<Value>, name: impl Into<String>) -> Self {
        Self {
            observable,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn shared(observable: Observable<Value>, name: impl Into<String>) -> Rc<dyn Property> {
        Rc::new(Self::new(observable, name))
    }
}

impl Property for ObservableProperty {
    fn get(&self) -> Value {
        self.observable.get()
    }

    fn set(&self, value: Value) -> Result<(), PropertyError> {
        self.observable.set(value);
        Ok(())
    }

    fn observe(&self, callback: ChangeCallback) -> Option<Subscription> {
        Some(self.observable.subscribe(move |old, new| callback(old, new)))
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

// ---------------------------------------------------------------------------
// Key path
// ---------------------------------------------------------------------------

/// A key path below an observable value tree.
///
/// Observers fire only when the value at the path changes, not on every
/// change of the tree. A path that does not resolve reads as `Null`.
#[derive(Debug, Clone)]
pub struct KeyPathProperty {
    root: Observable<Value>,
    path: KeyPath,
    scope: &'static str,
}

impl KeyPathProperty {
    #[must_use]
    pub fn new(root: Observable<Value>, path: KeyPath, scope: &'static str) -> Self {
        Self { root, path, scope }
    }

    #[must_use]
    pub fn path(&self) -> &KeyPath {
        &self.path
    }
}

impl Property for KeyPathProperty {
    fn get(&self) -> Value {
        self.root
            .with(|tree| tree.lookup(&self.path))
            .unwrap_or_default()
    }

    fn set(&self, value: Value) -> Result<(), PropertyError> {
        if self.path.is_empty() {
            self.root.set(value);
            return Ok(());
        }
        if self.root.with(|tree| tree.lookup(&self.path).as_ref() == Some(&value)) {
            return Ok(());
        }
        // Validate on a scratch copy so a failed write leaves the tree untouched.
        let mut tree = self.root.get();
        tree.assign(&self.path, value)?;
        self.root.set(tree);
        Ok(())
    }

    fn observe(&self, callback: ChangeCallback) -> Option<Subscription> {
        let path = self.path.clone();
        Some(self.root.subscribe(move |old_tree, new_tree| {
            let old = old_tree.lookup(&path).unwrap_or_default();
            let new = new_tree.lookup(&path).unwrap_or_default();
            if old != new {
                callback(&old, &new);
            }
        }))
    }

    fn describe(&self) -> String {
        if self.path.is_empty() {
            self.scope.to_owned()
        } else {
            format!("{}.{}", self.scope, self.path)
        }
    }
}

// ---------------------------------------------------------------------------
// Constant
// ---------------------------------------------------------------------------

/// A read-only value that never changes.
#[derive(Debug, Clone)]
pub struct ConstantProperty {
    value: Value,
}

impl ConstantProperty {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl Property for ConstantProperty {
    fn get(&self) -> Value {
        self.value.clone()
    }

    fn set(&self, _value: Value) -> Result<(), PropertyError> {
        Err(PropertyError::ReadOnly(self.describe()))
    }

    fn observe(&self, _callback: ChangeCallback) -> Option<Subscription> {
        None
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("constant {}", self.value)
    }
}
