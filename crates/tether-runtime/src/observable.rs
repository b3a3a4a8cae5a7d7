#![forbid(unsafe_code)]

//! Observable value wrapper with old/new change notification.
//!
//! # Design
//!
//! [`Observable<T>`] wraps a value in shared, reference-counted storage
//! (`Rc<RefCell<..>>`). When the value changes (by `PartialEq`), all live
//! subscribers are called with the previous and the new value, in
//! registration order.
//!
//! No borrow is held while subscribers run, so a subscriber may call
//! [`Observable::set`] on the same observable. Bindings rely on this: a
//! target write made while handling a source change notifies synchronously
//! and re-entrantly.
//!
//! # Invariants
//!
//! 1. `version` increments by exactly 1 on each value-changing mutation.
//! 2. `set(v)` where `v == current` is a no-op.
//! 3. Once a [`Subscription`] is dropped or cancelled its callback never runs
//!    again, including for a notification cycle already in progress.
//! 4. A subscriber never receives a `new` value older than the current one:
//!    when a subscriber mutates the observable, the nested cycle delivers the
//!    latest value and the outer cycle stops.
//!
//! # Failure Modes
//!
//! - **Subscriber leak**: subscriptions stored indefinitely accumulate dead
//!   entries only until the next notification, which prunes them.
//! - **Unbounded re-entrancy**: a subscriber that always sets a different
//!   value recurses without limit. Bindings break such loops with their
//!   update guards.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type CallbackRc<T> = Rc<dyn Fn(&T, &T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T, &T)>;

struct ObservableInner<T> {
    value: T,
    version: u64,
    /// Dead entries are pruned on notify.
    subscribers: Vec<CallbackWeak<T>>,
}

/// A shared, version-tracked value with change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** state.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Set a new value, notifying subscribers if it differs from the current one.
    pub fn set(&self, value: T) {
        let old = {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.version += 1;
            std::mem::replace(&mut inner.value, value)
        };
        self.notify(&old);
    }

    /// Modify the value in place. Subscribers are notified if the value
    /// changed compared to a snapshot taken before `f` ran.
    ///
    /// `f` must not access this observable.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let (old, result) = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.value.clone();
            let result = f(&mut inner.value);
            if inner.value == old {
                return result;
            }
            inner.version += 1;
            (old, result)
        };
        self.notify(&old);
        result
    }

    /// Subscribe to changes. The callback receives `(old, new)`.
    pub fn subscribe(&self, callback: impl Fn(&T, &T) + 'static) -> Subscription {
        let active = Rc::new(Cell::new(true));
        let gate = Rc::clone(&active);
        let strong: CallbackRc<T> = Rc::new(move |old: &T, new: &T| {
            if gate.get() {
                callback(old, new);
            }
        });
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        Subscription {
            active,
            _guard: Box::new(strong),
        }
    }

    /// Current version; increments by 1 on each value-changing mutation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of registered subscribers, including dead ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Whether both handles share the same state.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self, old: &T) {
        let callbacks: Vec<CallbackRc<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            inner
                .subscribers
                .iter()
                .filter_map(Weak::upgrade)
                .collect()
        };
        let (new, version) = {
            let inner = self.inner.borrow();
            (inner.value.clone(), inner.version)
        };
        for callback in &callbacks {
            // A nested mutation has already notified everyone with the newer value.
            if self.version() != version {
                break;
            }
            callback(old, &new);
        }
    }
}

/// RAII guard for a subscriber callback.
///
/// Dropping the guard (or calling [`cancel`](Self::cancel)) deactivates the
/// callback immediately and releases it.
pub struct Subscription {
    active: Rc<Cell<bool>>,
    /// Type-erased strong reference keeping the callback alive.
    _guard: Box<dyn std::any::Any>,
}

impl Subscription {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Explicit unsubscribe; equivalent to dropping the guard.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.set(false);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.active.get())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_and_version() {
        let obs = Observable::new(42);
        assert_eq!(obs.get(), 42);
        obs.set(42);
        assert_eq!(obs.version(), 0);
        obs.set(7);
        assert_eq!((obs.get(), obs.version()), (7, 1));
    }

    #[test]
    fn subscribers_receive_old_and_new() {
        let obs = Observable::new(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let _sub = obs.subscribe(move |old, new| log.borrow_mut().push((*old, *new)));
        obs.set(2);
        obs.update(|v| *v += 3);
        obs.update(|_| {});
        assert_eq!(*seen.borrow(), vec![(1, 2), (2, 5)]);
    }

    #[test]
    fn dropped_subscription_is_silent() {
        let obs = Observable::new(0);
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = obs.subscribe(move |_, _| c.set(c.get() + 1));
        obs.set(1);
        drop(sub);
        obs.set(2);
        assert_eq!(count.get(), 1);
        assert_eq!(obs.subscriber_count(), 0);
    }

    #[test]
    fn cancel_during_notification_suppresses_pending_callback() {
        let obs = Observable::new(0);
        let second: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let fired = Rc::new(Cell::new(false));

        let slot = Rc::clone(&second);
        let _first = obs.subscribe(move |_, _| {
            // Cancel the second subscriber while this cycle is in flight.
            slot.borrow_mut().take();
        });
        let flag = Rc::clone(&fired);
        *second.borrow_mut() = Some(obs.subscribe(move |_, _| flag.set(true)));

        obs.set(1);
        assert!(!fired.get());
    }

    #[test]
    fn reentrant_set_from_subscriber() {
        let obs = Observable::new(0);
        let handle = obs.clone();
        let _sub = obs.subscribe(move |_, new| {
            if *new < 3 {
                handle.set(new + 1);
            }
        });
        obs.set(1);
        assert_eq!(obs.get(), 3);
        assert_eq!(obs.version(), 3);
    }

    #[test]
    fn reentrant_set_delivers_latest_to_later_subscribers() {
        let obs = Observable::new(0);
        let handle = obs.clone();
        let _clamp = obs.subscribe(move |_, new| {
            if *new > 10 {
                handle.set(10);
            }
        });
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let _later = obs.subscribe(move |old, new| log.borrow_mut().push((*old, *new)));

        obs.set(15);
        assert_eq!(obs.get(), 10);
        assert_eq!(*seen.borrow(), vec![(15, 10)]);
        assert_eq!(seen.borrow().last().map(|pair| pair.1), Some(obs.get()));
    }

    #[test]
    fn clones_share_state() {
        let a = Observable::new(String::from("x"));
        let b = a.clone();
        b.set("y".into());
        assert_eq!(a.get(), "y");
        assert!(a.ptr_eq(&b));
    }
}
