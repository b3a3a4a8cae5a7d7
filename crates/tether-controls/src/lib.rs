#![forbid(unsafe_code)]

//! Composite controls for tether.
//!
//! A [`CompositeControl`] groups bound controls into a tree, routes every
//! binding event to one [`ControlDelegate`] tagged with the originating
//! control, and orders controls for keyboard activation.
//!
//! # Example
//!
//! ```
//! use tether_controls::{CompositeControl, Control};
//!
//! let mut form = CompositeControl::new("form");
//! let root = form.root();
//! let address = form.add_control(root, Control::composite("address")).unwrap();
//! form.add_control(address, Control::leaf("street")).unwrap();
//! assert_eq!(form.controls(root).unwrap(), &[address]);
//! // Leaves without a binding never take part in activation.
//! assert!(form.activation_sequence().is_empty());
//! ```

pub mod composite;
pub mod control;
pub mod delegate;
pub mod enumerate;
pub mod error;

pub use composite::CompositeControl;
pub use control::{ActivationEvent, ActivationPolicy, Control, ControlId, ControlKind, ControlNode};
pub use delegate::ControlDelegate;
pub use enumerate::{BindingDeclaration, BindingTargetEnumerator, OutletCollection, StaticTableView, ViewNode};
pub use error::ControlError;
