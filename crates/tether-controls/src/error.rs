#![forbid(unsafe_code)]

use tether_runtime::BindingError;

use crate::control::ControlId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("unknown control {0}")]
    UnknownControl(ControlId),
    #[error("{0} is not a composite control")]
    NotComposite(ControlId),
    #[error("index {index} out of range for {parent} with {len} controls")]
    IndexOutOfRange {
        parent: ControlId,
        index: usize,
        len: usize,
    },
    #[error("the root control cannot be removed")]
    RootControl,
    #[error("binding for control '{control}' failed: {source}")]
    Binding {
        control: String,
        #[source]
        source: BindingError,
    },
}
