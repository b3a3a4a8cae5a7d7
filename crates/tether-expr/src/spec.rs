#![forbid(unsafe_code)]

//! Specification tree describing what a binding type accepts.
//!
//! A [`BindingSpecification`] is built once per binding type, usually from a
//! static table (all types here are `serde` serializable so tables can live in
//! JSON), and shared by every binding of that type.
//!
//! ```text
//! BindingSpecification
//! ├── target: BindingTargetSpecification ── TypePattern
//! └── expression: BindingExpressionSpecification
//!     ├── expression_type: ExpressionType
//!     ├── array_item: BindingExpressionSpecification
//!     └── attributes: name → BindingAttributeSpecification
//!                              └── expression: BindingExpressionSpecification
//! ```

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::ExpressionType;
use crate::value::Value;

// ----------------------------------------------------------------------------
// Type patterns
// ----------------------------------------------------------------------------

/// Type identity of a binding target: its type name plus the names of the
/// types it derives from or conforms to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetKind {
    pub type_name: String,
    pub supertypes: Vec<String>,
}

impl TargetKind {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            supertypes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_supertype(mut self, name: impl Into<String>) -> Self {
        self.supertypes.push(name.into());
        self
    }

    /// The type name followed by all super types.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.type_name.as_str()).chain(self.supertypes.iter().map(String::as_str))
    }
}

/// Predicate over type identities and value types.
///
/// Rejections win over acceptances. An empty accept set accepts everything
/// not rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypePattern {
    pub accepted_types: BTreeSet<String>,
    pub rejected_types: BTreeSet<String>,
    pub accepted_value_types: BTreeSet<String>,
    pub rejected_value_types: BTreeSet<String>,
}

impl TypePattern {
    /// Pattern accepting exactly the given types (and their subtypes).
    #[must_use]
    pub fn accepting<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted_types: types.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn rejecting_type(mut self, name: impl Into<String>) -> Self {
        self.rejected_types.insert(name.into());
        self
    }

    #[must_use]
    pub fn accepting_value_type(mut self, name: impl Into<String>) -> Self {
        self.accepted_value_types.insert(name.into());
        self
    }

    #[must_use]
    pub fn matches_type(&self, kind: &TargetKind) -> bool {
        if kind.names().any(|name| self.rejected_types.contains(name)) {
            return false;
        }
        self.accepted_types.is_empty() || kind.names().any(|name| self.accepted_types.contains(name))
    }

    /// Match on [`Value::type_name`].
    #[must_use]
    pub fn matches_value(&self, value: &Value) -> bool {
        let name = value.type_name();
        if self.rejected_value_types.contains(name) {
            return false;
        }
        self.accepted_value_types.is_empty() || self.accepted_value_types.contains(name)
    }
}

// ----------------------------------------------------------------------------
// Attributes
// ----------------------------------------------------------------------------

/// How a binding consumes one of its attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeUse {
    /// Evaluate the primary once and store the value.
    #[default]
    AssignValue,
    /// Store the expression itself, unevaluated.
    AssignExpression,
    /// Create a nested binding that keeps the property in sync.
    BindToProperty,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingAttributeSpecification {
    pub required: bool,
    pub attribute_use: AttributeUse,
    /// Configuration slot the attribute is applied to; defaults to the
    /// attribute name.
    pub binding_property: Option<String>,
    pub expression: BindingExpressionSpecification,
    /// Provider used for `BindToProperty` attributes; `None` uses a plain
    /// property binding.
    pub provider: Option<String>,
}

impl BindingAttributeSpecification {
    #[must_use]
    pub fn new(expression: BindingExpressionSpecification) -> Self {
        Self {
            expression,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_use(mut self, attribute_use: AttributeUse) -> Self {
        self.attribute_use = attribute_use;
        self
    }

    #[must_use]
    pub fn with_binding_property(mut self, property: impl Into<String>) -> Self {
        self.binding_property = Some(property.into());
        self
    }

    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

// ----------------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingExpressionSpecification {
    pub expression_type: ExpressionType,
    pub attributes: IndexMap<String, BindingAttributeSpecification>,
    /// Schema for each element of an array primary. `None` accepts any item.
    pub array_item: Option<Box<BindingExpressionSpecification>>,
    pub allow_unknown_attributes: bool,
    /// Whether an expression without a primary part is rejected.
    pub require_primary: bool,
    /// Enumeration used to check unqualified `$enum.Value` constants.
    pub enumeration_type: Option<String>,
}

impl Default for BindingExpressionSpecification {
    fn default() -> Self {
        Self {
            expression_type: ExpressionType::ANY,
            attributes: IndexMap::new(),
            array_item: None,
            allow_unknown_attributes: false,
            require_primary: false,
            enumeration_type: None,
        }
    }
}

impl BindingExpressionSpecification {
    #[must_use]
    pub fn new(expression_type: ExpressionType) -> Self {
        Self {
            expression_type,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, spec: BindingAttributeSpecification) -> Self {
        self.attributes.insert(name.into(), spec);
        self
    }

    #[must_use]
    pub fn with_array_item(mut self, spec: BindingExpressionSpecification) -> Self {
        self.array_item = Some(Box::new(spec));
        self
    }

    #[must_use]
    pub fn allowing_unknown_attributes(mut self) -> Self {
        self.allow_unknown_attributes = true;
        self
    }

    #[must_use]
    pub fn requiring_primary(mut self) -> Self {
        self.require_primary = true;
        self
    }

    #[must_use]
    pub fn with_enumeration_type(mut self, type_name: impl Into<String>) -> Self {
        self.enumeration_type = Some(type_name.into());
        self
    }
}

// ----------------------------------------------------------------------------
// Bindings
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingTargetSpecification {
    pub type_pattern: TypePattern,
}

/// Everything known about one binding type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingSpecification {
    /// Registry key of the provider instantiating this binding type.
    pub binding_type: String,
    #[serde(default)]
    pub target: BindingTargetSpecification,
    #[serde(default)]
    pub expression: BindingExpressionSpecification,
}

impl BindingSpecification {
    #[must_use]
    pub fn new(binding_type: impl Into<String>, expression: BindingExpressionSpecification) -> Self {
        Self {
            binding_type: binding_type.into(),
            target: BindingTargetSpecification::default(),
            expression,
        }
    }

    #[must_use]
    pub fn with_target(mut self, type_pattern: TypePattern) -> Self {
        self.target = BindingTargetSpecification { type_pattern };
        self
    }
}
