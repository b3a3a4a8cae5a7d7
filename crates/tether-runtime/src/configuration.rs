#![forbid(unsafe_code)]

//! Attribute application.
//!
//! When a provider builds a binding, each attribute of the validated
//! expression is applied according to its [`AttributeUse`]:
//!
//! | Use | Stored as |
//! |-----|-----------|
//! | `AssignValue` | [`ConfigurationValue::Value`], evaluated once |
//! | `AssignExpression` | [`ConfigurationValue::Expression`], unevaluated |
//! | `BindToProperty` | [`ConfigurationValue::Bound`], a slot kept in sync by a nested binding |
//!
//! Entries are keyed by the attribute's `binding_property`, or by the
//! attribute name when none is declared. Attributes absent from the
//! specification (accepted through `allow_unknown_attributes`) are applied
//! as `AssignValue`.

use std::rc::Weak;

use indexmap::IndexMap;
use tether_expr::{
    AttributeUse, BindingAttributeSpecification, BindingExpression, BindingExpressionSpecification,
    ExpressionError, TargetKind, Value,
};
use tracing::trace;

use crate::binding::Binding;
use crate::context::BindingContext;
use crate::delegate::BindingDelegate;
use crate::error::{BindingError, ConstructionError};
use crate::observable::Observable;
use crate::property::ObservableProperty;
use crate::provider::{BindingProviderRegistry, BindingRequest};

/// Type name nested attribute bindings report for their slot target.
pub const CONFIGURATION_SLOT_TYPE: &str = "ConfigurationSlot";

#[derive(Debug, Clone)]
pub enum ConfigurationValue {
    Value(Value),
    Expression(BindingExpression),
    /// Live slot written by an attribute binding.
    Bound(Observable<Value>),
}

impl ConfigurationValue {
    /// Current value; `None` for unevaluated expressions.
    #[must_use]
    pub fn current(&self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value.clone()),
            Self::Expression(_) => None,
            Self::Bound(slot) => Some(slot.get()),
        }
    }
}

/// Named values a binding was configured with.
#[derive(Debug, Clone, Default)]
pub struct BindingConfiguration {
    entries: IndexMap<String, ConfigurationValue>,
}

impl BindingConfiguration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ConfigurationValue) -> Option<ConfigurationValue> {
        self.entries.insert(name.into(), value)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConfigurationValue> {
        self.entries.get(name)
    }

    /// Current value of an assigned or bound entry.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<Value> {
        self.get(name).and_then(ConfigurationValue::current)
    }

    #[must_use]
    pub fn expression(&self, name: &str) -> Option<&BindingExpression> {
        match self.get(name)? {
            ConfigurationValue::Expression(expr) => Some(expr),
            _ => None,
        }
    }

    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&Observable<Value>> {
        match self.get(name)? {
            ConfigurationValue::Bound(slot) => Some(slot),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigurationValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Result of applying an expression's attributes.
#[derive(Debug, Default)]
pub struct AppliedAttributes {
    pub configuration: BindingConfiguration,
    /// Un-started nested bindings for `BindToProperty` attributes.
    pub bindings: Vec<Binding>,
}

/// Apply every attribute of `expression` as declared by `spec`.
///
/// `providers` resolves attributes that name a provider; without it such an
/// attribute fails with [`ConstructionError::UnknownBindingType`].
pub fn apply_attributes(
    expression: &BindingExpression,
    spec: &BindingExpressionSpecification,
    context: &BindingContext,
    providers: Option<&BindingProviderRegistry>,
    delegate: Option<&Weak<dyn BindingDelegate>>,
) -> Result<AppliedAttributes, ConstructionError> {
    let mut applied = AppliedAttributes::default();
    let passthrough = BindingAttributeSpecification::default();

    for (name, attribute) in expression.attributes() {
        let attribute_spec = spec.attributes.get(name).unwrap_or(&passthrough);
        let key = attribute_spec.binding_property.as_deref().unwrap_or(name);
        let entry = match attribute_spec.attribute_use {
            AttributeUse::AssignValue if attribute.primary().is_some() => {
                ConfigurationValue::Value(context.evaluate(attribute))
            }
            AttributeUse::AssignValue | AttributeUse::AssignExpression => {
                ConfigurationValue::Expression(attribute.clone())
            }
            AttributeUse::BindToProperty => {
                let slot = Observable::new(context.evaluate(attribute));
                let binding = bind_attribute(name, key, attribute, attribute_spec, &slot, context, providers, delegate)
                    .map_err(|source| ConstructionError::Attribute {
                        name: name.clone(),
                        source: Box::new(source),
                    })?;
                applied.bindings.push(binding);
                ConfigurationValue::Bound(slot)
            }
        };
        trace!(attribute = %name, key, use_ = ?attribute_spec.attribute_use, "applied attribute");
        applied.configuration.insert(key, entry);
    }
    Ok(applied)
}

#[allow(clippy::too_many_arguments)]
fn bind_attribute(
    name: &str,
    key: &str,
    attribute: &BindingExpression,
    attribute_spec: &BindingAttributeSpecification,
    slot: &Observable<Value>,
    context: &BindingContext,
    providers: Option<&BindingProviderRegistry>,
    delegate: Option<&Weak<dyn BindingDelegate>>,
) -> Result<Binding, ConstructionError> {
    let target = ObservableProperty::shared(slot.clone(), key);
    match &attribute_spec.provider {
        Some(provider_name) => {
            let registry = providers.ok_or_else(|| ConstructionError::UnknownBindingType(provider_name.clone()))?;
            let provider = registry
                .provider(provider_name)
                .ok_or_else(|| ConstructionError::UnknownBindingType(provider_name.clone()))?;
            let validated = registry
                .validate(provider_name, attribute)
                .map_err(|err| match err {
                    BindingError::Expression(ExpressionError::Schema(schema)) => {
                        ConstructionError::Schema(schema.under_attribute(name))
                    }
                    BindingError::Expression(other) => ConstructionError::Provider(other.to_string()),
                    BindingError::Construction(other) => other,
                })?;
            provider.create_binding(BindingRequest {
                target,
                target_kind: TargetKind::new(CONFIGURATION_SLOT_TYPE),
                expression: validated,
                context: context.clone(),
                delegate: delegate.cloned(),
                providers: registry,
            })
        }
        None => Ok(Binding::builder(context.source_property(attribute)?, target)
            .binding_type(format!("attribute:{name}"))
            .delegate(delegate.cloned())
            .expression(attribute.clone())
            .build()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_expr::{BindingSpecification, ExpressionType, KeyPath, SchemaErrorKind, Validator};

    fn spec() -> BindingExpressionSpecification {
        BindingExpressionSpecification::new(ExpressionType::ANY_KEY_PATH)
            .with_attribute(
                "placeholder",
                BindingAttributeSpecification::new(BindingExpressionSpecification::new(ExpressionType::ANY))
                    .with_binding_property("placeholderText"),
            )
            .with_attribute(
                "format",
                BindingAttributeSpecification::new(BindingExpressionSpecification::new(ExpressionType::ANY))
                    .with_use(AttributeUse::AssignExpression),
            )
            .with_attribute(
                "enabled",
                BindingAttributeSpecification::new(BindingExpressionSpecification::new(ExpressionType::ANY))
                    .with_use(AttributeUse::BindToProperty),
            )
    }

    fn context() -> BindingContext {
        BindingContext::new(Observable::new(Value::from(serde_json::json!({
            "name": "Ann",
            "hint": "Your name",
            "editable": true,
        }))))
    }

    #[test]
    fn applies_each_attribute_use() {
        let ctx = context();
        let expr = BindingExpression::parse("name { placeholder: hint, format: $enum.Style.Short, enabled: editable }")
            .unwrap();
        let expr = Validator::default().validate(&expr, &spec()).unwrap();
        let applied = apply_attributes(&expr, &spec(), &ctx, None, None).unwrap();

        let config = &applied.configuration;
        assert_eq!(config.value("placeholderText"), Some(Value::from("Your name")));
        assert!(config.expression("format").is_some());
        assert_eq!(config.value("enabled"), Some(Value::Bool(true)));
        assert_eq!(applied.bindings.len(), 1);
    }

    #[test]
    fn bound_attribute_tracks_its_source() {
        let ctx = context();
        let expr = BindingExpression::parse("name { enabled: editable }").unwrap();
        let applied = apply_attributes(&expr, &spec(), &ctx, None, None).unwrap();
        let binding = &applied.bindings[0];
        binding.start_observing_changes();

        ctx.data()
            .update(|tree| tree.assign(&KeyPath::parse("editable"), Value::Bool(false)))
            .unwrap();
        assert_eq!(applied.configuration.value("enabled"), Some(Value::Bool(false)));
    }

    #[test]
    fn unknown_provider_names_the_attribute() {
        let spec = BindingExpressionSpecification::new(ExpressionType::ANY).with_attribute(
            "items",
            BindingAttributeSpecification::new(BindingExpressionSpecification::new(ExpressionType::ANY))
                .with_use(AttributeUse::BindToProperty)
                .with_provider("list"),
        );
        let expr = BindingExpression::parse("name { items: hint }").unwrap();
        let err = apply_attributes(&expr, &spec, &context(), None, None).unwrap_err();
        assert_eq!(
            err,
            ConstructionError::Attribute {
                name: "items".into(),
                source: Box::new(ConstructionError::UnknownBindingType("list".into())),
            }
        );
    }

    #[test]
    fn provider_attribute_checked_against_its_provider() {
        let mut registry = BindingProviderRegistry::new();
        registry.register(crate::provider::PropertyBindingProvider::new(BindingSpecification::new(
            "list",
            BindingExpressionSpecification::new(ExpressionType::ANY_KEY_PATH).with_attribute(
                "limit",
                BindingAttributeSpecification::new(BindingExpressionSpecification::new(ExpressionType::INTEGER))
                    .required(),
            ),
        )));
        let spec = BindingExpressionSpecification::new(ExpressionType::ANY).with_attribute(
            "items",
            BindingAttributeSpecification::new(BindingExpressionSpecification::new(ExpressionType::ANY))
                .with_use(AttributeUse::BindToProperty)
                .with_provider("list"),
        );

        let expr = BindingExpression::parse("name { items: hint }").unwrap();
        let err = apply_attributes(&expr, &spec, &context(), Some(&registry), None).unwrap_err();
        let schema = err.as_schema_error().unwrap();
        assert_eq!(schema.kind, SchemaErrorKind::MissingRequiredAttribute("limit".into()));
        assert_eq!(schema.path.to_string(), "items");
        assert!(matches!(&err, ConstructionError::Attribute { name, .. } if name == "items"));

        let expr = BindingExpression::parse("name { items: hint { limit: 3 } }").unwrap();
        let applied = apply_attributes(&expr, &spec, &context(), Some(&registry), None).unwrap();
        assert_eq!(applied.bindings.len(), 1);
        assert_eq!(applied.bindings[0].binding_type(), "list");
    }
}
