#![forbid(unsafe_code)]

//! Binding providers and the registry that dispatches to them.
//!
//! A provider owns the [`BindingSpecification`] of one binding type and
//! turns validated expressions into [`Binding`]s. The registry is an
//! explicit object built at startup; nothing is registered globally.
//!
//! ```text
//! bind(type, text, target, context)
//!   ├─ provider lookup          → ConstructionError::UnknownBindingType
//!   ├─ target type pattern      → ConstructionError::TargetMismatch
//!   ├─ parse                    → ParseError
//!   ├─ validate (+ type registry) → SchemaValidationError
//!   ├─ provider.create_binding  → ConstructionError
//!   └─ start_observing_changes
//! ```
//!
//! No binding exists unless every step succeeded.

use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tether_expr::{
    BindingExpression, BindingSpecification, TargetKind, TypeRegistry, ValidationOptions, Validator,
};
use tracing::{debug, warn};

use crate::binding::{Binding, BindingBehavior, IdentityBehavior};
use crate::configuration::{BindingConfiguration, apply_attributes};
use crate::context::BindingContext;
use crate::delegate::BindingDelegate;
use crate::error::{BindingError, ConstructionError};
use crate::property::Property;

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Everything a provider needs to build one binding.
pub struct BindingRequest<'a> {
    pub target: Rc<dyn Property>,
    pub target_kind: TargetKind,
    /// Already validated against the provider's specification.
    pub expression: BindingExpression,
    pub context: BindingContext,
    pub delegate: Option<Weak<dyn BindingDelegate>>,
    /// For nested attribute bindings that name a provider.
    pub providers: &'a BindingProviderRegistry,
}

/// Factory for one binding type.
pub trait BindingProvider {
    fn specification(&self) -> &BindingSpecification;

    /// Build an un-started binding for a validated expression.
    fn create_binding(&self, request: BindingRequest<'_>) -> Result<Binding, ConstructionError>;

    /// Add the enumeration and option types this binding type understands.
    fn register_enumeration_and_option_types(&self, _types: &mut TypeRegistry) {}
}

/// Builds a behavior from the binding's applied configuration.
pub type BehaviorFactory = Box<dyn Fn(&BindingConfiguration) -> Box<dyn BindingBehavior>>;

/// Generic provider binding the expression's primary to the target.
///
/// Attributes are applied per specification; the optional behavior factory
/// supplies conversion and validation.
pub struct PropertyBindingProvider {
    specification: BindingSpecification,
    behavior: Option<BehaviorFactory>,
    enumerations: Vec<(String, Vec<String>)>,
    options: Vec<(String, Vec<String>)>,
}

impl fmt::Debug for PropertyBindingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBindingProvider")
            .field("binding_type", &self.specification.binding_type)
            .field("has_behavior", &self.behavior.is_some())
            .finish_non_exhaustive()
    }
}

impl PropertyBindingProvider {
    #[must_use]
    pub fn new(specification: BindingSpecification) -> Self {
        Self {
            specification,
            behavior: None,
            enumerations: Vec::new(),
            options: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_behavior<F, B>(mut self, factory: F) -> Self
    where
        F: Fn(&BindingConfiguration) -> B + 'static,
        B: BindingBehavior + 'static,
    {
        self.behavior = Some(Box::new(
            move |config: &BindingConfiguration| -> Box<dyn BindingBehavior> { Box::new(factory(config)) },
        ));
        self
    }

    #[must_use]
    pub fn with_enumeration<I, S>(mut self, type_name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enumerations
            .push((type_name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, type_name: impl Into<String>, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options
            .push((type_name.into(), flags.into_iter().map(Into::into).collect()));
        self
    }
}

impl BindingProvider for PropertyBindingProvider {
    fn specification(&self) -> &BindingSpecification {
        &self.specification
    }

    fn create_binding(&self, request: BindingRequest<'_>) -> Result<Binding, ConstructionError> {
        let source = request.context.source_property(&request.expression)?;
        let applied = apply_attributes(
            &request.expression,
            &self.specification.expression,
            &request.context,
            Some(request.providers),
            request.delegate.as_ref(),
        )?;
        let behavior: Box<dyn BindingBehavior> = match &self.behavior {
            Some(factory) => factory(&applied.configuration),
            None => Box::new(IdentityBehavior),
        };
        Ok(Binding::builder(source, request.target)
            .binding_type(self.specification.binding_type.clone())
            .boxed_behavior(behavior)
            .delegate(request.delegate)
            .configuration(applied.configuration)
            .attribute_bindings(applied.bindings)
            .expression(request.expression)
            .build())
    }

    fn register_enumeration_and_option_types(&self, types: &mut TypeRegistry) {
        for (name, values) in &self.enumerations {
            types.register_enumeration(name, values.iter().cloned());
        }
        for (name, flags) in &self.options {
            types.register_options(name, flags.iter().cloned());
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Binding target handed to [`BindingProviderRegistry::bind`].
#[derive(Debug, Clone)]
pub struct BindingTarget {
    pub property: Rc<dyn Property>,
    pub kind: TargetKind,
}

impl BindingTarget {
    #[must_use]
    pub fn new(property: Rc<dyn Property>, kind: TargetKind) -> Self {
        Self { property, kind }
    }
}

/// Providers keyed by binding type, plus the shared type registry.
#[derive(Default)]
pub struct BindingProviderRegistry {
    providers: IndexMap<String, Rc<dyn BindingProvider>>,
    types: TypeRegistry,
    options: ValidationOptions,
}

impl fmt::Debug for BindingProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingProviderRegistry")
            .field("binding_types", &self.providers.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl BindingProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_validation_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Register a provider under its binding type, replacing any previous one.
    pub fn register(&mut self, provider: impl BindingProvider + 'static) -> Option<Rc<dyn BindingProvider>> {
        self.register_shared(Rc::new(provider))
    }

    pub fn register_shared(&mut self, provider: Rc<dyn BindingProvider>) -> Option<Rc<dyn BindingProvider>> {
        provider.register_enumeration_and_option_types(&mut self.types);
        let binding_type = provider.specification().binding_type.clone();
        debug!(binding_type = %binding_type, "registered binding provider");
        let previous = self.providers.insert(binding_type.clone(), provider);
        if previous.is_some() {
            warn!(binding_type = %binding_type, "replaced binding provider");
        }
        previous
    }

    #[must_use]
    pub fn provider(&self, binding_type: &str) -> Option<&Rc<dyn BindingProvider>> {
        self.providers.get(binding_type)
    }

    #[must_use]
    pub fn specification(&self, binding_type: &str) -> Option<&BindingSpecification> {
        self.provider(binding_type).map(|p| p.specification())
    }

    /// Binding types whose target pattern accepts `kind`, in registration order.
    pub fn find_for_target<'a>(&'a self, kind: &'a TargetKind) -> impl Iterator<Item = &'a str> + 'a {
        self.providers
            .iter()
            .filter(|(_, p)| p.specification().target.type_pattern.matches_type(kind))
            .map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    #[must_use]
    pub fn validation_options(&self) -> ValidationOptions {
        self.options
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn lookup(&self, binding_type: &str) -> Result<&Rc<dyn BindingProvider>, ConstructionError> {
        self.provider(binding_type)
            .ok_or_else(|| ConstructionError::UnknownBindingType(binding_type.to_owned()))
    }

    /// Validate an expression against a binding type's schema.
    pub fn validate(&self, binding_type: &str, expression: &BindingExpression) -> Result<BindingExpression, BindingError> {
        let provider = self.lookup(binding_type)?;
        let validated = Validator::new(self.options)
            .with_registry(&self.types)
            .validate(expression, &provider.specification().expression)?;
        Ok(validated)
    }

    /// Parse and validate expression text for a binding type.
    pub fn parse(&self, binding_type: &str, text: &str) -> Result<BindingExpression, BindingError> {
        self.lookup(binding_type)?;
        let expression = BindingExpression::parse(text)?;
        self.validate(binding_type, &expression)
    }

    /// Build an un-started binding from an unvalidated expression.
    pub fn create(
        &self,
        binding_type: &str,
        expression: &BindingExpression,
        target: BindingTarget,
        context: &BindingContext,
        delegate: Option<Weak<dyn BindingDelegate>>,
    ) -> Result<Binding, BindingError> {
        let provider = self.lookup(binding_type)?;
        let pattern = &provider.specification().target.type_pattern;
        if !pattern.matches_type(&target.kind) {
            return Err(ConstructionError::TargetMismatch {
                binding_type: binding_type.to_owned(),
                target_type: target.kind.type_name.clone(),
            }
            .into());
        }
        let validated = self.validate(binding_type, expression)?;
        let binding = provider.create_binding(BindingRequest {
            target: target.property,
            target_kind: target.kind,
            expression: validated,
            context: context.clone(),
            delegate,
            providers: self,
        })?;
        debug!(binding = %binding.id(), binding_type, expression = %expression, "created binding");
        Ok(binding)
    }

    /// Build and start a binding from an expression.
    pub fn bind_expression(
        &self,
        binding_type: &str,
        expression: &BindingExpression,
        target: BindingTarget,
        context: &BindingContext,
        delegate: Option<Weak<dyn BindingDelegate>>,
    ) -> Result<Binding, BindingError> {
        let binding = self.create(binding_type, expression, target, context, delegate)?;
        binding.start_observing_changes();
        Ok(binding)
    }

    /// Build and start a binding from expression text.
    pub fn bind(
        &self,
        binding_type: &str,
        text: &str,
        target: BindingTarget,
        context: &BindingContext,
        delegate: Option<Weak<dyn BindingDelegate>>,
    ) -> Result<Binding, BindingError> {
        self.lookup(binding_type)?;
        let expression = BindingExpression::parse(text).inspect_err(|err| {
            debug!(binding_type, error = %err, "binding expression did not parse");
        })?;
        self.bind_expression(binding_type, &expression, target, context, delegate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;
    use crate::observable::Observable;
    use crate::property::ObservableProperty;
    use tether_expr::{
        AttributeUse, BindingAttributeSpecification, BindingExpressionSpecification, ExpressionType,
        SchemaErrorKind, TypePattern, Value,
    };

    struct Suffix(String);

    impl BindingBehavior for Suffix {
        fn convert_source_to_target(&self, _: &Value, new: &Value) -> Result<Value, ConversionError> {
            Ok(Value::from(format!("{new}{}", self.0)))
        }
    }

    fn registry() -> BindingProviderRegistry {
        let spec = BindingSpecification::new(
            "text",
            BindingExpressionSpecification::new(ExpressionType::ANY_KEY_PATH | ExpressionType::STRING)
                .with_attribute(
                    "suffix",
                    BindingAttributeSpecification::new(BindingExpressionSpecification::new(ExpressionType::STRING)),
                ),
        )
        .with_target(TypePattern::accepting(["Label", "TextField"]));
        let mut registry = BindingProviderRegistry::new();
        registry.register(
            PropertyBindingProvider::new(spec)
                .with_behavior(|config| Suffix(config.value("suffix").map(|v| v.to_string()).unwrap_or_default()))
                .with_enumeration("Alignment", ["left", "right"]),
        );
        registry
    }

    fn target() -> (Observable<Value>, BindingTarget) {
        let slot = Observable::new(Value::Null);
        let target = BindingTarget::new(ObservableProperty::shared(slot.clone(), "label.text"), TargetKind::new("Label"));
        (slot, target)
    }

    #[test]
    fn bind_runs_the_full_pipeline() {
        let registry = registry();
        let context = BindingContext::new(Observable::new(Value::from(serde_json::json!({ "name": "Ann" }))));
        let (slot, target) = target();
        let binding = registry
            .bind("text", r#"name { suffix: "!" }"#, target, &context, None)
            .unwrap();
        assert!(binding.is_observing());
        assert_eq!(binding.binding_type(), "text");
        assert_eq!(slot.get(), Value::from("Ann!"));
        assert_eq!(registry.types().enumeration("Alignment").map(<[String]>::len), Some(2));
    }

    #[test]
    fn unknown_binding_type() {
        let registry = registry();
        let context = BindingContext::new(Observable::new(Value::Null));
        let (_, target) = target();
        let err = registry.bind("switch", "on", target, &context, None).unwrap_err();
        assert_eq!(
            err,
            BindingError::Construction(ConstructionError::UnknownBindingType("switch".into()))
        );
    }

    #[test]
    fn target_pattern_is_enforced() {
        let registry = registry();
        let context = BindingContext::new(Observable::new(Value::Null));
        let target = BindingTarget::new(
            ObservableProperty::shared(Observable::new(Value::Null), "slider"),
            TargetKind::new("Slider"),
        );
        assert!(matches!(
            registry.bind("text", "name", target, &context, None),
            Err(BindingError::Construction(ConstructionError::TargetMismatch { .. }))
        ));
        assert_eq!(
            registry.find_for_target(&TargetKind::new("TextField")).collect::<Vec<_>>(),
            vec!["text"]
        );
    }

    #[test]
    fn undeclared_attribute_constructs_nothing() {
        let registry = registry();
        let context = BindingContext::new(Observable::new(Value::Null));
        let (slot, target) = target();
        let err = registry
            .bind("text", "name { colour: \"red\" }", target, &context, None)
            .unwrap_err();
        assert_eq!(
            err.as_schema_error().map(|e| &e.kind),
            Some(&SchemaErrorKind::UnknownAttribute("colour".into()))
        );
        assert_eq!(slot.version(), 0);
    }

    #[test]
    fn global_override_passes_unknown_attributes_through() {
        let registry = registry().with_validation_options(ValidationOptions {
            allow_unknown_attributes: true,
        });
        let context = BindingContext::new(Observable::new(Value::Null));
        let (_, target) = target();
        let binding = registry
            .bind("text", "name { colour: \"red\" }", target, &context, None)
            .unwrap();
        assert_eq!(binding.configuration().value("colour"), Some(Value::from("red")));
    }

    #[test]
    fn attribute_binding_through_named_provider() {
        let mut registry = registry();
        let list = BindingSpecification::new(
            "form",
            BindingExpressionSpecification::new(ExpressionType::ANY_KEY_PATH).with_attribute(
                "title",
                BindingAttributeSpecification::new(BindingExpressionSpecification::new(ExpressionType::ANY_KEY_PATH))
                    .with_use(AttributeUse::BindToProperty)
                    .with_provider("text"),
            ),
        );
        registry.register(PropertyBindingProvider::new(list));
        let data = Observable::new(Value::from(serde_json::json!({ "rows": [], "caption": "Hi" })));
        let context = BindingContext::new(data);
        let (_, target) = target();
        let binding = registry
            .bind("form", "rows { title: caption }", target, &context, None)
            .unwrap();
        assert_eq!(binding.attribute_bindings().len(), 1);
        assert_eq!(binding.attribute_bindings()[0].binding_type(), "text");
        assert_eq!(binding.configuration().value("title"), Some(Value::from("Hi")));
        assert!(binding.attribute_bindings()[0].is_observing());
    }
}
