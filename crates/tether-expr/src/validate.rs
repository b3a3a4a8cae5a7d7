#![forbid(unsafe_code)]

//! Semantic phase: check a parsed expression against its specification.
//!
//! Validation walks the expression and the specification tree side by side.
//! It returns a normalized copy of the input: unqualified key paths accepted
//! only as data-context paths are rewritten to `$data` paths, so later stages
//! never see an unqualified path where the specification did not allow one.
//!
//! # Check order
//!
//! For every node, in this order:
//!
//! 1. primary presence (`require_primary`)
//! 2. primary classification against `expression_type`, with widening
//! 3. array items against `array_item`, reported as `[i]` path steps
//! 4. `$enum` / `$options` constants against the [`TypeRegistry`]
//! 5. attributes: unknown names, then each nested expression
//! 6. required attributes that are absent
//!
//! The first failure wins and carries the [`AttributePath`] of the node.

use crate::error::{AttributePath, PathSegment, SchemaErrorKind, SchemaValidationError};
use crate::expression::{BindingExpression, PrimaryExpression};
use crate::key_path::KeyPathScope;
use crate::registry::TypeRegistry;
use crate::spec::BindingExpressionSpecification;
use crate::types::ExpressionType;

/// Options applied on top of every specification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Accept attributes no specification declares.
    pub allow_unknown_attributes: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Validator<'r> {
    options: ValidationOptions,
    registry: Option<&'r TypeRegistry>,
}

impl<'r> Validator<'r> {
    #[must_use]
    pub fn new(options: ValidationOptions) -> Self {
        Self {
            options,
            registry: None,
        }
    }

    /// Check `$enum` / `$options` constants against `registry`.
    #[must_use]
    pub fn with_registry(mut self, registry: &'r TypeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validate `expr`, returning its normalized form.
    pub fn validate(
        &self,
        expr: &BindingExpression,
        spec: &BindingExpressionSpecification,
    ) -> Result<BindingExpression, SchemaValidationError> {
        let mut normalized = expr.clone();
        let mut path = AttributePath::root();
        self.check(&mut normalized, spec, &mut path).inspect_err(|err| {
            tracing::debug!(error = %err, expression = %expr, "schema validation failed");
        })?;
        Ok(normalized)
    }

    fn check(
        &self,
        expr: &mut BindingExpression,
        spec: &BindingExpressionSpecification,
        path: &mut AttributePath,
    ) -> Result<(), SchemaValidationError> {
        let fail = |path: &AttributePath, kind: SchemaErrorKind| -> Result<(), SchemaValidationError> {
            Err(SchemaValidationError::new(path.clone(), kind))
        };

        match expr.primary_mut() {
            None if spec.require_primary => return fail(path, SchemaErrorKind::MissingPrimary),
            None => {}
            Some(primary) => {
                let found = primary.expression_type();
                let Some(accepted) = found.accepted_as(spec.expression_type) else {
                    return fail(
                        path,
                        SchemaErrorKind::PrimaryTypeMismatch {
                            found,
                            allowed: spec.expression_type,
                        },
                    );
                };
                match primary {
                    PrimaryExpression::KeyPath { scope, .. } => {
                        if *scope == KeyPathScope::Unqualified
                            && accepted == ExpressionType::DATA_CONTEXT_KEY_PATH
                        {
                            *scope = KeyPathScope::DataContext;
                        }
                    }
                    PrimaryExpression::Array(items) => {
                        if let Some(item_spec) = &spec.array_item {
                            for (index, item) in items.iter_mut().enumerate() {
                                path.push(PathSegment::Index(index));
                                self.check(item, item_spec, path)?;
                                path.pop();
                            }
                        }
                    }
                    PrimaryExpression::Constant(value) => {
                        if let Some(registry) = self.registry {
                            if let Err(kind) = registry.check(value, spec.enumeration_type.as_deref()) {
                                return fail(path, kind);
                            }
                        }
                    }
                }
            }
        }

        let allow_unknown = spec.allow_unknown_attributes || self.options.allow_unknown_attributes;
        for (name, value) in expr.attributes_mut().iter_mut() {
            match spec.attributes.get(name) {
                Some(attribute) => {
                    path.push(PathSegment::Attribute(name.clone()));
                    self.check(value, &attribute.expression, path)?;
                    path.pop();
                }
                None if allow_unknown => {}
                None => return fail(path, SchemaErrorKind::UnknownAttribute(name.clone())),
            }
        }

        if let Some((name, _)) = spec
            .attributes
            .iter()
            .find(|(name, attribute)| attribute.required && !expr.attributes().contains_key(*name))
        {
            return fail(path, SchemaErrorKind::MissingRequiredAttribute(name.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::BindingAttributeSpecification;
    use crate::value::Value;

    fn text_spec() -> BindingExpressionSpecification {
        BindingExpressionSpecification::new(ExpressionType::STRING)
            .with_attribute(
                "placeholder",
                BindingAttributeSpecification::new(BindingExpressionSpecification::new(
                    ExpressionType::STRING_CONSTANT,
                )),
            )
            .with_attribute(
                "maxLength",
                BindingAttributeSpecification::new(BindingExpressionSpecification::new(
                    ExpressionType::INTEGER,
                )),
            )
    }

    fn validate(text: &str, spec: &BindingExpressionSpecification) -> Result<BindingExpression, SchemaValidationError> {
        let expr = BindingExpression::parse(text).unwrap();
        Validator::default().validate(&expr, spec)
    }

    #[test]
    fn unqualified_path_normalized_to_data_context() {
        let expr = validate("model.name", &text_spec()).unwrap();
        assert_eq!(
            expr.primary(),
            Some(&PrimaryExpression::key_path(KeyPathScope::DataContext, "model.name"))
        );
    }

    #[test]
    fn unqualified_path_kept_when_allowed() {
        let spec = BindingExpressionSpecification::default();
        let expr = validate("model.name", &spec).unwrap();
        assert_eq!(expr.expression_type(), Some(ExpressionType::UNQUALIFIED_KEY_PATH));
    }

    #[test]
    fn primary_type_mismatch() {
        let err = validate("42", &text_spec()).unwrap_err();
        assert!(err.path.is_root());
        assert!(matches!(
            err.kind,
            SchemaErrorKind::PrimaryTypeMismatch { found, .. } if found == ExpressionType::INTEGER_CONSTANT
        ));
    }

    #[test]
    fn nested_attribute_mismatch_reports_path() {
        let err = validate("name { maxLength: \"ten\" }", &text_spec()).unwrap_err();
        assert_eq!(err.path.to_string(), "maxLength");
        assert!(matches!(err.kind, SchemaErrorKind::PrimaryTypeMismatch { .. }));
    }

    #[test]
    fn unknown_attribute_rejected_unless_allowed() {
        let err = validate("name { color: 1 }", &text_spec()).unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::UnknownAttribute("color".into()));

        let lenient = Validator::new(ValidationOptions {
            allow_unknown_attributes: true,
        });
        let expr = BindingExpression::parse("name { color: 1 }").unwrap();
        assert!(lenient.validate(&expr, &text_spec()).is_ok());
        assert!(validate("name { color: 1 }", &text_spec().allowing_unknown_attributes()).is_ok());
    }

    #[test]
    fn missing_required_attribute() {
        let spec = BindingExpressionSpecification::new(ExpressionType::ANY_KEY_PATH).with_attribute(
            "format",
            BindingAttributeSpecification::new(BindingExpressionSpecification::new(ExpressionType::CLASS_CONSTANT))
                .required(),
        );
        let err = validate("$data.amount", &spec).unwrap_err();
        assert_eq!(err.attribute_name(), Some("format"));
        assert!(validate("$data.amount { format: <Currency> }", &spec).is_ok());
    }

    #[test]
    fn missing_primary() {
        let spec = text_spec().requiring_primary();
        let err = validate("{ placeholder: \"x\" }", &spec).unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::MissingPrimary);
    }

    #[test]
    fn array_items_report_index() {
        let spec = BindingExpressionSpecification::new(ExpressionType::ARRAY)
            .with_array_item(BindingExpressionSpecification::new(ExpressionType::STRING_CONSTANT));
        assert!(validate("[\"a\", \"b\"]", &spec).is_ok());
        let err = validate("[\"a\", 2]", &spec).unwrap_err();
        assert_eq!(err.path.to_string(), "[1]");
    }

    #[test]
    fn integer_widens_into_double_slot() {
        let spec = BindingExpressionSpecification::new(ExpressionType::DOUBLE);
        let expr = validate("3", &spec).unwrap();
        assert_eq!(expr.constant_value(), Some(&Value::Integer(3)));
    }

    #[test]
    fn enum_constants_checked_against_registry() {
        let mut registry = TypeRegistry::new();
        registry.register_enumeration("Alignment", ["Left", "Right"]);
        let spec = BindingExpressionSpecification::new(ExpressionType::ENUM_CONSTANT)
            .with_enumeration_type("Alignment");
        let validator = Validator::default().with_registry(&registry);

        let ok = BindingExpression::parse("$enum.Left").unwrap();
        assert!(validator.validate(&ok, &spec).is_ok());

        let bad = BindingExpression::parse("$enum.Alignment.Middle").unwrap();
        let err = validator.validate(&bad, &spec).unwrap_err();
        assert!(matches!(err.kind, SchemaErrorKind::UnknownEnumerationValue { .. }));
    }
}
