#![forbid(unsafe_code)]

//! Enumeration and option types referenced by `$enum` / `$options` constants.
//!
//! The registry is an explicit value built at startup and passed to the
//! validator; there is no process-wide table. Binding providers add their
//! types through `register_enumeration_and_option_types`.

use ahash::AHashMap;

use crate::error::SchemaErrorKind;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    enumerations: AHashMap<String, Vec<String>>,
    options: AHashMap<String, Vec<String>>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or extend) an enumeration type.
    pub fn register_enumeration<I, S>(&mut self, type_name: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.enumerations.entry(type_name.to_owned()).or_default();
        for value in values {
            let value = value.into();
            if !entry.contains(&value) {
                entry.push(value);
            }
        }
        tracing::debug!(type_name, members = entry.len(), "registered enumeration type");
    }

    /// Register (or extend) an option set type.
    pub fn register_options<I, S>(&mut self, type_name: &str, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.options.entry(type_name.to_owned()).or_default();
        for flag in flags {
            let flag = flag.into();
            if !entry.contains(&flag) {
                entry.push(flag);
            }
        }
        tracing::debug!(type_name, flags = entry.len(), "registered option type");
    }

    #[must_use]
    pub fn enumeration(&self, type_name: &str) -> Option<&[String]> {
        self.enumerations.get(type_name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn options(&self, type_name: &str) -> Option<&[String]> {
        self.options.get(type_name).map(Vec::as_slice)
    }

    /// Check an `$enum` or `$options` constant against the registered types.
    ///
    /// `expected_type` names the enumeration to use for unqualified `$enum`
    /// constants. Other values pass unchecked.
    pub fn check(&self, value: &Value, expected_type: Option<&str>) -> Result<(), SchemaErrorKind> {
        match value {
            Value::Enum { type_name, value } => {
                let Some(type_name) = type_name.as_deref().or(expected_type) else {
                    // An unqualified member without context cannot be checked.
                    return Ok(());
                };
                let members = self
                    .enumeration(type_name)
                    .ok_or_else(|| SchemaErrorKind::UnknownEnumerationType(type_name.to_owned()))?;
                if members.iter().any(|m| m == value) {
                    Ok(())
                } else {
                    Err(SchemaErrorKind::UnknownEnumerationValue {
                        type_name: type_name.to_owned(),
                        value: value.clone(),
                    })
                }
            }
            Value::Options { type_name, flags } => {
                let known = self
                    .options(type_name)
                    .ok_or_else(|| SchemaErrorKind::UnknownEnumerationType(type_name.clone()))?;
                match flags.iter().find(|flag| !known.contains(flag)) {
                    None => Ok(()),
                    Some(flag) => Err(SchemaErrorKind::UnknownEnumerationValue {
                        type_name: type_name.clone(),
                        value: flag.clone(),
                    }),
                }
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register_enumeration("Alignment", ["Left", "Center", "Right"]);
        registry.register_options("Edges", ["Top", "Left", "Bottom", "Right"]);
        registry
    }

    #[test]
    fn registration_is_additive() {
        let mut registry = registry();
        registry.register_enumeration("Alignment", ["Center", "Justified"]);
        assert_eq!(registry.enumeration("Alignment").map(<[String]>::len), Some(4));
    }

    #[test]
    fn checks_enum_members() {
        let registry = registry();
        let center = Value::Enum {
            type_name: Some("Alignment".into()),
            value: "Center".into(),
        };
        assert_eq!(registry.check(&center, None), Ok(()));

        let bogus = Value::Enum {
            type_name: None,
            value: "Middle".into(),
        };
        assert_eq!(registry.check(&bogus, None), Ok(()));
        assert!(matches!(
            registry.check(&bogus, Some("Alignment")),
            Err(SchemaErrorKind::UnknownEnumerationValue { .. })
        ));

        let unknown_type = Value::Enum {
            type_name: Some("Gravity".into()),
            value: "Down".into(),
        };
        assert_eq!(
            registry.check(&unknown_type, None),
            Err(SchemaErrorKind::UnknownEnumerationType("Gravity".into()))
        );
    }

    #[test]
    fn checks_option_flags() {
        let registry = registry();
        let ok = Value::Options {
            type_name: "Edges".into(),
            flags: vec!["Top".into(), "Left".into()],
        };
        assert_eq!(registry.check(&ok, None), Ok(()));
        let bad = Value::Options {
            type_name: "Edges".into(),
            flags: vec!["Middle".into()],
        };
        assert!(registry.check(&bad, None).is_err());
    }
}
