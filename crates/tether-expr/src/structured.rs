#![forbid(unsafe_code)]

//! Binding expressions from structured (dictionary) input.
//!
//! Declarations stored in JSON use the same shapes as the text grammar:
//!
//! | JSON | Expression |
//! |------|------------|
//! | string | parsed as expression text |
//! | number | integer or double constant |
//! | bool | boolean constant |
//! | array | array expression |
//! | null | empty expression |
//! | object | attributes; the reserved key `"$primary"` holds the primary |

use serde_json::Value as Json;

use crate::error::{ParseError, ParseErrorKind};
use crate::expression::{BindingExpression, PrimaryExpression};
use crate::key_path::KeyPath;
use crate::parser::{MAX_DEPTH, parse_expression};
use crate::value::Value;

/// Key carrying the primary expression inside a JSON object.
pub const PRIMARY_KEY: &str = "$primary";

impl BindingExpression {
    /// Build an expression from a JSON value.
    pub fn from_json(json: &Json) -> Result<Self, ParseError> {
        convert(json, 0)
    }
}

fn convert(json: &Json, depth: usize) -> Result<BindingExpression, ParseError> {
    if depth > MAX_DEPTH {
        return Err(ParseError::new(ParseErrorKind::TooDeep(MAX_DEPTH), 0));
    }
    match json {
        Json::Null => Ok(BindingExpression::default()),
        Json::String(text) => parse_expression(text),
        Json::Bool(_) | Json::Number(_) => Ok(BindingExpression::constant(Value::from(json.clone()))),
        Json::Array(items) => {
            let items = items
                .iter()
                .map(|item| convert(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(BindingExpression::new(Some(PrimaryExpression::Array(items))))
        }
        Json::Object(map) => {
            let mut expr = match map.get(PRIMARY_KEY) {
                Some(primary) => convert(primary, depth + 1)?,
                None => BindingExpression::default(),
            };
            for (name, value) in map.iter().filter(|(name, _)| *name != PRIMARY_KEY) {
                if !KeyPath::is_valid_segment(name) || name.starts_with('@') {
                    return Err(ParseError::new(
                        ParseErrorKind::UnsupportedValue(format!("attribute name '{name}'")),
                        0,
                    ));
                }
                if expr.attributes().contains_key(name) {
                    return Err(ParseError::new(
                        ParseErrorKind::DuplicateAttribute(name.clone()),
                        0,
                    ));
                }
                let value = convert(value, depth + 1)?;
                expr.attributes_mut().insert(name.clone(), value);
            }
            Ok(expr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_path::KeyPathScope;
    use crate::types::ExpressionType;
    use serde_json::json;

    #[test]
    fn object_with_primary_and_attributes() {
        let expr = BindingExpression::from_json(&json!({
            "$primary": "$data.amount",
            "digits": 2,
            "grouping": true,
            "format": { "$primary": "<Currency>", "locale": "\"fr_FR\"" },
        }))
        .unwrap();
        assert_eq!(
            expr.primary(),
            Some(&PrimaryExpression::key_path(KeyPathScope::DataContext, "amount"))
        );
        let names: Vec<_> = expr.attributes().keys().map(String::as_str).collect();
        assert_eq!(names, ["digits", "grouping", "format"]);
        assert_eq!(
            expr.attribute("format").and_then(BindingExpression::expression_type),
            Some(ExpressionType::CLASS_CONSTANT)
        );
    }

    #[test]
    fn scalars_and_arrays() {
        assert_eq!(
            BindingExpression::from_json(&json!(1.5)).unwrap(),
            BindingExpression::constant(1.5)
        );
        assert!(BindingExpression::from_json(&json!(null)).unwrap().is_empty());
        let array = BindingExpression::from_json(&json!(["a", 1])).unwrap();
        assert_eq!(array.expression_type(), Some(ExpressionType::ARRAY));
    }

    #[test]
    fn primary_attributes_merge_with_object_keys() {
        let expr = BindingExpression::from_json(&json!({
            "$primary": "name { a: 1 }",
            "b": 2,
        }))
        .unwrap();
        assert_eq!(expr.attributes().len(), 2);

        let err = BindingExpression::from_json(&json!({
            "$primary": "name { a: 1 }",
            "a": 2,
        }))
        .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DuplicateAttribute("a".into()));
    }

    #[test]
    fn rejects_invalid_attribute_names() {
        let err = BindingExpression::from_json(&json!({ "not valid": 1 })).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnsupportedValue(_)));
    }
}
