#![forbid(unsafe_code)]

//! Recursive-descent parser for binding expression text.
//!
//! This is the syntactic phase: it decides whether the text can be read as
//! *some* expression shape and classifies every primary expression. It knows
//! nothing about specifications; see [`crate::validate`] for the semantic
//! phase.
//!
//! Named constants (`$color`, `$point`, `$size`, `$rect`, `$font`) are
//! evaluated here, so a malformed constant is a [`ParseError`].
//!
//! # Failure Modes
//!
//! | Input | Error |
//! |-------|-------|
//! | `a.` | `UnexpectedToken { expected: "key path segment", .. }` |
//! | `$foo` | `UnknownVariable("foo")` |
//! | `{ a: 1, a: 2 }` | `DuplicateAttribute("a")` |
//! | `$color { red: 300 }` | `InvalidConstant { constant: "color", .. }` |
//! | nesting deeper than [`MAX_DEPTH`] | `TooDeep` |

use indexmap::IndexMap;

use crate::error::{ParseError, ParseErrorKind};
use crate::expression::{BindingExpression, PrimaryExpression};
use crate::key_path::{KeyPath, KeyPathScope};
use crate::lexer::{Token, TokenKind, tokenize};
use crate::value::{Color, Font, Point, Rect, Size, Value};

/// Maximum nesting of arrays and attribute blocks.
pub const MAX_DEPTH: usize = 64;

/// Parse a complete binding expression.
pub fn parse_expression(text: &str) -> Result<BindingExpression, ParseError> {
    let mut cursor = TokenCursor::new(tokenize(text)?);
    let expr = parse_expr(&mut cursor, 0)?;
    cursor.expect_eof()?;
    Ok(expr)
}

// ----------------------------------------------------------------------------
// Token cursor
// ----------------------------------------------------------------------------

/// Position in a token stream. Shared with the predicate parser.
pub(crate) struct TokenCursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenCursor {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub(crate) fn peek(&self) -> &Token {
        // The stream always ends with Eof and the cursor never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn unexpected(&self, expected: &'static str) -> ParseError {
        let token = self.peek();
        ParseError::new(
            ParseErrorKind::UnexpectedToken {
                expected,
                found: token.kind.to_string(),
            },
            token.offset,
        )
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind, expected: &'static str) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    pub(crate) fn expect_identifier(&mut self, expected: &'static str) -> Result<(String, usize), ParseError> {
        let token = self.peek();
        let TokenKind::Identifier(name) = &token.kind else {
            return Err(self.unexpected(expected));
        };
        let found = (name.clone(), token.offset);
        self.advance();
        Ok(found)
    }

    pub(crate) fn expect_eof(&self) -> Result<(), ParseError> {
        if *self.peek_kind() == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }

    /// `segment ('.' segment)*`, where integer tokens also count as segments.
    pub(crate) fn key_path_tail(&mut self, mut path: KeyPath) -> Result<KeyPath, ParseError> {
        while self.eat(&TokenKind::Dot) {
            let token = self.advance();
            let segment = match token.kind {
                TokenKind::Identifier(name) => name,
                TokenKind::Integer(index) if index >= 0 => index.to_string(),
                other => {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedToken {
                            expected: "key path segment",
                            found: other.to_string(),
                        },
                        token.offset,
                    ));
                }
            };
            path = path.child(segment);
        }
        Ok(path)
    }
}

fn check_depth(depth: usize, offset: usize) -> Result<(), ParseError> {
    if depth > MAX_DEPTH {
        Err(ParseError::new(ParseErrorKind::TooDeep(MAX_DEPTH), offset))
    } else {
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------------

fn parse_expr(cursor: &mut TokenCursor, depth: usize) -> Result<BindingExpression, ParseError> {
    check_depth(depth, cursor.peek().offset)?;
    let primary = if *cursor.peek_kind() == TokenKind::LBrace {
        None
    } else {
        Some(parse_primary(cursor, depth)?)
    };
    let mut expr = BindingExpression::new(primary);
    if *cursor.peek_kind() == TokenKind::LBrace {
        *expr.attributes_mut() = parse_attributes(cursor, depth + 1)?;
    }
    Ok(expr)
}

fn parse_attributes(
    cursor: &mut TokenCursor,
    depth: usize,
) -> Result<IndexMap<String, BindingExpression>, ParseError> {
    check_depth(depth, cursor.peek().offset)?;
    cursor.expect(&TokenKind::LBrace, "'{'")?;
    let mut attributes = IndexMap::new();
    while *cursor.peek_kind() != TokenKind::RBrace {
        let (name, offset) = cursor.expect_identifier("attribute name")?;
        cursor.expect(&TokenKind::Colon, "':'")?;
        let value = parse_expr(cursor, depth + 1)?;
        if attributes.contains_key(&name) {
            return Err(ParseError::new(ParseErrorKind::DuplicateAttribute(name), offset));
        }
        attributes.insert(name, value);
        if !cursor.eat(&TokenKind::Comma) {
            break;
        }
    }
    cursor.expect(&TokenKind::RBrace, "',' or '}'")?;
    Ok(attributes)
}

fn parse_primary(cursor: &mut TokenCursor, depth: usize) -> Result<PrimaryExpression, ParseError> {
    let token = cursor.peek().clone();
    match token.kind {
        TokenKind::Identifier(name) => {
            cursor.advance();
            let is_keyword = *cursor.peek_kind() != TokenKind::Dot;
            match name.as_str() {
                "true" if is_keyword => Ok(PrimaryExpression::Constant(Value::Bool(true))),
                "false" if is_keyword => Ok(PrimaryExpression::Constant(Value::Bool(false))),
                _ => Ok(PrimaryExpression::KeyPath {
                    scope: KeyPathScope::Unqualified,
                    path: cursor.key_path_tail(KeyPath::empty().child(name))?,
                }),
            }
        }
        TokenKind::String(s) => {
            cursor.advance();
            Ok(PrimaryExpression::Constant(Value::String(s)))
        }
        TokenKind::Integer(i) => {
            cursor.advance();
            Ok(PrimaryExpression::Constant(Value::Integer(i)))
        }
        TokenKind::Double(d) => {
            cursor.advance();
            Ok(PrimaryExpression::Constant(Value::Double(d)))
        }
        TokenKind::LBracket => parse_array(cursor, depth + 1),
        TokenKind::Less => {
            cursor.advance();
            let (first, _) = cursor.expect_identifier("class name")?;
            let name = cursor.key_path_tail(KeyPath::empty().child(first))?;
            cursor.expect(&TokenKind::Greater, "'>'")?;
            Ok(PrimaryExpression::Constant(Value::Class(name.to_string())))
        }
        TokenKind::Variable(name) => {
            cursor.advance();
            parse_variable(cursor, &name, token.offset)
        }
        _ => Err(cursor.unexpected("expression")),
    }
}

/// A single primary expression, used as a predicate operand.
pub(crate) fn parse_operand(cursor: &mut TokenCursor) -> Result<PrimaryExpression, ParseError> {
    parse_primary(cursor, 0)
}

fn parse_array(cursor: &mut TokenCursor, depth: usize) -> Result<PrimaryExpression, ParseError> {
    check_depth(depth, cursor.peek().offset)?;
    cursor.expect(&TokenKind::LBracket, "'['")?;
    let mut items = Vec::new();
    while *cursor.peek_kind() != TokenKind::RBracket {
        items.push(parse_expr(cursor, depth + 1)?);
        if !cursor.eat(&TokenKind::Comma) {
            break;
        }
    }
    cursor.expect(&TokenKind::RBracket, "',' or ']'")?;
    Ok(PrimaryExpression::Array(items))
}

fn parse_variable(
    cursor: &mut TokenCursor,
    name: &str,
    offset: usize,
) -> Result<PrimaryExpression, ParseError> {
    if let Some(scope) = KeyPathScope::from_variable(name) {
        return Ok(PrimaryExpression::KeyPath {
            scope,
            path: cursor.key_path_tail(KeyPath::empty())?,
        });
    }
    let value = match name {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "color" => parse_color(&components(cursor, "color", &["red", "green", "blue", "alpha"])?)?,
        "point" => {
            let c = components(cursor, "point", &["x", "y"])?;
            Value::Point(Point {
                x: c.number("x")?,
                y: c.number("y")?,
            })
        }
        "size" => {
            let c = components(cursor, "size", &["width", "height"])?;
            Value::Size(Size {
                width: c.number("width")?,
                height: c.number("height")?,
            })
        }
        "rect" => {
            let c = components(cursor, "rect", &["x", "y", "width", "height"])?;
            Value::Rect(Rect {
                x: c.number("x")?,
                y: c.number("y")?,
                width: c.number("width")?,
                height: c.number("height")?,
            })
        }
        "font" => {
            let c = components(cursor, "font", &["name", "size"])?;
            Value::Font(Font {
                name: c.string("name")?,
                size: c.number("size")?,
            })
        }
        "enum" => {
            cursor.expect(&TokenKind::Dot, "'.'")?;
            let (first, _) = cursor.expect_identifier("enumeration value")?;
            if cursor.eat(&TokenKind::Dot) {
                let (value, _) = cursor.expect_identifier("enumeration value")?;
                Value::Enum {
                    type_name: Some(first),
                    value,
                }
            } else {
                Value::Enum {
                    type_name: None,
                    value: first,
                }
            }
        }
        "options" => {
            cursor.expect(&TokenKind::Dot, "'.'")?;
            let (type_name, _) = cursor.expect_identifier("option type name")?;
            cursor.expect(&TokenKind::LBrace, "'{'")?;
            let mut flags = Vec::new();
            while *cursor.peek_kind() != TokenKind::RBrace {
                let (flag, _) = cursor.expect_identifier("option flag")?;
                flags.push(flag);
                if !cursor.eat(&TokenKind::Comma) {
                    break;
                }
            }
            cursor.expect(&TokenKind::RBrace, "',' or '}'")?;
            Value::Options { type_name, flags }
        }
        other => {
            return Err(ParseError::new(
                ParseErrorKind::UnknownVariable(other.to_owned()),
                offset,
            ));
        }
    };
    Ok(PrimaryExpression::Constant(value))
}

// ----------------------------------------------------------------------------
// Named constant components
// ----------------------------------------------------------------------------

struct Components {
    constant: &'static str,
    offset: usize,
    values: IndexMap<String, Value>,
}

impl Components {
    fn invalid(&self, reason: String) -> ParseError {
        ParseError::new(
            ParseErrorKind::InvalidConstant {
                constant: self.constant,
                reason,
            },
            self.offset,
        )
    }

    fn optional_number(&self, name: &str) -> Result<Option<f64>, ParseError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(format!("'{name}' must be a number"))),
        }
    }

    fn number(&self, name: &str) -> Result<f64, ParseError> {
        self.optional_number(name)?
            .ok_or_else(|| self.invalid(format!("missing component '{name}'")))
    }

    fn string(&self, name: &str) -> Result<Option<String>, ParseError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.invalid(format!("'{name}' must be a string"))),
        }
    }
}

/// `'{' (name ':' literal (',' name ':' literal)* ','?)? '}'`
fn components(
    cursor: &mut TokenCursor,
    constant: &'static str,
    allowed: &[&str],
) -> Result<Components, ParseError> {
    let offset = cursor.peek().offset;
    cursor.expect(&TokenKind::LBrace, "'{'")?;
    let mut result = Components {
        constant,
        offset,
        values: IndexMap::new(),
    };
    while *cursor.peek_kind() != TokenKind::RBrace {
        let (name, name_offset) = cursor.expect_identifier("component name")?;
        if !allowed.contains(&name.as_str()) {
            return Err(ParseError::new(
                ParseErrorKind::InvalidConstant {
                    constant,
                    reason: format!("unknown component '{name}'"),
                },
                name_offset,
            ));
        }
        cursor.expect(&TokenKind::Colon, "':'")?;
        let literal = cursor.advance();
        let value = match literal.kind {
            TokenKind::Integer(i) => Value::Integer(i),
            TokenKind::Double(d) => Value::Double(d),
            TokenKind::String(s) => Value::String(s),
            other => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedToken {
                        expected: "number or string literal",
                        found: other.to_string(),
                    },
                    literal.offset,
                ));
            }
        };
        if result.values.contains_key(&name) {
            return Err(ParseError::new(
                ParseErrorKind::DuplicateAttribute(name),
                name_offset,
            ));
        }
        result.values.insert(name, value);
        if !cursor.eat(&TokenKind::Comma) {
            break;
        }
    }
    cursor.expect(&TokenKind::RBrace, "',' or '}'")?;
    Ok(result)
}

/// Integer components above 1 are byte values and scaled into `0..=1`.
fn parse_color(c: &Components) -> Result<Value, ParseError> {
    let component = |name: &str, default: Option<f64>| -> Result<f64, ParseError> {
        let raw = match (c.values.get(name), default) {
            (Some(Value::Integer(i)), _) if *i > 1 => *i as f64 / 255.0,
            (Some(_), _) => c.number(name)?,
            (None, Some(default)) => default,
            (None, None) => c.number(name)?,
        };
        if (0.0..=1.0).contains(&raw) {
            Ok(raw)
        } else {
            Err(c.invalid(format!("'{name}' is out of range")))
        }
    };
    Ok(Value::Color(Color {
        red: component("red", None)?,
        green: component("green", None)?,
        blue: component("blue", None)?,
        alpha: component("alpha", Some(1.0))?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExpressionType;

    fn primary(text: &str) -> PrimaryExpression {
        parse_expression(text)
            .unwrap()
            .primary()
            .cloned()
            .unwrap()
    }

    #[test]
    fn unqualified_key_path() {
        let expr = parse_expression("model.name").unwrap();
        assert_eq!(expr.expression_type(), Some(ExpressionType::UNQUALIFIED_KEY_PATH));
        assert!(expr.attributes().is_empty());
    }

    #[test]
    fn scoped_key_paths() {
        assert_eq!(
            primary("$data.model.name"),
            PrimaryExpression::key_path(KeyPathScope::DataContext, "model.name")
        );
        assert_eq!(
            primary("$root"),
            PrimaryExpression::key_path(KeyPathScope::RootDataContext, "")
        );
        assert_eq!(
            primary("$control.owner.title").expression_type(),
            ExpressionType::CONTROL_KEY_PATH
        );
    }

    #[test]
    fn literals() {
        assert_eq!(primary("\"x\""), PrimaryExpression::Constant(Value::from("x")));
        assert_eq!(primary("12"), PrimaryExpression::Constant(Value::Integer(12)));
        assert_eq!(primary("-1.5"), PrimaryExpression::Constant(Value::Double(-1.5)));
        assert_eq!(primary("true"), PrimaryExpression::Constant(Value::Bool(true)));
        assert_eq!(primary("$false"), PrimaryExpression::Constant(Value::Bool(false)));
        assert_eq!(
            primary("<NumberFormatter>"),
            PrimaryExpression::Constant(Value::Class("NumberFormatter".into()))
        );
    }

    #[test]
    fn consecutive_numeric_segments() {
        assert_eq!(
            primary("matrix.0.1"),
            PrimaryExpression::key_path(KeyPathScope::Unqualified, "matrix.0.1")
        );
        let PrimaryExpression::KeyPath { path, .. } = primary("$data.rows.10.2.name") else {
            panic!("expected key path");
        };
        assert_eq!(path.segments(), ["rows", "10", "2", "name"]);
    }

    #[test]
    fn keyword_followed_by_dot_is_a_key_path() {
        assert_eq!(
            primary("true.value"),
            PrimaryExpression::key_path(KeyPathScope::Unqualified, "true.value")
        );
    }

    #[test]
    fn arrays_and_attributes() {
        let expr = parse_expression("[1, \"a\", b { c: 2 },] { sep: \", \" }").unwrap();
        let Some(PrimaryExpression::Array(items)) = expr.primary() else {
            panic!("expected array");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].attributes().len(), 1);
        assert_eq!(expr.attribute("sep").and_then(|e| e.constant_value()), Some(&Value::from(", ")));
    }

    #[test]
    fn attribute_only_expression() {
        let expr = parse_expression("{ textColor: $color { red: 255, green: 0, blue: 0 } }").unwrap();
        assert!(expr.primary().is_none());
        let color = expr.attribute("textColor").and_then(|e| e.constant_value()).cloned();
        assert_eq!(color, Some(Value::Color(Color::rgba(1.0, 0.0, 0.0, 1.0))));
    }

    #[test]
    fn geometry_and_font_constants() {
        assert_eq!(
            primary("$rect { x: 0, y: 0, width: 10.5, height: 2 }"),
            PrimaryExpression::Constant(Value::Rect(Rect {
                x: 0.0,
                y: 0.0,
                width: 10.5,
                height: 2.0
            }))
        );
        assert_eq!(
            primary("$font { name: \"Menlo\", size: 12 }"),
            PrimaryExpression::Constant(Value::Font(Font {
                name: Some("Menlo".into()),
                size: 12.0
            }))
        );
    }

    #[test]
    fn enum_and_options() {
        assert_eq!(
            primary("$enum.Alignment.Center"),
            PrimaryExpression::Constant(Value::Enum {
                type_name: Some("Alignment".into()),
                value: "Center".into()
            })
        );
        assert_eq!(
            primary("$options.Edges{Top, Left}"),
            PrimaryExpression::Constant(Value::Options {
                type_name: "Edges".into(),
                flags: vec!["Top".into(), "Left".into()]
            })
        );
    }

    #[test]
    fn errors() {
        let err = parse_expression("a.").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { expected: "key path segment", .. }));

        let err = parse_expression("$nope").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnknownVariable("nope".into()));
        assert_eq!(err.offset, 0);

        let err = parse_expression("{ a: 1, a: 2 }").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::DuplicateAttribute("a".into()));
        assert_eq!(err.offset, 8);

        let err = parse_expression("$color { red: 300, green: 0, blue: 0 }").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidConstant { constant: "color", .. }));

        let err = parse_expression("$point { x: 1 }").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidConstant { constant: "point", .. }));

        assert!(parse_expression("").is_err());
        assert!(parse_expression("a b").is_err());
    }

    #[test]
    fn nesting_limit() {
        let deep = format!("{}1{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        let err = parse_expression(&deep).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TooDeep(MAX_DEPTH));

        let shallow = format!("{}1{}", "[".repeat(8), "]".repeat(8));
        assert!(parse_expression(&shallow).is_ok());
    }
}
