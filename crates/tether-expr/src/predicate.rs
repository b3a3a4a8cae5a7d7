#![forbid(unsafe_code)]

//! Clause predicates for conditional bindings.
//!
//! ```text
//! or      := and ('||' and)*
//! and     := unary ('&&' unary)*
//! unary   := '!' unary | atom
//! atom    := '(' or ')' | operand (cmp operand)?
//! cmp     := '==' | '!=' | '<' | '<=' | '>' | '>='
//! operand := key path | scoped key path | literal | named constant
//! ```
//!
//! A lone operand tests truthiness (see [`Value::is_truthy`]); the literals
//! `true` and `false` parse to [`Predicate::Always`] and [`Predicate::Never`].
//! Key paths that do not resolve evaluate as `null`.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{ParseError, ParseErrorKind};
use crate::expression::PrimaryExpression;
use crate::key_path::{KeyPath, KeyPathScope};
use crate::lexer::{TokenKind, tokenize};
use crate::parser::{MAX_DEPTH, TokenCursor, parse_operand};
use crate::value::Value;

/// Source of key path values for predicate evaluation.
pub trait KeyPathResolver {
    fn resolve(&self, scope: KeyPathScope, path: &KeyPath) -> Option<Value>;
}

impl<F> KeyPathResolver for F
where
    F: Fn(KeyPathScope, &KeyPath) -> Option<Value>,
{
    fn resolve(&self, scope: KeyPathScope, path: &KeyPath) -> Option<Value> {
        self(scope, path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    KeyPath { scope: KeyPathScope, path: KeyPath },
    Constant(Value),
}

impl Operand {
    fn evaluate(&self, resolver: &dyn KeyPathResolver) -> Value {
        match self {
            Self::KeyPath { scope, path } => resolver.resolve(*scope, path).unwrap_or_default(),
            Self::Constant(value) => value.clone(),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let primary = match self {
            Self::KeyPath { scope, path } => PrimaryExpression::KeyPath {
                scope: *scope,
                path: path.clone(),
            },
            Self::Constant(value) => PrimaryExpression::Constant(value.clone()),
        };
        write!(f, "{primary}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn from_token(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::EqEq => Some(Self::Eq),
            TokenKind::NotEq => Some(Self::Ne),
            TokenKind::Less => Some(Self::Lt),
            TokenKind::LessEq => Some(Self::Le),
            TokenKind::Greater => Some(Self::Gt),
            TokenKind::GreaterEq => Some(Self::Ge),
            _ => None,
        }
    }

    fn apply(self, lhs: &Value, rhs: &Value) -> bool {
        match self {
            Self::Eq => lhs.loosely_equals(rhs),
            Self::Ne => !lhs.loosely_equals(rhs),
            Self::Lt => lhs.compare(rhs) == Some(Ordering::Less),
            Self::Le => matches!(lhs.compare(rhs), Some(Ordering::Less | Ordering::Equal)),
            Self::Gt => lhs.compare(rhs) == Some(Ordering::Greater),
            Self::Ge => matches!(lhs.compare(rhs), Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Always,
    Never,
    Truthy(Operand),
    Compare {
        lhs: Operand,
        op: CompareOp,
        rhs: Operand,
    },
    Not(Box<Predicate>),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Parse predicate text.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut cursor = TokenCursor::new(tokenize(text)?);
        let predicate = parse_or(&mut cursor, 0)?;
        cursor.expect_eof()?;
        Ok(predicate)
    }

    /// `path op constant` shorthand.
    #[must_use]
    pub fn compare(path: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            lhs: Operand::KeyPath {
                scope: KeyPathScope::Unqualified,
                path: KeyPath::parse(path),
            },
            op,
            rhs: Operand::Constant(value.into()),
        }
    }

    #[must_use]
    pub fn evaluate(&self, resolver: &dyn KeyPathResolver) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Truthy(operand) => operand.evaluate(resolver).is_truthy(),
            Self::Compare { lhs, op, rhs } => op.apply(&lhs.evaluate(resolver), &rhs.evaluate(resolver)),
            Self::Not(inner) => !inner.evaluate(resolver),
            Self::All(items) => items.iter().all(|p| p.evaluate(resolver)),
            Self::Any(items) => items.iter().any(|p| p.evaluate(resolver)),
        }
    }

    fn is_compound(&self) -> bool {
        matches!(self, Self::All(_) | Self::Any(_))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = |f: &mut fmt::Formatter<'_>, items: &[Predicate], sep: &str| -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                if item.is_compound() {
                    write!(f, "({item})")?;
                } else {
                    write!(f, "{item}")?;
                }
            }
            Ok(())
        };
        match self {
            Self::Always => f.write_str("true"),
            Self::Never => f.write_str("false"),
            Self::Truthy(operand) => write!(f, "{operand}"),
            Self::Compare { lhs, op, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
            Self::Not(inner) => match inner.as_ref() {
                Self::Compare { .. } | Self::All(_) | Self::Any(_) => write!(f, "!({inner})"),
                _ => write!(f, "!{inner}"),
            },
            Self::All(items) if items.is_empty() => f.write_str("true"),
            Self::Any(items) if items.is_empty() => f.write_str("false"),
            Self::All(items) => joined(f, items, " && "),
            Self::Any(items) => joined(f, items, " || "),
        }
    }
}

// ----------------------------------------------------------------------------
// Parser
// ----------------------------------------------------------------------------

fn too_deep(cursor: &TokenCursor, depth: usize) -> Result<(), ParseError> {
    if depth > MAX_DEPTH {
        Err(ParseError::new(ParseErrorKind::TooDeep(MAX_DEPTH), cursor.peek().offset))
    } else {
        Ok(())
    }
}

fn parse_or(cursor: &mut TokenCursor, depth: usize) -> Result<Predicate, ParseError> {
    too_deep(cursor, depth)?;
    let mut items = vec![parse_and(cursor, depth)?];
    while cursor.eat(&TokenKind::OrOr) {
        items.push(parse_and(cursor, depth)?);
    }
    Ok(if items.len() == 1 {
        items.remove(0)
    } else {
        Predicate::Any(items)
    })
}

fn parse_and(cursor: &mut TokenCursor, depth: usize) -> Result<Predicate, ParseError> {
    let mut items = vec![parse_unary(cursor, depth)?];
    while cursor.eat(&TokenKind::AndAnd) {
        items.push(parse_unary(cursor, depth)?);
    }
    Ok(if items.len() == 1 {
        items.remove(0)
    } else {
        Predicate::All(items)
    })
}

fn parse_unary(cursor: &mut TokenCursor, depth: usize) -> Result<Predicate, ParseError> {
    too_deep(cursor, depth)?;
    if cursor.eat(&TokenKind::Bang) {
        return Ok(Predicate::Not(Box::new(parse_unary(cursor, depth + 1)?)));
    }
    if cursor.eat(&TokenKind::LParen) {
        let inner = parse_or(cursor, depth + 1)?;
        cursor.expect(&TokenKind::RParen, "')'")?;
        return Ok(inner);
    }
    let lhs = operand(cursor)?;
    let Some(op) = CompareOp::from_token(cursor.peek_kind()) else {
        return Ok(match lhs {
            Operand::Constant(Value::Bool(true)) => Predicate::Always,
            Operand::Constant(Value::Bool(false)) => Predicate::Never,
            other => Predicate::Truthy(other),
        });
    };
    cursor.advance();
    let rhs = operand(cursor)?;
    Ok(Predicate::Compare { lhs, op, rhs })
}

fn operand(cursor: &mut TokenCursor) -> Result<Operand, ParseError> {
    let offset = cursor.peek().offset;
    match parse_operand(cursor)? {
        PrimaryExpression::KeyPath { scope, path } => Ok(Operand::KeyPath { scope, path }),
        PrimaryExpression::Constant(value) => Ok(Operand::Constant(value)),
        PrimaryExpression::Array(_) => Err(ParseError::new(
            ParseErrorKind::UnexpectedToken {
                expected: "comparison operand",
                found: "array".to_owned(),
            },
            offset,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(data: serde_json::Value) -> impl Fn(KeyPathScope, &KeyPath) -> Option<Value> {
        let data = Value::from(data);
        move |scope, path| match scope {
            KeyPathScope::Unqualified | KeyPathScope::DataContext => data.lookup(path),
            _ => None,
        }
    }

    #[test]
    fn comparison() {
        let adult = Predicate::parse("age >= 18").unwrap();
        assert_eq!(adult, Predicate::compare("age", CompareOp::Ge, 18));
        assert!(adult.evaluate(&context(json!({ "age": 20 }))));
        assert!(!adult.evaluate(&context(json!({ "age": 15 }))));
        assert!(!adult.evaluate(&context(json!({}))));
    }

    #[test]
    fn boolean_structure() {
        let p = Predicate::parse("!(kind == \"guest\") && (age > 17 || $data.override)").unwrap();
        let ctx = context(json!({ "kind": "member", "age": 12, "override": true }));
        assert!(p.evaluate(&ctx));
        let ctx = context(json!({ "kind": "guest", "age": 40 }));
        assert!(!p.evaluate(&ctx));
    }

    #[test]
    fn literals() {
        assert_eq!(Predicate::parse("true").unwrap(), Predicate::Always);
        assert_eq!(Predicate::parse("$false").unwrap(), Predicate::Never);
        assert!(Predicate::parse("name").unwrap().evaluate(&context(json!({ "name": "x" }))));
    }

    #[test]
    fn display_reparses() {
        for text in [
            "age >= 18",
            "!(a == 1)",
            "(a && b) || !c",
            "$root.flags.@count > 0 && name != \"\"",
        ] {
            let parsed = Predicate::parse(text).unwrap();
            assert_eq!(Predicate::parse(&parsed.to_string()).unwrap(), parsed, "{text}");
        }
    }

    #[test]
    fn errors() {
        assert!(Predicate::parse("a >=").is_err());
        assert!(Predicate::parse("(a").is_err());
        assert!(Predicate::parse("[1] == a").is_err());
        assert!(Predicate::parse("a b").is_err());
    }
}
