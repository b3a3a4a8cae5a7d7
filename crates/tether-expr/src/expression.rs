#![forbid(unsafe_code)]

//! Binding expression AST and its canonical text form.
//!
//! A [`BindingExpression`] is an optional [`PrimaryExpression`] plus an
//! ordered map of named attributes, each itself a binding expression.
//! Expressions are immutable once parsed; the validator returns a normalized
//! copy instead of mutating its input.
//!
//! # Invariants
//!
//! 1. `BindingExpression::parse(&e.to_string())` is structurally equal to `e`
//!    for every expression produced by the parser.
//! 2. Attribute order is declaration order and survives serialization.
//!
//! # Canonical form
//!
//! | Construct | Text |
//! |-----------|------|
//! | unqualified key path | `a.b` |
//! | scoped key path | `$data.a.b`, `$root`, `$control.a` |
//! | boolean | `$true`, `$false` |
//! | double | shortest form that reparses exactly (`1.0`, `2.5e-8`) |
//! | color | `$color { red: 1.0, green: 0.0, blue: 0.0, alpha: 1.0 }` |
//! | attributes | `primary { a: x, b: y }` |
//! | empty expression | `{}` |

use std::fmt;

use indexmap::IndexMap;

use crate::error::{ExpressionError, ParseError};
use crate::key_path::{KeyPath, KeyPathScope};
use crate::registry::TypeRegistry;
use crate::spec::BindingExpressionSpecification;
use crate::types::ExpressionType;
use crate::validate::{ValidationOptions, Validator};
use crate::value::Value;

/// The primary part of a binding expression.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryExpression {
    KeyPath { scope: KeyPathScope, path: KeyPath },
    Constant(Value),
    Array(Vec<BindingExpression>),
}

impl PrimaryExpression {
    #[must_use]
    pub fn key_path(scope: KeyPathScope, path: &str) -> Self {
        Self::KeyPath {
            scope,
            path: KeyPath::parse(path),
        }
    }

    /// Base classification flag.
    ///
    /// Constants holding values the grammar cannot express (`Null`, `Map`)
    /// classify as the empty set and are rejected by every specification.
    #[must_use]
    pub fn expression_type(&self) -> ExpressionType {
        match self {
            Self::KeyPath { scope, .. } => scope.expression_type(),
            Self::Array(_) => ExpressionType::ARRAY,
            Self::Constant(value) => constant_type(value),
        }
    }

    #[must_use]
    pub fn is_key_path(&self) -> bool {
        matches!(self, Self::KeyPath { .. })
    }
}

fn constant_type(value: &Value) -> ExpressionType {
    match value {
        Value::Bool(_) => ExpressionType::BOOLEAN_CONSTANT,
        Value::Integer(_) => ExpressionType::INTEGER_CONSTANT,
        Value::Double(_) => ExpressionType::DOUBLE_CONSTANT,
        Value::String(_) => ExpressionType::STRING_CONSTANT,
        Value::Color(_) => ExpressionType::COLOR_CONSTANT,
        Value::Point(_) => ExpressionType::POINT_CONSTANT,
        Value::Size(_) => ExpressionType::SIZE_CONSTANT,
        Value::Rect(_) => ExpressionType::RECT_CONSTANT,
        Value::Font(_) => ExpressionType::FONT_CONSTANT,
        Value::Class(_) => ExpressionType::CLASS_CONSTANT,
        Value::Enum { .. } => ExpressionType::ENUM_CONSTANT,
        Value::Options { .. } => ExpressionType::OPTIONS_CONSTANT,
        Value::Array(_) => ExpressionType::ARRAY,
        Value::Null | Value::Map(_) => ExpressionType::empty(),
    }
}

/// A parsed binding expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingExpression {
    primary: Option<PrimaryExpression>,
    attributes: IndexMap<String, BindingExpression>,
}

impl BindingExpression {
    #[must_use]
    pub fn new(primary: Option<PrimaryExpression>) -> Self {
        Self {
            primary,
            attributes: IndexMap::new(),
        }
    }

    /// Expression consisting of a single constant.
    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::new(Some(PrimaryExpression::Constant(value.into())))
    }

    /// Builder: add or replace an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: BindingExpression) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Parse expression text (syntactic phase only).
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        crate::parser::parse_expression(text)
    }

    /// Parse and validate against `spec` in one step.
    pub fn parse_with_spec(
        text: &str,
        spec: &BindingExpressionSpecification,
        registry: Option<&TypeRegistry>,
    ) -> Result<Self, ExpressionError> {
        let parsed = Self::parse(text)?;
        let mut validator = Validator::new(ValidationOptions::default());
        if let Some(registry) = registry {
            validator = validator.with_registry(registry);
        }
        Ok(validator.validate(&parsed, spec)?)
    }

    #[must_use]
    pub fn primary(&self) -> Option<&PrimaryExpression> {
        self.primary.as_ref()
    }

    #[must_use]
    pub fn attributes(&self) -> &IndexMap<String, BindingExpression> {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&BindingExpression> {
        self.attributes.get(name)
    }

    /// Classification of the primary expression, if any.
    #[must_use]
    pub fn expression_type(&self) -> Option<ExpressionType> {
        self.primary.as_ref().map(PrimaryExpression::expression_type)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.attributes.is_empty()
    }

    /// The constant value of the primary expression, if it is a constant.
    #[must_use]
    pub fn constant_value(&self) -> Option<&Value> {
        match &self.primary {
            Some(PrimaryExpression::Constant(value)) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn set_primary(&mut self, primary: Option<PrimaryExpression>) {
        self.primary = primary;
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut IndexMap<String, BindingExpression> {
        &mut self.attributes
    }

    pub(crate) fn primary_mut(&mut self) -> Option<&mut PrimaryExpression> {
        self.primary.as_mut()
    }

    /// Multi-line rendering: one attribute per line, indented by `indent`
    /// spaces per nesting level. Reparses to the same tree as the compact form.
    #[must_use]
    pub fn to_text_pretty(&self, indent: usize) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_expression(&mut out, self, Some((indent, 0)));
        out
    }
}

impl fmt::Display for BindingExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expression(f, self, None)
    }
}

impl fmt::Display for PrimaryExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_primary(f, self, None)
    }
}

// ----------------------------------------------------------------------------
// Serialization
// ----------------------------------------------------------------------------

/// Multi-line layout as `(indent width, current level)`; `None` is compact.
type Layout = Option<(usize, usize)>;

fn write_expression<W: fmt::Write>(
    out: &mut W,
    expr: &BindingExpression,
    layout: Layout,
) -> fmt::Result {
    if let Some(primary) = &expr.primary {
        write_primary(out, primary, layout)?;
        if expr.attributes.is_empty() {
            return Ok(());
        }
        out.write_char(' ')?;
    }
    write_attributes(out, &expr.attributes, layout)
}

fn write_attributes<W: fmt::Write>(
    out: &mut W,
    attributes: &IndexMap<String, BindingExpression>,
    layout: Layout,
) -> fmt::Result {
    if attributes.is_empty() {
        return out.write_str("{}");
    }
    match layout {
        None => {
            out.write_str("{ ")?;
            for (i, (name, value)) in attributes.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write!(out, "{name}: ")?;
                write_expression(out, value, None)?;
            }
            out.write_str(" }")
        }
        Some((width, level)) => {
            out.write_str("{\n")?;
            let inner = " ".repeat(width * (level + 1));
            for (i, (name, value)) in attributes.iter().enumerate() {
                if i > 0 {
                    out.write_str(",\n")?;
                }
                write!(out, "{inner}{name}: ")?;
                write_expression(out, value, Some((width, level + 1)))?;
            }
            write!(out, "\n{}}}", " ".repeat(width * level))
        }
    }
}

fn write_primary<W: fmt::Write>(
    out: &mut W,
    primary: &PrimaryExpression,
    layout: Layout,
) -> fmt::Result {
    match primary {
        PrimaryExpression::KeyPath { scope, path } => match scope {
            KeyPathScope::Unqualified => write!(out, "{path}"),
            scoped if path.is_empty() => out.write_str(scoped.prefix()),
            scoped => write!(out, "{}.{path}", scoped.prefix()),
        },
        PrimaryExpression::Constant(value) => write_constant(out, value),
        PrimaryExpression::Array(items) => {
            out.write_char('[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_expression(out, item, layout)?;
            }
            out.write_char(']')
        }
    }
}

fn write_double<W: fmt::Write>(out: &mut W, value: f64) -> fmt::Result {
    // Debug formatting is the shortest representation that round-trips and
    // always carries a fraction or exponent.
    write!(out, "{value:?}")
}

fn write_string<W: fmt::Write>(out: &mut W, value: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in value.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c if c.is_control() => write!(out, "\\u{{{:x}}}", u32::from(c))?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

fn write_components<W: fmt::Write>(
    out: &mut W,
    constructor: &str,
    components: &[(&str, f64)],
) -> fmt::Result {
    write!(out, "${constructor} {{ ")?;
    for (i, (name, value)) in components.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write!(out, "{name}: ")?;
        write_double(out, *value)?;
    }
    out.write_str(" }")
}

fn write_constant<W: fmt::Write>(out: &mut W, value: &Value) -> fmt::Result {
    match value {
        Value::Null => out.write_str("{}"),
        Value::Bool(true) => out.write_str("$true"),
        Value::Bool(false) => out.write_str("$false"),
        Value::Integer(i) => write!(out, "{i}"),
        Value::Double(d) => write_double(out, *d),
        Value::String(s) => write_string(out, s),
        Value::Color(c) => write_components(
            out,
            "color",
            &[
                ("red", c.red),
                ("green", c.green),
                ("blue", c.blue),
                ("alpha", c.alpha),
            ],
        ),
        Value::Point(p) => write_components(out, "point", &[("x", p.x), ("y", p.y)]),
        Value::Size(s) => write_components(
            out,
            "size",
            &[("width", s.width), ("height", s.height)],
        ),
        Value::Rect(r) => write_components(
            out,
            "rect",
            &[
                ("x", r.x),
                ("y", r.y),
                ("width", r.width),
                ("height", r.height),
            ],
        ),
        Value::Font(font) => {
            out.write_str("$font { ")?;
            if let Some(name) = &font.name {
                out.write_str("name: ")?;
                write_string(out, name)?;
                out.write_str(", ")?;
            }
            out.write_str("size: ")?;
            write_double(out, font.size)?;
            out.write_str(" }")
        }
        Value::Class(name) => write!(out, "<{name}>"),
        Value::Enum { type_name, value } => match type_name {
            Some(type_name) => write!(out, "$enum.{type_name}.{value}"),
            None => write!(out, "$enum.{value}"),
        },
        Value::Options { type_name, flags } => {
            write!(out, "$options.{type_name}{{{}}}", flags.join(", "))
        }
        Value::Array(items) => {
            out.write_char('[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_constant(out, item)?;
            }
            out.write_char(']')
        }
        Value::Map(map) => {
            if map.is_empty() {
                return out.write_str("{}");
            }
            out.write_str("{ ")?;
            for (i, (name, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write!(out, "{name}: ")?;
                write_constant(out, item)?;
            }
            out.write_str(" }")
        }
    }
}
