//! Property tests: serialized expressions reparse to the same tree.

use proptest::prelude::*;
use tether_expr::{
    BindingExpression, Color, Font, KeyPath, KeyPathScope, Point, Predicate, PrimaryExpression,
    Rect, Size, Value,
};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,6}".prop_filter("keyword", |s| s != "true" && s != "false")
}

fn type_name() -> impl Strategy<Value = String> {
    "[A-Z][a-zA-Z0-9]{0,8}"
}

fn finite() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("finite", |d| d.is_finite())
}

fn unit() -> impl Strategy<Value = f64> {
    0.0f64..=1.0
}

fn key_path() -> impl Strategy<Value = PrimaryExpression> {
    prop_oneof![
        proptest::collection::vec(ident(), 1..4).prop_map(|segments| PrimaryExpression::KeyPath {
            scope: KeyPathScope::Unqualified,
            path: KeyPath::from_segments(segments),
        }),
        (
            prop_oneof![
                Just(KeyPathScope::DataContext),
                Just(KeyPathScope::RootDataContext),
                Just(KeyPathScope::Control),
            ],
            proptest::collection::vec(ident(), 0..4),
        )
            .prop_map(|(scope, segments)| PrimaryExpression::KeyPath {
                scope,
                path: KeyPath::from_segments(segments),
            }),
    ]
}

fn constant() -> impl Strategy<Value = Value> {
    prop_oneof![
        "\\PC*".prop_map(Value::String),
        any::<i64>().prop_map(Value::Integer),
        finite().prop_map(Value::Double),
        any::<bool>().prop_map(Value::Bool),
        type_name().prop_map(Value::Class),
        (unit(), unit(), unit(), unit())
            .prop_map(|(r, g, b, a)| Value::Color(Color::rgba(r, g, b, a))),
        (finite(), finite()).prop_map(|(x, y)| Value::Point(Point { x, y })),
        (finite(), finite()).prop_map(|(width, height)| Value::Size(Size { width, height })),
        (finite(), finite(), finite(), finite()).prop_map(|(x, y, width, height)| {
            Value::Rect(Rect {
                x,
                y,
                width,
                height,
            })
        }),
        (proptest::option::of("\\PC{0,12}"), finite())
            .prop_map(|(name, size)| Value::Font(Font { name, size })),
        (proptest::option::of(type_name()), type_name())
            .prop_map(|(type_name, value)| Value::Enum { type_name, value }),
        (type_name(), proptest::collection::vec(type_name(), 0..4))
            .prop_map(|(type_name, flags)| Value::Options { type_name, flags }),
    ]
}

fn leaf_primary() -> impl Strategy<Value = PrimaryExpression> {
    prop_oneof![key_path(), constant().prop_map(PrimaryExpression::Constant)]
}

fn expression() -> impl Strategy<Value = BindingExpression> {
    let leaf = proptest::option::of(leaf_primary()).prop_map(BindingExpression::new);
    leaf.prop_recursive(4, 48, 4, |inner| {
        (
            proptest::option::of(prop_oneof![
                3 => leaf_primary(),
                1 => proptest::collection::vec(inner.clone(), 0..4).prop_map(PrimaryExpression::Array),
            ]),
            proptest::collection::vec((ident(), inner), 0..4),
        )
            .prop_map(|(primary, attributes)| {
                attributes
                    .into_iter()
                    .fold(BindingExpression::new(primary), |expr, (name, value)| {
                        expr.with_attribute(name, value)
                    })
            })
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn compact_text_reparses(expr in expression()) {
        let text = expr.to_string();
        let reparsed = BindingExpression::parse(&text);
        prop_assert!(reparsed.is_ok(), "failed to reparse {text:?}: {reparsed:?}");
        prop_assert_eq!(reparsed.ok(), Some(expr));
    }

    #[test]
    fn pretty_text_reparses(expr in expression(), indent in 0usize..6) {
        let text = expr.to_text_pretty(indent);
        prop_assert_eq!(BindingExpression::parse(&text).ok(), Some(expr));
    }

    #[test]
    fn classification_survives_round_trip(expr in expression()) {
        let reparsed = BindingExpression::parse(&expr.to_string()).ok();
        prop_assert_eq!(
            reparsed.as_ref().and_then(BindingExpression::expression_type),
            expr.expression_type()
        );
        let keys: Vec<_> = expr.attributes().keys().cloned().collect();
        let reparsed_keys: Vec<_> = reparsed
            .map(|e| e.attributes().keys().cloned().collect())
            .unwrap_or_default();
        prop_assert_eq!(keys, reparsed_keys);
    }

    #[test]
    fn parser_never_panics(text in "\\PC{0,64}") {
        let _ = BindingExpression::parse(&text);
        let _ = Predicate::parse(&text);
    }

    #[test]
    fn predicate_text_reparses(
        path in proptest::collection::vec(ident(), 1..3),
        bound in any::<i64>(),
        negate in any::<bool>(),
    ) {
        let text = format!("{}{} >= {bound} || $root.flag", if negate { "!" } else { "" }, path.join("."));
        let parsed = Predicate::parse(&text);
        prop_assert!(parsed.is_ok());
        let parsed = parsed.ok();
        let reparsed = parsed.as_ref().and_then(|p| Predicate::parse(&p.to_string()).ok());
        prop_assert_eq!(reparsed, parsed);
    }
}
