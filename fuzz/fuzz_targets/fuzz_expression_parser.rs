#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tether_expr::{
    BindingExpression, BindingExpressionSpecification, ExpressionType, ValidationOptions, Validator,
};

#[derive(Debug, Arbitrary)]
struct Input {
    text: String,
    expression_type: u32,
    allow_unknown_attributes: bool,
    require_primary: bool,
}

fuzz_target!(|input: Input| {
    let Ok(expression) = BindingExpression::parse(&input.text) else {
        return;
    };

    let printed = expression.to_string();
    let reparsed = BindingExpression::parse(&printed);
    assert!(reparsed.is_ok(), "printed form failed to parse: {printed:?}");

    let mut spec = BindingExpressionSpecification::new(ExpressionType::from_bits_truncate(input.expression_type));
    spec.require_primary = input.require_primary;
    let options = ValidationOptions {
        allow_unknown_attributes: input.allow_unknown_attributes,
    };
    let _ = Validator::new(options).validate(&expression, &spec);
});
