//! Populating composites from view sources and routing binding events.

use std::cell::RefCell;
use std::rc::Rc;

use tether_controls::{
    ActivationPolicy, CompositeControl, Control, ControlDelegate, ControlError, ControlId,
    OutletCollection, StaticTableView, ViewNode,
};
use tether_expr::{
    BindingExpressionSpecification, BindingSpecification, ExpressionType, KeyPath, TargetKind,
    TypePattern, Value,
};
use tether_runtime::{
    BindingBehavior, BindingContext, BindingId, BindingProviderRegistry, ConversionError, Direction,
    Observable, PropertyBindingProvider,
};
use tracing::Level;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(Level::TRACE)
        .try_init();
}

/// Integer model values shown as text.
struct IntegerText;

impl BindingBehavior for IntegerText {
    fn convert_source_to_target(&self, _: &Value, new: &Value) -> Result<Value, ConversionError> {
        Ok(Value::from(new.to_string()))
    }

    fn convert_target_to_source(&self, _: &Value, new: &Value) -> Result<Value, ConversionError> {
        new.as_str()
            .and_then(|text| text.trim().parse::<i64>().ok())
            .map(Value::from)
            .ok_or_else(|| ConversionError::new(new.clone(), "Integer", "not a whole number"))
    }
}

fn registry() -> BindingProviderRegistry {
    let keyed = || BindingExpressionSpecification::new(ExpressionType::DATA_CONTEXT_KEY_PATH).requiring_primary();
    let mut registry = BindingProviderRegistry::new();
    registry.register(
        PropertyBindingProvider::new(
            BindingSpecification::new("text", keyed()).with_target(TypePattern::accepting(["TextField"])),
        ),
    );
    registry.register(
        PropertyBindingProvider::new(
            BindingSpecification::new("integer", keyed()).with_target(TypePattern::accepting(["TextField"])),
        )
        .with_behavior(|_| IntegerText),
    );
    registry
}

fn model() -> Observable<Value> {
    Observable::new(Value::from(serde_json::json!({
        "user": { "name": "Bob", "email": "bob@example.com", "age": 41 },
    })))
}

fn field(name: &str, binding_type: &str, path: &str) -> ViewNode {
    ViewNode::new(name, TargetKind::new("TextField")).with_binding(binding_type, path)
}

#[derive(Default)]
struct Recorder(RefCell<Vec<(ControlId, Direction, String)>>);

impl ControlDelegate for Recorder {
    fn conversion_failed(&self, control: ControlId, _: BindingId, direction: Direction, error: &ConversionError) {
        self.0.borrow_mut().push((control, direction, error.reason.clone()));
    }
}

/// Root children: A (no binding), B (bound), C (composite holding bound D).
fn scenario_form(registry: &BindingProviderRegistry, context: &BindingContext) -> (CompositeControl, ViewNode, ViewNode) {
    let mut form = CompositeControl::new("form");
    let root = form.root();
    form.add_control(root, Control::leaf("A")).unwrap();

    let b = field("B", "text", "user.name");
    let hierarchy = ViewNode::new("header", TargetKind::new("View")).with_child(b.clone());
    assert_eq!(form.add_controls_from(root, &hierarchy, registry, context).unwrap(), 1);

    let c = form.add_control(root, Control::composite("C")).unwrap();
    let d = field("D", "text", "user.email");
    let outlets = OutletCollection(vec![d.clone()]);
    assert_eq!(form.add_controls_from(c, &outlets, registry, context).unwrap(), 1);
    (form, b, d)
}

#[test]
fn activation_sequence_follows_bound_leaves() {
    init_tracing();
    let registry = registry();
    let context = BindingContext::new(model());
    let (form, b_view, d_view) = scenario_form(&registry, &context);

    let b = form.find("B").unwrap();
    let d = form.find("D").unwrap();
    assert_eq!(form.activation_sequence(), vec![b, d]);
    assert_eq!(form.next_control_in_activation_sequence_after(b), Some(d));
    assert_eq!(form.next_control_in_activation_sequence_after(d), None);

    assert_eq!(b_view.value.get(), Value::from("Bob"));
    assert_eq!(d_view.value.get(), Value::from("bob@example.com"));

    let form = form.with_policy(ActivationPolicy::wrapping());
    assert_eq!(form.next_control_in_activation_sequence_after(d), Some(b));
}

#[test]
fn bound_controls_sync_in_both_directions() {
    init_tracing();
    let registry = registry();
    let data = model();
    let context = BindingContext::new(data.clone());
    let (_form, b_view, _) = scenario_form(&registry, &context);

    b_view.value.set(Value::from("Robert"));
    assert_eq!(
        data.with(|tree| tree.lookup(&KeyPath::parse("user.name"))),
        Some(Value::from("Robert"))
    );
}

#[test]
fn conversion_failures_reach_composite_delegate_tagged_with_control() {
    init_tracing();
    let registry = registry();
    let data = model();
    let context = BindingContext::new(data.clone());

    let mut form = CompositeControl::new("form");
    let recorder = Rc::new(Recorder::default());
    let delegate: Rc<dyn ControlDelegate> = recorder.clone();
    form.set_delegate(Some(Rc::downgrade(&delegate)));

    let age = field("age", "integer", "user.age");
    let root = form.root();
    form.add_controls_from(root, &OutletCollection(vec![age.clone()]), &registry, &context)
        .unwrap();
    let age_control = form.find("age").unwrap();
    assert_eq!(age.value.get(), Value::from("41"));

    age.value.set(Value::from("forty"));
    assert_eq!(
        *recorder.0.borrow(),
        vec![(age_control, Direction::TargetToSource, "not a whole number".to_owned())]
    );
    assert_eq!(
        data.with(|tree| tree.lookup(&KeyPath::parse("user.age"))),
        Some(Value::from(41_i64))
    );

    age.value.set(Value::from("42"));
    assert_eq!(
        data.with(|tree| tree.lookup(&KeyPath::parse("user.age"))),
        Some(Value::from(42_i64))
    );
    assert_eq!(recorder.0.borrow().len(), 1);
}

#[test]
fn failed_population_rolls_back_inserted_controls() {
    init_tracing();
    let registry = registry();
    let context = BindingContext::new(model());
    let mut form = CompositeControl::new("form");
    let root = form.root();

    let table = StaticTableView::default()
        .with_section(vec![field("name", "text", "user.name")])
        .with_section(vec![
            field("broken", "text", "user."),
            field("never", "text", "user.email"),
        ]);
    let err = form.add_controls_from(root, &table, &registry, &context).unwrap_err();
    assert!(matches!(&err, ControlError::Binding { control, .. } if control == "broken"));
    assert!(form.is_empty());

    let unknown = OutletCollection(vec![field("x", "slider", "user.age")]);
    let err = form.add_controls_from(root, &unknown, &registry, &context).unwrap_err();
    assert!(err.to_string().contains("no provider registered for binding type 'slider'"));
    assert!(form.is_empty());
}

#[test]
fn insert_population_keeps_position() {
    init_tracing();
    let registry = registry();
    let context = BindingContext::new(model());
    let mut form = CompositeControl::new("form");
    let root = form.root();
    let first = form.add_control(root, Control::leaf("first")).unwrap();
    let last = form.add_control(root, Control::leaf("last")).unwrap();

    let outlets = vec![
        OutletCollection(vec![field("name", "text", "user.name")]),
        OutletCollection(vec![field("email", "text", "user.email")]),
    ];
    assert_eq!(form.insert_controls_from(root, 1, &outlets, &registry, &context).unwrap(), 2);
    let name = form.find("name").unwrap();
    let email = form.find("email").unwrap();
    assert_eq!(form.controls(root).unwrap(), &[first, name, email, last]);
    assert_eq!(form.activation_sequence(), vec![name, email]);
}

#[test]
fn request_next_walks_populated_form() {
    init_tracing();
    let registry = registry();
    let context = BindingContext::new(model());
    let (mut form, _, _) = scenario_form(&registry, &context);
    let b = form.find("B").unwrap();
    let d = form.find("D").unwrap();

    assert!(form.activate(b).unwrap());
    assert_eq!(form.request_activate_next(b).unwrap(), Some(d));
    assert_eq!(form.request_activate_next(d).unwrap(), None);
    assert_eq!(form.active_control(), None);
}
