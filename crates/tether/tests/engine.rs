//! Engine configuration driving registries and composites end to end.

use std::io::Write as _;

use proptest::prelude::*;
use tether::prelude::*;
use tether::{ActivationConfig, ConfigError, LoggingConfig, ValidationConfig, logging};
use tether_expr::SchemaErrorKind;
use tracing::Level;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(Level::TRACE)
        .try_init();
}

/// Label binding table with one optional attribute.
const LABEL: &str = r#"{
    "binding_type": "label",
    "target": { "type_pattern": { "accepted_types": ["Label", "TextField"] } },
    "expression": {
        "expression_type": "DATA_CONTEXT_KEY_PATH | STRING_CONSTANT",
        "require_primary": true,
        "attributes": {
            "placeholder": { "expression": { "expression_type": "STRING_CONSTANT" } }
        }
    }
}"#;

fn label_provider() -> PropertyBindingProvider {
    PropertyBindingProvider::new(serde_json::from_str(LABEL).unwrap())
}

fn model() -> Observable<Value> {
    Observable::new(Value::from(serde_json::json!({
        "user": { "name": "Bob", "email": "bob@example.com" },
    })))
}

fn label_target(initial: &str) -> (Observable<Value>, BindingTarget) {
    let view = Observable::new(Value::from(initial));
    let target = BindingTarget::new(ObservableProperty::shared(view.clone(), "label.text"), TargetKind::new("Label"));
    (view, target)
}

fn write_config(name: &str, contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    (dir, path)
}

#[test]
fn undeclared_attribute_rejected_by_default() {
    init_tracing();
    let mut registry = EngineConfig::default().registry();
    registry.register(label_provider());
    let context = BindingContext::new(model());
    let (view, target) = label_target("Ann");

    let err = registry
        .bind("label", "user.name { tooltip: \"Name\" }", target, &context, None)
        .unwrap_err();
    let schema = err.as_schema_error().unwrap();
    assert_eq!(schema.kind, SchemaErrorKind::UnknownAttribute("tooltip".into()));
    assert_eq!(view.get(), Value::from("Ann"));
}

#[cfg(feature = "toml-config")]
#[test]
fn toml_file_relaxes_validation_and_wraps_activation() {
    init_tracing();
    let (_dir, path) = write_config(
        "engine.toml",
        "[validation]\nallow_unknown_attributes = true\n\n[activation]\nwrap = true\n",
    );
    let config = EngineConfig::from_path(&path).unwrap();
    assert!(config.activation.wrap);

    let mut registry = config.registry();
    registry.register(label_provider());
    let context = BindingContext::new(model());
    let (view, target) = label_target("Ann");
    let binding = registry
        .bind("label", "user.name { tooltip: \"Name\", placeholder: \"none\" }", target, &context, None)
        .unwrap();
    assert_eq!(view.get(), Value::from("Bob"));
    assert_eq!(binding.configuration().value("tooltip"), Some(Value::from("Name")));
    assert_eq!(binding.configuration().value("placeholder"), Some(Value::from("none")));

    let mut form = config.composite("form");
    let root = form.root();
    let fields = OutletCollection(vec![
        ViewNode::new("name", TargetKind::new("TextField")).with_binding("label", "user.name"),
        ViewNode::new("email", TargetKind::new("TextField")).with_binding("label", "user.email"),
    ]);
    assert_eq!(form.add_controls_from(root, &fields, &registry, &context).unwrap(), 2);
    let name = form.find("name").unwrap();
    let email = form.find("email").unwrap();
    assert_eq!(form.next_control_in_activation_sequence_after(email), Some(name));
}

#[test]
fn json_file_and_unsupported_extension() {
    let (_dir, path) = write_config("engine.json", r#"{ "logging": { "filter": "tether_runtime=trace" } }"#);
    let config = EngineConfig::from_path(&path).unwrap();
    assert_eq!(config.logging.filter, "tether_runtime=trace");
    assert!(!config.activation.wrap);

    let (_dir, path) = write_config("engine.yaml", "activation: {}\n");
    assert!(matches!(
        EngineConfig::from_path(&path),
        Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"
    ));

    let missing = std::env::temp_dir().join("tether-missing-config.json");
    assert!(matches!(EngineConfig::from_path(&missing), Err(ConfigError::Io { .. })));
}

#[test]
fn required_attribute_missing_names_it() {
    init_tracing();
    let mut registry = EngineConfig::default().registry();
    registry.register(PropertyBindingProvider::new(BindingSpecification::new(
        "formatted",
        BindingExpressionSpecification::new(ExpressionType::DATA_CONTEXT_KEY_PATH)
            .requiring_primary()
            .with_attribute(
                "format",
                BindingAttributeSpecification::new(BindingExpressionSpecification::new(ExpressionType::STRING_CONSTANT))
                    .required(),
            ),
    )));
    let context = BindingContext::new(model());
    let (view, target) = label_target("Ann");

    let err = registry.bind("formatted", "user.name", target, &context, None).unwrap_err();
    let schema = err.as_schema_error().unwrap();
    assert_eq!(schema.kind, SchemaErrorKind::MissingRequiredAttribute("format".into()));
    assert_eq!(schema.attribute_name(), Some("format"));
    assert_eq!(view.get(), Value::from("Ann"));

    let (view, target) = label_target("Ann");
    registry
        .bind("formatted", "user.name { format: \"upper\" }", target, &context, None)
        .unwrap();
    assert_eq!(view.get(), Value::from("Bob"));
}

#[test]
fn logging_init_with_default_config() {
    // A subscriber may already be installed by another test in this binary.
    let _installed = logging::init(&EngineConfig::default().logging).unwrap();
    assert!(!logging::init(&EngineConfig::default().logging).unwrap());
}

fn engine_config() -> impl Strategy<Value = EngineConfig> {
    (any::<bool>(), any::<bool>(), "[a-z_]{1,12}(=(trace|debug|info|warn|error))?", any::<bool>()).prop_map(
        |(allow_unknown_attributes, wrap, filter, json)| EngineConfig {
            validation: ValidationConfig { allow_unknown_attributes },
            activation: ActivationConfig { wrap },
            logging: LoggingConfig { filter, json },
        },
    )
}

proptest! {
    #[test]
    fn config_survives_json(config in engine_config()) {
        let text = serde_json::to_string(&config).unwrap();
        prop_assert_eq!(EngineConfig::from_json_str(&text).unwrap(), config);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn config_survives_toml(config in engine_config()) {
        let text = toml::to_string(&config).unwrap();
        prop_assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn omitted_sections_take_defaults(wrap in any::<bool>()) {
        let text = format!(r#"{{ "activation": {{ "wrap": {wrap} }} }}"#);
        let config = EngineConfig::from_json_str(&text).unwrap();
        prop_assert_eq!(config.activation.wrap, wrap);
        prop_assert_eq!(config.validation, ValidationConfig::default());
        prop_assert_eq!(config.logging, LoggingConfig::default());
    }
}
