#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_expr::{KeyPath, KeyPathResolver, KeyPathScope, Predicate, Value};

struct Fixed;

impl KeyPathResolver for Fixed {
    fn resolve(&self, _: KeyPathScope, path: &KeyPath) -> Option<Value> {
        (path.to_string().len() % 2 == 0).then(|| Value::from(18_i64))
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(predicate) = Predicate::parse(text) else {
        return;
    };
    let printed = predicate.to_string();
    let reparsed = Predicate::parse(&printed);
    assert!(reparsed.is_ok(), "printed form failed to parse: {printed:?}");
    let _ = predicate.evaluate(&Fixed);
});
