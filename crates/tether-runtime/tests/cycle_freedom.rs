//! Property tests for the synchronization state machine.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use tether_expr::Value;
use tether_runtime::{
    Binding, BindingBehavior, ConversionError, Observable, ObservableProperty, Subscription,
};

#[derive(Debug, Clone)]
enum Op {
    SetSource(i64),
    SetTarget(i64),
    Start,
    Stop,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0i64..6).prop_map(Op::SetSource),
        4 => (0i64..6).prop_map(Op::SetTarget),
        1 => Just(Op::Start),
        1 => Just(Op::Stop),
    ]
}

/// Doubles towards the target, halves back towards the source.
struct Scale;

impl BindingBehavior for Scale {
    fn convert_source_to_target(&self, _: &Value, new: &Value) -> Result<Value, ConversionError> {
        new.as_i64()
            .map(|n| Value::Integer(n * 2))
            .ok_or_else(|| ConversionError::new(new.clone(), "integer", "not an integer"))
    }

    fn convert_target_to_source(&self, _: &Value, new: &Value) -> Result<Value, ConversionError> {
        new.as_i64()
            .map(|n| Value::Integer(n.div_euclid(2)))
            .ok_or_else(|| ConversionError::new(new.clone(), "integer", "not an integer"))
    }
}

struct Harness {
    source: Observable<Value>,
    target: Observable<Value>,
    binding: Binding,
    both_flags_seen: Rc<Cell<bool>>,
    source_writes_during_target_update: Rc<Cell<u32>>,
    target_writes_during_source_update: Rc<Cell<u32>>,
    _probes: Vec<Subscription>,
}

fn harness(scaled: bool) -> Harness {
    let source = Observable::new(Value::Integer(0));
    let target = Observable::new(Value::Integer(0));
    let builder = Binding::builder(
        ObservableProperty::shared(source.clone(), "source"),
        ObservableProperty::shared(target.clone(), "target"),
    );
    let binding = if scaled { builder.behavior(Scale).build() } else { builder.build() };

    let both_flags_seen = Rc::new(Cell::new(false));
    let source_writes = Rc::new(Cell::new(0));
    let target_writes = Rc::new(Cell::new(0));

    let probe_source = {
        let binding = binding.clone();
        let both = Rc::clone(&both_flags_seen);
        let writes = Rc::clone(&source_writes);
        source.subscribe(move |_, _| {
            both.set(both.get() || (binding.is_updating_source() && binding.is_updating_target()));
            if binding.is_updating_target() {
                writes.set(writes.get() + 1);
            }
        })
    };
    let probe_target = {
        let binding = binding.clone();
        let both = Rc::clone(&both_flags_seen);
        let writes = Rc::clone(&target_writes);
        target.subscribe(move |_, _| {
            both.set(both.get() || (binding.is_updating_source() && binding.is_updating_target()));
            if binding.is_updating_source() {
                writes.set(writes.get() + 1);
            }
        })
    };

    Harness {
        source,
        target,
        binding,
        both_flags_seen,
        source_writes_during_target_update: source_writes,
        target_writes_during_source_update: target_writes,
        _probes: vec![probe_source, probe_target],
    }
}

fn run(h: &Harness, ops: &[Op]) -> Result<(), TestCaseError> {
    for op in ops {
        let (source_before, target_before) = (h.source.version(), h.target.version());
        match *op {
            Op::SetSource(n) => {
                h.source.set(Value::Integer(n));
                prop_assert!(h.source.version() <= source_before + 1);
            }
            Op::SetTarget(n) => {
                h.target.set(Value::Integer(n));
                prop_assert!(h.target.version() <= target_before + 1);
            }
            Op::Start => h.binding.start_observing_changes(),
            Op::Stop => h.binding.stop_observing_changes(),
        }
        let expected = if h.binding.is_observing() { 2 } else { 0 };
        prop_assert_eq!(h.binding.subscription_count(), expected);
        prop_assert!(!h.binding.is_updating_source());
        prop_assert!(!h.binding.is_updating_target());
    }
    prop_assert!(!h.both_flags_seen.get());
    prop_assert_eq!(h.source_writes_during_target_update.get(), 0);
    prop_assert_eq!(h.target_writes_during_source_update.get(), 0);
    Ok(())
}

proptest! {
    #[test]
    fn identity_binding_never_cycles(ops in proptest::collection::vec(op(), 0..40)) {
        let h = harness(false);
        h.binding.start_observing_changes();
        run(&h, &ops)?;
        if h.binding.is_observing() {
            prop_assert_eq!(h.source.get(), h.target.get());
        }
    }

    #[test]
    fn converting_binding_never_cycles(ops in proptest::collection::vec(op(), 0..40)) {
        let h = harness(true);
        h.binding.start_observing_changes();
        run(&h, &ops)?;
    }

    #[test]
    fn observation_lifecycle_is_idempotent(toggles in proptest::collection::vec(any::<bool>(), 1..20)) {
        let h = harness(false);
        for start in toggles {
            if start {
                h.binding.start_observing_changes();
            } else {
                h.binding.stop_observing_changes();
            }
        }
        h.binding.start_observing_changes();
        h.binding.stop_observing_changes();
        h.binding.start_observing_changes();
        prop_assert_eq!(h.binding.subscription_count(), 2);

        // Exactly one delivery per change.
        let deliveries = Rc::new(Cell::new(0));
        let d = Rc::clone(&deliveries);
        let _count = h.target.subscribe(move |_, _| d.set(d.get() + 1));
        h.source.set(Value::Integer(99));
        prop_assert_eq!(deliveries.get(), 1);
        prop_assert_eq!(h.target.get(), Value::Integer(99));
    }
}
