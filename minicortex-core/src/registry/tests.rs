use super::*;
use crate::node::NodeBehavior;
use crate::schema::{Action, Category, ClassSource, DataType, NodeClass, Property, Store};
use crate::value::Value;
use parking_lot::Mutex;

struct Emit7;
impl NodeBehavior for Emit7 {
    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        ctx.set_output("out", 7)
    }
}

struct Sink;
impl NodeBehavior for Sink {
    fn process(&mut self, _ctx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }
}

struct Tunable;
impl NodeBehavior for Tunable {
    fn process(&mut self, _ctx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn property_changed(
        &mut self,
        ctx: &mut NodeContext<'_>,
        callback: &str,
        new: &Value,
        old: &Value,
    ) -> Result<()> {
        if callback == "gain_changed" {
            let old = old.as_f64().unwrap_or(0.0);
            let new = new.as_f64().unwrap_or(0.0);
            ctx.set_store("log", format!("{old}->{new}"))?;
        }
        Ok(())
    }

    fn action(
        &mut self,
        ctx: &mut NodeContext<'_>,
        callback: &str,
        _params: &serde_json::Value,
    ) -> Result<Value> {
        match callback {
            "do_reset" => {
                ctx.set_store("log", "")?;
                Ok(Value::Str("ok".into()))
            }
            other => Err(CortexError::not_found("action callback", other)),
        }
    }
}

fn source_class() -> NodeClass {
    NodeClass::builder("source", Category::Input)
        .output("out", "Out", DataType::Int)
        .factory(|| Box::new(Emit7))
        .build()
        .unwrap()
}

fn sink_class() -> NodeClass {
    NodeClass::builder("sink", Category::Output)
        .input("x", "X", DataType::Int)
        .output("y", "Y", DataType::Int)
        .factory(|| Box::new(Sink))
        .build()
        .unwrap()
}

fn array_source_class() -> NodeClass {
    NodeClass::builder("array_source", Category::Input)
        .output("out", "Out", DataType::NdArray)
        .factory(|| Box::new(Sink))
        .build()
        .unwrap()
}

fn any_source_class() -> NodeClass {
    NodeClass::builder("any_source", Category::Input)
        .output("out", "Out", DataType::Any)
        .factory(|| Box::new(Sink))
        .build()
        .unwrap()
}

fn tunable_class() -> NodeClass {
    NodeClass::builder("tunable", Category::Processing)
        .property(Property::range("gain", "Gain", 1.0, 0.0, 10.0).on_change("gain_changed"))
        .action(Action::new("reset", "Reset", "do_reset"))
        .store(Store::new("log", ""))
        .factory(|| Box::new(Tunable))
        .build()
        .unwrap()
}

fn registry() -> Registry {
    let mut reg = Registry::new();
    for class in [
        source_class(),
        sink_class(),
        array_source_class(),
        any_source_class(),
        tunable_class(),
    ] {
        reg.register_class(class).unwrap();
    }
    reg
}

fn at_origin(reg: &mut Registry, type_name: &str) -> InstanceId {
    reg.create_instance(type_name, Position::default()).unwrap()
}

#[test]
fn create_unknown_type_is_not_found() {
    let mut reg = registry();
    let err = reg
        .create_instance("missing", Position::default())
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[test]
fn create_rejects_non_finite_position() {
    let mut reg = registry();
    let err = reg
        .create_instance("source", Position::new(f64::NAN, 0.0))
        .unwrap_err();
    assert_eq!(err.code(), "validation");
}

#[test]
fn instance_ids_follow_creation_order() {
    let mut reg = registry();
    let a = at_origin(&mut reg, "source");
    let b = at_origin(&mut reg, "sink");
    assert_eq!(a.as_str(), "source_0");
    assert_eq!(b.as_str(), "sink_1");
    assert_eq!(reg.instances()[0].seq, 0);
    assert_eq!(reg.instances()[1].seq, 1);
}

#[test]
fn connect_validates_endpoints_in_order() {
    let mut reg = registry();
    let src = at_origin(&mut reg, "source");
    let dst = at_origin(&mut reg, "sink");

    let ghost = InstanceId::from_raw("ghost_9");
    assert_eq!(
        reg.connect(&ghost, "out", &dst, "x", false).unwrap_err().code(),
        "not_found"
    );
    assert_eq!(
        reg.connect(&src, "nope", &dst, "x", false).unwrap_err().code(),
        "not_found"
    );
    assert_eq!(
        reg.connect(&src, "out", &dst, "nope", false).unwrap_err().code(),
        "not_found"
    );

    reg.connect(&src, "out", &dst, "x", false).unwrap();
    assert_eq!(reg.connections().len(), 1);
}

#[test]
fn type_mismatch_is_rejected_but_any_matches() {
    let mut reg = registry();
    let arrays = at_origin(&mut reg, "array_source");
    let any = at_origin(&mut reg, "any_source");
    let dst = at_origin(&mut reg, "sink");

    let err = reg.connect(&arrays, "out", &dst, "x", false).unwrap_err();
    assert_eq!(err.code(), "type_mismatch");
    assert!(reg.connections().is_empty());

    reg.connect(&any, "out", &dst, "x", false).unwrap();
    assert_eq!(reg.connections().len(), 1);
}

#[test]
fn occupied_input_is_port_busy() {
    let mut reg = registry();
    let a = at_origin(&mut reg, "source");
    let a2 = at_origin(&mut reg, "source");
    let b = at_origin(&mut reg, "sink");

    reg.connect(&a, "out", &b, "x", false).unwrap();
    let err = reg.connect(&a2, "out", &b, "x", false).unwrap_err();
    assert_eq!(err.code(), "port_busy");
    // The duplicate of an existing edge is the same rejection.
    let err = reg.connect(&a, "out", &b, "x", false).unwrap_err();
    assert_eq!(err.code(), "port_busy");
    assert_eq!(reg.connections().len(), 1);
    assert_eq!(reg.connections()[0].from_node, a);
}

#[test]
fn cycles_are_allowed_unless_strict() {
    let mut reg = registry();
    let x = at_origin(&mut reg, "sink");
    let y = at_origin(&mut reg, "sink");

    reg.connect(&x, "y", &y, "x", false).unwrap();
    let err = reg.connect(&y, "y", &x, "x", true).unwrap_err();
    assert_eq!(err.code(), "cycle");
    reg.connect(&y, "y", &x, "x", false).unwrap();
    assert_eq!(reg.connections().len(), 2);
}

#[test]
fn self_loop_is_a_cycle_under_strict() {
    let mut reg = registry();
    let x = at_origin(&mut reg, "sink");
    let err = reg.connect(&x, "y", &x, "x", true).unwrap_err();
    assert_eq!(err.code(), "cycle");
    reg.connect(&x, "y", &x, "x", false).unwrap();
}

#[test]
fn delete_removes_touching_connections() {
    let mut reg = registry();
    let a = at_origin(&mut reg, "source");
    let b = at_origin(&mut reg, "sink");
    let c = at_origin(&mut reg, "sink");

    reg.connect(&a, "out", &b, "x", false).unwrap();
    reg.connect(&b, "y", &c, "x", false).unwrap();
    reg.delete_instance(&b).unwrap();

    assert!(reg.instance(&b).is_none());
    assert!(reg.connections().is_empty());
    assert!(reg.instance(&a).is_some());
    assert!(reg.instance(&c).is_some());
}

#[test]
fn property_write_coerces_and_fires_callback() {
    let mut reg = registry();
    let id = at_origin(&mut reg, "tunable");

    let stored = reg.set_property(&id, "gain", &Value::Int(50)).unwrap();
    assert_eq!(stored, Value::Float(10.0)); // clamped
    let logged = reg.instance(&id).unwrap().cells.stores["log"].clone();
    assert_eq!(logged, Value::Str("1->10".into()));

    // Writing the same value again does not re-fire the callback.
    reg.set_store(&id, "log", Value::Str("quiet".into())).unwrap();
    reg.set_property(&id, "gain", &Value::Float(10.0)).unwrap();
    let logged = reg.instance(&id).unwrap().cells.stores["log"].clone();
    assert_eq!(logged, Value::Str("quiet".into()));
}

#[test]
fn property_write_round_trips_through_schema() {
    let mut reg = registry();
    let id = at_origin(&mut reg, "tunable");
    reg.set_property(&id, "gain", &Value::Float(2.5)).unwrap();
    let schema = reg.instance_schema(&id).unwrap();
    let gain = schema
        .properties
        .iter()
        .find(|p| p.spec.key == "gain")
        .unwrap();
    assert_eq!(gain.value, serde_json::json!(2.5));
}

#[test]
fn actions_dispatch_by_callback_name() {
    let mut reg = registry();
    let id = at_origin(&mut reg, "tunable");
    reg.set_store(&id, "log", Value::Str("dirty".into())).unwrap();

    let result = reg
        .invoke_action(&id, "reset", &serde_json::Value::Null)
        .unwrap();
    assert_eq!(result, Value::Str("ok".into()));
    assert_eq!(
        reg.instance(&id).unwrap().cells.stores["log"],
        Value::Str("".into())
    );

    let err = reg
        .invoke_action(&id, "missing", &serde_json::Value::Null)
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[test]
fn display_toggle_requires_known_key() {
    let mut reg = registry();
    let id = at_origin(&mut reg, "source");
    let err = reg.set_display_enabled(&id, "nope", false).unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[test]
fn register_class_is_idempotent_for_static_classes() {
    let mut reg = registry();
    assert!(!reg.register_class(source_class()).unwrap());
    assert_eq!(
        reg.classes()
            .iter()
            .filter(|c| c.type_name == "source")
            .count(),
        1
    );
}

#[test]
fn viewport_zoom_is_clamped() {
    let mut reg = registry();
    reg.set_viewport(Position::new(5.0, -3.0), 99.0).unwrap();
    assert_eq!(reg.viewport().zoom, MAX_ZOOM);
    reg.set_viewport(Position::default(), 0.0).unwrap();
    assert_eq!(reg.viewport().zoom, MIN_ZOOM);
    assert_eq!(
        reg.set_viewport(Position::default(), f64::NAN).unwrap_err().code(),
        "validation"
    );
}

#[test]
fn clear_keeps_classes_and_resets_ids() {
    let mut reg = registry();
    at_origin(&mut reg, "source");
    reg.clear();
    assert!(reg.instances().is_empty());
    assert!(!reg.classes().is_empty());
    let id = at_origin(&mut reg, "source");
    assert_eq!(id.as_str(), "source_0");
}

#[test]
fn palette_groups_by_category_in_registration_order() {
    let reg = registry();
    let palette = reg.palette();
    let categories: Vec<_> = palette.iter().map(|g| g.category.as_str()).collect();
    assert_eq!(categories, ["Input", "Output", "Processing"]);
    let inputs: Vec<_> = palette[0].nodes.iter().map(|n| n.type_name.as_str()).collect();
    assert_eq!(inputs, ["source", "array_source", "any_source"]);
}

// ---------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------

struct StaticProvider;
impl ClassProvider for StaticProvider {
    fn scan(&self) -> Result<Vec<SourceUnit>> {
        Ok(vec![
            SourceUnit {
                name: "basics".into(),
                classes: vec![source_class(), sink_class()],
            },
            SourceUnit {
                name: "_private".into(),
                classes: vec![tunable_class()],
            },
        ])
    }
}

#[test]
fn discovery_skips_underscore_units_and_reports_new_types() {
    let mut reg = Registry::new();
    let added = reg.discover(&StaticProvider).unwrap();
    assert_eq!(added, ["source", "sink"]);
    assert!(reg.class("tunable").is_none());

    // Re-discovery adds nothing new.
    let added = reg.discover(&StaticProvider).unwrap();
    assert!(added.is_empty());
}

// ---------------------------------------------------------------------
// Hot reload
// ---------------------------------------------------------------------

/// An in-memory class source: `load` clones whatever was last stored.
#[derive(Default)]
struct MemorySource {
    slot: Mutex<Option<NodeClass>>,
}

impl MemorySource {
    fn set(&self, class: NodeClass) {
        *self.slot.lock() = Some(class);
    }
}

impl ClassSource for MemorySource {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn load(&self) -> Result<NodeClass> {
        self.slot
            .lock()
            .clone()
            .ok_or_else(|| CortexError::validation("source", "no class staged"))
    }
}

struct Counter;
impl NodeBehavior for Counter {
    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let count = ctx.store("count").as_i64().unwrap_or(0) + 1;
        ctx.set_store("count", count)?;
        ctx.set_output("out", count)
    }
}

fn counter_class(input_key: &str, source: Arc<MemorySource>) -> NodeClass {
    NodeClass::builder("counter", Category::Processing)
        .dynamic()
        .source(source)
        .input(input_key, "In", DataType::Any)
        .output("out", "Out", DataType::Any)
        .property(Property::range("rate", "Rate", 1.0, 0.0, 5.0))
        .store(Store::new("count", 0))
        .factory(|| Box::new(Counter))
        .build()
        .unwrap()
}

#[test]
fn reload_preserves_state_and_drops_vanished_ports() {
    let source = Arc::new(MemorySource::default());
    let v1 = counter_class("x", source.clone());
    source.set(v1.clone());

    let mut reg = registry();
    reg.register_class(v1).unwrap();
    let feeder = at_origin(&mut reg, "any_source");
    let id = at_origin(&mut reg, "counter");
    let downstream = at_origin(&mut reg, "sink");

    reg.connect(&feeder, "out", &id, "x", false).unwrap();
    reg.connect(&id, "out", &downstream, "x", false).unwrap();
    reg.set_property(&id, "rate", &Value::Float(2.0)).unwrap();
    reg.set_store(&id, "count", Value::Int(5)).unwrap();

    // Edit the source: the input port is renamed.
    source.set(counter_class("x2", source.clone()));
    reg.reload_instance(&id).unwrap();

    let inst = reg.instance(&id).unwrap();
    assert_eq!(inst.cells.stores["count"], Value::Int(5));
    assert_eq!(inst.cells.properties["rate"], Value::Float(2.0));
    assert!(inst.class.input("x2").is_some());

    // The edge into the renamed port is gone; the output edge survives.
    assert_eq!(reg.connections().len(), 1);
    assert_eq!(reg.connections()[0].from_node, id);
}

#[test]
fn reload_of_static_class_is_rejected() {
    let mut reg = registry();
    let id = at_origin(&mut reg, "source");
    assert_eq!(reg.reload_instance(&id).unwrap_err().code(), "validation");
}

#[test]
fn failed_source_leaves_instances_untouched() {
    let source = Arc::new(MemorySource::default());
    let v1 = counter_class("x", source.clone());
    source.set(v1.clone());

    let mut reg = registry();
    reg.register_class(v1).unwrap();
    let id = at_origin(&mut reg, "counter");
    reg.set_store(&id, "count", Value::Int(9)).unwrap();

    *source.slot.lock() = None;
    let err = reg.reload_instance(&id).unwrap_err();
    assert_eq!(err.code(), "reload_failed");
    assert_eq!(
        reg.instance(&id).unwrap().cells.stores["count"],
        Value::Int(9)
    );
}

#[test]
fn reregistering_a_dynamic_class_migrates_instances() {
    let source = Arc::new(MemorySource::default());
    let v1 = counter_class("x", source.clone());
    source.set(v1.clone());

    let mut reg = registry();
    reg.register_class(v1).unwrap();
    let id = at_origin(&mut reg, "counter");
    reg.set_store(&id, "count", Value::Int(3)).unwrap();

    let newly_added = reg
        .register_class(counter_class("renamed", source.clone()))
        .unwrap();
    assert!(!newly_added);
    let inst = reg.instance(&id).unwrap();
    assert!(inst.class.input("renamed").is_some());
    assert_eq!(inst.cells.stores["count"], Value::Int(3));
}
