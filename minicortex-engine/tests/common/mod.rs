//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use minicortex_core::prelude::*;
use minicortex_engine::{Engine, EngineConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

/// An engine with its workspace directory in a tempdir.
pub fn test_engine() -> (Engine, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        workspaces_dir: dir.path().to_path_buf(),
        ..EngineConfig::default()
    };
    (Engine::new(config), dir)
}

/// Read a display's current value from the instance schema.
pub fn display_value(engine: &Engine, id: &InstanceId, key: &str) -> serde_json::Value {
    engine
        .instance_schema(id)
        .unwrap()
        .outputs
        .into_iter()
        .find(|d| d.spec.key == key)
        .unwrap()
        .value
        .unwrap()
}

/// Read a property's current value from the instance schema.
pub fn property_value(engine: &Engine, id: &InstanceId, key: &str) -> serde_json::Value {
    engine
        .instance_schema(id)
        .unwrap()
        .properties
        .into_iter()
        .find(|p| p.spec.key == key)
        .unwrap()
        .value
}

// ---------------------------------------------------------------------
// Node classes
// ---------------------------------------------------------------------

/// Emits the `value` property on `out` every tick.
struct IntSource;
impl NodeBehavior for IntSource {
    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let value = ctx.property("value").as_i64().unwrap_or(0);
        ctx.set_output("out", value)?;
        ctx.set_display("reading", value as f64)
    }
}

pub fn int_source_class() -> NodeClass {
    NodeClass::builder("int_source", Category::Input)
        .output("out", "Out", DataType::Int)
        .property(Property::integer("value", "Value", 7))
        .display(Display::numeric("reading", "Reading"))
        .factory(|| Box::new(IntSource))
        .build()
        .unwrap()
}

/// `y = x + bias`; returns early while `x` is unconnected.
struct Adder;
impl NodeBehavior for Adder {
    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let x = ctx.input("x").clone();
        if x.is_null() {
            return Ok(());
        }
        let bias = ctx.property("bias").as_i64().unwrap_or(0);
        let y = x.as_i64().unwrap_or(0) + bias;
        ctx.set_output("y", y)?;
        ctx.set_display("sum", y as f64)
    }
}

pub fn adder_class() -> NodeClass {
    NodeClass::builder("adder", Category::Processing)
        .input("x", "X", DataType::Int)
        .output("y", "Y", DataType::Int)
        .property(Property::integer("bias", "Bias", 3))
        .display(Display::numeric("sum", "Sum"))
        .factory(|| Box::new(Adder))
        .build()
        .unwrap()
}

/// Self-loop counter: `curr = (prev or 0) + 1`.
struct LoopCounter;
impl NodeBehavior for LoopCounter {
    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let curr = ctx.input("prev").as_i64().unwrap_or(0) + 1;
        ctx.set_output("curr", curr)?;
        ctx.set_display("count", curr as f64)
    }
}

pub fn loop_counter_class() -> NodeClass {
    NodeClass::builder("loop_counter", Category::Processing)
        .input("prev", "Previous", DataType::Any)
        .output("curr", "Current", DataType::Int)
        .display(Display::numeric("count", "Count"))
        .factory(|| Box::new(LoopCounter))
        .build()
        .unwrap()
}

/// Relay for two-node cycles: `out = (in or 0) + 1`.
struct Relay;
impl NodeBehavior for Relay {
    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let out = ctx.input("in").as_i64().unwrap_or(0) + 1;
        ctx.set_output("out", out)?;
        ctx.set_display("val", out as f64)
    }
}

pub fn relay_class() -> NodeClass {
    NodeClass::builder("relay", Category::Processing)
        .input("in", "In", DataType::Any)
        .output("out", "Out", DataType::Int)
        .display(Display::numeric("val", "Value"))
        .factory(|| Box::new(Relay))
        .build()
        .unwrap()
}

/// Fails whenever its input carries a value.
struct FailsOnInput;
impl NodeBehavior for FailsOnInput {
    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        if ctx.input("x").is_null() {
            return Ok(());
        }
        Err(CortexError::validation("boom", "intentional test failure"))
    }
}

pub fn failing_class() -> NodeClass {
    NodeClass::builder("failing", Category::Processing)
        .input("x", "X", DataType::Any)
        .factory(|| Box::new(FailsOnInput))
        .build()
        .unwrap()
}

/// Publishes the tensor held in its `matrix` store.
struct MatrixKeeper;
impl NodeBehavior for MatrixKeeper {
    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        if let Some(matrix) = ctx.store("matrix").as_tensor().cloned() {
            ctx.set_output("out", matrix.clone())?;
            ctx.set_display("view", matrix)?;
        }
        Ok(())
    }
}

pub fn matrix_class() -> NodeClass {
    NodeClass::builder("matrix_store", Category::Input)
        .output("out", "Out", DataType::NdArray)
        .display(Display::vector2d("view", "View"))
        .store(Store::new("matrix", Value::Null))
        .factory(|| Box::new(MatrixKeeper))
        .build()
        .unwrap()
}

/// Counts how many times `init` has run on this instance.
struct InitCounter;
impl NodeBehavior for InitCounter {
    fn init(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let inits = ctx.store("inits").as_i64().unwrap_or(0) + 1;
        ctx.set_store("inits", inits)
    }

    fn process(&mut self, _ctx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }
}

pub fn init_counter_class() -> NodeClass {
    NodeClass::builder("init_counter", Category::Utilities)
        .store(Store::new("inits", 0))
        .factory(|| Box::new(InitCounter))
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------
// Hot-reload fixtures
// ---------------------------------------------------------------------

/// An in-memory class source: `load` clones whatever was last staged.
#[derive(Default)]
pub struct MemorySource {
    slot: Mutex<Option<NodeClass>>,
}

impl MemorySource {
    pub fn stage(&self, class: NodeClass) {
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

/// Increments its `count` store every tick and emits it.
struct Accumulator;
impl NodeBehavior for Accumulator {
    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let count = ctx.store("count").as_i64().unwrap_or(0) + 1;
        ctx.set_store("count", count)?;
        ctx.set_output("out", count)
    }
}

/// The hot-reloadable accumulator; `input_key` names the input port so
/// tests can simulate a source edit that renames it.
pub fn accumulator_class(input_key: &str, source: Arc<MemorySource>) -> NodeClass {
    NodeClass::builder("acc", Category::Processing)
        .dynamic()
        .source(source)
        .input(input_key, "In", DataType::Any)
        .output("out", "Out", DataType::Any)
        .property(Property::range("gain", "Gain", 1.0, 0.0, 10.0))
        .store(Store::new("count", 0))
        .factory(|| Box::new(Accumulator))
        .build()
        .unwrap()
}
