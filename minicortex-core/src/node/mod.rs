//! The node runtime contract: what a node implementation provides and how it
//! reads and writes its cells.
//!
//! Node code never touches the registry or the signal store directly. Every
//! hook receives a [`NodeContext`] carrying the schema-backed cell storage
//! for that instance: inputs are read, outputs/displays/stores are written,
//! and the scheduler harvests the results after the call returns.

mod instance;

pub use instance::{Cells, NodeInstance};

use crate::error::{CortexError, Result};
use crate::schema::NodeClass;
use crate::value::Value;
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// The contract a node implementation fulfils.
///
/// `process` is required; everything else has a default. Hooks run on the
/// computation thread (ticks and probes) or on a request-handler thread
/// (actions, property changes), never concurrently for the same instance.
pub trait NodeBehavior: Send {
    /// Called once when an instance is first created, again after every
    /// successful hot reload, and once after workspace load. All cells are
    /// already populated when it runs (defaults or restored values), so
    /// implementations should be idempotent.
    fn init(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// The main compute hook, invoked on every tick and once per probe.
    ///
    /// Inputs may be null on partially-connected graphs; by convention a
    /// node returns early when a required input is null.
    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()>;

    /// Action dispatch. `callback` is the name declared by the triggering
    /// `Action` descriptor; `params` is a free-form parameter mapping.
    fn action(
        &mut self,
        ctx: &mut NodeContext<'_>,
        callback: &str,
        params: &serde_json::Value,
    ) -> Result<Value> {
        let _ = (ctx, params);
        Err(CortexError::not_found("action callback", callback))
    }

    /// Fired by a property write whose descriptor declares an on-change
    /// callback, after the coerced value has been stored.
    fn property_changed(
        &mut self,
        ctx: &mut NodeContext<'_>,
        callback: &str,
        new: &Value,
        old: &Value,
    ) -> Result<()> {
        let _ = (ctx, callback, new, old);
        Ok(())
    }
}

/// A captured node failure: message plus rendered detail.
#[derive(Debug, Clone, Serialize)]
pub struct NodeFault {
    /// The failure message.
    pub message: String,
    /// Rendered error source chain or panic payload.
    pub trace: String,
}

impl NodeFault {
    /// Capture an error, rendering its source chain as the trace.
    pub fn from_error(err: &CortexError) -> Self {
        let mut trace = err.to_string();
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            trace.push_str("\ncaused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            trace,
        }
    }

    /// Capture a panic payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "node code panicked".to_string());
        Self {
            trace: format!("panic in node code: {message}"),
            message,
        }
    }
}

/// Run a node hook, converting both `Err` returns and panics into a
/// [`NodeFault`]. Node code is trusted but not assumed to be panic-free.
pub fn run_guarded<R>(f: impl FnOnce() -> Result<R>) -> Result<R, NodeFault> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(NodeFault::from_error(&err)),
        Err(payload) => Err(NodeFault::from_panic(payload)),
    }
}

/// Schema-backed cell access handed to every node hook.
///
/// Reads are lenient: an unknown key reads as null, like an unconnected
/// input. Writes are strict and fail with `NotFound` so a typo in an output
/// key surfaces immediately.
pub struct NodeContext<'a> {
    class: &'a NodeClass,
    cells: &'a mut Cells,
}

impl<'a> NodeContext<'a> {
    /// Wrap an instance's cells for a hook invocation.
    pub fn new(class: &'a NodeClass, cells: &'a mut Cells) -> Self {
        Self { class, cells }
    }

    /// The schema of the node being executed.
    pub fn class(&self) -> &NodeClass {
        self.class
    }

    /// Read an input port. Null when unconnected or unpopulated.
    pub fn input(&self, key: &str) -> &Value {
        self.cells.inputs.get(key).unwrap_or(&Value::Null)
    }

    /// Write an output port.
    pub fn set_output(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        if self.class.output(key).is_none() {
            return Err(CortexError::not_found("output port", key));
        }
        self.cells.outputs.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Read a property. Falls back to the declared default for unset cells.
    pub fn property(&self, key: &str) -> &Value {
        if let Some(value) = self.cells.properties.get(key) {
            return value;
        }
        self.class
            .property(key)
            .map(|p| &p.default)
            .unwrap_or(&Value::Null)
    }

    /// Write a display cell.
    pub fn set_display(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        if self.class.display(key).is_none() {
            return Err(CortexError::not_found("display", key));
        }
        self.cells.displays.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Read a store cell.
    pub fn store(&self, key: &str) -> &Value {
        if let Some(value) = self.cells.stores.get(key) {
            return value;
        }
        self.class
            .store(key)
            .map(|s| &s.default)
            .unwrap_or(&Value::Null)
    }

    /// Write a store cell.
    pub fn set_store(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        if self.class.store(key).is_none() {
            return Err(CortexError::not_found("store", key));
        }
        self.cells.stores.insert(key.to_string(), value.into());
        Ok(())
    }
}
