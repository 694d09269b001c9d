//! The registry: class table, instance table, connection list, and viewport.
//!
//! A registry is a plain owned object; the engine wraps one in the single
//! process-wide lock together with the signal store and supervisor state.
//! Tests construct their own.
//!
//! All graph invariants are enforced here: connections only between existing,
//! type-compatible ports; at most one edge per input port; finite positions;
//! unique class type names.

mod discovery;
mod reload;
mod snapshot;

pub use discovery::{ClassProvider, SourceUnit};
pub use snapshot::{
    DisplayView, InstanceSchema, InstanceSummary, PaletteEntry, PaletteGroup, PropertyView,
    TopologySnapshot,
};

use crate::error::{CortexError, Result};
use crate::node::{NodeContext, NodeInstance, run_guarded};
use crate::schema::NodeClass;
use crate::types::{InstanceId, Position};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Lower bound for the editor zoom factor.
pub const MIN_ZOOM: f64 = 0.1;
/// Upper bound for the editor zoom factor.
pub const MAX_ZOOM: f64 = 3.0;

/// A directed connection from one node's output to another node's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Source instance.
    pub from_node: InstanceId,
    /// Source output port key.
    pub from_output: String,
    /// Target instance.
    pub to_node: InstanceId,
    /// Target input port key.
    pub to_input: String,
}

impl Connection {
    /// Create a connection record.
    pub fn new(
        from_node: impl Into<InstanceId>,
        from_output: impl Into<String>,
        to_node: impl Into<InstanceId>,
        to_input: impl Into<String>,
    ) -> Self {
        Self {
            from_node: from_node.into(),
            from_output: from_output.into(),
            to_node: to_node.into(),
            to_input: to_input.into(),
        }
    }

    /// Whether either endpoint references the given instance.
    pub fn touches(&self, id: &InstanceId) -> bool {
        self.from_node == *id || self.to_node == *id
    }
}

/// Editor viewport: pan offset plus zoom factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Pan offset.
    pub pan: Position,
    /// Zoom factor, kept within `[MIN_ZOOM, MAX_ZOOM]`.
    pub zoom: f64,
}

impl Viewport {
    /// A viewport with the zoom clamped into its valid range.
    pub fn clamped(pan: Position, zoom: f64) -> Self {
        Self {
            pan,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Position::default(),
            zoom: 1.0,
        }
    }
}

/// The class/instance/connection/viewport tables.
#[derive(Default)]
pub struct Registry {
    pub(crate) classes: Vec<Arc<NodeClass>>,
    pub(crate) class_index: HashMap<String, usize>,
    pub(crate) instances: Vec<NodeInstance>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) viewport: Viewport,
    pub(crate) next_seq: u64,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------

    /// Register a class, idempotent on type name.
    ///
    /// Returns `true` when the class was newly added. Re-registering a name
    /// that belongs to a `dynamic` class is a replacement and migrates every
    /// live instance (see hot reload); re-registering a non-dynamic class is
    /// a no-op.
    pub fn register_class(&mut self, class: NodeClass) -> Result<bool> {
        match self.class_index.get(&class.type_name) {
            Some(&idx) => {
                if self.classes[idx].dynamic {
                    self.install_class_replacement(Arc::new(class))?;
                }
                Ok(false)
            }
            None => {
                tracing::info!(type_name = %class.type_name, "registered node class");
                self.class_index
                    .insert(class.type_name.clone(), self.classes.len());
                self.classes.push(Arc::new(class));
                Ok(true)
            }
        }
    }

    /// Look up a class by type name.
    pub fn class(&self, type_name: &str) -> Option<&Arc<NodeClass>> {
        self.class_index.get(type_name).map(|&i| &self.classes[i])
    }

    /// All registered classes, in registration order.
    pub fn classes(&self) -> &[Arc<NodeClass>] {
        &self.classes
    }

    // ------------------------------------------------------------------
    // Instances
    // ------------------------------------------------------------------

    /// Create an instance of a class at the given position and run `init`.
    pub fn create_instance(&mut self, type_name: &str, position: Position) -> Result<InstanceId> {
        let class = self
            .class(type_name)
            .cloned()
            .ok_or_else(|| CortexError::not_found("node type", type_name))?;
        if !position.is_finite() {
            return Err(CortexError::validation("position", "must be finite"));
        }

        let seq = self.next_seq;
        let id = InstanceId::derive(type_name, seq);
        let mut instance = NodeInstance::new(id.clone(), class.clone(), position, seq);
        self.run_init(&mut instance)?;

        self.next_seq += 1;
        self.instances.push(instance);
        tracing::info!(instance = %id, type_name, "created node instance");
        Ok(id)
    }

    /// Destroy an instance, removing every connection that touches it.
    pub fn delete_instance(&mut self, id: &InstanceId) -> Result<()> {
        let idx = self
            .instance_index(id)
            .ok_or_else(|| CortexError::not_found("instance", id.as_str()))?;
        self.instances.remove(idx);
        self.connections.retain(|c| !c.touches(id));
        tracing::info!(instance = %id, "deleted node instance");
        Ok(())
    }

    /// Look up an instance by ID.
    pub fn instance(&self, id: &InstanceId) -> Option<&NodeInstance> {
        self.instances.iter().find(|i| i.id == *id)
    }

    /// Mutable lookup by ID.
    pub fn instance_mut(&mut self, id: &InstanceId) -> Option<&mut NodeInstance> {
        self.instances.iter_mut().find(|i| i.id == *id)
    }

    /// All instances, in creation order.
    pub fn instances(&self) -> &[NodeInstance] {
        &self.instances
    }

    fn instance_index(&self, id: &InstanceId) -> Option<usize> {
        self.instances.iter().position(|i| i.id == *id)
    }

    /// Move an instance on the canvas.
    pub fn set_position(&mut self, id: &InstanceId, x: f64, y: f64) -> Result<()> {
        let position = Position::new(x, y);
        if !position.is_finite() {
            return Err(CortexError::validation("position", "must be finite"));
        }
        let instance = self
            .instance_mut(id)
            .ok_or_else(|| CortexError::not_found("instance", id.as_str()))?;
        instance.position = position;
        Ok(())
    }

    /// Write a property value, coercing and clamping per its kind.
    ///
    /// Fires the property's on-change callback when the stored value
    /// actually changed. Returns the coerced value.
    pub fn set_property(&mut self, id: &InstanceId, key: &str, value: &Value) -> Result<Value> {
        let (class, behavior) = {
            let instance = self
                .instance(id)
                .ok_or_else(|| CortexError::not_found("instance", id.as_str()))?;
            (instance.class.clone(), instance.behavior())
        };
        let property = class
            .property(key)
            .ok_or_else(|| CortexError::not_found("property", key))?;
        let coerced = property.coerce(value)?;

        let instance = self.instance_mut(id).expect("instance checked above");
        let name = instance.name.clone();
        let old = instance
            .cells
            .properties
            .insert(key.to_string(), coerced.clone())
            .unwrap_or(Value::Null);

        if coerced != old {
            if let Some(callback) = &property.on_change {
                let mut behavior = behavior.lock();
                let mut ctx = NodeContext::new(&class, &mut instance.cells);
                run_guarded(|| behavior.property_changed(&mut ctx, callback, &coerced, &old))
                    .map_err(|fault| CortexError::NodeRuntime {
                        instance: id.clone(),
                        name,
                        message: fault.message,
                        trace: fault.trace,
                    })?;
            }
        }
        Ok(coerced)
    }

    /// Write a store value directly (request-handler path).
    pub fn set_store(&mut self, id: &InstanceId, key: &str, value: Value) -> Result<()> {
        let instance = self
            .instance_mut(id)
            .ok_or_else(|| CortexError::not_found("instance", id.as_str()))?;
        if instance.class.store(key).is_none() {
            return Err(CortexError::not_found("store", key));
        }
        instance.cells.stores.insert(key.to_string(), value);
        Ok(())
    }

    /// Enable or disable broadcasting of a display output.
    pub fn set_display_enabled(&mut self, id: &InstanceId, key: &str, enabled: bool) -> Result<()> {
        let instance = self
            .instance_mut(id)
            .ok_or_else(|| CortexError::not_found("instance", id.as_str()))?;
        if instance.class.display(key).is_none() {
            return Err(CortexError::not_found("display", key));
        }
        instance.enabled_displays.insert(key.to_string(), enabled);
        Ok(())
    }

    /// Invoke a node action synchronously, returning its result value.
    pub fn invoke_action(
        &mut self,
        id: &InstanceId,
        key: &str,
        params: &serde_json::Value,
    ) -> Result<Value> {
        let (class, behavior) = {
            let instance = self
                .instance(id)
                .ok_or_else(|| CortexError::not_found("instance", id.as_str()))?;
            (instance.class.clone(), instance.behavior())
        };
        let callback = class
            .action(key)
            .ok_or_else(|| CortexError::not_found("action", key))?
            .callback
            .clone();

        let instance = self.instance_mut(id).expect("instance checked above");
        let name = instance.name.clone();
        let mut behavior = behavior.lock();
        let mut ctx = NodeContext::new(&class, &mut instance.cells);
        run_guarded(|| behavior.action(&mut ctx, &callback, params)).map_err(|fault| {
            CortexError::NodeRuntime {
                instance: id.clone(),
                name,
                message: fault.message,
                trace: fault.trace,
            }
        })
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Create a connection.
    ///
    /// Fails with `NotFound` for missing endpoints, `TypeMismatch` for
    /// incompatible port types, `PortBusy` when the target input already has
    /// an edge, and `Cycle` when `strict_acyclic` is set and the edge would
    /// close a cycle. Cycles are permitted by default; the scheduler breaks
    /// them with one-tick feedback delays.
    pub fn connect(
        &mut self,
        from_node: &InstanceId,
        from_output: &str,
        to_node: &InstanceId,
        to_input: &str,
        strict_acyclic: bool,
    ) -> Result<()> {
        let source = self
            .instance(from_node)
            .ok_or_else(|| CortexError::not_found("instance", from_node.as_str()))?;
        let target = self
            .instance(to_node)
            .ok_or_else(|| CortexError::not_found("instance", to_node.as_str()))?;

        let out_port = source
            .class
            .output(from_output)
            .ok_or_else(|| CortexError::not_found("output port", from_output))?;
        let in_port = target
            .class
            .input(to_input)
            .ok_or_else(|| CortexError::not_found("input port", to_input))?;

        if !out_port.data_type.compatible(&in_port.data_type) {
            return Err(CortexError::TypeMismatch {
                from_node: from_node.clone(),
                from_port: from_output.to_string(),
                from_type: out_port.data_type.to_string(),
                to_node: to_node.clone(),
                to_port: to_input.to_string(),
                to_type: in_port.data_type.to_string(),
            });
        }

        if self
            .connections
            .iter()
            .any(|c| c.to_node == *to_node && c.to_input == to_input)
        {
            return Err(CortexError::PortBusy {
                node: to_node.clone(),
                port: to_input.to_string(),
            });
        }

        if strict_acyclic && self.would_cycle(from_node, to_node) {
            return Err(CortexError::Cycle {
                from_node: from_node.clone(),
                to_node: to_node.clone(),
            });
        }

        self.connections.push(Connection::new(
            from_node.clone(),
            from_output,
            to_node.clone(),
            to_input,
        ));
        Ok(())
    }

    /// Remove the matching connection. No-op (returns `false`) if absent.
    pub fn disconnect(
        &mut self,
        from_node: &InstanceId,
        from_output: &str,
        to_node: &InstanceId,
        to_input: &str,
    ) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| {
            !(c.from_node == *from_node
                && c.from_output == from_output
                && c.to_node == *to_node
                && c.to_input == to_input)
        });
        self.connections.len() != before
    }

    /// All connections, in creation order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Whether adding `from -> to` would close a cycle: true when `from` is
    /// already reachable from `to` along existing edges (or `from == to`).
    fn would_cycle(&self, from: &InstanceId, to: &InstanceId) -> bool {
        if from == to {
            return true;
        }
        let mut queue: VecDeque<&InstanceId> = VecDeque::from([to]);
        let mut seen: HashSet<&InstanceId> = HashSet::from([to]);
        while let Some(node) = queue.pop_front() {
            for conn in self.connections.iter().filter(|c| c.from_node == *node) {
                if conn.to_node == *from {
                    return true;
                }
                if seen.insert(&conn.to_node) {
                    queue.push_back(&conn.to_node);
                }
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------

    /// Update the editor viewport. Zoom is clamped into its valid range.
    pub fn set_viewport(&mut self, pan: Position, zoom: f64) -> Result<()> {
        if !pan.is_finite() || !zoom.is_finite() {
            return Err(CortexError::validation("viewport", "must be finite"));
        }
        self.viewport = Viewport::clamped(pan, zoom);
        Ok(())
    }

    /// The current viewport.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Empty the instance and connection tables and reset the viewport and
    /// ID counter. Registered classes are kept.
    pub fn clear(&mut self) {
        self.instances.clear();
        self.connections.clear();
        self.viewport = Viewport::default();
        self.next_seq = 0;
    }

    // ------------------------------------------------------------------
    // Internals shared with reload / workspace install
    // ------------------------------------------------------------------

    pub(crate) fn run_init(&self, instance: &mut NodeInstance) -> Result<()> {
        let behavior = instance.behavior();
        let class = instance.class.clone();
        let id = instance.id.clone();
        let name = instance.name.clone();
        let mut behavior = behavior.lock();
        let mut ctx = NodeContext::new(&class, &mut instance.cells);
        run_guarded(|| behavior.init(&mut ctx)).map_err(|fault| CortexError::NodeRuntime {
            instance: id,
            name,
            message: fault.message,
            trace: fault.trace,
        })
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("classes", &self.classes.len())
            .field("instances", &self.instances.len())
            .field("connections", &self.connections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests;
