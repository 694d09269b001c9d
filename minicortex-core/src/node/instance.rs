//! Per-instance storage backing the descriptor schema.

use super::{NodeBehavior, NodeFault};
use crate::schema::NodeClass;
use crate::types::{InstanceId, Position};
use crate::value::Value;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// The value cells of one node instance, keyed by descriptor key.
///
/// Input cells hold `Value::Null` until a signal arrives; that sentinel is
/// distinct from "present but equal to the default". Property and store
/// cells are the persistent surface; outputs and displays are transient.
#[derive(Debug, Clone, Default)]
pub struct Cells {
    /// Latest inbound signal per input port.
    pub inputs: HashMap<String, Value>,
    /// Latest written value per output port.
    pub outputs: HashMap<String, Value>,
    /// Current property values.
    pub properties: HashMap<String, Value>,
    /// Current display values.
    pub displays: HashMap<String, Value>,
    /// Current store values.
    pub stores: HashMap<String, Value>,
}

impl Cells {
    /// Initialize every cell to its class default.
    pub fn from_class(class: &NodeClass) -> Self {
        Self {
            inputs: class
                .inputs
                .iter()
                .map(|p| (p.key.clone(), Value::Null))
                .collect(),
            outputs: class
                .outputs
                .iter()
                .map(|p| (p.key.clone(), Value::Null))
                .collect(),
            properties: class
                .properties
                .iter()
                .map(|p| (p.key.clone(), p.default.clone()))
                .collect(),
            displays: class
                .displays
                .iter()
                .map(|d| (d.key.clone(), d.default_value()))
                .collect(),
            stores: class
                .stores
                .iter()
                .map(|s| (s.key.clone(), s.default.clone()))
                .collect(),
        }
    }
}

/// A live node instance: schema reference, cells, editor state, and the
/// behavior object executing its hooks.
pub struct NodeInstance {
    /// Unique instance ID.
    pub id: InstanceId,
    /// The class schema this instance was created from.
    pub class: Arc<NodeClass>,
    /// Display name (defaults to the type name).
    pub name: String,
    /// Position on the editor canvas.
    pub position: Position,
    /// Creation sequence number; drives deterministic scheduling order and
    /// survives hot reload.
    pub seq: u64,
    /// The instance's value cells.
    pub cells: Cells,
    /// Per-display broadcast-enabled flags (default true).
    pub enabled_displays: HashMap<String, bool>,
    /// Most recent failure, or `None` when the last run succeeded.
    pub error: Option<NodeFault>,
    behavior: Arc<Mutex<Box<dyn NodeBehavior>>>,
}

impl NodeInstance {
    /// Create an instance with default cells. `init` is the registry's job.
    pub fn new(id: InstanceId, class: Arc<NodeClass>, position: Position, seq: u64) -> Self {
        let behavior = Arc::new(Mutex::new(class.instantiate()));
        Self {
            name: class.type_name.clone(),
            cells: Cells::from_class(&class),
            enabled_displays: class
                .displays
                .iter()
                .map(|d| (d.key.clone(), true))
                .collect(),
            error: None,
            id,
            class,
            position,
            seq,
            behavior,
        }
    }

    /// Handle to the behavior object. The scheduler clones this so user code
    /// can run without the registry lock held; actions take the same mutex,
    /// so a node's hooks never run concurrently with each other.
    pub fn behavior(&self) -> Arc<Mutex<Box<dyn NodeBehavior>>> {
        Arc::clone(&self.behavior)
    }

    /// Whether a display's broadcast is enabled (unknown keys read false).
    pub fn display_enabled(&self, key: &str) -> bool {
        self.enabled_displays.get(key).copied().unwrap_or(false)
    }
}

impl std::fmt::Debug for NodeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeInstance")
            .field("id", &self.id)
            .field("type", &self.class.type_name)
            .field("seq", &self.seq)
            .field("position", &self.position)
            .finish()
    }
}
