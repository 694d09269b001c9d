//! Workspace persistence: the serializable document and its installation.
//!
//! A workspace document captures graph topology, per-node property/store
//! values (tensors in the tagged `__array__` form), display-enabled flags,
//! and the viewport. Loading stages a complete replacement instance set and
//! swaps it in atomically, so a failed load leaves the registry untouched.

mod store;

pub use store::WorkspaceStore;

use crate::error::{CortexError, Result};
use crate::node::NodeInstance;
use crate::registry::{Connection, Registry, Viewport};
use crate::types::{InstanceId, Position};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current workspace file format version.
pub const FORMAT_VERSION: u32 = 1;

/// The workspace document (stable wire contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceDoc {
    /// Format version marker.
    pub version: u32,
    /// Editor viewport.
    pub viewport: Viewport,
    /// Node instances.
    pub nodes: Vec<WorkspaceNode>,
    /// Connections.
    pub connections: Vec<Connection>,
}

/// One persisted node instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceNode {
    /// Instance ID, kept verbatim across save/load.
    pub id: InstanceId,
    /// Class type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Canvas position.
    pub position: Position,
    /// Property values by key.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    /// Store values by key.
    #[serde(default)]
    pub stores: BTreeMap<String, Value>,
    /// Display-enabled flags by key.
    #[serde(default)]
    pub outputs_enabled: BTreeMap<String, bool>,
}

/// Counts reported by a successful workspace install.
#[derive(Debug, Clone, Copy)]
pub struct LoadStats {
    /// Instances restored.
    pub nodes: usize,
    /// Connections restored.
    pub connections: usize,
}

impl Registry {
    /// Serialize the current graph into a workspace document.
    pub fn export_workspace(&self) -> WorkspaceDoc {
        WorkspaceDoc {
            version: FORMAT_VERSION,
            viewport: self.viewport,
            nodes: self
                .instances
                .iter()
                .map(|instance| {
                    let class = &instance.class;
                    WorkspaceNode {
                        id: instance.id.clone(),
                        type_name: class.type_name.clone(),
                        position: instance.position,
                        properties: class
                            .properties
                            .iter()
                            .map(|p| {
                                let value = instance
                                    .cells
                                    .properties
                                    .get(&p.key)
                                    .unwrap_or(&p.default)
                                    .clone();
                                (p.key.clone(), value)
                            })
                            .collect(),
                        stores: class
                            .stores
                            .iter()
                            .map(|s| {
                                let value = instance
                                    .cells
                                    .stores
                                    .get(&s.key)
                                    .unwrap_or(&s.default)
                                    .clone();
                                (s.key.clone(), value)
                            })
                            .collect(),
                        outputs_enabled: class
                            .displays
                            .iter()
                            .map(|d| (d.key.clone(), instance.display_enabled(&d.key)))
                            .collect(),
                    }
                })
                .collect(),
            connections: self.connections.clone(),
        }
    }

    /// Replace the current graph with the document's contents.
    ///
    /// The replacement is staged in full (instances rebuilt, values restored
    /// through coercion, connections re-validated, `init` run on every
    /// instance) before anything is installed. Any failure leaves the
    /// registry in its pre-load state. Nodes of unknown types are skipped
    /// with a warning; so are connections that no longer validate.
    pub fn install_workspace(&mut self, doc: &WorkspaceDoc) -> Result<LoadStats> {
        if doc.version > FORMAT_VERSION {
            return Err(CortexError::validation(
                "version",
                format!("unsupported workspace format version {}", doc.version),
            ));
        }

        let mut staged = Registry {
            classes: self.classes.clone(),
            class_index: self.class_index.clone(),
            instances: Vec::new(),
            connections: Vec::new(),
            viewport: Viewport::clamped(doc.viewport.pan, doc.viewport.zoom),
            next_seq: 0,
        };

        for node in &doc.nodes {
            let Some(class) = staged.class(&node.type_name).cloned() else {
                tracing::warn!(
                    instance = %node.id,
                    type_name = %node.type_name,
                    "skipping node of unknown type"
                );
                continue;
            };
            if !node.position.is_finite() {
                return Err(CortexError::validation("position", "must be finite"));
            }

            let seq = staged.next_seq;
            staged.next_seq += 1;
            let mut instance = NodeInstance::new(node.id.clone(), class.clone(), node.position, seq);

            for property in &class.properties {
                if let Some(value) = node.properties.get(&property.key) {
                    match property.coerce(value) {
                        Ok(coerced) => {
                            instance
                                .cells
                                .properties
                                .insert(property.key.clone(), coerced);
                        }
                        Err(e) => tracing::warn!(
                            instance = %node.id,
                            property = %property.key,
                            error = %e,
                            "dropping saved property value"
                        ),
                    }
                }
            }
            for store in &class.stores {
                if let Some(value) = node.stores.get(&store.key) {
                    instance.cells.stores.insert(store.key.clone(), value.clone());
                }
            }
            for (key, enabled) in &node.outputs_enabled {
                if instance.enabled_displays.contains_key(key) {
                    instance.enabled_displays.insert(key.clone(), *enabled);
                }
            }
            staged.instances.push(instance);
        }

        // New IDs must never collide with restored ones.
        let max_restored = staged
            .instances
            .iter()
            .filter_map(|i| i.id.trailing_sequence())
            .max();
        if let Some(max) = max_restored {
            staged.next_seq = staged.next_seq.max(max + 1);
        }

        for conn in &doc.connections {
            if let Err(e) = staged.connect(
                &conn.from_node,
                &conn.from_output,
                &conn.to_node,
                &conn.to_input,
                false,
            ) {
                tracing::warn!(error = %e, "skipping saved connection");
            }
        }

        let mut instances = std::mem::take(&mut staged.instances);
        for instance in &mut instances {
            staged.run_init(instance)?;
        }

        let stats = LoadStats {
            nodes: instances.len(),
            connections: staged.connections.len(),
        };
        self.instances = instances;
        self.connections = staged.connections;
        self.viewport = staged.viewport;
        self.next_seq = staged.next_seq;
        tracing::info!(
            nodes = stats.nodes,
            connections = stats.connections,
            "workspace installed"
        );
        Ok(stats)
    }
}
