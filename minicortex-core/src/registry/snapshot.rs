//! Serializable views of the registry for the control plane and editor.

use super::{Connection, Registry, Viewport};
use crate::node::{NodeFault, NodeInstance};
use crate::schema::{Action, Display, DisplayKind, InputPort, OutputPort, Property};
use crate::types::{InstanceId, Position};
use crate::value::Value;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// A structured view of the whole graph: per-instance schemas with current
/// values, the connection list, and the viewport.
#[derive(Debug, Clone, Serialize)]
pub struct TopologySnapshot {
    /// Per-instance schemas.
    pub nodes: Vec<InstanceSchema>,
    /// All connections.
    pub connections: Vec<Connection>,
    /// Editor viewport.
    pub viewport: Viewport,
}

/// One instance's schema with its current values, as rendered by the editor.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSchema {
    /// Instance ID.
    pub node_id: InstanceId,
    /// Class type name.
    pub node_type: String,
    /// Display name.
    pub name: String,
    /// Canvas position.
    pub position: Position,
    /// Palette category name.
    pub category: String,
    /// Whether the class is hot-reloadable.
    pub dynamic: bool,
    /// Input ports.
    pub input_ports: Vec<InputPort>,
    /// Output ports.
    pub output_ports: Vec<OutputPort>,
    /// Properties with current values.
    pub properties: Vec<PropertyView>,
    /// Actions.
    pub actions: Vec<Action>,
    /// Displays with current values and enabled flags.
    pub outputs: Vec<DisplayView>,
    /// Most recent failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<NodeFault>,
}

/// A property descriptor together with its current value.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyView {
    /// The descriptor.
    #[serde(flatten)]
    pub spec: Property,
    /// Current value.
    pub value: JsonValue,
}

/// A display descriptor together with its current value and enabled flag.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayView {
    /// The descriptor.
    #[serde(flatten)]
    pub spec: Display,
    /// Whether this display is broadcast.
    pub enabled: bool,
    /// Current value (numeric and text displays).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    /// Pre-rendered value per the format hint (numeric displays).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    /// Array shape (vector displays).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
}

/// Compact instance listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSummary {
    /// Instance ID.
    pub id: InstanceId,
    /// Class type name.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Display name.
    pub name: String,
    /// Canvas position.
    pub position: Position,
}

/// One palette category with its node types.
#[derive(Debug, Clone, Serialize)]
pub struct PaletteGroup {
    /// Category display name.
    pub category: String,
    /// Node types in this category, in registration order.
    pub nodes: Vec<PaletteEntry>,
}

/// One palette entry.
#[derive(Debug, Clone, Serialize)]
pub struct PaletteEntry {
    /// Class type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Display name.
    pub name: String,
}

impl Registry {
    /// Build the full topology snapshot.
    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            nodes: self.instances.iter().map(instance_schema).collect(),
            connections: self.connections.clone(),
            viewport: self.viewport,
        }
    }

    /// Build the schema view for a single instance.
    pub fn instance_schema(&self, id: &InstanceId) -> Option<InstanceSchema> {
        self.instance(id).map(instance_schema)
    }

    /// Compact listing of all instances.
    pub fn list_instances(&self) -> Vec<InstanceSummary> {
        self.instances
            .iter()
            .map(|i| InstanceSummary {
                id: i.id.clone(),
                node_type: i.class.type_name.clone(),
                name: i.name.clone(),
                position: i.position,
            })
            .collect()
    }

    /// The palette: classes grouped by category, in registration order.
    pub fn palette(&self) -> Vec<PaletteGroup> {
        let mut groups: Vec<PaletteGroup> = Vec::new();
        for class in &self.classes {
            let category = class.category.as_str();
            let entry = PaletteEntry {
                type_name: class.type_name.clone(),
                name: class.display_name.clone(),
            };
            match groups.iter_mut().find(|g| g.category == category) {
                Some(group) => group.nodes.push(entry),
                None => groups.push(PaletteGroup {
                    category: category.to_string(),
                    nodes: vec![entry],
                }),
            }
        }
        groups
    }
}

fn instance_schema(instance: &NodeInstance) -> InstanceSchema {
    let class = &instance.class;
    InstanceSchema {
        node_id: instance.id.clone(),
        node_type: class.type_name.clone(),
        name: instance.name.clone(),
        position: instance.position,
        category: class.category.as_str().to_string(),
        dynamic: class.dynamic,
        input_ports: class.inputs.clone(),
        output_ports: class.outputs.clone(),
        properties: class
            .properties
            .iter()
            .map(|p| PropertyView {
                spec: p.clone(),
                value: instance
                    .cells
                    .properties
                    .get(&p.key)
                    .unwrap_or(&p.default)
                    .to_json(),
            })
            .collect(),
        actions: class.actions.clone(),
        outputs: class
            .displays
            .iter()
            .map(|d| display_view(instance, d))
            .collect(),
        error: instance.error.clone(),
    }
}

fn display_view(instance: &NodeInstance, display: &Display) -> DisplayView {
    let current = instance
        .cells
        .displays
        .get(&display.key)
        .cloned()
        .unwrap_or_else(|| display.default_value());
    let enabled = instance.display_enabled(&display.key);

    match &display.kind {
        DisplayKind::Numeric { format } => DisplayView {
            spec: display.clone(),
            enabled,
            formatted: Some(format_numeric(format, &current)),
            value: Some(current.to_json()),
            shape: None,
        },
        DisplayKind::Text => DisplayView {
            spec: display.clone(),
            enabled,
            value: Some(current.to_json()),
            formatted: None,
            shape: None,
        },
        DisplayKind::Vector1D | DisplayKind::Vector2D { .. } => DisplayView {
            spec: display.clone(),
            enabled,
            value: None,
            formatted: None,
            shape: current.as_tensor().map(|t| t.shape().to_vec()),
        },
    }
}

/// Render a numeric value per a `.Nf`-style format hint, falling back to
/// plain display for anything unrecognized.
fn format_numeric(format: &str, value: &Value) -> String {
    let Some(v) = value.as_f64() else {
        return value.to_json().to_string();
    };
    if let Some(precision) = format
        .strip_prefix('.')
        .and_then(|rest| rest.strip_suffix('f'))
        .and_then(|digits| digits.parse::<usize>().ok())
    {
        format!("{v:.precision$}")
    } else {
        format!("{v}")
    }
}
