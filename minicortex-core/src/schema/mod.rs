//! Node class schema: the static, reflective description of a node type.
//!
//! A [`NodeClass`] is built once with [`ClassBuilder`] and shared behind an
//! `Arc`; the registry, the scheduler, and the editor all consume the same
//! schema object. Per-instance storage is a keyed cell map initialized from
//! the schema's defaults.

mod datatype;
mod descriptors;

pub use datatype::DataType;
pub use descriptors::{
    Action, Display, DisplayKind, InputPort, OutputPort, Property, PropertyKind, Scale, Store,
};

use crate::error::{CortexError, Result};
use crate::node::NodeBehavior;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Palette category for editor organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    /// Data sources and generators.
    Input,
    /// Algorithms and computation.
    Processing,
    /// Transformation and inspection helpers.
    Utilities,
    /// Data sinks and exporters.
    Output,
    /// User-named custom category.
    Custom(String),
}

impl Category {
    /// The category's display name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Input => "Input",
            Self::Processing => "Processing",
            Self::Utilities => "Utilities",
            Self::Output => "Output",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "Input" => Self::Input,
            "Processing" => Self::Processing,
            "Utilities" => Self::Utilities,
            "Output" => Self::Output,
            _ => Self::Custom(raw),
        })
    }
}

/// Factory producing a fresh behavior for each instance of a class.
pub type Factory = Arc<dyn Fn() -> Box<dyn NodeBehavior> + Send + Sync>;

/// Re-derives a class schema from wherever its source lives.
///
/// The core never touches the filesystem for hot reload; it asks the source
/// to produce a fresh [`NodeClass`] under the same type name. File-backed
/// providers re-read and recompile; tests swap a class held in memory.
pub trait ClassSource: Send + Sync {
    /// A human-readable reference (path, URL) for error messages.
    fn describe(&self) -> String;

    /// Re-derive the class from its source.
    fn load(&self) -> Result<NodeClass>;
}

/// The immutable schema of a node class.
#[derive(Clone)]
pub struct NodeClass {
    /// Stable type name (snake_case by convention).
    pub type_name: String,
    /// Display name shown in the palette.
    pub display_name: String,
    /// Palette category.
    pub category: Category,
    /// Whether instances of this class may be hot-reloaded.
    pub dynamic: bool,
    /// Input ports, in declaration order.
    pub inputs: Vec<InputPort>,
    /// Output ports, in declaration order.
    pub outputs: Vec<OutputPort>,
    /// Properties, in declaration order.
    pub properties: Vec<Property>,
    /// Displays, in declaration order.
    pub displays: Vec<Display>,
    /// Actions, in declaration order.
    pub actions: Vec<Action>,
    /// Stores, in declaration order.
    pub stores: Vec<Store>,
    source: Option<Arc<dyn ClassSource>>,
    factory: Factory,
}

impl NodeClass {
    /// Start building a class schema.
    pub fn builder(type_name: impl Into<String>, category: Category) -> ClassBuilder {
        ClassBuilder::new(type_name, category)
    }

    /// Instantiate a fresh behavior for a new node instance.
    pub fn instantiate(&self) -> Box<dyn NodeBehavior> {
        (self.factory)()
    }

    /// The source reference used for hot reload, if any.
    pub fn source(&self) -> Option<&Arc<dyn ClassSource>> {
        self.source.as_ref()
    }

    /// Attach a source reference after the fact (used when a re-derived
    /// class should stay reloadable through the source that produced it).
    pub fn with_source(mut self, source: Arc<dyn ClassSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Look up an input port by key.
    pub fn input(&self, key: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.key == key)
    }

    /// Look up an output port by key.
    pub fn output(&self, key: &str) -> Option<&OutputPort> {
        self.outputs.iter().find(|p| p.key == key)
    }

    /// Look up a property by key.
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.key == key)
    }

    /// Look up a display by key.
    pub fn display(&self, key: &str) -> Option<&Display> {
        self.displays.iter().find(|d| d.key == key)
    }

    /// Look up an action by key.
    pub fn action(&self, key: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.key == key)
    }

    /// Look up a store by key.
    pub fn store(&self, key: &str) -> Option<&Store> {
        self.stores.iter().find(|s| s.key == key)
    }
}

impl fmt::Debug for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeClass")
            .field("type_name", &self.type_name)
            .field("category", &self.category)
            .field("dynamic", &self.dynamic)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("properties", &self.properties.len())
            .field("displays", &self.displays.len())
            .field("actions", &self.actions.len())
            .field("stores", &self.stores.len())
            .finish()
    }
}

/// Declarative builder for [`NodeClass`] schemas.
///
/// ```
/// use minicortex_core::schema::{Category, DataType, NodeClass, Property};
/// use minicortex_core::node::{NodeBehavior, NodeContext};
///
/// struct Gain;
/// impl NodeBehavior for Gain {
///     fn process(&mut self, ctx: &mut NodeContext<'_>) -> minicortex_core::Result<()> {
///         let gain = ctx.property("gain").as_f64().unwrap_or(1.0);
///         if let Some(x) = ctx.input("x").as_f64() {
///             ctx.set_output("y", x * gain)?;
///         }
///         Ok(())
///     }
/// }
///
/// let class = NodeClass::builder("gain", Category::Processing)
///     .input("x", "Input", DataType::Float)
///     .output("y", "Output", DataType::Float)
///     .property(Property::range("gain", "Gain", 1.0, 0.0, 10.0))
///     .factory(|| Box::new(Gain))
///     .build()
///     .unwrap();
/// assert_eq!(class.type_name, "gain");
/// ```
pub struct ClassBuilder {
    type_name: String,
    display_name: Option<String>,
    category: Category,
    dynamic: bool,
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
    properties: Vec<Property>,
    displays: Vec<Display>,
    actions: Vec<Action>,
    stores: Vec<Store>,
    source: Option<Arc<dyn ClassSource>>,
    factory: Option<Factory>,
}

impl ClassBuilder {
    fn new(type_name: impl Into<String>, category: Category) -> Self {
        Self {
            type_name: type_name.into(),
            display_name: None,
            category,
            dynamic: false,
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: Vec::new(),
            displays: Vec::new(),
            actions: Vec::new(),
            stores: Vec::new(),
            source: None,
            factory: None,
        }
    }

    /// Override the palette display name (defaults to the type name).
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Mark the class as hot-reloadable.
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Attach the source reference used for hot reload.
    pub fn source(mut self, source: Arc<dyn ClassSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Declare an input port.
    pub fn input(
        mut self,
        key: impl Into<String>,
        label: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        self.inputs.push(InputPort::new(key, label, data_type));
        self
    }

    /// Declare an output port.
    pub fn output(
        mut self,
        key: impl Into<String>,
        label: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        self.outputs.push(OutputPort::new(key, label, data_type));
        self
    }

    /// Declare a property.
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Declare a display.
    pub fn display(mut self, display: Display) -> Self {
        self.displays.push(display);
        self
    }

    /// Declare an action.
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Declare a store.
    pub fn store(mut self, store: Store) -> Self {
        self.stores.push(store);
        self
    }

    /// Set the behavior factory.
    pub fn factory(
        mut self,
        factory: impl Fn() -> Box<dyn NodeBehavior> + Send + Sync + 'static,
    ) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Finish the schema.
    ///
    /// Fails with `Validation` when the type name is empty, a descriptor key
    /// is duplicated within its kind, or no factory was provided.
    pub fn build(self) -> Result<NodeClass> {
        if self.type_name.is_empty() {
            return Err(CortexError::validation("type_name", "must not be empty"));
        }
        check_unique("input", self.inputs.iter().map(|p| p.key.as_str()))?;
        check_unique("output", self.outputs.iter().map(|p| p.key.as_str()))?;
        check_unique("property", self.properties.iter().map(|p| p.key.as_str()))?;
        check_unique("display", self.displays.iter().map(|d| d.key.as_str()))?;
        check_unique("action", self.actions.iter().map(|a| a.key.as_str()))?;
        check_unique("store", self.stores.iter().map(|s| s.key.as_str()))?;

        let factory = self.factory.ok_or_else(|| {
            CortexError::validation(&self.type_name, "class has no behavior factory")
        })?;

        Ok(NodeClass {
            display_name: self.display_name.unwrap_or_else(|| self.type_name.clone()),
            type_name: self.type_name,
            category: self.category,
            dynamic: self.dynamic,
            inputs: self.inputs,
            outputs: self.outputs,
            properties: self.properties,
            displays: self.displays,
            actions: self.actions,
            stores: self.stores,
            source: self.source,
            factory,
        })
    }
}

fn check_unique<'a>(kind: &str, keys: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(CortexError::validation(
                key,
                format!("duplicate {kind} descriptor key"),
            ));
        }
    }
    Ok(())
}
