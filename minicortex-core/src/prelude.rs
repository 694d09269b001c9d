//! Prelude for convenient imports.
//!
//! ```
//! use minicortex_core::prelude::*;
//! ```

pub use crate::error::{CortexError, Result};
pub use crate::node::{Cells, NodeBehavior, NodeContext, NodeFault, NodeInstance};
pub use crate::registry::{
    ClassProvider, Connection, Registry, SourceUnit, TopologySnapshot, Viewport,
};
pub use crate::schema::{
    Action, Category, ClassSource, DataType, Display, DisplayKind, InputPort, NodeClass,
    OutputPort, Property, PropertyKind, Scale, Store,
};
pub use crate::types::{InstanceId, Position};
pub use crate::value::{DType, Tensor, Value};
pub use crate::workspace::{WorkspaceDoc, WorkspaceStore};
