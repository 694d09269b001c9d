//! MiniCortex core library.
//!
//! The node metamodel and graph state for the MiniCortex computational
//! framework: users define modular node classes, wire instances into a
//! directed graph, and the engine executes them in discrete ticks while
//! streaming intermediate state to a visual editor.
//!
//! # Key components
//!
//! - **Schema**: declarative node class descriptors (ports, properties,
//!   displays, actions, stores) built once and shared behind an `Arc`
//! - **Node runtime**: the [`node::NodeBehavior`] contract plus per-instance
//!   cell storage accessed through [`node::NodeContext`]
//! - **Registry**: the class/instance/connection/viewport tables with all
//!   graph invariants, discovery, and hot reload
//! - **Workspace**: lossless save/load of the whole graph, including typed
//!   numeric arrays
//!
//! The tick scheduler and lifecycle supervisor live in `minicortex-engine`.
//!
//! # Example
//!
//! ```
//! use minicortex_core::prelude::*;
//!
//! struct Doubler;
//! impl NodeBehavior for Doubler {
//!     fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
//!         if let Some(x) = ctx.input("x").as_f64() {
//!             ctx.set_output("y", x * 2.0)?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let class = NodeClass::builder("doubler", Category::Processing)
//!     .input("x", "Input", DataType::Float)
//!     .output("y", "Output", DataType::Float)
//!     .factory(|| Box::new(Doubler))
//!     .build()?;
//!
//! let mut registry = Registry::new();
//! registry.register_class(class)?;
//! let id = registry.create_instance("doubler", Position::default())?;
//! assert_eq!(id.as_str(), "doubler_0");
//! # Ok::<(), CortexError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod node;
pub mod prelude;
pub mod registry;
pub mod schema;
pub mod types;
pub mod value;
pub mod workspace;

// Re-export key types at crate root for convenience
pub use error::{CortexError, Result};
pub use registry::{Connection, Registry, Viewport};
pub use schema::{Category, DataType, NodeClass};
pub use types::{InstanceId, Position};
pub use value::{DType, Tensor, Value};
