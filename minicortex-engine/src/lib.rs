//! MiniCortex engine.
//!
//! The execution half of MiniCortex: the topological tick scheduler, the
//! lifecycle supervisor with its computation and broadcast loops, and the
//! control-plane facade any transport wraps.
//!
//! # Example
//!
//! ```
//! use minicortex_core::prelude::*;
//! use minicortex_engine::{Engine, EngineConfig};
//!
//! struct Seven;
//! impl NodeBehavior for Seven {
//!     fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
//!         ctx.set_output("out", 7)
//!     }
//! }
//!
//! let engine = Engine::new(EngineConfig::default());
//! engine.register_class(
//!     NodeClass::builder("seven", Category::Input)
//!         .output("out", "Out", DataType::Int)
//!         .factory(|| Box::new(Seven))
//!         .build()?,
//! )?;
//! engine.create_instance("seven", Position::default())?;
//! engine.step()?;
//! assert_eq!(engine.network_status().step, 1);
//! # Ok::<(), CortexError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod frames;
pub mod scheduler;
pub mod supervisor;

pub use frames::{
    BufferedSink, ErrorFrame, Frame, FrameSink, NetworkStatus, NodeError, NodeFrame, SinkClosed,
    StateFrame,
};
pub use scheduler::{ExecutionOrder, build_order};
pub use supervisor::{ConfigView, Engine, EngineConfig};
