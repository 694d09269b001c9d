//! The topological scheduler: evaluation order and per-tick execution.
//!
//! Every tick computes each node exactly once, in an order where
//! feedforward edges deliver current-tick values and feedback edges deliver
//! previous-tick values. Cycles never diverge: they are broken
//! deterministically and the closing edges become one-tick delays.

mod order;
mod tick;

pub use order::{ExecutionOrder, build_order};
pub use tick::{SignalMap, TickFailure, TickOutcome, TickPlan, execute, plan, publish};
