//! Per-tick execution: plan under the lock, run user code without it,
//! publish the results back.
//!
//! A [`TickPlan`] is a self-contained snapshot: cloned cells, behavior
//! handles, resolved incoming edges, and a deep copy of the previous-tick
//! signal generation. [`execute`] therefore runs with no shared state at
//! all; [`publish`] folds the outcome back into the registry and the caller
//! swaps the signal generations.

use super::order::build_order;
use minicortex_core::error::Result;
use minicortex_core::node::{Cells, NodeBehavior, NodeContext, NodeFault, run_guarded};
use minicortex_core::registry::Registry;
use minicortex_core::schema::NodeClass;
use minicortex_core::types::InstanceId;
use minicortex_core::value::Value;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One signal generation: the last value each output port produced, keyed
/// by `(instance, output key)`.
pub type SignalMap = HashMap<(InstanceId, String), Value>;

/// A resolved incoming edge for one input port.
struct IncomingEdge {
    input: String,
    source: (InstanceId, String),
    feedback: bool,
}

struct PlanNode {
    id: InstanceId,
    name: String,
    class: Arc<NodeClass>,
    behavior: Arc<Mutex<Box<dyn NodeBehavior>>>,
    cells: Cells,
    incoming: Vec<IncomingEdge>,
}

/// A snapshot of everything one tick needs, taken under the registry lock.
pub struct TickPlan {
    nodes: Vec<PlanNode>,
    prev: SignalMap,
}

impl TickPlan {
    /// Number of nodes scheduled in this tick.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// The results of a completed tick.
pub struct TickOutcome {
    /// This tick's signal generation; becomes "previous" after the swap.
    pub signals: SignalMap,
    /// Post-`process` cells per node, in evaluation order.
    pub cells: Vec<(InstanceId, Cells)>,
}

/// A node failure that aborted the tick.
#[derive(Debug, Clone)]
pub struct TickFailure {
    /// The failing instance.
    pub instance: InstanceId,
    /// Its display name.
    pub name: String,
    /// The captured fault.
    pub fault: NodeFault,
}

/// Build a tick plan from the current registry and signal generation.
pub fn plan(registry: &Registry, prev: &SignalMap) -> TickPlan {
    let meta: Vec<(InstanceId, u64)> = registry
        .instances()
        .iter()
        .map(|i| (i.id.clone(), i.seq))
        .collect();
    let order = build_order(&meta, registry.connections());

    let mut incoming: HashMap<&InstanceId, Vec<IncomingEdge>> = HashMap::new();
    for (ci, conn) in registry.connections().iter().enumerate() {
        incoming.entry(&conn.to_node).or_default().push(IncomingEdge {
            input: conn.to_input.clone(),
            source: (conn.from_node.clone(), conn.from_output.clone()),
            feedback: order.feedback.contains(&ci),
        });
    }

    let nodes = order
        .sequence
        .iter()
        .map(|id| {
            let instance = registry.instance(id).expect("ordered id exists");
            PlanNode {
                id: id.clone(),
                name: instance.name.clone(),
                class: instance.class.clone(),
                behavior: instance.behavior(),
                cells: instance.cells.clone(),
                incoming: incoming.remove(id).unwrap_or_default(),
            }
        })
        .collect();

    TickPlan {
        nodes,
        prev: prev.clone(),
    }
}

/// Run every node in the plan once.
///
/// Feedforward inputs read this tick's generation (the source has already
/// run); feedback inputs read the previous generation, null on the first
/// tick. Values are cloned on handoff, so no two nodes ever observe the
/// same tensor buffer. The first failure aborts the tick.
pub fn execute(mut plan: TickPlan) -> Result<TickOutcome, TickFailure> {
    let mut current: SignalMap = HashMap::new();
    let mut cells: Vec<(InstanceId, Cells)> = Vec::with_capacity(plan.nodes.len());

    for node in &mut plan.nodes {
        for port in &node.class.inputs {
            let value = match node.incoming.iter().find(|e| e.input == port.key) {
                Some(edge) if edge.feedback => {
                    plan.prev.get(&edge.source).cloned().unwrap_or(Value::Null)
                }
                Some(edge) => current.get(&edge.source).cloned().unwrap_or(Value::Null),
                // Unconnected ports read null; this also clears stale values
                // after a disconnection.
                None => Value::Null,
            };
            node.cells.inputs.insert(port.key.clone(), value);
        }

        let mut behavior = node.behavior.lock();
        let mut ctx = NodeContext::new(&node.class, &mut node.cells);
        if let Err(fault) = run_guarded(|| behavior.process(&mut ctx)) {
            return Err(TickFailure {
                instance: node.id.clone(),
                name: node.name.clone(),
                fault,
            });
        }
        drop(behavior);

        for port in &node.class.outputs {
            if let Some(value) = node.cells.outputs.get(&port.key) {
                if !value.is_null() {
                    current.insert((node.id.clone(), port.key.clone()), value.clone());
                }
            }
        }
        cells.push((node.id.clone(), std::mem::take(&mut node.cells)));
    }

    Ok(TickOutcome {
        signals: current,
        cells,
    })
}

/// Write a successful tick's cells back into the registry.
///
/// Only keys that still exist on the live instance's class are written, so
/// a deletion or hot reload that landed mid-tick cannot resurrect stale
/// cells. Successfully processed nodes have their error state cleared.
///
/// With `persist_stores` false (probing ticks), store writes are discarded:
/// a probe refreshes the visible surface of the graph without mutating
/// persistent state.
pub fn publish(registry: &mut Registry, outcome: &TickOutcome, persist_stores: bool) {
    for (id, snapshot) in &outcome.cells {
        let Some(instance) = registry.instance_mut(id) else {
            continue;
        };
        let class = instance.class.clone();
        for port in &class.inputs {
            if let Some(value) = snapshot.inputs.get(&port.key) {
                instance.cells.inputs.insert(port.key.clone(), value.clone());
            }
        }
        for port in &class.outputs {
            if let Some(value) = snapshot.outputs.get(&port.key) {
                instance.cells.outputs.insert(port.key.clone(), value.clone());
            }
        }
        for display in &class.displays {
            if let Some(value) = snapshot.displays.get(&display.key) {
                instance
                    .cells
                    .displays
                    .insert(display.key.clone(), value.clone());
            }
        }
        if persist_stores {
            for store in &class.stores {
                if let Some(value) = snapshot.stores.get(&store.key) {
                    instance.cells.stores.insert(store.key.clone(), value.clone());
                }
            }
        }
        instance.error = None;
    }
}
