//! The two long-lived loops and the shared state they coordinate on.
//!
//! One `parking_lot::Mutex` guards the registry, the signal generation, and
//! the supervisor state. The computation loop holds it only to plan and to
//! publish; node code runs with the lock released. The broadcast loop takes
//! it for one short snapshot per frame.

use crate::frames::{Frame, NetworkStatus, NodeError, NodeFrame, SinkSet, StateFrame};
use crate::scheduler::{self, SignalMap};
use minicortex_core::registry::Registry;
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Smoothing factor for the actual-Hz moving average.
const ACTUAL_HZ_ALPHA: f64 = 0.2;

/// How long the computation loop dozes while stopped before re-checking.
const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Everything guarded by the single exclusive lock.
pub(crate) struct Shared {
    /// The graph state.
    pub registry: Registry,
    /// Previous-tick signal generation; swapped after each tick.
    pub signals: SignalMap,
    /// Whether the computation loop is ticking.
    pub running: bool,
    /// Target tick rate in Hz.
    pub speed: f64,
    /// Measured tick rate (exponential moving average).
    pub actual_hz: f64,
    /// Monotonic tick counter.
    pub step: u64,
    /// Most recent tick failure, cleared on `start`.
    pub error: Option<NodeError>,
    /// True from plan to publish of the in-flight tick.
    pub tick_in_flight: bool,
}

impl Shared {
    pub(crate) fn new(speed: f64) -> Self {
        Self {
            registry: Registry::new(),
            signals: SignalMap::new(),
            running: false,
            speed,
            actual_hz: 0.0,
            step: 0,
            error: None,
            tick_in_flight: false,
        }
    }

    pub(crate) fn status(&self) -> NetworkStatus {
        NetworkStatus {
            running: self.running,
            speed: self.speed,
            actual_hz: self.actual_hz,
            step: self.step,
        }
    }
}

/// What kind of tick is being requested, and what state gates it.
///
/// A probe runs the same machinery as a real tick but leaves no trace that
/// would alter subsequent ticks: the step counter does not advance, the
/// signal generations are not swapped, and store writes are discarded. It
/// exists only to refresh outputs and displays after a topology change
/// while the network is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickMode {
    /// Paced tick from the computation loop; requires `running`.
    Loop,
    /// Synchronous single tick; requires stopped.
    Step,
    /// Probing tick after a topology change; requires stopped.
    Probe,
}

/// Run one tick: plan under the lock, execute without it, publish under it.
///
/// Returns false when the gate condition no longer held (a `stop` raced the
/// loop, a `start` raced a probe) or when a node failed. On failure the
/// supervisor records the error, transitions to stopped, and emits an error
/// frame followed by a state frame.
pub(crate) fn run_tick(
    shared: &Mutex<Shared>,
    gate: &Condvar,
    sinks: &SinkSet,
    mode: TickMode,
) -> bool {
    let plan = {
        let mut guard = shared.lock();
        let admissible = match mode {
            TickMode::Loop => guard.running,
            TickMode::Step | TickMode::Probe => !guard.running,
        };
        if !admissible {
            return false;
        }
        guard.tick_in_flight = true;
        scheduler::plan(&guard.registry, &guard.signals)
    };

    // User code runs here, off the lock; request handlers may mutate the
    // graph concurrently and the publish step reconciles against it.
    let result = scheduler::execute(plan);

    let mut guard = shared.lock();
    guard.tick_in_flight = false;
    match result {
        Ok(outcome) => {
            let real_tick = mode != TickMode::Probe;
            scheduler::publish(&mut guard.registry, &outcome, real_tick);
            if real_tick {
                guard.signals = outcome.signals;
                guard.step += 1;
            }
            gate.notify_all();
            true
        }
        Err(failure) => {
            guard.running = false;
            let error = NodeError {
                node_id: failure.instance.clone(),
                node_name: failure.name.clone(),
                message: failure.fault.message.clone(),
                trace: failure.fault.trace.clone(),
            };
            if let Some(instance) = guard.registry.instance_mut(&failure.instance) {
                instance.error = Some(failure.fault.clone());
            }
            guard.error = Some(error.clone());
            tracing::error!(
                instance = %failure.instance,
                node = %failure.name,
                message = %failure.fault.message,
                "tick aborted by node failure"
            );

            let error_frame = Frame::Error(crate::frames::ErrorFrame {
                error,
                network: guard.status(),
            });
            let state_frame = Frame::State(build_state_frame(&guard));
            gate.notify_all();
            drop(guard);
            sinks.broadcast(&error_frame);
            sinks.broadcast(&state_frame);
            false
        }
    }
}

/// Build a state frame from the shared state: enabled display outputs per
/// instance plus the network status.
pub(crate) fn build_state_frame(shared: &Shared) -> StateFrame {
    let mut nodes = BTreeMap::new();
    for instance in shared.registry.instances() {
        let outputs = instance
            .class
            .displays
            .iter()
            .filter(|d| instance.display_enabled(&d.key))
            .map(|d| {
                let value = instance
                    .cells
                    .displays
                    .get(&d.key)
                    .map(|v| v.to_json())
                    .unwrap_or(serde_json::Value::Null);
                (d.key.clone(), value)
            })
            .collect();
        nodes.insert(instance.id.clone(), NodeFrame { outputs });
    }
    StateFrame {
        nodes,
        network: shared.status(),
    }
}

/// The computation loop: paced ticks at the target rate while running,
/// condvar doze while stopped.
pub(crate) fn computation_loop(
    shared: Arc<Mutex<Shared>>,
    gate: Arc<Condvar>,
    sinks: Arc<SinkSet>,
    shutdown: Arc<AtomicBool>,
) {
    let mut last_tick: Option<Instant> = None;

    while !shutdown.load(Ordering::SeqCst) {
        let speed = {
            let mut guard = shared.lock();
            if !guard.running {
                last_tick = None;
                let _ = gate.wait_for(&mut guard, IDLE_WAIT);
                continue;
            }
            guard.speed
        };

        let tick_started = Instant::now();
        run_tick(&shared, &gate, &sinks, TickMode::Loop);

        if let Some(previous) = last_tick {
            let dt = tick_started.duration_since(previous).as_secs_f64();
            if dt > 0.0 {
                let instantaneous = 1.0 / dt;
                let mut guard = shared.lock();
                guard.actual_hz = if guard.actual_hz == 0.0 {
                    instantaneous
                } else {
                    ACTUAL_HZ_ALPHA * instantaneous + (1.0 - ACTUAL_HZ_ALPHA) * guard.actual_hz
                };
            }
        }
        last_tick = Some(tick_started);

        let period = Duration::from_secs_f64(1.0 / speed.max(1.0));
        if let Some(remaining) = period.checked_sub(tick_started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }
}

/// The broadcast loop: one state frame per interval to every sink.
pub(crate) fn broadcast_loop(
    shared: Arc<Mutex<Shared>>,
    sinks: Arc<SinkSet>,
    shutdown: Arc<AtomicBool>,
    fps: f64,
) {
    let interval = Duration::from_secs_f64(1.0 / fps.max(1.0));
    while !shutdown.load(Ordering::SeqCst) {
        let frame = {
            let guard = shared.lock();
            Frame::State(build_state_frame(&guard))
        };
        sinks.broadcast(&frame);
        std::thread::sleep(interval);
    }
}
