//! Event frames streamed to observers, and the observer contract.
//!
//! The broadcast loop emits one [`Frame`] per interval to every subscribed
//! [`FrameSink`]. Sinks are the transport seam: a WebSocket wrapper
//! implements one per client, tests use [`BufferedSink`]. A sink whose
//! `send` fails is dropped; a stalled observer never blocks the engine.

use minicortex_core::types::InstanceId;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Network state carried in every frame.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NetworkStatus {
    /// Whether the computation loop is ticking.
    pub running: bool,
    /// Target tick rate in Hz.
    pub speed: f64,
    /// Measured tick rate (exponential moving average).
    pub actual_hz: f64,
    /// Monotonic tick counter.
    pub step: u64,
}

/// The failure payload carried by error frames and the supervisor's error
/// state.
#[derive(Debug, Clone, Serialize)]
pub struct NodeError {
    /// The failing instance.
    pub node_id: InstanceId,
    /// Its display name.
    pub node_name: String,
    /// Failure message.
    pub message: String,
    /// Rendered error detail.
    pub trace: String,
}

/// One node's enabled display outputs.
#[derive(Debug, Clone, Serialize)]
pub struct NodeFrame {
    /// Display values keyed by output key; arrays appear as nested lists.
    pub outputs: BTreeMap<String, JsonValue>,
}

/// A periodic state frame.
#[derive(Debug, Clone, Serialize)]
pub struct StateFrame {
    /// Per-instance display outputs.
    pub nodes: BTreeMap<InstanceId, NodeFrame>,
    /// Network state.
    pub network: NetworkStatus,
}

/// An error frame, emitted when a tick fails and followed by a state frame
/// showing `running = false`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorFrame {
    /// The failure.
    #[serde(flatten)]
    pub error: NodeError,
    /// Network state after the failure.
    pub network: NetworkStatus,
}

/// A frame on the event stream. Serializes with a `"type"` tag of `state`
/// or `error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Periodic state snapshot.
    State(StateFrame),
    /// Tick failure notification.
    Error(ErrorFrame),
}

/// Returned by a sink to signal that its observer is gone.
#[derive(Debug)]
pub struct SinkClosed;

impl fmt::Display for SinkClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("observer disconnected")
    }
}

impl std::error::Error for SinkClosed {}

/// An observer of the event stream.
pub trait FrameSink: Send + Sync {
    /// Deliver one frame. Returning `Err` unsubscribes the sink.
    fn send(&self, frame: &Frame) -> Result<(), SinkClosed>;
}

/// The set of live sinks.
pub(crate) struct SinkSet {
    sinks: Mutex<Vec<Arc<dyn FrameSink>>>,
}

impl SinkSet {
    pub(crate) fn new() -> Self {
        Self {
            sinks: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self, sink: Arc<dyn FrameSink>) {
        self.sinks.lock().push(sink);
    }

    /// Fan a frame out to every sink, dropping the ones that fail.
    pub(crate) fn broadcast(&self, frame: &Frame) {
        let mut sinks = self.sinks.lock();
        sinks.retain(|sink| match sink.send(frame) {
            Ok(()) => true,
            Err(SinkClosed) => {
                tracing::debug!("dropping disconnected observer");
                false
            }
        });
    }
}

/// A bounded in-memory sink: keeps the most recent frames for inspection.
pub struct BufferedSink {
    frames: Mutex<VecDeque<Frame>>,
    capacity: usize,
}

impl BufferedSink {
    /// A sink keeping at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Copy out the buffered frames, oldest first.
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().iter().cloned().collect()
    }

    /// Take the buffered frames, leaving the sink empty.
    pub fn drain(&self) -> Vec<Frame> {
        self.frames.lock().drain(..).collect()
    }
}

impl FrameSink for BufferedSink {
    fn send(&self, frame: &Frame) -> Result<(), SinkClosed> {
        let mut frames = self.frames.lock();
        if frames.len() == self.capacity {
            frames.pop_front();
        }
        frames.push_back(frame.clone());
        Ok(())
    }
}
