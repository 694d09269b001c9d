//! The lifecycle supervisor and control-plane facade.
//!
//! [`Engine`] owns the shared state, the two loops, and every operation the
//! control plane exposes. Any transport (HTTP, WebSocket, tests) wraps these
//! methods; none of them assume a framing.

mod loops;

use crate::frames::{Frame, FrameSink, NetworkStatus, NodeError, SinkSet};
use loops::{Shared, TickMode, build_state_frame, run_tick};

use minicortex_core::error::{CortexError, Result};
use minicortex_core::registry::{
    ClassProvider, Connection, InstanceSchema, InstanceSummary, PaletteGroup, TopologySnapshot,
    Viewport,
};
use minicortex_core::schema::NodeClass;
use minicortex_core::types::{InstanceId, Position};
use minicortex_core::value::Value;
use minicortex_core::workspace::{LoadStats, WorkspaceStore};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding saved workspace files.
    pub workspaces_dir: PathBuf,
    /// Broadcast frame rate in frames per second.
    pub broadcast_fps: f64,
    /// Lowest accepted tick rate.
    pub min_speed: f64,
    /// Highest accepted tick rate.
    pub max_speed: f64,
    /// Initial tick rate.
    pub default_speed: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspaces_dir: PathBuf::from("workspaces"),
            broadcast_fps: 40.0,
            min_speed: 1.0,
            max_speed: 300.0,
            default_speed: 10.0,
        }
    }
}

impl EngineConfig {
    /// Configuration from environment variables, falling back to defaults.
    ///
    /// Reads `MINICORTEX_WORKSPACES_DIR`, `MINICORTEX_BROADCAST_FPS`, and
    /// `MINICORTEX_MAX_SPEED`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("MINICORTEX_WORKSPACES_DIR") {
            config.workspaces_dir = PathBuf::from(dir);
        }
        if let Some(fps) = env_f64("MINICORTEX_BROADCAST_FPS") {
            config.broadcast_fps = fps.max(1.0);
        }
        if let Some(max) = env_f64("MINICORTEX_MAX_SPEED") {
            config.max_speed = max.max(config.min_speed);
        }
        config
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// The full configuration snapshot served to a freshly connected editor.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    /// Per-instance schemas.
    pub nodes: Vec<InstanceSchema>,
    /// All connections.
    pub connections: Vec<Connection>,
    /// Editor viewport.
    pub viewport: Viewport,
    /// The node palette.
    pub palette: Vec<PaletteGroup>,
    /// Network state.
    pub network: NetworkStatus,
}

/// The MiniCortex engine: graph state, scheduler, loops, and control plane.
pub struct Engine {
    config: EngineConfig,
    shared: Arc<Mutex<Shared>>,
    gate: Arc<Condvar>,
    sinks: Arc<SinkSet>,
    store: WorkspaceStore,
    current_workspace: Mutex<Option<String>>,
    provider: Mutex<Option<Arc<dyn ClassProvider>>>,
    shutdown: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Create an engine. The loops are not started; call
    /// [`Engine::start_loops`] to spawn them, or drive ticks synchronously
    /// with [`Engine::step`] (tests do the latter).
    pub fn new(config: EngineConfig) -> Self {
        let store = WorkspaceStore::new(config.workspaces_dir.clone());
        Self {
            shared: Arc::new(Mutex::new(Shared::new(config.default_speed))),
            gate: Arc::new(Condvar::new()),
            sinks: Arc::new(SinkSet::new()),
            store,
            current_workspace: Mutex::new(None),
            provider: Mutex::new(None),
            shutdown: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
            config,
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Spawn the computation and broadcast threads. Idempotent.
    pub fn start_loops(&self) {
        let mut threads = self.threads.lock();
        if !threads.is_empty() {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let gate = Arc::clone(&self.gate);
        let sinks = Arc::clone(&self.sinks);
        let shutdown = Arc::clone(&self.shutdown);
        threads.push(
            std::thread::Builder::new()
                .name("minicortex-compute".into())
                .spawn(move || loops::computation_loop(shared, gate, sinks, shutdown))
                .expect("spawn computation loop"),
        );

        let shared = Arc::clone(&self.shared);
        let sinks = Arc::clone(&self.sinks);
        let shutdown = Arc::clone(&self.shutdown);
        let fps = self.config.broadcast_fps;
        threads.push(
            std::thread::Builder::new()
                .name("minicortex-broadcast".into())
                .spawn(move || loops::broadcast_loop(shared, sinks, shutdown, fps))
                .expect("spawn broadcast loop"),
        );
    }

    /// Stop both loops and wait for them to exit.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.gate.notify_all();
        for handle in self.threads.lock().drain(..) {
            let _ = handle.join();
        }
    }

    // ------------------------------------------------------------------
    // Classes and discovery
    // ------------------------------------------------------------------

    /// Register a node class. See `Registry::register_class`.
    pub fn register_class(&self, class: NodeClass) -> Result<bool> {
        self.shared.lock().registry.register_class(class)
    }

    /// Install the class provider used by [`Engine::rediscover`].
    pub fn set_class_provider(&self, provider: Arc<dyn ClassProvider>) {
        *self.provider.lock() = Some(provider);
    }

    /// Re-scan the class provider, returning newly added type names.
    pub fn rediscover(&self) -> Result<Vec<String>> {
        let provider = self
            .provider
            .lock()
            .clone()
            .ok_or_else(|| CortexError::validation("provider", "no class provider installed"))?;
        self.shared.lock().registry.discover(provider.as_ref())
    }

    /// The node palette.
    pub fn palette(&self) -> Vec<PaletteGroup> {
        self.shared.lock().registry.palette()
    }

    // ------------------------------------------------------------------
    // Graph mutation
    // ------------------------------------------------------------------

    /// Create a node instance and probe the stopped network.
    pub fn create_instance(
        &self,
        type_name: &str,
        position: Position,
    ) -> Result<(InstanceSchema, TopologySnapshot)> {
        let id = self
            .shared
            .lock()
            .registry
            .create_instance(type_name, position)?;
        self.probe();
        let guard = self.shared.lock();
        let schema = guard
            .registry
            .instance_schema(&id)
            .expect("instance just created");
        Ok((schema, guard.registry.snapshot()))
    }

    /// Delete a node instance, its connections, and its signals.
    pub fn delete_instance(&self, id: &InstanceId) -> Result<TopologySnapshot> {
        {
            let mut guard = self.shared.lock();
            guard.registry.delete_instance(id)?;
            guard.signals.retain(|(node, _), _| node != id);
        }
        self.probe();
        Ok(self.shared.lock().registry.snapshot())
    }

    /// Compact listing of all instances.
    pub fn list_instances(&self) -> Vec<InstanceSummary> {
        self.shared.lock().registry.list_instances()
    }

    /// One instance's schema with current values.
    pub fn instance_schema(&self, id: &InstanceId) -> Result<InstanceSchema> {
        self.shared
            .lock()
            .registry
            .instance_schema(id)
            .ok_or_else(|| CortexError::not_found("instance", id.as_str()))
    }

    /// Move an instance on the canvas.
    pub fn set_position(&self, id: &InstanceId, x: f64, y: f64) -> Result<()> {
        self.shared.lock().registry.set_position(id, x, y)
    }

    /// Write a property value; returns the coerced value. Visible to the
    /// next tick, never mid-tick.
    pub fn set_property(&self, id: &InstanceId, key: &str, value: &Value) -> Result<Value> {
        self.shared.lock().registry.set_property(id, key, value)
    }

    /// Write a store value directly. Visible to the next tick.
    pub fn set_store(&self, id: &InstanceId, key: &str, value: Value) -> Result<()> {
        self.shared.lock().registry.set_store(id, key, value)
    }

    /// Read a store value (the declared default when never written).
    pub fn store_value(&self, id: &InstanceId, key: &str) -> Result<Value> {
        let guard = self.shared.lock();
        let instance = guard
            .registry
            .instance(id)
            .ok_or_else(|| CortexError::not_found("instance", id.as_str()))?;
        let store = instance
            .class
            .store(key)
            .ok_or_else(|| CortexError::not_found("store", key))?;
        Ok(instance
            .cells
            .stores
            .get(key)
            .unwrap_or(&store.default)
            .clone())
    }

    /// Invoke a node action synchronously on this thread.
    pub fn invoke_action(
        &self,
        id: &InstanceId,
        key: &str,
        params: &serde_json::Value,
    ) -> Result<Value> {
        self.shared.lock().registry.invoke_action(id, key, params)
    }

    /// Enable or disable broadcasting of a display output.
    pub fn set_display_enabled(&self, id: &InstanceId, key: &str, enabled: bool) -> Result<()> {
        self.shared
            .lock()
            .registry
            .set_display_enabled(id, key, enabled)
    }

    /// Hot-reload the class of the given instance, then probe.
    pub fn reload_instance(&self, id: &InstanceId) -> Result<InstanceSchema> {
        self.shared.lock().registry.reload_instance(id)?;
        self.probe();
        self.instance_schema(id)
    }

    /// Create a connection and probe the stopped network.
    pub fn connect(
        &self,
        from_node: &InstanceId,
        from_output: &str,
        to_node: &InstanceId,
        to_input: &str,
    ) -> Result<TopologySnapshot> {
        self.shared
            .lock()
            .registry
            .connect(from_node, from_output, to_node, to_input, false)?;
        self.probe();
        Ok(self.shared.lock().registry.snapshot())
    }

    /// Remove a connection (no-op if absent) and probe the stopped network.
    pub fn disconnect(
        &self,
        from_node: &InstanceId,
        from_output: &str,
        to_node: &InstanceId,
        to_input: &str,
    ) -> Result<TopologySnapshot> {
        self.shared
            .lock()
            .registry
            .disconnect(from_node, from_output, to_node, to_input);
        self.probe();
        Ok(self.shared.lock().registry.snapshot())
    }

    /// Update the editor viewport.
    pub fn set_viewport(&self, pan: Position, zoom: f64) -> Result<()> {
        self.shared.lock().registry.set_viewport(pan, zoom)
    }

    /// The full configuration snapshot for a freshly connected editor.
    pub fn get_config(&self) -> ConfigView {
        let guard = self.shared.lock();
        let snapshot = guard.registry.snapshot();
        ConfigView {
            nodes: snapshot.nodes,
            connections: snapshot.connections,
            viewport: snapshot.viewport,
            palette: guard.registry.palette(),
            network: guard.status(),
        }
    }

    /// The current topology snapshot.
    pub fn snapshot(&self) -> TopologySnapshot {
        self.shared.lock().registry.snapshot()
    }

    // ------------------------------------------------------------------
    // Network control
    // ------------------------------------------------------------------

    /// Start ticking. Clears the supervisor error state.
    pub fn start(&self) -> NetworkStatus {
        let mut guard = self.shared.lock();
        guard.running = true;
        guard.error = None;
        let status = guard.status();
        self.gate.notify_all();
        status
    }

    /// Stop ticking, waiting for any in-flight tick to complete.
    pub fn stop(&self) -> NetworkStatus {
        let mut guard = self.shared.lock();
        guard.running = false;
        while guard.tick_in_flight {
            self.gate.wait(&mut guard);
        }
        guard.status()
    }

    /// Execute one synchronous tick. Rejected while running.
    ///
    /// A node failure during the tick is reported through the error state
    /// and the event stream, like any other tick failure; the returned
    /// status reflects it.
    pub fn step(&self) -> Result<NetworkStatus> {
        if self.shared.lock().running {
            return Err(CortexError::validation(
                "step",
                "network is running; stop it first",
            ));
        }
        run_tick(&self.shared, &self.gate, &self.sinks, TickMode::Step);
        Ok(self.network_status())
    }

    /// Set the target tick rate, clamped to the configured bounds.
    pub fn set_speed(&self, hz: f64) -> NetworkStatus {
        let mut guard = self.shared.lock();
        if hz.is_finite() {
            guard.speed = hz.clamp(self.config.min_speed, self.config.max_speed);
        }
        guard.status()
    }

    /// The current network status.
    pub fn network_status(&self) -> NetworkStatus {
        self.shared.lock().status()
    }

    /// The most recent tick failure, if the supervisor is in an error state.
    pub fn last_error(&self) -> Option<NodeError> {
        self.shared.lock().error.clone()
    }

    // ------------------------------------------------------------------
    // Event stream
    // ------------------------------------------------------------------

    /// Subscribe an observer to the event stream.
    pub fn subscribe(&self, sink: Arc<dyn FrameSink>) {
        self.sinks.subscribe(sink);
    }

    /// Build and emit one state frame immediately (outside the broadcast
    /// cadence), e.g. to seed a newly connected observer.
    pub fn emit_state(&self) {
        let frame = {
            let guard = self.shared.lock();
            Frame::State(build_state_frame(&guard))
        };
        self.sinks.broadcast(&frame);
    }

    // ------------------------------------------------------------------
    // Workspaces
    // ------------------------------------------------------------------

    /// Save the current graph under the given name.
    pub fn save_workspace(&self, name: &str) -> Result<()> {
        let doc = self.shared.lock().registry.export_workspace();
        self.store.save(name, &doc)?;
        *self.current_workspace.lock() = Some(name.to_string());
        Ok(())
    }

    /// Replace the current graph with a saved workspace, then probe.
    ///
    /// A failed load leaves the registry in its pre-load state.
    pub fn load_workspace(&self, name: &str) -> Result<LoadStats> {
        let doc = self.store.load(name)?;
        let stats = {
            let mut guard = self.shared.lock();
            let stats = guard.registry.install_workspace(&doc).map_err(|e| match e {
                CortexError::LoadFailed { .. } => e,
                other => CortexError::LoadFailed {
                    name: name.to_string(),
                    cause: other.to_string(),
                },
            })?;
            guard.signals.clear();
            guard.error = None;
            stats
        };
        *self.current_workspace.lock() = Some(name.to_string());
        self.probe();
        Ok(stats)
    }

    /// Delete a saved workspace file.
    pub fn delete_workspace(&self, name: &str) -> Result<()> {
        self.store.delete(name)
    }

    /// Enumerate saved workspace names.
    pub fn list_workspaces(&self) -> Result<Vec<String>> {
        self.store.list()
    }

    /// Empty the graph and viewport without touching any file.
    pub fn clear_workspace(&self) {
        let mut guard = self.shared.lock();
        guard.registry.clear();
        guard.signals.clear();
        guard.error = None;
        *self.current_workspace.lock() = None;
    }

    /// The most recently saved or loaded workspace name, if any.
    pub fn current_workspace(&self) -> Option<String> {
        self.current_workspace.lock().clone()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Run a probing tick if the network is stopped: same machinery as a
    /// normal tick, but the step counter does not advance. A probe failure
    /// records the error state without failing the mutating operation that
    /// triggered it.
    fn probe(&self) {
        run_tick(&self.shared, &self.gate, &self.sinks, TickMode::Probe);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
