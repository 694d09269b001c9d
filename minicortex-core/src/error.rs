//! Error types for MiniCortex.
//!
//! Every failure mode the core can report is a variant of [`CortexError`]
//! with a stable `E###` code in its message and a stable kind string from
//! [`CortexError::code`], so control-plane wrappers can map errors without
//! parsing messages.

use crate::types::InstanceId;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = CortexError> = std::result::Result<T, E>;

/// The main error type for MiniCortex operations.
#[derive(Error, Debug, Clone)]
pub enum CortexError {
    /// An instance, class, port, action, or workspace was not found.
    #[error("E101: {kind} '{name}' not found")]
    NotFound {
        /// What was looked up (e.g. "instance", "node type", "input port").
        kind: &'static str,
        /// The name or id that failed to resolve.
        name: String,
    },

    /// Connection endpoints have incompatible port data types.
    #[error(
        "E102: incompatible port types: {from_node}.{from_port} ({from_type}) -> {to_node}.{to_port} ({to_type})"
    )]
    TypeMismatch {
        /// Source instance.
        from_node: InstanceId,
        /// Source output port key.
        from_port: String,
        /// Declared type of the source port.
        from_type: String,
        /// Target instance.
        to_node: InstanceId,
        /// Target input port key.
        to_port: String,
        /// Declared type of the target port.
        to_type: String,
    },

    /// The target input port already has an incoming connection.
    #[error("E103: input '{port}' on {node} already has a connection")]
    PortBusy {
        /// The target instance.
        node: InstanceId,
        /// The occupied input port key.
        port: String,
    },

    /// A connection would close a cycle while strict acyclicity was requested.
    #[error("E104: connection would create a cycle involving {from_node} and {to_node}")]
    Cycle {
        /// Source instance of the rejected edge.
        from_node: InstanceId,
        /// Target instance of the rejected edge.
        to_node: InstanceId,
    },

    /// A value or request failed validation.
    #[error("E105: validation failed for '{field}': {cause}")]
    Validation {
        /// The offending field or parameter.
        field: String,
        /// What went wrong.
        cause: String,
    },

    /// A workspace file is absent, corrupted, or unsupported.
    #[error("E201: failed to load workspace '{name}': {cause}")]
    LoadFailed {
        /// The workspace name.
        name: String,
        /// What went wrong.
        cause: String,
    },

    /// A hot-reload source could not be re-derived into a usable class.
    #[error("E202: hot reload of '{type_name}' failed: {cause}")]
    ReloadFailed {
        /// The class type name being reloaded.
        type_name: String,
        /// What went wrong.
        cause: String,
    },

    /// Workspace file IO failed outside of loading (save, delete, list).
    #[error("E203: workspace storage error at {path}: {cause}")]
    Storage {
        /// The path that could not be accessed.
        path: String,
        /// The underlying IO failure.
        cause: String,
    },

    /// A node's `process`, `init`, or action callback raised.
    #[error("E301: node '{name}' ({instance}) failed: {message}")]
    NodeRuntime {
        /// The failing instance.
        instance: InstanceId,
        /// The instance's display name.
        name: String,
        /// The failure message.
        message: String,
        /// Rendered error detail (source chain or panic payload).
        trace: String,
    },
}

impl CortexError {
    /// Shorthand for a [`CortexError::NotFound`].
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Shorthand for a [`CortexError::Validation`].
    pub fn validation(field: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            cause: cause.into(),
        }
    }

    /// Stable kind string for control-plane responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::PortBusy { .. } => "port_busy",
            Self::Cycle { .. } => "cycle",
            Self::Validation { .. } => "validation",
            Self::LoadFailed { .. } => "load_failed",
            Self::ReloadFailed { .. } => "reload_failed",
            Self::Storage { .. } => "storage",
            Self::NodeRuntime { .. } => "node_runtime",
        }
    }
}
