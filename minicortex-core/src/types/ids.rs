//! Strongly-typed identifier for node instances.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a node instance.
///
/// IDs are derived from the class type name and a monotonic per-registry
/// counter (`adder_3`), so they stay readable in workspace files and
/// broadcast frames. IDs restored from a workspace are kept verbatim; the
/// counter is advanced past them so newly created instances never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Derive an ID from a class type name and a sequence number.
    pub fn derive(type_name: &str, seq: u64) -> Self {
        Self(format!("{type_name}_{seq}"))
    }

    /// Wrap a raw ID string (used when restoring a workspace).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing sequence number, if the ID follows the derived format.
    ///
    /// Used on workspace load to advance the registry counter past every
    /// restored ID.
    pub fn trailing_sequence(&self) -> Option<u64> {
        self.0.rsplit_once('_').and_then(|(_, n)| n.parse().ok())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}
