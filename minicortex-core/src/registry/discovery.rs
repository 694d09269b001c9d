//! Node class discovery.
//!
//! The core does not import source files itself; a [`ClassProvider`] hands
//! it named source units (conventionally, one per file in the nodes
//! directory). Units whose name begins with an underscore are skipped, and
//! every class they carry is registered idempotently.

use super::Registry;
use crate::error::Result;
use crate::schema::NodeClass;

/// One scanned source unit: a name plus the classes defined in it.
pub struct SourceUnit {
    /// Unit name (conventionally the file stem).
    pub name: String,
    /// Classes carrying a palette category defined in this unit.
    pub classes: Vec<NodeClass>,
}

/// Scans the conventional nodes directory (or whatever backs it) for node
/// classes. Dynamic classes should arrive with their source reference set so
/// hot reload can re-derive them later.
pub trait ClassProvider: Send + Sync {
    /// Scan for source units.
    fn scan(&self) -> Result<Vec<SourceUnit>>;
}

impl Registry {
    /// Scan a provider and register every discovered class.
    ///
    /// Returns the type names that were newly added (replacements of
    /// existing dynamic classes are applied but not reported as new).
    pub fn discover(&mut self, provider: &dyn ClassProvider) -> Result<Vec<String>> {
        let mut added = Vec::new();
        for unit in provider.scan()? {
            if unit.name.starts_with('_') {
                tracing::debug!(unit = %unit.name, "skipping underscore-prefixed unit");
                continue;
            }
            for class in unit.classes {
                let type_name = class.type_name.clone();
                if self.register_class(class)? {
                    added.push(type_name);
                }
            }
        }
        Ok(added)
    }
}
