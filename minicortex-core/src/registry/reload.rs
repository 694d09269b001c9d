//! Hot reload: replace a `dynamic` class in-session, preserving state.
//!
//! The migration is staged completely (fresh instances built, values copied,
//! connections filtered, `init` run) before anything is installed, so a
//! failure at any step leaves the registry untouched.

use super::{Connection, Registry};
use crate::error::{CortexError, Result};
use crate::node::NodeInstance;
use crate::schema::NodeClass;
use crate::types::InstanceId;
use std::collections::HashSet;
use std::sync::Arc;

impl Registry {
    /// Hot-reload the class of the given instance.
    ///
    /// Re-derives the class from its source reference and migrates every
    /// live instance of the type (not just the requested one). Property and
    /// store values survive keyed by name; connections touching ports that
    /// no longer exist are dropped.
    pub fn reload_instance(&mut self, id: &InstanceId) -> Result<()> {
        let class = self
            .instance(id)
            .ok_or_else(|| CortexError::not_found("instance", id.as_str()))?
            .class
            .clone();
        if !class.dynamic {
            return Err(CortexError::validation(
                &class.type_name,
                "class is not dynamic",
            ));
        }
        let source = class
            .source()
            .cloned()
            .ok_or_else(|| CortexError::ReloadFailed {
                type_name: class.type_name.clone(),
                cause: "class has no source reference".to_string(),
            })?;

        let mut new_class = source.load().map_err(|e| CortexError::ReloadFailed {
            type_name: class.type_name.clone(),
            cause: e.to_string(),
        })?;
        if new_class.type_name != class.type_name {
            return Err(CortexError::ReloadFailed {
                type_name: class.type_name.clone(),
                cause: format!(
                    "source {} produced class '{}'",
                    source.describe(),
                    new_class.type_name
                ),
            });
        }
        // A re-derived class stays reloadable through the same source unless
        // it restated one itself.
        if new_class.source().is_none() {
            new_class = new_class.with_source(source);
        }

        self.install_class_replacement(Arc::new(new_class))
    }

    /// Replace a registered class and migrate its live instances.
    ///
    /// Also used when a `dynamic` class is re-registered under the same type
    /// name (discovery after a source edit).
    pub(crate) fn install_class_replacement(&mut self, new_class: Arc<NodeClass>) -> Result<()> {
        let type_name = new_class.type_name.clone();
        let Some(&class_idx) = self.class_index.get(&type_name) else {
            self.class_index.insert(type_name, self.classes.len());
            self.classes.push(new_class);
            return Ok(());
        };

        // Stage a fresh instance per live instance of this type. IDs and
        // creation sequence numbers carry over so connections stay bound and
        // scheduling order is unchanged.
        let mut staged: Vec<(usize, NodeInstance)> = Vec::new();
        for (idx, old) in self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, i)| i.class.type_name == type_name)
        {
            let mut fresh =
                NodeInstance::new(old.id.clone(), new_class.clone(), old.position, old.seq);
            fresh.name = old.name.clone();

            for property in &new_class.properties {
                if let Some(value) = old.cells.properties.get(&property.key) {
                    match property.coerce(value) {
                        Ok(coerced) => {
                            fresh.cells.properties.insert(property.key.clone(), coerced);
                        }
                        Err(e) => tracing::warn!(
                            instance = %old.id,
                            property = %property.key,
                            error = %e,
                            "dropping property value on reload"
                        ),
                    }
                }
            }
            for store in &new_class.stores {
                if let Some(value) = old.cells.stores.get(&store.key) {
                    fresh.cells.stores.insert(store.key.clone(), value.clone());
                }
            }
            for (key, enabled) in &old.enabled_displays {
                if fresh.enabled_displays.contains_key(key) {
                    fresh.enabled_displays.insert(key.clone(), *enabled);
                }
            }
            staged.push((idx, fresh));
        }

        // Drop connections whose endpoint port vanished from the new schema.
        let replaced: HashSet<&InstanceId> = staged.iter().map(|(_, i)| &i.id).collect();
        let retained: Vec<Connection> = self
            .connections
            .iter()
            .filter(|c| {
                let from_ok =
                    !replaced.contains(&c.from_node) || new_class.output(&c.from_output).is_some();
                let to_ok =
                    !replaced.contains(&c.to_node) || new_class.input(&c.to_input).is_some();
                from_ok && to_ok
            })
            .cloned()
            .collect();
        let dropped = self.connections.len() - retained.len();

        for (_, instance) in &mut staged {
            self.run_init(instance).map_err(|e| CortexError::ReloadFailed {
                type_name: type_name.clone(),
                cause: e.to_string(),
            })?;
        }

        self.classes[class_idx] = new_class;
        let migrated = staged.len();
        for (idx, instance) in staged {
            self.instances[idx] = instance;
        }
        self.connections = retained;
        tracing::info!(
            type_name,
            migrated,
            dropped_connections = dropped,
            "hot reload installed"
        );
        Ok(())
    }
}
