//! [`EntityRegistry`] – per-kind record of mirrored entities.
//!
//! One registry exists per [`EntityKind`]; keeping the kinds separate is
//! half of the namespace-isolation guarantee (the other half being the
//! per-kind OPC UA namespace index on the node ids).
//!
//! The registry is the mechanism that makes repeated scan cycles
//! idempotent: before creating a node for a discovered entity, the
//! reconciler runs [`EntityRegistry::find_node_with_same_name`] and reuses
//! the existing node instead of creating a sibling duplicate.

use std::collections::HashMap;

use tracing::{debug, warn};

use rosua_types::{Entity, EntityKind, NodeHandle};

/// Name → mirrored entity mapping for a single kind.
pub struct EntityRegistry {
    kind: EntityKind,
    entries: HashMap<String, Entity>,
}

impl EntityRegistry {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Find the mirrored node whose identifier equals `name`.
    ///
    /// Linear scan over the current entries; read-only.  Linear cost is
    /// acceptable at the coarse cycle interval and typical graph sizes.
    pub fn find_node_with_same_name(&self, name: &str) -> Option<&NodeHandle> {
        debug!(kind = %self.kind, name, "dedup lookup");
        for entity in self.entries.values() {
            if entity.node.id.ident == name {
                debug!(name, "found existing node");
                return Some(&entity.node);
            }
        }
        None
    }

    /// Record a newly mirrored entity.
    ///
    /// At most one entry exists per name.  An entry's node reference, once
    /// set, is never replaced by a node with a different identifier: such an
    /// attempt is logged and the original entry kept.
    pub fn insert(&mut self, entity: Entity) {
        if let Some(existing) = self.entries.get(&entity.name) {
            if existing.node.id != entity.node.id {
                warn!(
                    kind = %self.kind,
                    name = %entity.name,
                    existing = %existing.node.id,
                    rejected = %entity.node.id,
                    "refusing to rebind a mirrored entity to a different node"
                );
            }
            return;
        }
        self.entries.insert(entity.name.clone(), entity);
    }

    /// Iterate the current entries, unspecified order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entries.values()
    }
}
