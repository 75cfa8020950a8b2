//! [`AddressSpace`] – the protocol-server collaborator boundary.
//!
//! The reconciler mutates the address space through this trait only; the
//! concrete server runtime behind it is interchangeable.  [`InMemorySpace`]
//! is the reference implementation: a node table plus a namespace array,
//! enough to honour every contract the reconciler relies on (namespace
//! isolation per entity kind, duplicate-id rejection, readable parent ids).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use rosua_types::{MirrorError, NodeHandle, NodeId};

/// Shared handle to the single mutable address space.
///
/// One logical writer (the reconciliation loop) and any number of readers
/// (the browse server) take this lock; no lock is ever held across an await.
pub type SharedSpace = Arc<Mutex<dyn AddressSpace + Send>>;

/// Hierarchical node tree exposed to external protocol clients.
pub trait AddressSpace: Send {
    /// Register a namespace URI and return its index.
    ///
    /// Registering the same URI twice returns the original index.
    fn register_namespace(&mut self, uri: &str) -> u16;

    /// The root "Objects" container under which all kind containers live.
    fn objects(&self) -> NodeId;

    /// Add a child object under `parent` with an explicit node id and browse
    /// name, returning a handle whose id and parent stay readable.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Space`] when `parent` does not exist or a node
    /// with the same id already exists.
    fn add_object(
        &mut self,
        parent: &NodeId,
        id: NodeId,
        browse_name: &str,
    ) -> Result<NodeHandle, MirrorError>;

    /// Total number of nodes, including the Objects root.
    fn node_count(&self) -> usize;

    fn contains(&self, id: &NodeId) -> bool;

    /// Handles of the direct children of `id`, unspecified order.
    fn children_of(&self, id: &NodeId) -> Vec<NodeHandle>;
}

struct NodeRec {
    parent: Option<NodeId>,
    browse_name: String,
    children: Vec<NodeId>,
}

/// In-memory [`AddressSpace`] implementation.
pub struct InMemorySpace {
    namespaces: Vec<String>,
    nodes: HashMap<NodeId, NodeRec>,
    objects_id: NodeId,
}

impl InMemorySpace {
    /// Create a space holding only the base namespace and the Objects root.
    pub fn new() -> Self {
        let objects_id = NodeId::new(0, "Objects");
        let mut nodes = HashMap::new();
        nodes.insert(
            objects_id.clone(),
            NodeRec {
                parent: None,
                browse_name: "Objects".to_string(),
                children: Vec::new(),
            },
        );
        Self {
            namespaces: vec!["http://opcfoundation.org/UA/".to_string()],
            nodes,
            objects_id,
        }
    }

    /// Registered namespace URIs, base namespace first.
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }
}

impl Default for InMemorySpace {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace for InMemorySpace {
    fn register_namespace(&mut self, uri: &str) -> u16 {
        if let Some(idx) = self.namespaces.iter().position(|n| n == uri) {
            return idx as u16;
        }
        self.namespaces.push(uri.to_string());
        (self.namespaces.len() - 1) as u16
    }

    fn objects(&self) -> NodeId {
        self.objects_id.clone()
    }

    fn add_object(
        &mut self,
        parent: &NodeId,
        id: NodeId,
        browse_name: &str,
    ) -> Result<NodeHandle, MirrorError> {
        if !self.nodes.contains_key(parent) {
            return Err(MirrorError::Space(format!("parent node {parent} does not exist")));
        }
        if self.nodes.contains_key(&id) {
            return Err(MirrorError::Space(format!("node {id} already exists")));
        }
        self.nodes.insert(
            id.clone(),
            NodeRec {
                parent: Some(parent.clone()),
                browse_name: browse_name.to_string(),
                children: Vec::new(),
            },
        );
        if let Some(parent_rec) = self.nodes.get_mut(parent) {
            parent_rec.children.push(id.clone());
        }
        Ok(NodeHandle {
            id,
            parent: parent.clone(),
            browse_name: browse_name.to_string(),
        })
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    fn children_of(&self, id: &NodeId) -> Vec<NodeHandle> {
        let Some(rec) = self.nodes.get(id) else {
            return Vec::new();
        };
        rec.children
            .iter()
            .filter_map(|child_id| {
                self.nodes.get(child_id).map(|child| NodeHandle {
                    id: child_id.clone(),
                    parent: id.clone(),
                    browse_name: child.browse_name.clone(),
                })
            })
            .collect()
    }
}

/// Wrap a concrete address space into the [`SharedSpace`] handle.
pub fn shared(space: impl AddressSpace + Send + 'static) -> SharedSpace {
    Arc::new(Mutex::new(space))
}
