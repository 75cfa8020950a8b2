use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three kinds of entity that can appear in the ROS communication graph.
///
/// Each kind is mirrored into its own OPC UA namespace so that a topic and a
/// service sharing the same name never collide on a node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Topic,
    Service,
    Action,
}

impl EntityKind {
    /// Namespace URI registered on the address space for this kind.
    pub fn namespace_uri(&self) -> &'static str {
        match self {
            EntityKind::Topic => "http://ros.org/topics",
            EntityKind::Service => "http://ros.org/services",
            EntityKind::Action => "http://ros.org/actions",
        }
    }

    /// Browse name of the top-level container object for this kind.
    pub fn root_browse_name(&self) -> &'static str {
        match self {
            EntityKind::Topic => "ROS-Topics",
            EntityKind::Service => "ROS-Services",
            EntityKind::Action => "ROS-Actions",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Topic => write!(f, "topic"),
            EntityKind::Service => write!(f, "service"),
            EntityKind::Action => write!(f, "action"),
        }
    }
}

/// One topic as enumerated from the robot graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    /// Fully-qualified, slash-delimited topic name (e.g. `/robot/cmd_vel`).
    pub name: String,
    /// Message type (e.g. `geometry_msgs/Twist`).
    pub datatype: String,
    /// Node names currently publishing on the topic.
    pub publishers: Vec<String>,
    /// Node names currently subscribed to the topic.
    pub subscribers: Vec<String>,
}

/// One service as enumerated from the robot graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub datatype: String,
}

/// One action server as enumerated from the robot graph.
///
/// An action is backed by a fixed set of topics (`goal`, `cancel`, `status`,
/// `feedback`, `result`) listed in `topics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInfo {
    pub name: String,
    pub topics: Vec<String>,
}

/// Result of one full graph enumeration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub topics: Vec<TopicInfo>,
    pub services: Vec<ServiceInfo>,
    pub actions: Vec<ActionInfo>,
}

/// Outcome of pinging every known process in the robot graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingReport {
    pub reachable: Vec<String>,
    pub unreachable: Vec<String>,
}

/// String-identifier OPC UA node id, qualified by a namespace index.
///
/// Entity container nodes carry the full slash-delimited entity name as
/// their identifier, under the namespace index of their [`EntityKind`];
/// that is what makes the duplicate-avoidance lookup possible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub ns: u16,
    pub ident: String,
}

impl NodeId {
    pub fn new(ns: u16, ident: impl Into<String>) -> Self {
        Self {
            ns,
            ident: ident.into(),
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ns={};s={}", self.ns, self.ident)
    }
}

/// Non-owning reference to a node in the address space.
///
/// The address space owns the node; registries and reconciliation logic only
/// ever hold handles. Both the node's own id and its parent id stay readable
/// so the duplicate-avoidance lookup can inspect them on later cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHandle {
    pub id: NodeId,
    pub parent: NodeId,
    pub browse_name: String,
}

/// A mirrored graph entity and its address-space node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    pub node: NodeHandle,
}

/// Global error type spanning graph enumeration, address-space mutation,
/// configuration resolution, and wire serialization.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Address-space error: {0}")]
    Space(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_namespaces_are_distinct() {
        let uris = [
            EntityKind::Topic.namespace_uri(),
            EntityKind::Service.namespace_uri(),
            EntityKind::Action.namespace_uri(),
        ];
        assert_ne!(uris[0], uris[1]);
        assert_ne!(uris[1], uris[2]);
        assert_ne!(uris[0], uris[2]);
    }

    #[test]
    fn topic_info_roundtrip() {
        let info = TopicInfo {
            name: "/robot/cmd_vel".to_string(),
            datatype: "geometry_msgs/Twist".to_string(),
            publishers: vec!["/teleop".to_string()],
            subscribers: vec!["/base_controller".to_string()],
        };
        let json = serde_json::to_string(&info).unwrap();
        let back: TopicInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, back);
    }

    #[test]
    fn node_id_display_includes_namespace_and_identifier() {
        let id = NodeId::new(2, "/robot/odom");
        assert_eq!(id.to_string(), "ns=2;s=/robot/odom");
    }

    #[test]
    fn same_identifier_different_namespace_is_distinct() {
        let a = NodeId::new(1, "/ping");
        let b = NodeId::new(2, "/ping");
        assert_ne!(a, b);
    }

    #[test]
    fn entity_roundtrip() {
        let entity = Entity {
            name: "/robot/odom".to_string(),
            kind: EntityKind::Topic,
            node: NodeHandle {
                id: NodeId::new(1, "/robot/odom"),
                parent: NodeId::new(1, "ROS-Topics"),
                browse_name: "robotodom".to_string(),
            },
        };
        let json = serde_json::to_string(&entity).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(entity, back);
    }

    #[test]
    fn mirror_error_display() {
        let err = MirrorError::Graph("rosbridge unreachable".to_string());
        assert!(err.to_string().contains("rosbridge unreachable"));

        let err2 = MirrorError::Space("duplicate node id".to_string());
        assert!(err2.to_string().contains("Address-space"));
    }
}
