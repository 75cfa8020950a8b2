//! [`Reconciler`] – the graph-to-address-space synchronisation loop.
//!
//! One cycle walks four phases:
//!
//! 1. **Enumerating** – snapshot the robot graph through [`GraphSource`].
//! 2. **Filtering** – drop entities outside the namespace root or rejected
//!    by the [`ScopeConfig`] policy.  A filtered entity is neither recorded
//!    nor deleted; it simply does not take part this cycle.
//! 3. **Resolving** – place the entity in the tree: find the deepest
//!    already-mirrored ancestor of the same kind (else the kind's root
//!    container) and derive the browse label from the remaining hierarchy.
//! 4. **Reconciling** – consult the kind's [`EntityRegistry`]; create the
//!    node and record the mapping only when no node with the same
//!    identifier exists yet.  Existing nodes are left untouched.
//!
//! [`Reconciler::run`] repeats cycles forever with a configurable sleep in
//! between, checking the shutdown flag at cycle boundaries only.  Nodes are
//! never retracted when their entity disappears from the graph; clients may
//! rely on mirrored nodes staying browsable.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{Instrument, debug, error, info, warn};

use rosua_graph::GraphSource;
use rosua_space::{AddressSpace, SharedSpace};
use rosua_types::{Entity, EntityKind, MirrorError, NodeId};

use crate::filter::ScopeConfig;
use crate::hierarchy::{remaining_hierarchy, split_name};
use crate::registry::EntityRegistry;

/// Default pause between scan cycles.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// Tunables for the reconciliation loop.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Pause between scan cycles.  Coarse on purpose: discovery latency is
    /// traded for low load on the graph and the server.
    pub scan_interval: Duration,
    /// Only entities under this prefix are mirrored.
    pub namespace_root: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            namespace_root: "/".to_string(),
        }
    }
}

/// Outcome counters for one scan cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    /// Entities enumerated from the graph.
    pub discovered: usize,
    /// Entities dropped by namespace root or scope policy.
    pub filtered_out: usize,
    /// Nodes created this cycle.
    pub created: usize,
    /// Entities whose node already existed.
    pub reused: usize,
    /// Entities skipped because of a resolution or creation problem.
    pub skipped: usize,
}

impl CycleReport {
    fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            discovered: 0,
            filtered_out: 0,
            created: 0,
            reused: 0,
            skipped: 0,
        }
    }
}

/// Per-kind state: registry, namespace index, root container node.
struct KindSlot {
    registry: EntityRegistry,
    ns: u16,
    root: NodeId,
}

/// Explicit context object for the reconciliation loop.
///
/// Owns the registries, the resolved scope policy, and the collaborator
/// handles; nothing lives in ambient state, so a single cycle can be driven
/// in isolation against sim collaborators.
pub struct Reconciler {
    graph: Arc<dyn GraphSource>,
    space: SharedSpace,
    scope: ScopeConfig,
    config: ReconcilerConfig,
    topics: KindSlot,
    services: KindSlot,
    actions: KindSlot,
}

impl Reconciler {
    /// Wire up the reconciler: register the three kind namespaces on the
    /// address space and create the per-kind root containers under Objects.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Space`] when a root container cannot be
    /// created.
    pub async fn new(
        graph: Arc<dyn GraphSource>,
        space: SharedSpace,
        scope: ScopeConfig,
        config: ReconcilerConfig,
    ) -> Result<Self, MirrorError> {
        let (topics, services, actions) = {
            let mut sp = space.lock().await;
            let objects = sp.objects();
            (
                make_slot(&mut *sp, &objects, EntityKind::Topic)?,
                make_slot(&mut *sp, &objects, EntityKind::Service)?,
                make_slot(&mut *sp, &objects, EntityKind::Action)?,
            )
        };
        Ok(Self {
            graph,
            space,
            scope,
            config,
            topics,
            services,
            actions,
        })
    }

    /// Namespace index registered for `kind`.
    pub fn namespace_index(&self, kind: EntityKind) -> u16 {
        self.slot(kind).ns
    }

    /// Registry for `kind` (read access, mainly for tests and diagnostics).
    pub fn registry(&self, kind: EntityKind) -> &EntityRegistry {
        &self.slot(kind).registry
    }

    fn slot(&self, kind: EntityKind) -> &KindSlot {
        match kind {
            EntityKind::Topic => &self.topics,
            EntityKind::Service => &self.services,
            EntityKind::Action => &self.actions,
        }
    }

    /// Run one full scan cycle.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Graph`] when enumeration fails; per-entity
    /// problems are logged and counted as skipped instead.
    pub async fn cycle(&mut self) -> Result<CycleReport, MirrorError> {
        let snapshot = self
            .graph
            .snapshot()
            .instrument(tracing::info_span!("enumerating"))
            .await?;
        let mut report = CycleReport::new();
        report.discovered =
            snapshot.topics.len() + snapshot.services.len() + snapshot.actions.len();

        async {
            for topic in &snapshot.topics {
                self.reconcile_entity(EntityKind::Topic, &topic.name, &mut report)
                    .await;
            }
            for service in &snapshot.services {
                self.reconcile_entity(EntityKind::Service, &service.name, &mut report)
                    .await;
            }
            for action in &snapshot.actions {
                self.reconcile_entity(EntityKind::Action, &action.name, &mut report)
                    .await;
            }
        }
        .instrument(tracing::info_span!("reconciling"))
        .await;
        Ok(report)
    }

    #[tracing::instrument(skip(self, report), level = "debug")]
    async fn reconcile_entity(&mut self, kind: EntityKind, name: &str, report: &mut CycleReport) {
        // Filtering: namespace root first, then the scope policy.  Entities
        // failing either are skipped entirely this cycle.
        let canonical = if name.starts_with('/') {
            name.to_string()
        } else {
            format!("/{name}")
        };
        if !in_namespace_root(&canonical, &self.config.namespace_root) {
            report.filtered_out += 1;
            return;
        }
        if !self.scope.in_scope(kind, &canonical) {
            report.filtered_out += 1;
            return;
        }

        let space = Arc::clone(&self.space);
        let slot = match kind {
            EntityKind::Topic => &mut self.topics,
            EntityKind::Service => &mut self.services,
            EntityKind::Action => &mut self.actions,
        };

        // Reconciling: reuse before create.
        if slot.registry.find_node_with_same_name(&canonical).is_some() {
            report.reused += 1;
            return;
        }

        // Resolving: deepest mirrored ancestor of the same kind, else the
        // kind root; the label is the concatenated remaining hierarchy.
        let segments = split_name(&canonical);
        let (parent, last_processed) = match deepest_ancestor(&slot.registry, &canonical) {
            Some(ancestor) => (
                ancestor.node.id.clone(),
                split_name(&ancestor.name).len() - 1,
            ),
            None => (slot.root.clone(), 0),
        };
        let label = remaining_hierarchy(&segments, last_processed);
        if label.is_empty() {
            debug!(kind = %kind, name = %canonical, "nothing further to create");
            report.skipped += 1;
            return;
        }

        let node_id = NodeId::new(slot.ns, canonical.clone());
        let created = {
            let mut sp = space.lock().await;
            sp.add_object(&parent, node_id, &label)
        };
        match created {
            Ok(node) => {
                debug!(kind = %kind, name = %canonical, node = %node.id, "mirrored new entity");
                slot.registry.insert(Entity {
                    name: canonical,
                    kind,
                    node,
                });
                report.created += 1;
            }
            Err(e) => {
                // One bad entity must not abort the whole cycle.
                warn!(kind = %kind, name = %canonical, error = %e, "node creation failed, skipping entity");
                report.skipped += 1;
            }
        }
    }

    /// Drive cycles until `shutdown` is set.
    ///
    /// The flag is checked once per cycle boundary; a failed cycle is
    /// logged and retried naturally on the next interval.
    pub async fn run(mut self, shutdown: Arc<AtomicBool>) {
        info!(
            interval_secs = self.config.scan_interval.as_secs(),
            namespace_root = %self.config.namespace_root,
            "reconciliation loop started"
        );
        while !shutdown.load(Ordering::SeqCst) {
            match self.cycle().await {
                Ok(report) => info!(
                    discovered = report.discovered,
                    created = report.created,
                    reused = report.reused,
                    filtered_out = report.filtered_out,
                    skipped = report.skipped,
                    "scan cycle complete"
                ),
                Err(e) => error!(error = %e, "scan cycle failed; retrying on next interval"),
            }
            tokio::time::sleep(self.config.scan_interval).await;
        }
        info!("shutdown requested, reconciliation loop exiting");
    }
}

fn make_slot(
    space: &mut (dyn AddressSpace + Send),
    objects: &NodeId,
    kind: EntityKind,
) -> Result<KindSlot, MirrorError> {
    let ns = space.register_namespace(kind.namespace_uri());
    let root = space.add_object(
        objects,
        NodeId::new(ns, kind.root_browse_name()),
        kind.root_browse_name(),
    )?;
    Ok(KindSlot {
        registry: EntityRegistry::new(kind),
        ns,
        root: root.id,
    })
}

/// Whether `name` lies under the namespace root.
///
/// The root must match on a whole path segment: `/robot` covers `/robot`
/// and `/robot/arm` but not the sibling namespace `/robotics`.
fn in_namespace_root(name: &str, root: &str) -> bool {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return true;
    }
    name == root || (name.starts_with(root) && name.as_bytes()[root.len()] == b'/')
}

/// Deepest registry entry whose name is a proper path prefix of `name`.
fn deepest_ancestor<'a>(registry: &'a EntityRegistry, name: &str) -> Option<&'a Entity> {
    registry
        .entities()
        .filter(|e| {
            name.len() > e.name.len()
                && name.starts_with(&e.name)
                && name.as_bytes()[e.name.len()] == b'/'
        })
        .max_by_key(|e| e.name.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosua_graph::SimGraph;
    use rosua_space::{InMemorySpace, shared};

    use crate::filter::RawScopeLists;
    use serde_json::json;

    async fn reconciler_for(graph: Arc<SimGraph>, scope: ScopeConfig) -> (Reconciler, SharedSpace) {
        let space = shared(InMemorySpace::new());
        let reconciler = Reconciler::new(
            Arc::clone(&graph) as Arc<dyn GraphSource>,
            Arc::clone(&space),
            scope,
            ReconcilerConfig::default(),
        )
        .await
        .expect("reconciler wiring must succeed");
        (reconciler, space)
    }

    async fn node_count(space: &SharedSpace) -> usize {
        space.lock().await.node_count()
    }

    #[tokio::test]
    async fn first_cycle_mirrors_all_discovered_topics() {
        let graph = Arc::new(SimGraph::new());
        graph.add_topic("/robot/cmd_vel", "geometry_msgs/Twist");
        graph.add_topic("/robot/odom", "nav_msgs/Odometry");
        let (mut reconciler, space) = reconciler_for(graph, ScopeConfig::default()).await;

        let report = reconciler.cycle().await.unwrap();
        assert_eq!(report.discovered, 2);
        assert_eq!(report.created, 2);
        assert_eq!(report.filtered_out, 0);
        // Objects + 3 kind roots + 2 topic nodes.
        assert_eq!(node_count(&space).await, 6);
    }

    #[tokio::test]
    async fn second_cycle_creates_nothing() {
        let graph = Arc::new(SimGraph::new());
        graph.add_topic("/robot/cmd_vel", "geometry_msgs/Twist");
        graph.add_topic("/robot/odom", "nav_msgs/Odometry");
        let (mut reconciler, space) = reconciler_for(graph, ScopeConfig::default()).await;

        reconciler.cycle().await.unwrap();
        let nodes_after_first = node_count(&space).await;

        let second = reconciler.cycle().await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.reused, 2);
        assert_eq!(node_count(&space).await, nodes_after_first);
    }

    #[tokio::test]
    async fn disappeared_entity_keeps_its_node() {
        let graph = Arc::new(SimGraph::new());
        graph.add_topic("/robot/cmd_vel", "geometry_msgs/Twist");
        graph.add_topic("/robot/odom", "nav_msgs/Odometry");
        let (mut reconciler, space) = reconciler_for(Arc::clone(&graph), ScopeConfig::default()).await;

        reconciler.cycle().await.unwrap();
        reconciler.cycle().await.unwrap();

        // /robot/odom vanishes from the graph but is never pruned.
        graph.remove_topic("/robot/odom");
        let third = reconciler.cycle().await.unwrap();
        assert_eq!(third.created, 0);

        let ns = reconciler.namespace_index(EntityKind::Topic);
        let odom_id = NodeId::new(ns, "/robot/odom");
        assert!(space.lock().await.contains(&odom_id));
        assert!(reconciler.registry(EntityKind::Topic).contains_name("/robot/odom"));
    }

    #[tokio::test]
    async fn topic_and_service_with_same_name_get_distinct_nodes() {
        let graph = Arc::new(SimGraph::new());
        graph.add_topic("/ping", "std_msgs/Empty");
        graph.add_service("/ping", "std_srvs/Empty");
        let (mut reconciler, space) = reconciler_for(graph, ScopeConfig::default()).await;

        let report = reconciler.cycle().await.unwrap();
        assert_eq!(report.created, 2);

        let topic_ns = reconciler.namespace_index(EntityKind::Topic);
        let service_ns = reconciler.namespace_index(EntityKind::Service);
        assert_ne!(topic_ns, service_ns);

        let sp = space.lock().await;
        assert!(sp.contains(&NodeId::new(topic_ns, "/ping")));
        assert!(sp.contains(&NodeId::new(service_ns, "/ping")));
    }

    #[tokio::test]
    async fn labels_come_from_the_remaining_hierarchy() {
        let graph = Arc::new(SimGraph::new());
        graph.add_topic("/robot/cmd_vel", "geometry_msgs/Twist");
        let (mut reconciler, space) = reconciler_for(graph, ScopeConfig::default()).await;

        reconciler.cycle().await.unwrap();

        let ns = reconciler.namespace_index(EntityKind::Topic);
        let sp = space.lock().await;
        let root = NodeId::new(ns, EntityKind::Topic.root_browse_name());
        let children = sp.children_of(&root);
        assert_eq!(children.len(), 1);
        // No mirrored ancestor: all real segments concatenated.
        assert_eq!(children[0].browse_name, "robotcmd_vel");
    }

    #[tokio::test]
    async fn entity_nests_under_its_mirrored_ancestor() {
        let graph = Arc::new(SimGraph::new());
        graph.add_topic("/robot", "std_msgs/String");
        graph.add_topic("/robot/arm/joint1", "sensor_msgs/JointState");
        let (mut reconciler, space) = reconciler_for(graph, ScopeConfig::default()).await;

        reconciler.cycle().await.unwrap();

        let ns = reconciler.namespace_index(EntityKind::Topic);
        let sp = space.lock().await;
        let children = sp.children_of(&NodeId::new(ns, "/robot"));
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].browse_name, "armjoint1");
        assert_eq!(children[0].id, NodeId::new(ns, "/robot/arm/joint1"));
    }

    #[tokio::test]
    async fn filtered_entities_are_not_recorded() {
        let graph = Arc::new(SimGraph::new());
        graph.add_topic("/robot/cmd_vel", "geometry_msgs/Twist");
        graph.add_topic("/rosout", "rosgraph_msgs/Log");
        let scope = ScopeConfig::resolve(RawScopeLists {
            excluded_topics: Some(json!(["/rosout"])),
            ..Default::default()
        });
        let (mut reconciler, _space) = reconciler_for(graph, scope).await;

        let report = reconciler.cycle().await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.filtered_out, 1);
        assert!(!reconciler.registry(EntityKind::Topic).contains_name("/rosout"));
    }

    #[tokio::test]
    async fn namespace_root_scopes_enumeration() {
        let graph = Arc::new(SimGraph::new());
        graph.add_topic("/robot/odom", "nav_msgs/Odometry");
        graph.add_topic("/other/telemetry", "std_msgs/String");
        let (mut reconciler, _space) = reconciler_for(graph, ScopeConfig::default()).await;
        reconciler.config.namespace_root = "/robot".to_string();

        let report = reconciler.cycle().await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.filtered_out, 1);
    }

    #[tokio::test]
    async fn namespace_root_matches_whole_segments_only() {
        let graph = Arc::new(SimGraph::new());
        graph.add_topic("/robot/odom", "nav_msgs/Odometry");
        graph.add_topic("/robotics/arm", "sensor_msgs/JointState");
        let (mut reconciler, _space) = reconciler_for(graph, ScopeConfig::default()).await;
        reconciler.config.namespace_root = "/robot".to_string();

        // "/robotics" shares the prefix but is a sibling namespace.
        let report = reconciler.cycle().await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.filtered_out, 1);
        assert!(reconciler.registry(EntityKind::Topic).contains_name("/robot/odom"));
        assert!(!reconciler.registry(EntityKind::Topic).contains_name("/robotics/arm"));
    }

    #[test]
    fn namespace_root_boundary_cases() {
        assert!(in_namespace_root("/robot", "/robot"));
        assert!(in_namespace_root("/robot/arm", "/robot"));
        assert!(in_namespace_root("/robot/arm", "/robot/"));
        assert!(!in_namespace_root("/robotics", "/robot"));
        assert!(in_namespace_root("/anything", "/"));
    }

    #[tokio::test]
    async fn actions_are_mirrored_in_their_own_namespace() {
        let graph = Arc::new(SimGraph::new());
        graph.add_action("/dock", &["/dock/goal", "/dock/result"]);
        let (mut reconciler, space) = reconciler_for(graph, ScopeConfig::default()).await;

        let report = reconciler.cycle().await.unwrap();
        assert_eq!(report.created, 1);

        let ns = reconciler.namespace_index(EntityKind::Action);
        assert!(space.lock().await.contains(&NodeId::new(ns, "/dock")));
    }

    #[tokio::test]
    async fn late_entities_are_picked_up_on_a_later_cycle() {
        let graph = Arc::new(SimGraph::new());
        let (mut reconciler, _space) = reconciler_for(Arc::clone(&graph), ScopeConfig::default()).await;

        let empty = reconciler.cycle().await.unwrap();
        assert_eq!(empty.discovered, 0);

        graph.add_topic("/late/arrival", "std_msgs/String");
        let next = reconciler.cycle().await.unwrap();
        assert_eq!(next.created, 1);
    }

    /// Graph that fails a fixed number of `snapshot` calls before
    /// delegating to an inner [`SimGraph`].
    struct FlakyGraph {
        inner: SimGraph,
        snapshot_failures: std::sync::atomic::AtomicUsize,
    }

    impl FlakyGraph {
        fn failing_once(inner: SimGraph) -> Self {
            Self {
                inner,
                snapshot_failures: std::sync::atomic::AtomicUsize::new(1),
            }
        }
    }

    #[async_trait::async_trait]
    impl GraphSource for FlakyGraph {
        async fn snapshot(&self) -> Result<rosua_types::GraphSnapshot, MirrorError> {
            let remaining = self
                .snapshot_failures
                .load(std::sync::atomic::Ordering::SeqCst);
            if remaining > 0 {
                self.snapshot_failures
                    .store(remaining - 1, std::sync::atomic::Ordering::SeqCst);
                return Err(MirrorError::Graph("simulated enumeration outage".to_string()));
            }
            self.inner.snapshot().await
        }

        async fn ping_all(&self) -> Result<rosua_types::PingReport, MirrorError> {
            self.inner.ping_all().await
        }

        async fn purge(&self, nodes: &[String]) -> Result<usize, MirrorError> {
            self.inner.purge(nodes).await
        }

        async fn has_param(&self, key: &str) -> Result<bool, MirrorError> {
            self.inner.has_param(key).await
        }

        async fn param(&self, key: &str) -> Result<Option<serde_json::Value>, MirrorError> {
            self.inner.param(key).await
        }
    }

    #[tokio::test]
    async fn failed_cycle_recovers_on_the_next_interval() {
        let inner = SimGraph::new();
        inner.add_topic("/robot/cmd_vel", "geometry_msgs/Twist");
        let graph: Arc<dyn GraphSource> = Arc::new(FlakyGraph::failing_once(inner));

        let space = shared(InMemorySpace::new());
        let mut reconciler = Reconciler::new(
            graph,
            Arc::clone(&space),
            ScopeConfig::default(),
            ReconcilerConfig::default(),
        )
        .await
        .expect("reconciler wiring must succeed");

        // Cycle 1 hits the outage and surfaces the error.
        let first = reconciler.cycle().await;
        assert!(matches!(first, Err(MirrorError::Graph(_))));
        assert!(reconciler.registry(EntityKind::Topic).is_empty());

        // Cycle 2 sees the healthy graph and mirrors as usual.
        let second = reconciler.cycle().await.unwrap();
        assert_eq!(second.created, 1);
        assert!(reconciler.registry(EntityKind::Topic).contains_name("/robot/cmd_vel"));
    }
}
