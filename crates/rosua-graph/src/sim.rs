//! [`SimGraph`] – in-memory robot graph for tests and offline runs.
//!
//! Behaves like a tiny ROS master: topics, services, actions, a process
//! table with per-process reachability, and a parameter store.  Tests mutate
//! the graph between reconciliation cycles to simulate entities appearing
//! and disappearing.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rosua_types::{ActionInfo, GraphSnapshot, MirrorError, PingReport, ServiceInfo, TopicInfo};

use crate::source::GraphSource;

#[derive(Default)]
struct SimState {
    topics: Vec<TopicInfo>,
    services: Vec<ServiceInfo>,
    actions: Vec<ActionInfo>,
    /// Process name → currently reachable.
    processes: HashMap<String, bool>,
    params: HashMap<String, serde_json::Value>,
}

/// In-memory [`GraphSource`] implementation.
///
/// Interior mutability lets tests hold an `Arc<SimGraph>` that both the
/// reconciler and the test body can see.
#[derive(Default)]
pub struct SimGraph {
    state: Mutex<SimState>,
}

impl SimGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a topic with no endpoints recorded.
    pub fn add_topic(&self, name: &str, datatype: &str) {
        self.with_state(|s| {
            s.topics.push(TopicInfo {
                name: name.to_string(),
                datatype: datatype.to_string(),
                publishers: Vec::new(),
                subscribers: Vec::new(),
            });
        });
    }

    /// Remove a topic by name. No-ops when the topic is unknown.
    pub fn remove_topic(&self, name: &str) {
        self.with_state(|s| s.topics.retain(|t| t.name != name));
    }

    pub fn add_service(&self, name: &str, datatype: &str) {
        self.with_state(|s| {
            s.services.push(ServiceInfo {
                name: name.to_string(),
                datatype: datatype.to_string(),
            });
        });
    }

    pub fn remove_service(&self, name: &str) {
        self.with_state(|s| s.services.retain(|sv| sv.name != name));
    }

    pub fn add_action(&self, name: &str, topics: &[&str]) {
        self.with_state(|s| {
            s.actions.push(ActionInfo {
                name: name.to_string(),
                topics: topics.iter().map(|t| t.to_string()).collect(),
            });
        });
    }

    /// Register a graph process and its reachability.
    pub fn add_process(&self, name: &str, reachable: bool) {
        self.with_state(|s| {
            s.processes.insert(name.to_string(), reachable);
        });
    }

    pub fn set_param(&self, key: &str, value: serde_json::Value) {
        self.with_state(|s| {
            s.params.insert(key.to_string(), value);
        });
    }

    /// Number of processes currently known to the simulated master.
    pub fn process_count(&self) -> usize {
        self.with_state(|s| s.processes.len())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

#[async_trait]
impl GraphSource for SimGraph {
    async fn snapshot(&self) -> Result<GraphSnapshot, MirrorError> {
        Ok(self.with_state(|s| GraphSnapshot {
            topics: s.topics.clone(),
            services: s.services.clone(),
            actions: s.actions.clone(),
        }))
    }

    async fn ping_all(&self) -> Result<PingReport, MirrorError> {
        Ok(self.with_state(|s| {
            let mut report = PingReport::default();
            for (name, reachable) in &s.processes {
                if *reachable {
                    report.reachable.push(name.clone());
                } else {
                    report.unreachable.push(name.clone());
                }
            }
            report.reachable.sort();
            report.unreachable.sort();
            report
        }))
    }

    async fn purge(&self, nodes: &[String]) -> Result<usize, MirrorError> {
        Ok(self.with_state(|s| {
            let before = s.processes.len();
            for node in nodes {
                s.processes.remove(node);
            }
            before - s.processes.len()
        }))
    }

    async fn has_param(&self, key: &str) -> Result<bool, MirrorError> {
        Ok(self.with_state(|s| s.params.contains_key(key)))
    }

    async fn param(&self, key: &str) -> Result<Option<serde_json::Value>, MirrorError> {
        Ok(self.with_state(|s| s.params.get(key).cloned()))
    }
}
