//! Scope policy assembly from the graph parameter store.
//!
//! Mirrors the precedence of the config loader: a list set on the robot's
//! parameter server under `/rosua/...` wins over the corresponding list in
//! the local config file.

use rosua_graph::GraphSource;
use rosua_sync::{RawScopeLists, ScopeConfig};
use tracing::{debug, warn};

use crate::config::FilterLists;

const PARAM_NAMESPACE_ROOT: &str = "/rosua/namespace";
const PARAM_ALLOWED_TOPICS: &str = "/rosua/allowed_topics";
const PARAM_EXCLUDED_TOPICS: &str = "/rosua/excluded_topics";
const PARAM_ALLOWED_SERVICES: &str = "/rosua/allowed_services";
const PARAM_EXCLUDED_SERVICES: &str = "/rosua/excluded_services";

/// Build the resolved scope policy, preferring graph parameters over the
/// config file's lists.
pub async fn scope_from(graph: &dyn GraphSource, file_lists: &FilterLists) -> ScopeConfig {
    let mut raw = file_lists.to_raw();
    if let Some(v) = param_list(graph, PARAM_ALLOWED_TOPICS).await {
        raw.allowed_topics = Some(v);
    }
    if let Some(v) = param_list(graph, PARAM_EXCLUDED_TOPICS).await {
        raw.excluded_topics = Some(v);
    }
    if let Some(v) = param_list(graph, PARAM_ALLOWED_SERVICES).await {
        raw.allowed_services = Some(v);
    }
    if let Some(v) = param_list(graph, PARAM_EXCLUDED_SERVICES).await {
        raw.excluded_services = Some(v);
    }
    ScopeConfig::resolve(raw)
}

/// Namespace root from the graph parameter store, else the config value.
pub async fn namespace_root_from(graph: &dyn GraphSource, file_value: &str) -> String {
    match param_list(graph, PARAM_NAMESPACE_ROOT).await {
        Some(serde_json::Value::String(root)) if !root.is_empty() => root,
        Some(other) => {
            warn!(key = PARAM_NAMESPACE_ROOT, value = %other, "namespace parameter is not a string; using config value");
            file_value.to_string()
        }
        None => file_value.to_string(),
    }
}

/// Fetch one parameter, treating absence and lookup failures as "not set".
async fn param_list(graph: &dyn GraphSource, key: &str) -> Option<serde_json::Value> {
    match graph.has_param(key).await {
        Ok(true) => match graph.param(key).await {
            Ok(value) => {
                debug!(key, "scope list taken from graph parameter");
                value
            }
            Err(e) => {
                warn!(key, error = %e, "parameter fetch failed; falling back to config file");
                None
            }
        },
        Ok(false) => None,
        Err(e) => {
            warn!(key, error = %e, "parameter lookup failed; falling back to config file");
            None
        }
    }
}
