//! [`ScopeConfig`] – allow/exclude filtering of graph entities.
//!
//! Four name sets control which entities are mirrored: allowed topics,
//! excluded topics, allowed services, excluded services.  Actions are
//! topic-backed, so they are evaluated against the topic sets.
//!
//! The precedence rule — a non-empty allow-list makes the sibling
//! exclude-list irrelevant — is enforced once, in [`ScopeConfig::resolve`],
//! by clearing the exclude-list.  After resolution [`ScopeConfig::in_scope`]
//! is a pure function of the stored sets.

use serde_json::Value;
use tracing::{error, warn};

use rosua_types::EntityKind;

/// Raw, unvalidated filter inputs as they arrive from the config file or
/// the graph parameter store.  `None` means "not configured".
#[derive(Debug, Clone, Default)]
pub struct RawScopeLists {
    pub allowed_topics: Option<Value>,
    pub excluded_topics: Option<Value>,
    pub allowed_services: Option<Value>,
    pub excluded_services: Option<Value>,
}

/// Resolved, validated filter policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeConfig {
    allowed_topics: Vec<String>,
    excluded_topics: Vec<String>,
    allowed_services: Vec<String>,
    excluded_services: Vec<String>,
}

impl ScopeConfig {
    /// Validate raw lists and enforce allow-over-exclude precedence.
    ///
    /// A list that is not a sequence of strings is reported and treated as
    /// empty; a non-empty allow-list clears its sibling exclude-list, with a
    /// warning. Neither condition is fatal.
    pub fn resolve(raw: RawScopeLists) -> Self {
        let allowed_topics = coerce_list("allowed_topics", raw.allowed_topics);
        let allowed_services = coerce_list("allowed_services", raw.allowed_services);
        let mut excluded_topics = coerce_list("excluded_topics", raw.excluded_topics);
        let mut excluded_services = coerce_list("excluded_services", raw.excluded_services);

        if !allowed_topics.is_empty() && !excluded_topics.is_empty() {
            warn!("a list of topics to connect to has been defined, so no exceptions can be defined");
            excluded_topics.clear();
        }
        if !allowed_services.is_empty() && !excluded_services.is_empty() {
            warn!("a list of services to connect to has been defined, so no exceptions can be defined");
            excluded_services.clear();
        }

        let resolved = Self {
            allowed_topics,
            excluded_topics,
            allowed_services,
            excluded_services,
        };
        resolved.log_lists();
        resolved
    }

    /// Whether `name` is in scope for `kind`.
    ///
    /// Allow-list non-empty: membership decides. Otherwise exclude-list
    /// non-empty: non-membership decides. Otherwise everything is in scope.
    pub fn in_scope(&self, kind: EntityKind, name: &str) -> bool {
        let (allowed, excluded) = match kind {
            // Actions are built from topics; they follow the topic sets.
            EntityKind::Topic | EntityKind::Action => {
                (&self.allowed_topics, &self.excluded_topics)
            }
            EntityKind::Service => (&self.allowed_services, &self.excluded_services),
        };
        if !allowed.is_empty() {
            return allowed.iter().any(|a| a == name);
        }
        if !excluded.is_empty() {
            return !excluded.iter().any(|e| e == name);
        }
        true
    }

    fn log_lists(&self) {
        for (label, list) in [
            ("allowed topics", &self.allowed_topics),
            ("allowed services", &self.allowed_services),
            ("excluded topics", &self.excluded_topics),
            ("excluded services", &self.excluded_services),
        ] {
            if !list.is_empty() {
                warn!(count = list.len(), "the list of {label} is: {}", list.join(", "));
            }
        }
    }
}

/// Coerce one raw value into a list of names.
///
/// Anything other than an array of strings is reported and ignored, so a
/// malformed list never excludes (or admits) anything by accident.
fn coerce_list(label: &str, raw: Option<Value>) -> Vec<String> {
    let Some(value) = raw else {
        return Vec::new();
    };
    match value {
        Value::Array(items) => {
            let strings: Vec<String> = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            if strings.len() != items.len() {
                error!("the list of {label} is not well defined, it will be ignored");
                return Vec::new();
            }
            strings
        }
        _ => {
            error!("the list of {label} is not well defined, it will be ignored");
            Vec::new()
        }
    }
}
