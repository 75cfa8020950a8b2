//! [`RosbridgeGraph`] – rosbridge-backed [`GraphSource`] implementation.
//!
//! Speaks the rosbridge JSON protocol over a single WebSocket connection and
//! drives the `/rosapi/*` introspection services:
//!
//! | Call | rosapi service |
//! |---|---|
//! | topic enumeration | `/rosapi/topics`, `/rosapi/publishers`, `/rosapi/subscribers` |
//! | service enumeration | `/rosapi/services`, `/rosapi/service_type` |
//! | action enumeration | `/rosapi/action_servers` |
//! | process table | `/rosapi/nodes`, `/rosapi/node_details` |
//! | parameters | `/rosapi/has_param`, `/rosapi/get_param` |
//!
//! rosbridge exposes no master-unregister RPC, so [`GraphSource::purge`]
//! operates on this client's own record of known processes, which is
//! refreshed on every snapshot.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, warn};
use uuid::Uuid;

use rosua_types::{ActionInfo, GraphSnapshot, MirrorError, PingReport, ServiceInfo, TopicInfo};

use crate::source::GraphSource;

/// How long to wait for any single rosapi response before giving up.
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Topic suffixes that back one action server.
const ACTION_SUBTOPICS: [&str; 5] = ["goal", "cancel", "status", "feedback", "result"];

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// rosbridge-backed view of the live robot graph.
pub struct RosbridgeGraph {
    ws: Mutex<WsStream>,
    /// Process names seen on the last snapshot, minus anything purged since.
    known: Mutex<HashSet<String>>,
}

impl RosbridgeGraph {
    /// Connect to a rosbridge endpoint (e.g. `ws://localhost:9090`).
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Graph`] when the WebSocket handshake fails.
    pub async fn connect(url: &str) -> Result<Self, MirrorError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| MirrorError::Graph(format!("rosbridge connect to {url}: {e}")))?;
        Ok(Self {
            ws: Mutex::new(ws),
            known: Mutex::new(HashSet::new()),
        })
    }

    /// Call one rosapi service and return its `values` object.
    async fn call(&self, service: &str, args: Value) -> Result<Value, MirrorError> {
        let id = Uuid::new_v4().to_string();
        let frame = call_frame(&id, service, args);

        let mut ws = self.ws.lock().await;
        ws.send(Message::Text(frame.to_string().into()))
            .await
            .map_err(|e| MirrorError::Graph(format!("rosbridge send for {service}: {e}")))?;

        loop {
            let msg = tokio::time::timeout(CALL_TIMEOUT, ws.next())
                .await
                .map_err(|_| {
                    MirrorError::Graph(format!("timed out waiting for {service} response"))
                })?;
            match msg {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(text.as_str()).map_err(|e| {
                        MirrorError::Serialization(format!("rosbridge frame: {e}"))
                    })?;
                    if value.get("op").and_then(Value::as_str) == Some("service_response")
                        && value.get("id").and_then(Value::as_str) == Some(id.as_str())
                    {
                        if value.get("result").and_then(Value::as_bool).unwrap_or(true) {
                            return Ok(value.get("values").cloned().unwrap_or(Value::Null));
                        }
                        return Err(MirrorError::Graph(format!("{service} call reported failure")));
                    }
                    // Unrelated frame (status message, stray publish) – keep reading.
                    debug!(service, "skipping unrelated rosbridge frame");
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(MirrorError::Graph("rosbridge connection closed".to_string()));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(MirrorError::Graph(format!("rosbridge read error: {e}")));
                }
            }
        }
    }

    async fn topic_endpoints(&self, topic: &str) -> (Vec<String>, Vec<String>) {
        // Endpoint enumeration is best-effort: a failed lookup leaves the
        // lists empty rather than failing the whole snapshot.
        let publishers = match self.call("/rosapi/publishers", json!({ "topic": topic })).await {
            Ok(values) => string_list(&values, "publishers"),
            Err(e) => {
                debug!(topic, error = %e, "publisher lookup failed");
                Vec::new()
            }
        };
        let subscribers = match self
            .call("/rosapi/subscribers", json!({ "topic": topic }))
            .await
        {
            Ok(values) => string_list(&values, "subscribers"),
            Err(e) => {
                debug!(topic, error = %e, "subscriber lookup failed");
                Vec::new()
            }
        };
        (publishers, subscribers)
    }
}

#[async_trait]
impl GraphSource for RosbridgeGraph {
    async fn snapshot(&self) -> Result<GraphSnapshot, MirrorError> {
        // Topics: names and types come back as two parallel arrays.
        let values = self.call("/rosapi/topics", json!({})).await?;
        let names = string_list(&values, "topics");
        let types = string_list(&values, "types");
        let mut topics = Vec::with_capacity(names.len());
        for (i, name) in names.into_iter().enumerate() {
            let datatype = types.get(i).cloned().unwrap_or_default();
            let (publishers, subscribers) = self.topic_endpoints(&name).await;
            topics.push(TopicInfo {
                name,
                datatype,
                publishers,
                subscribers,
            });
        }

        // Services, with a per-service type lookup.
        let values = self.call("/rosapi/services", json!({})).await?;
        let mut services = Vec::new();
        for name in string_list(&values, "services") {
            let datatype = match self
                .call("/rosapi/service_type", json!({ "service": name }))
                .await
            {
                Ok(v) => v
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                Err(e) => {
                    debug!(service = %name, error = %e, "service type lookup failed");
                    String::new()
                }
            };
            services.push(ServiceInfo { name, datatype });
        }

        // Action servers; constituent topics follow the actionlib layout.
        let values = self.call("/rosapi/action_servers", json!({})).await?;
        let actions = string_list(&values, "action_servers")
            .into_iter()
            .map(|name| {
                let topics = action_topics(&name);
                ActionInfo { name, topics }
            })
            .collect();

        // Refresh the process record while we are at it.
        let values = self.call("/rosapi/nodes", json!({})).await?;
        let nodes = string_list(&values, "nodes");
        {
            let mut known = self.known.lock().await;
            known.extend(nodes);
        }

        Ok(GraphSnapshot {
            topics,
            services,
            actions,
        })
    }

    async fn ping_all(&self) -> Result<PingReport, MirrorError> {
        let values = self.call("/rosapi/nodes", json!({})).await?;
        let nodes = string_list(&values, "nodes");
        {
            let mut known = self.known.lock().await;
            known.extend(nodes.clone());
        }

        let mut report = PingReport::default();
        let known: Vec<String> = {
            let guard = self.known.lock().await;
            guard.iter().cloned().collect()
        };
        for node in known {
            match self.call("/rosapi/node_details", json!({ "node": node })).await {
                Ok(_) => report.reachable.push(node),
                Err(e) => {
                    debug!(node = %node, error = %e, "node ping failed");
                    report.unreachable.push(node);
                }
            }
        }
        report.reachable.sort();
        report.unreachable.sort();
        Ok(report)
    }

    async fn purge(&self, nodes: &[String]) -> Result<usize, MirrorError> {
        let mut known = self.known.lock().await;
        let before = known.len();
        for node in nodes {
            known.remove(node);
        }
        let removed = before - known.len();
        if removed > 0 {
            warn!(removed, "purged stale process records");
        }
        Ok(removed)
    }

    async fn has_param(&self, key: &str) -> Result<bool, MirrorError> {
        let values = self.call("/rosapi/has_param", json!({ "name": key })).await?;
        Ok(values.get("exists").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn param(&self, key: &str) -> Result<Option<Value>, MirrorError> {
        if !self.has_param(key).await? {
            return Ok(None);
        }
        let values = self
            .call("/rosapi/get_param", json!({ "name": key, "default": "" }))
            .await?;
        Ok(values.get("value").map(decode_param_value))
    }
}

// ---------------------------------------------------------------------------
// Frame helpers
// ---------------------------------------------------------------------------

/// Build one rosbridge `call_service` frame.
fn call_frame(id: &str, service: &str, args: Value) -> Value {
    json!({
        "op": "call_service",
        "id": id,
        "service": service,
        "args": args,
    })
}

/// Extract a `Vec<String>` field from a rosapi `values` object.
///
/// Missing fields and non-string elements are dropped silently; rosapi
/// responses vary slightly between distributions.
fn string_list(values: &Value, key: &str) -> Vec<String> {
    values
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// rosapi returns parameter values JSON-encoded inside a string. Decode the
/// inner document when possible; otherwise pass the raw value through.
fn decode_param_value(raw: &Value) -> Value {
    match raw {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| raw.clone()),
        other => other.clone(),
    }
}

/// Topics backing one actionlib server.
fn action_topics(action: &str) -> Vec<String> {
    ACTION_SUBTOPICS
        .iter()
        .map(|suffix| format!("{action}/{suffix}"))
        .collect()
}
