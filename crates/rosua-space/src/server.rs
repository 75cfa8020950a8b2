//! [`SpaceServer`] – WebSocket endpoint exposing the address space.
//!
//! External automation tooling connects here to browse the mirrored node
//! tree as JSON frames:
//!
//! * `{"op":"browse"}` – children of the Objects root.
//! * `{"op":"browse","node":{"ns":1,"ident":"/robot/odom"}}` – children of
//!   a specific node.
//!
//! Replies are `browse_result` frames carrying the child handles, or an
//! `error` frame for unknown nodes and malformed requests.  The server is
//! read-only; only the reconciliation loop mutates the space.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info};

use rosua_types::{MirrorError, NodeId};

use crate::space::SharedSpace;

#[derive(Deserialize)]
struct BrowseRequest {
    op: String,
    node: Option<NodeRef>,
}

#[derive(Deserialize)]
struct NodeRef {
    ns: u16,
    ident: String,
}

/// Read-only WebSocket front end over a [`SharedSpace`].
pub struct SpaceServer {
    space: SharedSpace,
}

impl SpaceServer {
    pub fn new(space: SharedSpace) -> Self {
        Self { space }
    }

    /// Bind `addr` and start serving browse clients in a background task.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Space`] when the TCP listener cannot bind.
    pub async fn start(self, addr: &str) -> Result<SpaceServerHandle, MirrorError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MirrorError::Space(format!("bind error on {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| MirrorError::Space(format!("local_addr: {e}")))?;
        info!(%local_addr, "address-space endpoint listening");

        let space = self.space;
        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let space = Arc::clone(&space);
                        tokio::spawn(async move {
                            if let Err(e) = handle_client(stream, peer, space).await {
                                debug!(peer = %peer, error = %e, "browse client error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "accept error");
                    }
                }
            }
        });

        Ok(SpaceServerHandle { local_addr, task })
    }
}

/// Handle for a running [`SpaceServer`]; dropping it does not stop the
/// server, [`SpaceServerHandle::stop`] does.
pub struct SpaceServerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl SpaceServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting clients and tear the endpoint down.
    pub fn stop(self) {
        self.task.abort();
    }
}

async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    space: SharedSpace,
) -> Result<(), MirrorError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| MirrorError::Space(format!("ws handshake from {peer}: {e}")))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let reply = handle_request(text.as_str(), &space).await;
                if ws_tx
                    .send(Message::Text(reply.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }
    Ok(())
}

/// Answer one browse frame.
async fn handle_request(text: &str, space: &SharedSpace) -> Value {
    let request: BrowseRequest = match serde_json::from_str(text) {
        Ok(req) => req,
        Err(e) => return error_frame(&format!("malformed request: {e}")),
    };
    if request.op != "browse" {
        return error_frame(&format!("unknown op '{}'", request.op));
    }

    let space = space.lock().await;
    let node_id = match request.node {
        Some(node) => NodeId::new(node.ns, node.ident),
        None => space.objects(),
    };
    if !space.contains(&node_id) {
        return error_frame(&format!("unknown node {node_id}"));
    }

    let children: Vec<Value> = space
        .children_of(&node_id)
        .into_iter()
        .map(|child| {
            json!({
                "ns": child.id.ns,
                "ident": child.id.ident,
                "browse_name": child.browse_name,
            })
        })
        .collect();

    json!({
        "op": "browse_result",
        "node": { "ns": node_id.ns, "ident": node_id.ident },
        "children": children,
    })
}

fn error_frame(message: &str) -> Value {
    json!({ "op": "error", "message": message })
}
