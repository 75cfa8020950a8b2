//! The robot-graph collaborator boundary.
//!
//! The reconciler never speaks a wire protocol directly.  It consumes the
//! [`GraphSource`] trait; implementations translate the calls into whatever
//! the deployment actually runs:
//!
//! - [`RosbridgeGraph`][crate::rosbridge::RosbridgeGraph] – rosbridge
//!   `call_service` frames against the `/rosapi/*` services.
//! - [`SimGraph`][crate::sim::SimGraph] – an in-memory graph fixture for
//!   tests and offline runs.

use async_trait::async_trait;
use rosua_types::{GraphSnapshot, MirrorError, PingReport};

/// Read access to the live robot communication graph.
///
/// # Contract
///
/// * `snapshot` – enumerate the current topics, services, and actions.
/// * `ping_all` – ping every known graph process and partition the set into
///   reachable and unreachable.
/// * `purge` – remove the given processes from the graph's record of known
///   processes; returns how many were actually removed.
/// * `has_param` / `param` – key/value configuration reads from the graph's
///   parameter store, with a presence check before the read.
///
/// All calls are blocking from the caller's perspective; a slow graph stalls
/// the current scan cycle, which the coarse cycle interval absorbs.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Enumerate the current communication graph.
    async fn snapshot(&self) -> Result<GraphSnapshot, MirrorError>;

    /// Ping every known graph process.
    async fn ping_all(&self) -> Result<PingReport, MirrorError>;

    /// Remove stale process records from the graph's bookkeeping.
    async fn purge(&self, nodes: &[String]) -> Result<usize, MirrorError>;

    /// Whether a parameter is set in the graph's parameter store.
    async fn has_param(&self, key: &str) -> Result<bool, MirrorError>;

    /// Read a parameter value. Returns `None` when the key is absent.
    async fn param(&self, key: &str) -> Result<Option<serde_json::Value>, MirrorError>;
}
